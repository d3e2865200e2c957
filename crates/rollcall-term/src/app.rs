//! Application state machine and event dispatcher.
//!
//! The device half emulates an attended hardware terminal: a keypad, a small
//! OLED-style screen, and a card sensor, driven through the states
//! `Booting → Idle → EnterStaffId → SelectCourse → Active → Idle`, with
//! `Offline` reached when the store is unreachable at boot. The console half
//! is the live viewer for whichever session is active.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, warn};

use rollcall_core::{
  identity::{Course, Lecturer, STAFF_ID_DIGITS, StaffId, Student},
  scan::{ScanCommitter, ScanIdentity, ScanOutcome},
  session::{Session, SessionManager, SessionPolicy},
  store::{AttendanceStore, StoreEvent},
};

use crate::console::Console;

// ─── Timing ───────────────────────────────────────────────────────────────────

/// Simulated card settle time before the scan is submitted.
const READ_DELAY: Duration = Duration::from_millis(600);

/// How long a scan classification stays on screen before the ready message
/// returns.
const RESULT_DISPLAY: Duration = Duration::from_millis(1500);

/// How long rejection prompts stay up before falling back to idle.
const FALLBACK_DELAY: Duration = Duration::from_millis(2000);

/// Only the first 9 owned courses are selectable — single-digit keys address
/// the list.
const COURSE_CAP: usize = 9;

// ─── Device state ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
  Booting,
  /// The store was unreachable at boot; only quit works.
  Offline,
  Idle,
  EnterStaffId,
  SelectCourse,
  Active,
}

/// Which pane has keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
  Device,
  Console,
}

// ─── Deferred screen updates ──────────────────────────────────────────────────

/// What to do when a timed display (error, rejection) elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResetAction {
  /// Restore the ready-to-scan message (still `Active`).
  DeviceReady,
  /// Fall back to `Idle` with the welcome message.
  DeviceIdle,
  /// Re-show the staff-id prompt (still `EnterStaffId`).
  RepromptStaffId,
}

struct PendingReset {
  at:     Instant,
  action: ResetAction,
}

/// Result of a background scan task.
enum ScanReply {
  Outcome(ScanOutcome),
  Failed(String),
}

// ─── App ──────────────────────────────────────────────────────────────────────

/// Top-level application state.
pub struct App<S> {
  store:     S,
  manager:   SessionManager<S>,
  committer: ScanCommitter<S>,

  pub view:   View,
  pub device: DeviceState,

  /// Staff-id digit buffer (keypad input, without the `SMAF/` prefix).
  pub input: String,

  /// OLED screen lines.
  pub screen: Vec<String>,

  /// Staff member verified during this device interaction.
  pub staff: Option<Lecturer>,

  /// Courses offered for selection, already capped at [`COURSE_CAP`].
  pub courses: Vec<Course>,

  /// The session this device believes is running.
  pub session: Option<Session>,

  /// Test cards (all registered students) shown next to the device.
  pub cards:       Vec<Student>,
  pub card_cursor: usize,

  /// One scan may be in flight at a time; rapid repeated taps are dropped
  /// here, before they ever reach the committer.
  pub scan_in_flight: bool,

  pub console: Console,

  reset:   Option<PendingReset>,
  events:  broadcast::Receiver<StoreEvent>,
  scan_tx: mpsc::UnboundedSender<ScanReply>,
  scan_rx: mpsc::UnboundedReceiver<ScanReply>,
}

impl<S> App<S>
where
  S: AttendanceStore + Clone + 'static,
{
  pub fn new(store: S, policy: SessionPolicy, require_enrollment: bool) -> Self {
    let manager = SessionManager::new(store.clone(), policy);
    let committer = ScanCommitter::new(store.clone(), policy)
      .with_enrollment_gate(require_enrollment);
    let events = store.subscribe();
    let (scan_tx, scan_rx) = mpsc::unbounded_channel();

    Self {
      store,
      manager,
      committer,
      view: View::Device,
      device: DeviceState::Booting,
      input: String::new(),
      screen: vec!["> SYSTEM BOOT...".into()],
      staff: None,
      courses: Vec::new(),
      session: None,
      cards: Vec::new(),
      card_cursor: 0,
      scan_in_flight: false,
      console: Console::standby(),
      reset: None,
      events,
      scan_tx,
      scan_rx,
    }
  }

  pub fn policy(&self) -> &SessionPolicy { self.manager.policy() }

  // ── Boot ──────────────────────────────────────────────────────────────────

  /// Initial fetch: load test cards and resume any active session. A store
  /// failure here puts the device in `Offline` rather than crashing.
  pub async fn boot(&mut self) {
    match self.try_boot().await {
      Ok(()) => {}
      Err(e) => {
        warn!(error = %e, "boot failed; device offline");
        self.device = DeviceState::Offline;
        self.set_screen(["> NO NETWORK", "> CHECK CONFIG"]);
      }
    }
  }

  async fn try_boot(&mut self) -> Result<(), S::Error> {
    self.cards = self.store.list_students().await?;

    // Resume path: an in-progress session survives a client reload.
    if let Some(session) = self.manager.resolve_active().await? {
      self.adopt_session(session).await?;
      self.set_screen(["> SESSION ACTIVE", "> READY TO SCAN"]);
    } else {
      self.to_idle();
    }
    Ok(())
  }

  /// Enter `Active` for `session` and point the console at it.
  async fn adopt_session(&mut self, session: Session) -> Result<(), S::Error> {
    let history = self.store.logs_for_session(session.session_id).await?;
    let course = self.store.get_course(session.course_id).await?;
    self.console.watch(session.clone(), history, course);
    self.session = Some(session);
    self.device = DeviceState::Active;
    Ok(())
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub async fn handle_key(&mut self, key: KeyEvent) -> bool {
    // Global: Ctrl-C quits from anywhere.
    if key.modifiers.contains(KeyModifiers::CONTROL)
      && key.code == KeyCode::Char('c')
    {
      return false;
    }
    if key.code == KeyCode::Char('q') {
      return false;
    }
    if key.code == KeyCode::Tab {
      self.view = match self.view {
        View::Device => View::Console,
        View::Console => View::Device,
      };
      return true;
    }

    if self.view == View::Device {
      self.handle_device_key(key).await;
    }
    true
  }

  async fn handle_device_key(&mut self, key: KeyEvent) {
    if matches!(self.device, DeviceState::Booting | DeviceState::Offline) {
      return;
    }

    match key.code {
      KeyCode::Char(c) if c.is_ascii_digit() => self.keypad_digit(c).await,
      KeyCode::Enter => self.keypad_confirm().await,
      KeyCode::Backspace | KeyCode::Char('c') => self.keypad_clear(),
      KeyCode::Char('e') | KeyCode::Char('*') => self.keypad_end().await,
      KeyCode::Down | KeyCode::Char('j') => {
        if !self.cards.is_empty() && self.card_cursor + 1 < self.cards.len() {
          self.card_cursor += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => {
        self.card_cursor = self.card_cursor.saturating_sub(1);
      }
      KeyCode::Char('t') | KeyCode::Char(' ') => self.tap_card(),
      _ => {}
    }
  }

  async fn keypad_digit(&mut self, digit: char) {
    match self.device {
      DeviceState::EnterStaffId => {
        if self.input.len() < STAFF_ID_DIGITS {
          self.input.push(digit);
        }
        self.show_staff_prompt();
      }
      DeviceState::SelectCourse => {
        let Some(idx) = digit.to_digit(10).map(|d| d as usize) else {
          return;
        };
        if idx >= 1 && idx <= self.courses.len() {
          self.start_session(idx - 1).await;
        }
      }
      _ => {}
    }
  }

  async fn keypad_confirm(&mut self) {
    match self.device {
      DeviceState::Idle => {
        self.device = DeviceState::EnterStaffId;
        self.input.clear();
        self.show_staff_prompt();
      }
      DeviceState::EnterStaffId => self.submit_staff_id().await,
      _ => {}
    }
  }

  fn keypad_clear(&mut self) {
    if self.device == DeviceState::EnterStaffId {
      self.input.pop();
      self.show_staff_prompt();
    }
  }

  async fn keypad_end(&mut self) {
    if self.device != DeviceState::Active {
      return;
    }
    let Some(session) = self.session.take() else {
      self.to_idle();
      return;
    };
    self.set_screen(["> TERMINATING..."]);
    if let Err(e) = self.manager.stop(session.session_id).await {
      error!(error = %e, "failed to stop session");
    }
    self.console.clear();
    self.device = DeviceState::Idle;
    self.set_screen(["> SESSION ENDED", "> PRESS ENTER TO START"]);
  }

  // ── Staff id entry ────────────────────────────────────────────────────────

  fn show_staff_prompt(&mut self) {
    let padded = format!(
      "{}{}",
      self.input,
      "_".repeat(STAFF_ID_DIGITS - self.input.len())
    );
    self.set_screen(["ENTER STAFF ID:".into(), format!("SMAF/{padded}")]);
  }

  async fn submit_staff_id(&mut self) {
    let Ok(staff_id) = StaffId::from_digits(&self.input) else {
      self.set_screen(["INVALID ID LENGTH", "TRY AGAIN"]);
      self.input.clear();
      self.schedule(RESULT_DISPLAY, ResetAction::RepromptStaffId);
      return;
    };

    self.set_screen(["VERIFYING ID..."]);
    match self.store.lecturer_by_staff_id(&staff_id).await {
      Ok(Some(staff)) => {
        match self.store.courses_for_lecturer(staff.lecturer_id).await {
          Ok(courses) if !courses.is_empty() => {
            self.staff = Some(staff);
            self.courses = courses;
            self.courses.truncate(COURSE_CAP);
            self.device = DeviceState::SelectCourse;
            self.show_course_menu();
          }
          Ok(_) => {
            self.set_screen(["NO COURSES FOUND", "FOR THIS ID"]);
            self.schedule(FALLBACK_DELAY, ResetAction::DeviceIdle);
          }
          Err(e) => {
            error!(error = %e, "course lookup failed");
            self.set_screen(["> NET ERROR"]);
            self.schedule(FALLBACK_DELAY, ResetAction::DeviceIdle);
          }
        }
      }
      Ok(None) => {
        self.set_screen(["ID NOT FOUND"]);
        self.schedule(FALLBACK_DELAY, ResetAction::DeviceIdle);
      }
      Err(e) => {
        error!(error = %e, "staff lookup failed");
        self.set_screen(["> NET ERROR"]);
        self.schedule(FALLBACK_DELAY, ResetAction::DeviceIdle);
      }
    }
  }

  fn show_course_menu(&mut self) {
    let mut lines = vec![format!("SELECT COURSE (1-{}):", self.courses.len())];
    for (i, course) in self.courses.iter().enumerate() {
      lines.push(format!("{}. {}", i + 1, course.code));
    }
    self.screen = lines;
  }

  // ── Session start ─────────────────────────────────────────────────────────

  async fn start_session(&mut self, index: usize) {
    let Some(staff) = self.staff.clone() else { return };
    let Some(course) = self.courses.get(index).cloned() else { return };

    self.set_screen(["> INITIALIZING...", "> CONTACTING DB"]);
    match self.manager.start(course.course_id, staff.lecturer_id).await {
      Ok(session) => {
        if let Err(e) = self.adopt_session(session).await {
          error!(error = %e, "failed to load session state");
        }
        self.set_screen([
          "> SESSION STARTED",
          "> READY TO SCAN",
          "> PRESS E TO END",
        ]);
      }
      Err(e) => {
        error!(error = %e, "failed to start session");
        self.set_screen(["> ERROR STARTING", "> RETRYING..."]);
        self.schedule(FALLBACK_DELAY, ResetAction::DeviceIdle);
      }
    }
  }

  // ── Card taps ─────────────────────────────────────────────────────────────

  /// Dispatch a scan for the selected test card on a background task.
  ///
  /// The guard drops repeated taps while a scan is in flight; the server-side
  /// duplicate check is a separate concern and still applies.
  pub fn tap_card(&mut self) {
    if self.device != DeviceState::Active || self.scan_in_flight {
      return;
    }
    let Some(session) = self.session.clone() else {
      self.set_screen(["> ERROR: NO COURSE", "> RESTART SESSION"]);
      return;
    };
    let Some(card) = self.cards.get(self.card_cursor) else { return };
    let Some(tag) = card.rfid_tag.clone() else {
      self.set_screen(["> ERROR: NO TAG", "> CARD UNASSIGNED"]);
      self.schedule(RESULT_DISPLAY, ResetAction::DeviceReady);
      return;
    };

    self.scan_in_flight = true;
    let shown: String = tag.chars().take(6).collect();
    self.set_screen(["> READING TAG...".into(), format!("> ID: {shown}")]);

    let committer = self.committer.clone();
    let tx = self.scan_tx.clone();
    tokio::spawn(async move {
      // Card settle time, as on the real reader.
      tokio::time::sleep(READ_DELAY).await;
      let reply = match committer
        .submit(&ScanIdentity::Tag(tag), &session)
        .await
      {
        Ok(outcome) => ScanReply::Outcome(outcome),
        Err(e) => ScanReply::Failed(e.to_string()),
      };
      let _ = tx.send(reply);
    });
  }

  /// Collect finished background scans and display their classification.
  pub fn drain_scan_results(&mut self) {
    while let Ok(reply) = self.scan_rx.try_recv() {
      self.scan_in_flight = false;
      match reply {
        ScanReply::Outcome(ScanOutcome::Recorded(log)) => {
          let name = self
            .cards
            .iter()
            .find(|c| c.student_id == log.student_id)
            .map(|c| c.first_name.clone())
            .unwrap_or_default();
          self.set_screen(["> ACCESS GRANTED".into(), format!("> {name}")]);
          self.schedule(RESULT_DISPLAY, ResetAction::DeviceReady);
        }
        ScanReply::Outcome(ScanOutcome::Duplicate) => {
          self.set_screen(["> ERROR: DUPLICATE", "> ALREADY LOGGED"]);
          self.schedule(RESULT_DISPLAY, ResetAction::DeviceReady);
        }
        ScanReply::Outcome(ScanOutcome::UnknownTag) => {
          self.set_screen(["> ERROR: UNKNOWN TAG"]);
          self.schedule(RESULT_DISPLAY, ResetAction::DeviceReady);
        }
        ScanReply::Outcome(ScanOutcome::NotEnrolled) => {
          self.set_screen(["> ERROR: NOT ENROLLED"]);
          self.schedule(RESULT_DISPLAY, ResetAction::DeviceReady);
        }
        ScanReply::Outcome(ScanOutcome::SessionClosed) => {
          // The session died under us; the close event will also arrive,
          // but don't leave the operator scanning into nothing.
          self.set_screen(["> SESSION OVER", "> NOT RECORDED"]);
          self.schedule(FALLBACK_DELAY, ResetAction::DeviceIdle);
        }
        ScanReply::Failed(detail) => {
          error!(error = %detail, "scan submission failed");
          self.set_screen(["> SYS ERROR", "> RETRY LATER"]);
          self.schedule(RESULT_DISPLAY, ResetAction::DeviceReady);
        }
      }
    }
  }

  // ── Change-feed pump ──────────────────────────────────────────────────────

  /// Drain pending store events. A lagged receiver re-subscribes and
  /// re-fetches in full — attendance rows are immutable, so the re-fetch is
  /// always correct.
  pub async fn pump_events(&mut self) {
    loop {
      match self.events.try_recv() {
        Ok(event) => self.apply_event(event).await,
        Err(broadcast::error::TryRecvError::Empty) => break,
        Err(broadcast::error::TryRecvError::Lagged(missed)) => {
          warn!(missed, "change feed lagged; re-fetching");
          self.events = self.store.subscribe();
          self.refetch_console().await;
        }
        Err(broadcast::error::TryRecvError::Closed) => break,
      }
    }
  }

  async fn apply_event(&mut self, event: StoreEvent) {
    match event {
      StoreEvent::AttendanceRecorded { log_id, session_id } => {
        let watched =
          self.console.watching().map(|s| s.session_id);
        if watched.is_some() && session_id == watched {
          // Notifications carry ids only; fetch the joined record.
          match self.store.log_entry(log_id).await {
            Ok(Some(entry)) => self.console.push(entry),
            Ok(None) => {}
            Err(e) => error!(error = %e, "failed to fetch notified log"),
          }
        }
      }
      StoreEvent::SessionStarted(session) => {
        let already =
          self.console.watching().map(|s| s.session_id) == Some(session.session_id);
        if !already {
          if let Err(e) = self.watch_session(session).await {
            error!(error = %e, "failed to follow new session");
          }
        }
      }
      StoreEvent::SessionClosed { session_id } => {
        if self.console.watching().map(|s| s.session_id) == Some(session_id) {
          self.console.clear();
        }
        if self.device == DeviceState::Active
          && self.session.as_ref().map(|s| s.session_id) == Some(session_id)
        {
          self.session = None;
          self.device = DeviceState::Idle;
          self.set_screen(["> SESSION ENDED", "> PRESS ENTER TO START"]);
        }
      }
    }
  }

  /// Point the console (only) at `session`; the device keeps its own state.
  async fn watch_session(&mut self, session: Session) -> Result<(), S::Error> {
    let history = self.store.logs_for_session(session.session_id).await?;
    let course = self.store.get_course(session.course_id).await?;
    self.console.watch(session, history, course);
    Ok(())
  }

  async fn refetch_console(&mut self) {
    let Some(watched) = self.console.watching().cloned() else { return };
    match self.manager.resolve_active().await {
      Ok(Some(session)) if session.session_id == watched.session_id => {
        if let Err(e) = self.watch_session(session).await {
          error!(error = %e, "console re-fetch failed");
        }
      }
      Ok(_) => self.console.clear(),
      Err(e) => error!(error = %e, "console re-fetch failed"),
    }
  }

  // ── Tick ──────────────────────────────────────────────────────────────────

  /// Timed work: deferred screen resets, the session duration timeout, and
  /// the spotlight queue.
  pub async fn tick(&mut self, now: DateTime<Utc>, mono: Instant) {
    if let Some(pending) = &self.reset {
      if mono >= pending.at {
        let action = pending.action;
        self.reset = None;
        self.apply_reset(action);
      }
    }

    // The timeout is recomputed from start_time every tick, so it survives
    // reloads and needs no in-memory countdown.
    if let Some(session) = self.session.clone() {
      if session.is_expired(self.manager.policy(), now) {
        if let Err(e) = self.manager.stop(session.session_id).await {
          error!(error = %e, "failed to stop expired session");
        }
        self.session = None;
        self.console.clear();
        if self.device == DeviceState::Active {
          self.device = DeviceState::Idle;
          self.set_screen(["> SESSION TIMEOUT", "> PRESS ENTER TO START"]);
        }
      }
    }

    self.console.advance(mono);
  }

  fn apply_reset(&mut self, action: ResetAction) {
    match action {
      ResetAction::DeviceReady => {
        if self.device == DeviceState::Active {
          self.set_screen(["> SESSION ACTIVE", "> READY TO SCAN"]);
        }
      }
      ResetAction::DeviceIdle => self.to_idle(),
      ResetAction::RepromptStaffId => {
        if self.device == DeviceState::EnterStaffId {
          self.show_staff_prompt();
        }
      }
    }
  }

  // ── Helpers ───────────────────────────────────────────────────────────────

  fn to_idle(&mut self) {
    self.device = DeviceState::Idle;
    self.input.clear();
    self.staff = None;
    self.courses.clear();
    self.set_screen(["> WELCOME", "> PRESS ENTER TO START"]);
  }

  fn set_screen<I, T>(&mut self, lines: I)
  where
    I: IntoIterator<Item = T>,
    T: Into<String>,
  {
    self.screen = lines.into_iter().map(Into::into).collect();
  }

  fn schedule(&mut self, after: Duration, action: ResetAction) {
    self.reset = Some(PendingReset { at: Instant::now() + after, action });
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use rollcall_core::identity::{NewCourse, NewLecturer, NewStudent};
  use rollcall_store_sqlite::SqliteStore;

  use super::*;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  async fn seeded_store(courses: usize) -> SqliteStore {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let lecturer = store
      .add_lecturer(NewLecturer {
        staff_id:   StaffId::from_digits("0001").unwrap(),
        first_name: "Grace".into(),
        last_name:  "Hopper".into(),
        email:      "g.hopper@example.edu".into(),
        department: "Computer Science".into(),
      })
      .await
      .unwrap();
    for i in 0..courses {
      store
        .add_course(NewCourse {
          code:        format!("CS{:03}", 100 + i),
          name:        format!("Course {i}"),
          lecturer_id: Some(lecturer.lecturer_id),
          description: None,
        })
        .await
        .unwrap();
    }
    store
      .add_student(NewStudent {
        number:     "S001".into(),
        rfid_tag:   Some("AB12CD".into()),
        first_name: "Ada".into(),
        last_name:  "Lovelace".into(),
        email:      "a.lovelace@example.edu".into(),
        photo_url:  None,
      })
      .await
      .unwrap();
    store
  }

  async fn booted(store: SqliteStore) -> App<SqliteStore> {
    let mut app = App::new(store, SessionPolicy::default(), false);
    app.boot().await;
    app
  }

  #[tokio::test]
  async fn keypad_walkthrough_to_active() {
    let mut app = booted(seeded_store(2).await).await;
    assert_eq!(app.device, DeviceState::Idle);

    app.handle_key(key(KeyCode::Enter)).await;
    assert_eq!(app.device, DeviceState::EnterStaffId);

    for c in "0001".chars() {
      app.handle_key(key(KeyCode::Char(c))).await;
    }
    app.handle_key(key(KeyCode::Enter)).await;
    assert_eq!(app.device, DeviceState::SelectCourse);
    assert_eq!(app.courses.len(), 2);

    app.handle_key(key(KeyCode::Char('1'))).await;
    assert_eq!(app.device, DeviceState::Active);
    assert!(app.session.is_some());
    assert!(app.console.watching().is_some());
  }

  #[tokio::test]
  async fn short_staff_id_reprompts_without_leaving_entry() {
    let mut app = booted(seeded_store(1).await).await;
    app.handle_key(key(KeyCode::Enter)).await;
    app.handle_key(key(KeyCode::Char('1'))).await;
    app.handle_key(key(KeyCode::Enter)).await;

    assert_eq!(app.device, DeviceState::EnterStaffId);
    assert_eq!(app.screen[0], "INVALID ID LENGTH");
  }

  #[tokio::test]
  async fn unknown_staff_id_schedules_fallback_to_idle() {
    let mut app = booted(seeded_store(1).await).await;
    app.handle_key(key(KeyCode::Enter)).await;
    for c in "9999".chars() {
      app.handle_key(key(KeyCode::Char(c))).await;
    }
    app.handle_key(key(KeyCode::Enter)).await;

    assert_eq!(app.screen[0], "ID NOT FOUND");
    // Still in entry until the timed fallback fires.
    assert_eq!(app.device, DeviceState::EnterStaffId);
    tokio::time::sleep(FALLBACK_DELAY + Duration::from_millis(100)).await;
    app.tick(Utc::now(), Instant::now()).await;
    assert_eq!(app.device, DeviceState::Idle);
  }

  #[tokio::test]
  async fn course_menu_caps_at_nine_entries() {
    let mut app = booted(seeded_store(12).await).await;
    app.handle_key(key(KeyCode::Enter)).await;
    for c in "0001".chars() {
      app.handle_key(key(KeyCode::Char(c))).await;
    }
    app.handle_key(key(KeyCode::Enter)).await;

    assert_eq!(app.device, DeviceState::SelectCourse);
    assert_eq!(app.courses.len(), COURSE_CAP);

    // '0' addresses nothing.
    app.handle_key(key(KeyCode::Char('0'))).await;
    assert_eq!(app.device, DeviceState::SelectCourse);

    app.handle_key(key(KeyCode::Char('9'))).await;
    assert_eq!(app.device, DeviceState::Active);
  }

  #[tokio::test]
  async fn boot_resumes_into_active_session() {
    let store = seeded_store(1).await;
    {
      let mut first = booted(store.clone()).await;
      first.handle_key(key(KeyCode::Enter)).await;
      for c in "0001".chars() {
        first.handle_key(key(KeyCode::Char(c))).await;
      }
      first.handle_key(key(KeyCode::Enter)).await;
      first.handle_key(key(KeyCode::Char('1'))).await;
      assert_eq!(first.device, DeviceState::Active);
    }

    // A fresh app over the same store boots straight into Active.
    let reloaded = booted(store).await;
    assert_eq!(reloaded.device, DeviceState::Active);
    assert!(reloaded.session.is_some());
  }

  #[tokio::test]
  async fn tap_dispatches_one_scan_and_guards_reentry() {
    let store = seeded_store(1).await;
    let mut app = booted(store.clone()).await;
    app.handle_key(key(KeyCode::Enter)).await;
    for c in "0001".chars() {
      app.handle_key(key(KeyCode::Char(c))).await;
    }
    app.handle_key(key(KeyCode::Enter)).await;
    app.handle_key(key(KeyCode::Char('1'))).await;
    let session_id = app.session.as_ref().unwrap().session_id;

    // Three rapid taps; the guard lets only the first through.
    app.tap_card();
    assert!(app.scan_in_flight);
    app.tap_card();
    app.tap_card();

    tokio::time::sleep(READ_DELAY + Duration::from_millis(300)).await;
    app.drain_scan_results();
    assert!(!app.scan_in_flight);
    assert_eq!(app.screen[0], "> ACCESS GRANTED");

    let logs = store.logs_for_session(session_id).await.unwrap();
    assert_eq!(logs.len(), 1);
  }

  #[tokio::test]
  async fn external_stop_returns_device_to_idle() {
    let store = seeded_store(1).await;
    let mut app = booted(store.clone()).await;
    app.handle_key(key(KeyCode::Enter)).await;
    for c in "0001".chars() {
      app.handle_key(key(KeyCode::Char(c))).await;
    }
    app.handle_key(key(KeyCode::Enter)).await;
    app.handle_key(key(KeyCode::Char('1'))).await;
    let session_id = app.session.as_ref().unwrap().session_id;

    // Another actor stops the session.
    let manager = SessionManager::new(store, SessionPolicy::default());
    manager.stop(session_id).await.unwrap();

    app.pump_events().await;
    assert_eq!(app.device, DeviceState::Idle);
    assert!(app.console.watching().is_none());
  }

  #[tokio::test]
  async fn console_merges_notified_scans() {
    let store = seeded_store(1).await;
    let mut app = booted(store.clone()).await;
    app.handle_key(key(KeyCode::Enter)).await;
    for c in "0001".chars() {
      app.handle_key(key(KeyCode::Char(c))).await;
    }
    app.handle_key(key(KeyCode::Enter)).await;
    app.handle_key(key(KeyCode::Char('1'))).await;
    let session = app.session.clone().unwrap();

    // A scan committed by another client shows up via the feed.
    let committer =
      ScanCommitter::new(store, SessionPolicy::default());
    let outcome = committer
      .submit(&ScanIdentity::Tag("AB12CD".into()), &session)
      .await
      .unwrap();
    assert!(outcome.is_recorded());

    app.pump_events().await;
    let feed = app.console.feed.as_ref().unwrap();
    assert_eq!(feed.count(), 1);
    assert_eq!(feed.entries()[0].student.number, "S001");
  }
}
