//! Live-console state: the ordered feed plus the cosmetic spotlight queue.
//!
//! Ordering lives entirely in [`SessionFeed`]; the spotlight only controls
//! which already-merged entry is currently enlarged on screen, so serialising
//! the animation can never reorder the displayed list.

use std::{
  collections::VecDeque,
  time::{Duration, Instant},
};

use rollcall_core::{
  attendance::AttendanceEntry, feed::SessionFeed, identity::Course,
  session::Session,
};

/// How long one scan stays in the spotlight before the next is shown.
const SPOTLIGHT_DELAY: Duration = Duration::from_secs(3);

/// The console pane: standby until a session is being watched.
pub struct Console {
  pub feed:      Option<SessionFeed>,
  /// Course of the watched session, for the header.
  pub course:    Option<Course>,
  /// Entries waiting for their turn in the spotlight.
  pub pending:   VecDeque<AttendanceEntry>,
  pub spotlight: Option<(AttendanceEntry, Instant)>,
}

impl Console {
  pub fn standby() -> Self {
    Self {
      feed:      None,
      course:    None,
      pending:   VecDeque::new(),
      spotlight: None,
    }
  }

  /// Begin watching `session` with its bulk-fetched history.
  pub fn watch(
    &mut self,
    session: Session,
    history: Vec<AttendanceEntry>,
    course: Option<Course>,
  ) {
    self.feed = Some(SessionFeed::new(session, history));
    self.course = course;
    self.pending.clear();
    self.spotlight = None;
  }

  /// Tear down to standby (session stopped or lost).
  pub fn clear(&mut self) {
    *self = Self::standby();
  }

  pub fn watching(&self) -> Option<&Session> {
    self.feed.as_ref().map(SessionFeed::session)
  }

  /// Merge a notified entry into the ordered feed; queue it for the
  /// spotlight only if it was not a re-delivery.
  pub fn push(&mut self, entry: AttendanceEntry) {
    let Some(feed) = self.feed.as_mut() else { return };
    if feed.merge(entry.clone()) {
      self.pending.push_back(entry);
    }
  }

  /// Advance the spotlight queue. Called from the host's tick.
  pub fn advance(&mut self, now: Instant) {
    if let Some((_, until)) = &self.spotlight {
      if now < *until {
        return;
      }
      self.spotlight = None;
    }
    if let Some(next) = self.pending.pop_front() {
      self.spotlight = Some((next, now + SPOTLIGHT_DELAY));
    }
  }
}
