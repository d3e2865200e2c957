//! Scan validation and commit — turning a presented identity into exactly
//! one attendance row, or a classified rejection.
//!
//! Expected outcomes (unknown tag, not enrolled, duplicate, closed session)
//! are values, never errors; only infrastructure failures propagate as `Err`
//! so the terminal can degrade to an error display without crashing its
//! input loop.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
  attendance::{AttendanceLog, AttendanceStatus, NewAttendanceLog},
  identity::Student,
  session::{Session, SessionPolicy},
  store::{AttendanceInsert, AttendanceStore},
};

// ─── Identity ────────────────────────────────────────────────────────────────

/// The identity a scan presents: a raw RFID card value, or a student number
/// for deployments that key in identities manually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanIdentity {
  Tag(String),
  Number(String),
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// Classification of one scan submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "log", rename_all = "snake_case")]
pub enum ScanOutcome {
  /// Committed; exactly one of any set of concurrent submissions for the
  /// same (student, session) observes this.
  Recorded(AttendanceLog),
  /// A log for this (student, session) already exists. An
  /// expected-frequency outcome, not an error.
  Duplicate,
  /// No student matches the presented identity.
  UnknownTag,
  /// The course restricts scanning to enrolled students and this one is not.
  NotEnrolled,
  /// The session was stopped or timed out between the caller's last refresh
  /// and this submission. Distinct from `Duplicate`; no row is created.
  SessionClosed,
}

impl ScanOutcome {
  pub fn is_recorded(&self) -> bool { matches!(self, Self::Recorded(_)) }
}

// ─── Committer ───────────────────────────────────────────────────────────────

/// Validates eligibility and attempts a single atomic commit. Cheap to clone
/// when the store handle is.
#[derive(Debug, Clone)]
pub struct ScanCommitter<S> {
  store:              S,
  policy:             SessionPolicy,
  require_enrollment: bool,
}

impl<S: AttendanceStore> ScanCommitter<S> {
  pub fn new(store: S, policy: SessionPolicy) -> Self {
    Self { store, policy, require_enrollment: false }
  }

  /// Restrict scanning to students enrolled in the session's course.
  pub fn with_enrollment_gate(mut self, enabled: bool) -> Self {
    self.require_enrollment = enabled;
    self
  }

  /// Submit one scan against `session`.
  ///
  /// The caller supplies what it believes is the active session; the session
  /// is re-verified against the store before committing, so a scan arriving
  /// after a stop lands as [`ScanOutcome::SessionClosed`] rather than being
  /// logged against a dead session.
  pub async fn submit(
    &self,
    identity: &ScanIdentity,
    session: &Session,
  ) -> Result<ScanOutcome, S::Error> {
    // Re-verify liveness from the store, not the caller's cached copy.
    let current = self.store.get_session(session.session_id).await?;
    let current = match current {
      Some(s) if s.is_active && !s.is_expired(&self.policy, Utc::now()) => s,
      _ => return Ok(ScanOutcome::SessionClosed),
    };

    let student = match self.resolve(identity).await? {
      Some(s) => s,
      None => return Ok(ScanOutcome::UnknownTag),
    };

    if self.require_enrollment
      && !self
        .store
        .is_enrolled(student.student_id, current.course_id)
        .await?
    {
      return Ok(ScanOutcome::NotEnrolled);
    }

    // Pre-check: short-circuits the common repeat-tap without hitting the
    // insert constraint. Racy by design — two concurrent scans can both
    // pass it; the unique constraint below is the authority.
    if self
      .store
      .attendance_for(student.student_id, current.session_id)
      .await?
      .is_some()
    {
      return Ok(ScanOutcome::Duplicate);
    }

    let insert = self
      .store
      .insert_attendance(NewAttendanceLog {
        student_id: student.student_id,
        course_id:  current.course_id,
        session_id: Some(current.session_id),
        status:     AttendanceStatus::Present,
      })
      .await?;

    Ok(match insert {
      AttendanceInsert::Inserted(log) => ScanOutcome::Recorded(log),
      AttendanceInsert::Duplicate => ScanOutcome::Duplicate,
    })
  }

  async fn resolve(
    &self,
    identity: &ScanIdentity,
  ) -> Result<Option<Student>, S::Error> {
    match identity {
      ScanIdentity::Tag(tag) => self.store.student_by_tag(tag).await,
      ScanIdentity::Number(number) => {
        self.store.student_by_number(number).await
      }
    }
  }
}
