//! Sessions and the [`SessionManager`] — the single authority for "is there
//! an active session, and which one".
//!
//! The lifecycle is `NONE -> ACTIVE` (via [`SessionManager::start`]) and back
//! (via [`SessionManager::stop`], explicit or by timeout). Activation is a
//! deactivate-sweep followed by an insert — two separate store operations, so
//! two near-simultaneous starts can transiently leave two active rows.
//! [`SessionManager::resolve_active`] tolerates that by picking the latest
//! `start_time` and logging the inconsistency rather than crashing.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::store::AttendanceStore;

// ─── Session ─────────────────────────────────────────────────────────────────

/// A bounded, single-active-at-a-time period during which scans for one
/// course are accepted and logged. Never deleted; stopping sets `is_active`
/// to false and stamps `end_time`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
  pub session_id:  Uuid,
  pub course_id:   Uuid,
  pub lecturer_id: Uuid,
  pub start_time:  DateTime<Utc>,
  pub end_time:    Option<DateTime<Utc>>,
  pub is_active:   bool,
}

impl Session {
  /// The instant this session times out. Derived from `start_time` alone so
  /// a reloaded client recomputes it correctly.
  pub fn deadline(&self, policy: &SessionPolicy) -> DateTime<Utc> {
    self.start_time + policy.max_duration
  }

  pub fn is_expired(&self, policy: &SessionPolicy, now: DateTime<Utc>) -> bool {
    now >= self.deadline(policy)
  }

  /// Time left before the deadline; zero once expired.
  pub fn remaining(&self, policy: &SessionPolicy, now: DateTime<Utc>) -> Duration {
    (self.deadline(policy) - now).max(Duration::zero())
  }
}

/// Input to [`AttendanceStore::insert_session`]. The store stamps
/// `start_time` and activates the row.
#[derive(Debug, Clone)]
pub struct NewSession {
  pub course_id:   Uuid,
  pub lecturer_id: Uuid,
}

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Deployment-level session limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
  /// Maximum session length before the implicit timeout stops it.
  pub max_duration: Duration,
}

impl Default for SessionPolicy {
  fn default() -> Self {
    Self { max_duration: Duration::minutes(60) }
  }
}

impl SessionPolicy {
  pub fn with_minutes(minutes: i64) -> Self {
    Self { max_duration: Duration::minutes(minutes) }
  }
}

// ─── SessionManager ──────────────────────────────────────────────────────────

/// Owns session lifecycle against a store backend. Cheap to clone when the
/// store handle is.
#[derive(Debug, Clone)]
pub struct SessionManager<S> {
  store:  S,
  policy: SessionPolicy,
}

impl<S: AttendanceStore> SessionManager<S> {
  pub fn new(store: S, policy: SessionPolicy) -> Self {
    Self { store, policy }
  }

  pub fn policy(&self) -> &SessionPolicy { &self.policy }

  /// The currently active session, if any — the resume path used on client
  /// reconnect. Read-only and idempotent.
  ///
  /// More than one active row should not happen given the deactivation
  /// sweep, but is possible under the activation race; the latest
  /// `start_time` wins and the inconsistency is logged.
  pub async fn resolve_active(&self) -> Result<Option<Session>, S::Error> {
    let mut active = self.store.active_sessions().await?;
    if active.len() > 1 {
      warn!(
        count = active.len(),
        "multiple active sessions found; resolving to latest start_time"
      );
    }
    active.sort_by_key(|s| s.start_time);
    Ok(active.pop())
  }

  /// Start a session for `course_id`: deactivate all currently active
  /// sessions, then insert the new row.
  ///
  /// On failure after the sweep succeeded, the system is left with no active
  /// session — callers must treat a failed start as "standby", not assume
  /// the old session persists.
  pub async fn start(
    &self,
    course_id: Uuid,
    lecturer_id: Uuid,
  ) -> Result<Session, S::Error> {
    let swept = self.store.deactivate_all_sessions(Utc::now()).await?;
    if !swept.is_empty() {
      debug!(count = swept.len(), "deactivated previous sessions before start");
    }
    self
      .store
      .insert_session(NewSession { course_id, lecturer_id })
      .await
  }

  /// Stop a session. Idempotent: stopping an already-inactive session is a
  /// no-op, not an error.
  pub async fn stop(&self, session_id: Uuid) -> Result<(), S::Error> {
    self.store.finish_session(session_id, Utc::now()).await
  }

  /// Stop every active session whose deadline has passed. Driven by the
  /// host's tick loop; returns the ids that were stopped.
  pub async fn expire_overdue(
    &self,
    now: DateTime<Utc>,
  ) -> Result<Vec<Uuid>, S::Error> {
    let mut stopped = Vec::new();
    for session in self.store.active_sessions().await? {
      if session.is_expired(&self.policy, now) {
        self.store.finish_session(session.session_id, now).await?;
        stopped.push(session.session_id);
      }
    }
    Ok(stopped)
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  fn session_at(start: DateTime<Utc>) -> Session {
    Session {
      session_id:  Uuid::new_v4(),
      course_id:   Uuid::new_v4(),
      lecturer_id: Uuid::new_v4(),
      start_time:  start,
      end_time:    None,
      is_active:   true,
    }
  }

  #[test]
  fn deadline_is_derived_from_start_time() {
    let policy = SessionPolicy::with_minutes(40);
    let start = Utc::now();
    let s = session_at(start);
    assert_eq!(s.deadline(&policy), start + Duration::minutes(40));
  }

  #[test]
  fn expiry_boundary() {
    let policy = SessionPolicy::default();
    let start = Utc::now();
    let s = session_at(start);

    assert!(!s.is_expired(&policy, start + Duration::minutes(59)));
    assert!(s.is_expired(&policy, start + Duration::minutes(60)));
    assert!(s.is_expired(&policy, start + Duration::minutes(61)));
  }

  #[test]
  fn remaining_clamps_to_zero() {
    let policy = SessionPolicy::with_minutes(10);
    let start = Utc::now();
    let s = session_at(start);

    assert_eq!(
      s.remaining(&policy, start + Duration::minutes(4)),
      Duration::minutes(6)
    );
    assert_eq!(
      s.remaining(&policy, start + Duration::minutes(15)),
      Duration::zero()
    );
  }
}
