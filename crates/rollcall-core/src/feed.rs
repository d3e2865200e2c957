//! The ordered live-feed model behind the console view.
//!
//! Change notifications are at-least-once and not ordered, so the feed
//! merges by the store-assigned commit timestamp, never by arrival sequence.
//! Presentation concerns (spotlight animations, display delays) live in the
//! host — a row enters this model the moment its notification is processed,
//! whatever the host later chooses to show.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{attendance::AttendanceEntry, session::Session};

// ─── SessionFeed ─────────────────────────────────────────────────────────────

/// Committed attendance entries for one session, newest first.
///
/// Built from the initial bulk fetch, then fed one entry per notification.
/// Display order always equals commit order: entries are kept sorted by
/// `(timestamp, log_id)` descending and de-duplicated by log id, so
/// re-deliveries and out-of-order arrivals cannot reorder or double-count.
#[derive(Debug, Clone)]
pub struct SessionFeed {
  session: Session,
  entries: Vec<AttendanceEntry>,
  seen:    HashSet<Uuid>,
}

impl SessionFeed {
  /// Build from the session and its bulk-fetched history. The history is
  /// re-sorted locally rather than trusting the fetch order.
  pub fn new(session: Session, history: Vec<AttendanceEntry>) -> Self {
    let mut feed = Self {
      session,
      entries: Vec::with_capacity(history.len()),
      seen: HashSet::new(),
    };
    for entry in history {
      feed.merge(entry);
    }
    feed
  }

  pub fn session(&self) -> &Session { &self.session }

  /// Merge one entry, preserving commit order. Returns `false` when the
  /// entry was already present (a notification re-delivery).
  pub fn merge(&mut self, entry: AttendanceEntry) -> bool {
    if !self.seen.insert(entry.log.log_id) {
      return false;
    }
    let key = (entry.log.timestamp, entry.log.log_id);
    let at = self
      .entries
      .partition_point(|e| (e.log.timestamp, e.log.log_id) > key);
    self.entries.insert(at, entry);
    true
  }

  /// Entries newest-first.
  pub fn entries(&self) -> &[AttendanceEntry] { &self.entries }

  pub fn count(&self) -> usize { self.entries.len() }

  /// Scans per minute since the session started.
  pub fn rate(&self, now: DateTime<Utc>) -> f64 {
    let elapsed = (now - self.session.start_time).num_seconds().max(1) as f64;
    self.entries.len() as f64 * 60.0 / elapsed
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;
  use crate::{
    attendance::{AttendanceLog, AttendanceStatus},
    identity::Student,
  };

  fn session() -> Session {
    Session {
      session_id:  Uuid::new_v4(),
      course_id:   Uuid::new_v4(),
      lecturer_id: Uuid::new_v4(),
      start_time:  Utc::now() - Duration::minutes(5),
      end_time:    None,
      is_active:   true,
    }
  }

  fn entry(session: &Session, number: &str, at: DateTime<Utc>) -> AttendanceEntry {
    let student_id = Uuid::new_v4();
    AttendanceEntry {
      log:     AttendanceLog {
        log_id: Uuid::new_v4(),
        student_id,
        course_id: session.course_id,
        session_id: Some(session.session_id),
        timestamp: at,
        status: AttendanceStatus::Present,
      },
      student: Student {
        student_id,
        number: number.into(),
        rfid_tag: None,
        first_name: "Test".into(),
        last_name: number.into(),
        email: format!("{number}@example.edu"),
        photo_url: None,
        created_at: at,
      },
    }
  }

  #[test]
  fn merge_preserves_commit_order_under_shuffled_delivery() {
    let s = session();
    let base = s.start_time;
    let a = entry(&s, "S001", base + Duration::seconds(1));
    let b = entry(&s, "S002", base + Duration::seconds(2));
    let c = entry(&s, "S003", base + Duration::seconds(3));

    // Committed [A, B, C]; delivered [C, A, B].
    let mut feed = SessionFeed::new(s, Vec::new());
    feed.merge(c.clone());
    feed.merge(a.clone());
    feed.merge(b.clone());

    let numbers: Vec<_> =
      feed.entries().iter().map(|e| e.student.number.as_str()).collect();
    assert_eq!(numbers, ["S003", "S002", "S001"]);
  }

  #[test]
  fn merge_deduplicates_redelivered_notifications() {
    let s = session();
    let a = entry(&s, "S001", s.start_time + Duration::seconds(1));

    let mut feed = SessionFeed::new(s, Vec::new());
    assert!(feed.merge(a.clone()));
    assert!(!feed.merge(a));
    assert_eq!(feed.count(), 1);
  }

  #[test]
  fn bulk_history_is_resorted_locally() {
    let s = session();
    let base = s.start_time;
    let a = entry(&s, "S001", base + Duration::seconds(1));
    let b = entry(&s, "S002", base + Duration::seconds(2));

    // History handed over oldest-first; the feed shows newest-first anyway.
    let feed = SessionFeed::new(s, vec![a, b]);
    let numbers: Vec<_> =
      feed.entries().iter().map(|e| e.student.number.as_str()).collect();
    assert_eq!(numbers, ["S002", "S001"]);
  }

  #[test]
  fn rate_counts_scans_per_minute() {
    let mut s = session();
    s.start_time = Utc::now() - Duration::minutes(2);
    let now = Utc::now();

    let mut feed = SessionFeed::new(s.clone(), Vec::new());
    for i in 0..4 {
      feed.merge(entry(&s, &format!("S{i:03}"), s.start_time + Duration::seconds(i)));
    }

    let rate = feed.rate(now);
    assert!((rate - 2.0).abs() < 0.1, "expected ~2/min, got {rate}");
  }
}
