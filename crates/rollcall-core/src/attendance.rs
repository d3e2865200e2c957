//! Attendance records — the immutable outcome of a committed scan.
//!
//! A log row is written exactly once per (student, session) pair and never
//! updated or deleted. The store's composite unique constraint, not the
//! application pre-check, is what enforces this.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::Student;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Attendance classification. Every successful commit currently records
/// `Present`; `Late` and `Absent` exist in the data model but no grace-period
/// policy assigns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
  Present,
  Late,
  Absent,
}

// ─── AttendanceLog ───────────────────────────────────────────────────────────

/// An immutable record of one committed, de-duplicated scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceLog {
  pub log_id:     Uuid,
  pub student_id: Uuid,
  pub course_id:  Uuid,
  pub session_id: Option<Uuid>,
  /// Server-assigned at commit; defines commit order.
  pub timestamp:  DateTime<Utc>,
  pub status:     AttendanceStatus,
}

/// Input to [`crate::store::AttendanceStore::insert_attendance`].
/// `log_id` and `timestamp` are always set by the store; they are not
/// accepted from callers.
#[derive(Debug, Clone)]
pub struct NewAttendanceLog {
  pub student_id: Uuid,
  pub course_id:  Uuid,
  pub session_id: Option<Uuid>,
  pub status:     AttendanceStatus,
}

// ─── AttendanceEntry ─────────────────────────────────────────────────────────

/// A log joined with its student — the record the live console displays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceEntry {
  pub log:     AttendanceLog,
  pub student: Student,
}
