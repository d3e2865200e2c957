//! The `AttendanceStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g.
//! `rollcall-store-sqlite`). Higher layers (`rollcall-api`, the terminal
//! binary) depend on this abstraction, not on any concrete backend.
//!
//! All serialization of conflicting writes is delegated to the backend's
//! transactional and constraint guarantees; no in-process locks exist
//! because no in-process state is shared across the concurrent actors.

use std::future::Future;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
  attendance::{AttendanceEntry, AttendanceLog, NewAttendanceLog},
  identity::{
    Course, Enrollment, Lecturer, NewCourse, NewLecturer, NewStudent, StaffId,
    Student,
  },
  session::{NewSession, Session},
};

// ─── Insert outcome ──────────────────────────────────────────────────────────

/// Result of an attendance insert. The backend maps a violation of the
/// `(student_id, session_id)` unique constraint to `Duplicate`; any other
/// failure is its error type. This is the authoritative de-duplication path —
/// regardless of how many concurrent inserts race for the same pair, exactly
/// one observes `Inserted`.
#[derive(Debug, Clone)]
pub enum AttendanceInsert {
  Inserted(AttendanceLog),
  Duplicate,
}

// ─── Change feed ─────────────────────────────────────────────────────────────

/// A row-level change notification. Delivery is at-least-once and not
/// ordering-guaranteed; payloads carry ids only, so consumers re-fetch the
/// full joined record and order by the store-assigned timestamp.
#[derive(Debug, Clone)]
pub enum StoreEvent {
  AttendanceRecorded {
    log_id:     Uuid,
    session_id: Option<Uuid>,
  },
  SessionStarted(Session),
  SessionClosed { session_id: Uuid },
}

// ─── Report rows ─────────────────────────────────────────────────────────────

/// Per-student attendance count for one course.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AttendanceTotal {
  pub student:  Student,
  pub attended: u64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Rollcall store backend.
///
/// Attendance logs are append-only: once committed they are never updated or
/// deleted. Session rows are only ever mutated in their `is_active` and
/// `end_time` fields.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait AttendanceStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Registry writes ───────────────────────────────────────────────────

  /// Create and persist a student. The store assigns the row id and
  /// `created_at`.
  fn add_student(
    &self,
    input: NewStudent,
  ) -> impl Future<Output = Result<Student, Self::Error>> + Send + '_;

  fn add_lecturer(
    &self,
    input: NewLecturer,
  ) -> impl Future<Output = Result<Lecturer, Self::Error>> + Send + '_;

  fn add_course(
    &self,
    input: NewCourse,
  ) -> impl Future<Output = Result<Course, Self::Error>> + Send + '_;

  /// Link a student to a course. Unique on the pair.
  fn add_enrollment(
    &self,
    student_id: Uuid,
    course_id: Uuid,
  ) -> impl Future<Output = Result<Enrollment, Self::Error>> + Send + '_;

  /// Assign an unassigned course to `lecturer_id`. Returns the updated row,
  /// or `None` if the course is missing or already claimed — the update is
  /// conditional at the store layer, not check-then-act.
  fn claim_course(
    &self,
    course_id: Uuid,
    lecturer_id: Uuid,
  ) -> impl Future<Output = Result<Option<Course>, Self::Error>> + Send + '_;

  // ── Point queries ─────────────────────────────────────────────────────

  fn student_by_tag<'a>(
    &'a self,
    tag: &'a str,
  ) -> impl Future<Output = Result<Option<Student>, Self::Error>> + Send + 'a;

  fn student_by_number<'a>(
    &'a self,
    number: &'a str,
  ) -> impl Future<Output = Result<Option<Student>, Self::Error>> + Send + 'a;

  fn lecturer_by_staff_id<'a>(
    &'a self,
    staff_id: &'a StaffId,
  ) -> impl Future<Output = Result<Option<Lecturer>, Self::Error>> + Send + 'a;

  fn get_course(
    &self,
    course_id: Uuid,
  ) -> impl Future<Output = Result<Option<Course>, Self::Error>> + Send + '_;

  fn get_session(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + '_;

  // ── Filtered queries ──────────────────────────────────────────────────

  fn list_students(
    &self,
  ) -> impl Future<Output = Result<Vec<Student>, Self::Error>> + Send + '_;

  fn list_courses(
    &self,
  ) -> impl Future<Output = Result<Vec<Course>, Self::Error>> + Send + '_;

  fn courses_for_lecturer(
    &self,
    lecturer_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Course>, Self::Error>> + Send + '_;

  /// Students enrolled in a course, ordered by last name.
  fn roster(
    &self,
    course_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Student>, Self::Error>> + Send + '_;

  fn is_enrolled(
    &self,
    student_id: Uuid,
    course_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// All sessions with `is_active = true`, newest `start_time` first. At
  /// most one row is expected; more is a data inconsistency the caller must
  /// resolve, not crash on.
  fn active_sessions(
    &self,
  ) -> impl Future<Output = Result<Vec<Session>, Self::Error>> + Send + '_;

  // ── Session writes ────────────────────────────────────────────────────

  /// Insert a new active session. The store stamps `start_time`.
  fn insert_session(
    &self,
    input: NewSession,
  ) -> impl Future<Output = Result<Session, Self::Error>> + Send + '_;

  /// The deactivation sweep: set every active session inactive with
  /// `end_time = now`. Returns the swept ids. This is a sweep, not a
  /// row-scoped compare-and-swap.
  fn deactivate_all_sessions(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  /// Set one session inactive with `end_time = now`. Idempotent: finishing
  /// an already-inactive session is a no-op.
  fn finish_session(
    &self,
    session_id: Uuid,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Attendance ────────────────────────────────────────────────────────

  /// Existing log for `(student, session)`, if any. Used only as the racy
  /// pre-check optimization; the insert constraint is the source of truth.
  fn attendance_for(
    &self,
    student_id: Uuid,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Option<AttendanceLog>, Self::Error>> + Send + '_;

  /// Atomic insert with server-rejected duplicates on the composite unique
  /// key. The store assigns `log_id` and `timestamp`.
  fn insert_attendance(
    &self,
    input: NewAttendanceLog,
  ) -> impl Future<Output = Result<AttendanceInsert, Self::Error>> + Send + '_;

  /// Joined log entries for a session, timestamp descending — the bulk
  /// fetch a late-joining viewer uses to populate history.
  fn logs_for_session(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AttendanceEntry>, Self::Error>> + Send + '_;

  /// One joined entry by log id — the re-fetch a change notification
  /// triggers.
  fn log_entry(
    &self,
    log_id: Uuid,
  ) -> impl Future<Output = Result<Option<AttendanceEntry>, Self::Error>> + Send + '_;

  // ── Report reads ──────────────────────────────────────────────────────

  /// Number of sessions ever held for a course.
  fn sessions_held(
    &self,
    course_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Per-student attendance counts for a course, enrolled students only.
  fn attendance_totals(
    &self,
    course_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AttendanceTotal>, Self::Error>> + Send + '_;

  // ── Change feed ───────────────────────────────────────────────────────

  /// Subscribe to row-level change events. Each receiver sees every event
  /// sent after subscription; a lagged receiver must perform a full
  /// re-fetch rather than assume continuity.
  fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}
