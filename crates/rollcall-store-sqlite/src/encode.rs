//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings. Statuses and staff ids are stored in their
//! wire form.

use chrono::{DateTime, Utc};
use rollcall_core::{
  attendance::{AttendanceEntry, AttendanceLog, AttendanceStatus},
  identity::{Course, Lecturer, StaffId, Student},
  session::Session,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_uuid_opt(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── AttendanceStatus ────────────────────────────────────────────────────────

pub fn encode_status(s: AttendanceStatus) -> &'static str {
  match s {
    AttendanceStatus::Present => "present",
    AttendanceStatus::Late => "late",
    AttendanceStatus::Absent => "absent",
  }
}

pub fn decode_status(s: &str) -> Result<AttendanceStatus> {
  match s {
    "present" => Ok(AttendanceStatus::Present),
    "late" => Ok(AttendanceStatus::Late),
    "absent" => Ok(AttendanceStatus::Absent),
    other => Err(Error::Decode(format!("unknown status: {other:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawStudent`] / [`read_student`]; keep in sync.
pub const STUDENT_COLS: &str =
  "student_id, number, rfid_tag, first_name, last_name, email, photo_url, \
   created_at";

/// Raw strings read directly from a `students` row.
pub struct RawStudent {
  pub student_id: String,
  pub number:     String,
  pub rfid_tag:   Option<String>,
  pub first_name: String,
  pub last_name:  String,
  pub email:      String,
  pub photo_url:  Option<String>,
  pub created_at: String,
}

/// Read a [`RawStudent`] from a row selected with [`STUDENT_COLS`] starting
/// at column `base`.
pub fn read_student(
  row: &rusqlite::Row<'_>,
  base: usize,
) -> rusqlite::Result<RawStudent> {
  Ok(RawStudent {
    student_id: row.get(base)?,
    number:     row.get(base + 1)?,
    rfid_tag:   row.get(base + 2)?,
    first_name: row.get(base + 3)?,
    last_name:  row.get(base + 4)?,
    email:      row.get(base + 5)?,
    photo_url:  row.get(base + 6)?,
    created_at: row.get(base + 7)?,
  })
}

impl RawStudent {
  pub fn into_student(self) -> Result<Student> {
    Ok(Student {
      student_id: decode_uuid(&self.student_id)?,
      number:     self.number,
      rfid_tag:   self.rfid_tag,
      first_name: self.first_name,
      last_name:  self.last_name,
      email:      self.email,
      photo_url:  self.photo_url,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `lecturers` row.
pub struct RawLecturer {
  pub lecturer_id: String,
  pub staff_id:    String,
  pub first_name:  String,
  pub last_name:   String,
  pub email:       String,
  pub department:  String,
  pub created_at:  String,
}

impl RawLecturer {
  pub fn into_lecturer(self) -> Result<Lecturer> {
    Ok(Lecturer {
      lecturer_id: decode_uuid(&self.lecturer_id)?,
      staff_id:    StaffId::parse(&self.staff_id).map_err(Error::Core)?,
      first_name:  self.first_name,
      last_name:   self.last_name,
      email:       self.email,
      department:  self.department,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Column list matching [`RawCourse`] / [`read_course`]; keep in sync.
pub const COURSE_COLS: &str =
  "course_id, code, name, lecturer_id, description, created_at";

/// Raw strings read directly from a `courses` row.
pub struct RawCourse {
  pub course_id:   String,
  pub code:        String,
  pub name:        String,
  pub lecturer_id: Option<String>,
  pub description: Option<String>,
  pub created_at:  String,
}

pub fn read_course(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawCourse> {
  Ok(RawCourse {
    course_id:   row.get(0)?,
    code:        row.get(1)?,
    name:        row.get(2)?,
    lecturer_id: row.get(3)?,
    description: row.get(4)?,
    created_at:  row.get(5)?,
  })
}

impl RawCourse {
  pub fn into_course(self) -> Result<Course> {
    Ok(Course {
      course_id:   decode_uuid(&self.course_id)?,
      code:        self.code,
      name:        self.name,
      lecturer_id: decode_uuid_opt(self.lecturer_id.as_deref())?,
      description: self.description,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Column list matching [`RawSession`] / [`read_session`]; keep in sync.
pub const SESSION_COLS: &str =
  "session_id, course_id, lecturer_id, start_time, end_time, is_active";

/// Raw strings read directly from a `sessions` row.
pub struct RawSession {
  pub session_id:  String,
  pub course_id:   String,
  pub lecturer_id: String,
  pub start_time:  String,
  pub end_time:    Option<String>,
  pub is_active:   bool,
}

pub fn read_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSession> {
  Ok(RawSession {
    session_id:  row.get(0)?,
    course_id:   row.get(1)?,
    lecturer_id: row.get(2)?,
    start_time:  row.get(3)?,
    end_time:    row.get(4)?,
    is_active:   row.get::<_, i64>(5)? != 0,
  })
}

impl RawSession {
  pub fn into_session(self) -> Result<Session> {
    Ok(Session {
      session_id:  decode_uuid(&self.session_id)?,
      course_id:   decode_uuid(&self.course_id)?,
      lecturer_id: decode_uuid(&self.lecturer_id)?,
      start_time:  decode_dt(&self.start_time)?,
      end_time:    self.end_time.as_deref().map(decode_dt).transpose()?,
      is_active:   self.is_active,
    })
  }
}

/// Column list matching [`RawLog`] / [`read_log`]; keep in sync.
pub const LOG_COLS: &str =
  "log_id, student_id, course_id, session_id, timestamp, status";

/// Raw strings read directly from an `attendance_logs` row.
pub struct RawLog {
  pub log_id:     String,
  pub student_id: String,
  pub course_id:  String,
  pub session_id: Option<String>,
  pub timestamp:  String,
  pub status:     String,
}

pub fn read_log(
  row: &rusqlite::Row<'_>,
  base: usize,
) -> rusqlite::Result<RawLog> {
  Ok(RawLog {
    log_id:     row.get(base)?,
    student_id: row.get(base + 1)?,
    course_id:  row.get(base + 2)?,
    session_id: row.get(base + 3)?,
    timestamp:  row.get(base + 4)?,
    status:     row.get(base + 5)?,
  })
}

impl RawLog {
  pub fn into_log(self) -> Result<AttendanceLog> {
    Ok(AttendanceLog {
      log_id:     decode_uuid(&self.log_id)?,
      student_id: decode_uuid(&self.student_id)?,
      course_id:  decode_uuid(&self.course_id)?,
      session_id: decode_uuid_opt(self.session_id.as_deref())?,
      timestamp:  decode_dt(&self.timestamp)?,
      status:     decode_status(&self.status)?,
    })
  }
}

/// A log row joined with its student columns.
pub struct RawEntry {
  pub log:     RawLog,
  pub student: RawStudent,
}

impl RawEntry {
  pub fn into_entry(self) -> Result<AttendanceEntry> {
    Ok(AttendanceEntry {
      log:     self.log.into_log()?,
      student: self.student.into_student()?,
    })
  }
}
