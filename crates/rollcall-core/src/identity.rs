//! Identity records — students, lecturers, courses, enrollments.
//!
//! These are thin rows owned by the store. Core components hold only ids and
//! cached copies for display, never long-lived mutable handles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── StaffId ─────────────────────────────────────────────────────────────────

/// Prefix every staff identifier carries on the wire and on the keypad.
pub const STAFF_ID_PREFIX: &str = "SMAF/";

/// Number of digits following the prefix.
pub const STAFF_ID_DIGITS: usize = 4;

/// A validated staff identifier, e.g. `SMAF/0001`.
///
/// Stored and serialised as the full formatted string; only the digit part is
/// kept internally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StaffId(String);

impl StaffId {
  /// Parse a full formatted identifier (`SMAF/0001`).
  pub fn parse(s: &str) -> Result<Self> {
    let digits = s
      .strip_prefix(STAFF_ID_PREFIX)
      .ok_or_else(|| Error::InvalidStaffId(s.to_owned()))?;
    Self::from_digits(digits)
  }

  /// Build from the digit part alone (`0001`), as entered on the keypad.
  pub fn from_digits(digits: &str) -> Result<Self> {
    if digits.len() != STAFF_ID_DIGITS
      || !digits.chars().all(|c| c.is_ascii_digit())
    {
      return Err(Error::InvalidStaffId(format!("{STAFF_ID_PREFIX}{digits}")));
    }
    Ok(Self(digits.to_owned()))
  }

  /// The digit part without the prefix.
  pub fn digits(&self) -> &str { &self.0 }
}

impl std::fmt::Display for StaffId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{STAFF_ID_PREFIX}{}", self.0)
  }
}

impl TryFrom<String> for StaffId {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { Self::parse(&s) }
}

impl From<StaffId> for String {
  fn from(id: StaffId) -> Self { id.to_string() }
}

// ─── Student ─────────────────────────────────────────────────────────────────

/// A registered student. The `number` is the human-assigned enrollment
/// identifier (e.g. `S001`); the `rfid_tag` is the raw card value, nullable
/// until a card is assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
  pub student_id: Uuid,
  pub number:     String,
  pub rfid_tag:   Option<String>,
  pub first_name: String,
  pub last_name:  String,
  pub email:      String,
  pub photo_url:  Option<String>,
  pub created_at: DateTime<Utc>,
}

impl Student {
  /// `"Last, First"` for roster-style listings.
  pub fn display_name(&self) -> String {
    format!("{}, {}", self.last_name, self.first_name)
  }
}

/// Input to [`crate::store::AttendanceStore::add_student`].
/// `student_id` and `created_at` are always set by the store.
#[derive(Debug, Clone)]
pub struct NewStudent {
  pub number:     String,
  pub rfid_tag:   Option<String>,
  pub first_name: String,
  pub last_name:  String,
  pub email:      String,
  pub photo_url:  Option<String>,
}

// ─── Lecturer ────────────────────────────────────────────────────────────────

/// A staff member who owns courses and starts sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lecturer {
  pub lecturer_id: Uuid,
  pub staff_id:    StaffId,
  pub first_name:  String,
  pub last_name:   String,
  pub email:       String,
  pub department:  String,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::AttendanceStore::add_lecturer`].
#[derive(Debug, Clone)]
pub struct NewLecturer {
  pub staff_id:   StaffId,
  pub first_name: String,
  pub last_name:  String,
  pub email:      String,
  pub department: String,
}

// ─── Course ──────────────────────────────────────────────────────────────────

/// A course. `lecturer_id` is nullable — "unassigned" is a valid state, and
/// an unassigned course may be claimed by any lecturer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
  pub course_id:   Uuid,
  pub code:        String,
  pub name:        String,
  pub lecturer_id: Option<Uuid>,
  pub description: Option<String>,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::AttendanceStore::add_course`].
#[derive(Debug, Clone)]
pub struct NewCourse {
  pub code:        String,
  pub name:        String,
  pub lecturer_id: Option<Uuid>,
  pub description: Option<String>,
}

// ─── Enrollment ──────────────────────────────────────────────────────────────

/// A student-course link, unique on the pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
  pub enrollment_id: Uuid,
  pub student_id:    Uuid,
  pub course_id:     Uuid,
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn staff_id_roundtrip() {
    let id = StaffId::parse("SMAF/0001").unwrap();
    assert_eq!(id.digits(), "0001");
    assert_eq!(id.to_string(), "SMAF/0001");
  }

  #[test]
  fn staff_id_from_keypad_digits() {
    let id = StaffId::from_digits("0042").unwrap();
    assert_eq!(id.to_string(), "SMAF/0042");
  }

  #[test]
  fn staff_id_rejects_bad_input() {
    assert!(StaffId::parse("0001").is_err());
    assert!(StaffId::parse("SMAF/001").is_err());
    assert!(StaffId::parse("SMAF/00001").is_err());
    assert!(StaffId::parse("SMAF/00a1").is_err());
    assert!(StaffId::from_digits("12").is_err());
  }
}
