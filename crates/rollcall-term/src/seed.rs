//! Demo fixtures — lecturers, courses, and tagged students so the simulator
//! has something to scan on a fresh database.

use rollcall_core::{
  identity::{NewCourse, NewLecturer, NewStudent, StaffId},
  store::AttendanceStore,
};
use tracing::info;

/// Seed demo data unless it is already present. Returns `true` when rows
/// were inserted.
pub async fn seed_demo<S: AttendanceStore>(store: &S) -> Result<bool, S::Error> {
  let probe = StaffId::from_digits("0001").expect("static staff id");
  if store.lecturer_by_staff_id(&probe).await?.is_some() {
    info!("demo data already present; skipping seed");
    return Ok(false);
  }

  let okafor = store
    .add_lecturer(NewLecturer {
      staff_id:   probe,
      first_name: "Ngozi".into(),
      last_name:  "Okafor".into(),
      email:      "n.okafor@example.edu".into(),
      department: "Computer Science".into(),
    })
    .await?;
  let hassan = store
    .add_lecturer(NewLecturer {
      staff_id:   StaffId::from_digits("0002").expect("static staff id"),
      first_name: "Yusuf".into(),
      last_name:  "Hassan".into(),
      email:      "y.hassan@example.edu".into(),
      department: "Mathematics".into(),
    })
    .await?;

  let cs101 = store
    .add_course(NewCourse {
      code:        "CS101".into(),
      name:        "Introduction to Computing".into(),
      lecturer_id: Some(okafor.lecturer_id),
      description: Some("Foundations: machines, data, programs.".into()),
    })
    .await?;
  let cs203 = store
    .add_course(NewCourse {
      code:        "CS203".into(),
      name:        "Data Structures".into(),
      lecturer_id: Some(okafor.lecturer_id),
      description: None,
    })
    .await?;
  let ma202 = store
    .add_course(NewCourse {
      code:        "MA202".into(),
      name:        "Linear Algebra".into(),
      lecturer_id: Some(hassan.lecturer_id),
      description: None,
    })
    .await?;
  // Left unassigned; claimable from the portal.
  store
    .add_course(NewCourse {
      code:        "ST110".into(),
      name:        "Introductory Statistics".into(),
      lecturer_id: None,
      description: None,
    })
    .await?;

  let students = [
    ("S001", "AB12CD", "Ada", "Lovelace"),
    ("S002", "EF34GH", "Alan", "Turing"),
    ("S003", "IJ56KL", "Katherine", "Johnson"),
    ("S004", "MN78OP", "Edsger", "Dijkstra"),
    ("S005", "QR90ST", "Margaret", "Hamilton"),
    ("S006", "UV12WX", "Maurice", "Wilkes"),
  ];
  for (number, tag, first, last) in students {
    let student = store
      .add_student(NewStudent {
        number:     number.into(),
        rfid_tag:   Some(tag.into()),
        first_name: first.into(),
        last_name:  last.into(),
        email:      format!(
          "{}.{}@example.edu",
          first.to_lowercase().chars().next().unwrap_or('x'),
          last.to_lowercase()
        ),
        photo_url:  None,
      })
      .await?;

    // Everyone takes CS101; alternate the rest.
    store.add_enrollment(student.student_id, cs101.course_id).await?;
    let second = if student.number.ends_with(['1', '3', '5']) {
      cs203.course_id
    } else {
      ma202.course_id
    };
    store.add_enrollment(student.student_id, second).await?;
  }

  info!("seeded demo lecturers, courses, and students");
  Ok(true)
}

#[cfg(test)]
mod tests {
  use rollcall_store_sqlite::SqliteStore;

  use super::*;

  #[tokio::test]
  async fn seed_is_idempotent() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    assert!(seed_demo(&store).await.unwrap());
    assert!(!seed_demo(&store).await.unwrap());

    let students = store.list_students().await.unwrap();
    assert_eq!(students.len(), 6);
    let courses = store.list_courses().await.unwrap();
    assert_eq!(courses.len(), 4);
  }
}
