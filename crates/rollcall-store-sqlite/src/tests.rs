//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::Duration;
use rollcall_core::{
  attendance::{AttendanceStatus, NewAttendanceLog},
  feed::SessionFeed,
  identity::{NewCourse, NewLecturer, NewStudent, StaffId},
  scan::{ScanCommitter, ScanIdentity, ScanOutcome},
  session::{SessionManager, SessionPolicy},
  store::{AttendanceInsert, AttendanceStore, StoreEvent},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_student(number: &str, tag: Option<&str>) -> NewStudent {
  NewStudent {
    number:     number.into(),
    rfid_tag:   tag.map(Into::into),
    first_name: "Ada".into(),
    last_name:  number.into(),
    email:      format!("{}@example.edu", number.to_lowercase()),
    photo_url:  None,
  }
}

fn new_lecturer(digits: &str) -> NewLecturer {
  NewLecturer {
    staff_id:   StaffId::from_digits(digits).unwrap(),
    first_name: "Grace".into(),
    last_name:  "Hopper".into(),
    email:      "g.hopper@example.edu".into(),
    department: "Computer Science".into(),
  }
}

fn new_course(code: &str, lecturer_id: Option<Uuid>) -> NewCourse {
  NewCourse {
    code: code.into(),
    name: format!("{code} — Introduction"),
    lecturer_id,
    description: None,
  }
}

/// Lecturer + course + one enrolled, tagged student.
async fn classroom(s: &SqliteStore) -> (Uuid, Uuid, Uuid) {
  let lecturer = s.add_lecturer(new_lecturer("0001")).await.unwrap();
  let course = s
    .add_course(new_course("CS101", Some(lecturer.lecturer_id)))
    .await
    .unwrap();
  let student = s
    .add_student(new_student("S001", Some("AB12CD")))
    .await
    .unwrap();
  s.add_enrollment(student.student_id, course.course_id)
    .await
    .unwrap();
  (lecturer.lecturer_id, course.course_id, student.student_id)
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn student_point_queries() {
  let s = store().await;
  let created = s
    .add_student(new_student("S001", Some("AB12CD")))
    .await
    .unwrap();

  let by_tag = s.student_by_tag("AB12CD").await.unwrap().unwrap();
  assert_eq!(by_tag.student_id, created.student_id);

  let by_number = s.student_by_number("S001").await.unwrap().unwrap();
  assert_eq!(by_number.student_id, created.student_id);

  assert!(s.student_by_tag("ZZ99").await.unwrap().is_none());
}

#[tokio::test]
async fn lecturer_staff_id_roundtrip() {
  let s = store().await;
  let created = s.add_lecturer(new_lecturer("0042")).await.unwrap();

  let staff_id = StaffId::parse("SMAF/0042").unwrap();
  let found = s.lecturer_by_staff_id(&staff_id).await.unwrap().unwrap();
  assert_eq!(found.lecturer_id, created.lecturer_id);
  assert_eq!(found.staff_id.to_string(), "SMAF/0042");

  let missing = StaffId::parse("SMAF/9999").unwrap();
  assert!(s.lecturer_by_staff_id(&missing).await.unwrap().is_none());
}

#[tokio::test]
async fn claim_course_only_while_unassigned() {
  let s = store().await;
  let a = s.add_lecturer(new_lecturer("0001")).await.unwrap();
  let b = s.add_lecturer(new_lecturer("0002")).await.unwrap();
  let course = s.add_course(new_course("CS101", None)).await.unwrap();

  let claimed = s
    .claim_course(course.course_id, a.lecturer_id)
    .await
    .unwrap()
    .expect("unassigned course should be claimable");
  assert_eq!(claimed.lecturer_id, Some(a.lecturer_id));

  // Second claim finds the course taken; conditional update matches nothing.
  assert!(s
    .claim_course(course.course_id, b.lecturer_id)
    .await
    .unwrap()
    .is_none());

  let owned = s.courses_for_lecturer(a.lecturer_id).await.unwrap();
  assert_eq!(owned.len(), 1);
}

#[tokio::test]
async fn roster_and_enrollment_check() {
  let s = store().await;
  let course = s.add_course(new_course("CS101", None)).await.unwrap();
  let zeta = s
    .add_student(NewStudent {
      last_name: "Zeta".into(),
      ..new_student("S002", None)
    })
    .await
    .unwrap();
  let abel = s
    .add_student(NewStudent {
      last_name: "Abel".into(),
      ..new_student("S001", None)
    })
    .await
    .unwrap();
  s.add_enrollment(zeta.student_id, course.course_id)
    .await
    .unwrap();
  s.add_enrollment(abel.student_id, course.course_id)
    .await
    .unwrap();

  let roster = s.roster(course.course_id).await.unwrap();
  let names: Vec<_> = roster.iter().map(|r| r.last_name.as_str()).collect();
  assert_eq!(names, ["Abel", "Zeta"]);

  assert!(s
    .is_enrolled(abel.student_id, course.course_id)
    .await
    .unwrap());
  let outsider = s
    .add_student(new_student("S003", None))
    .await
    .unwrap();
  assert!(!s
    .is_enrolled(outsider.student_id, course.course_id)
    .await
    .unwrap());
}

// ─── Session lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn start_deactivates_previous_session() {
  let s = store().await;
  let (lecturer_id, course_id, _) = classroom(&s).await;
  let manager = SessionManager::new(s.clone(), SessionPolicy::default());

  let first = manager.start(course_id, lecturer_id).await.unwrap();
  let second = manager.start(course_id, lecturer_id).await.unwrap();

  let active = s.active_sessions().await.unwrap();
  assert_eq!(active.len(), 1);
  assert_eq!(active[0].session_id, second.session_id);

  // The swept session kept its row, inactive with an end time.
  let old = s.get_session(first.session_id).await.unwrap().unwrap();
  assert!(!old.is_active);
  assert!(old.end_time.is_some());
}

#[tokio::test]
async fn resolve_active_survives_double_activation() {
  let s = store().await;
  let (lecturer_id, course_id, _) = classroom(&s).await;
  let manager = SessionManager::new(s.clone(), SessionPolicy::default());

  // Two raw inserts emulate two terminals racing past the sweep.
  let older = s
    .insert_session(rollcall_core::session::NewSession {
      course_id,
      lecturer_id,
    })
    .await
    .unwrap();
  let newer = s
    .insert_session(rollcall_core::session::NewSession {
      course_id,
      lecturer_id,
    })
    .await
    .unwrap();
  assert!(newer.start_time >= older.start_time);

  let resolved = manager.resolve_active().await.unwrap().unwrap();
  assert_eq!(resolved.session_id, newer.session_id);
}

#[tokio::test]
async fn resolve_active_is_idempotent() {
  let s = store().await;
  let (lecturer_id, course_id, _) = classroom(&s).await;
  let manager = SessionManager::new(s.clone(), SessionPolicy::default());

  assert!(manager.resolve_active().await.unwrap().is_none());

  let started = manager.start(course_id, lecturer_id).await.unwrap();
  for _ in 0..3 {
    let resolved = manager.resolve_active().await.unwrap().unwrap();
    assert_eq!(resolved.session_id, started.session_id);
  }
}

#[tokio::test]
async fn stop_is_idempotent() {
  let s = store().await;
  let (lecturer_id, course_id, _) = classroom(&s).await;
  let manager = SessionManager::new(s.clone(), SessionPolicy::default());

  let session = manager.start(course_id, lecturer_id).await.unwrap();
  manager.stop(session.session_id).await.unwrap();
  manager.stop(session.session_id).await.unwrap();

  let stopped = s.get_session(session.session_id).await.unwrap().unwrap();
  assert!(!stopped.is_active);
}

#[tokio::test]
async fn timeout_closes_session() {
  let s = store().await;
  let (lecturer_id, course_id, _) = classroom(&s).await;
  let policy = SessionPolicy::with_minutes(60);
  let manager = SessionManager::new(s.clone(), policy);

  let session = manager.start(course_id, lecturer_id).await.unwrap();

  // Nothing to do before the deadline.
  let early = session.start_time + Duration::minutes(59);
  assert!(manager.expire_overdue(early).await.unwrap().is_empty());
  assert_eq!(s.active_sessions().await.unwrap().len(), 1);

  // Any check past start + duration closes it.
  let late = session.start_time + Duration::minutes(60) + Duration::seconds(1);
  let stopped = manager.expire_overdue(late).await.unwrap();
  assert_eq!(stopped, vec![session.session_id]);
  assert!(s.active_sessions().await.unwrap().is_empty());
}

// ─── Scan pipeline ───────────────────────────────────────────────────────────

#[tokio::test]
async fn exactly_once_under_concurrent_scans() {
  let s = store().await;
  let (lecturer_id, course_id, _) = classroom(&s).await;
  let manager = SessionManager::new(s.clone(), SessionPolicy::default());
  let committer = ScanCommitter::new(s.clone(), SessionPolicy::default());

  let session = manager.start(course_id, lecturer_id).await.unwrap();

  let mut handles = Vec::new();
  for _ in 0..8 {
    let committer = committer.clone();
    let session = session.clone();
    handles.push(tokio::spawn(async move {
      committer
        .submit(&ScanIdentity::Tag("AB12CD".into()), &session)
        .await
        .unwrap()
    }));
  }

  let mut recorded = 0;
  let mut duplicate = 0;
  for handle in handles {
    match handle.await.unwrap() {
      ScanOutcome::Recorded(_) => recorded += 1,
      ScanOutcome::Duplicate => duplicate += 1,
      other => panic!("unexpected outcome: {other:?}"),
    }
  }
  assert_eq!(recorded, 1);
  assert_eq!(duplicate, 7);

  let logs = s.logs_for_session(session.session_id).await.unwrap();
  assert_eq!(logs.len(), 1);
}

#[tokio::test]
async fn constraint_is_authoritative_when_precheck_is_stale() {
  let s = store().await;
  let (lecturer_id, course_id, student_id) = classroom(&s).await;
  let manager = SessionManager::new(s.clone(), SessionPolicy::default());
  let session = manager.start(course_id, lecturer_id).await.unwrap();

  // Both inserts bypass the committer's pre-check entirely, as if two
  // submissions had passed it before either insert ran.
  let first = s
    .insert_attendance(NewAttendanceLog {
      student_id,
      course_id,
      session_id: Some(session.session_id),
      status: AttendanceStatus::Present,
    })
    .await
    .unwrap();
  assert!(matches!(first, AttendanceInsert::Inserted(_)));

  let second = s
    .insert_attendance(NewAttendanceLog {
      student_id,
      course_id,
      session_id: Some(session.session_id),
      status: AttendanceStatus::Present,
    })
    .await
    .unwrap();
  assert!(matches!(second, AttendanceInsert::Duplicate));

  assert_eq!(s.logs_for_session(session.session_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_tag_and_enrollment_gate() {
  let s = store().await;
  let (lecturer_id, course_id, _) = classroom(&s).await;
  let manager = SessionManager::new(s.clone(), SessionPolicy::default());
  let session = manager.start(course_id, lecturer_id).await.unwrap();

  let gated = ScanCommitter::new(s.clone(), SessionPolicy::default())
    .with_enrollment_gate(true);

  let unknown = gated
    .submit(&ScanIdentity::Tag("ZZ99".into()), &session)
    .await
    .unwrap();
  assert!(matches!(unknown, ScanOutcome::UnknownTag));

  // Registered and tagged, but not enrolled in this course.
  s.add_student(new_student("S009", Some("EF34GH")))
    .await
    .unwrap();
  let rejected = gated
    .submit(&ScanIdentity::Tag("EF34GH".into()), &session)
    .await
    .unwrap();
  assert!(matches!(rejected, ScanOutcome::NotEnrolled));

  assert!(s.logs_for_session(session.session_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn scan_against_stopped_session_is_rejected_distinctly() {
  let s = store().await;
  let (lecturer_id, course_id, _) = classroom(&s).await;
  let manager = SessionManager::new(s.clone(), SessionPolicy::default());
  let committer = ScanCommitter::new(s.clone(), SessionPolicy::default());

  let session = manager.start(course_id, lecturer_id).await.unwrap();
  manager.stop(session.session_id).await.unwrap();

  // The caller still holds the stale session; the committer re-verifies.
  let outcome = committer
    .submit(&ScanIdentity::Tag("AB12CD".into()), &session)
    .await
    .unwrap();
  assert!(matches!(outcome, ScanOutcome::SessionClosed));
  assert!(s.logs_for_session(session.session_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn scan_against_expired_session_is_rejected() {
  let s = store().await;
  let (lecturer_id, course_id, _) = classroom(&s).await;
  // Zero-length sessions expire immediately; the row is still active.
  let policy = SessionPolicy::with_minutes(0);
  let manager = SessionManager::new(s.clone(), policy);
  let committer = ScanCommitter::new(s.clone(), policy);

  let session = manager.start(course_id, lecturer_id).await.unwrap();
  assert!(s.get_session(session.session_id).await.unwrap().unwrap().is_active);

  let outcome = committer
    .submit(&ScanIdentity::Tag("AB12CD".into()), &session)
    .await
    .unwrap();
  assert!(matches!(outcome, ScanOutcome::SessionClosed));
}

#[tokio::test]
async fn scan_by_student_number() {
  let s = store().await;
  let (lecturer_id, course_id, _) = classroom(&s).await;
  let manager = SessionManager::new(s.clone(), SessionPolicy::default());
  let committer = ScanCommitter::new(s.clone(), SessionPolicy::default());

  let session = manager.start(course_id, lecturer_id).await.unwrap();
  let outcome = committer
    .submit(&ScanIdentity::Number("S001".into()), &session)
    .await
    .unwrap();
  assert!(outcome.is_recorded());
}

// ─── Change feed ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn feed_notifies_recorded_scans_and_session_stop() {
  let s = store().await;
  let (lecturer_id, course_id, _) = classroom(&s).await;
  let manager = SessionManager::new(s.clone(), SessionPolicy::default());
  let committer = ScanCommitter::new(s.clone(), SessionPolicy::default());

  let mut feed = s.subscribe();
  let session = manager.start(course_id, lecturer_id).await.unwrap();

  match feed.recv().await.unwrap() {
    StoreEvent::SessionStarted(started) => {
      assert_eq!(started.session_id, session.session_id)
    }
    other => panic!("expected SessionStarted, got {other:?}"),
  }

  let outcome = committer
    .submit(&ScanIdentity::Tag("AB12CD".into()), &session)
    .await
    .unwrap();
  let ScanOutcome::Recorded(log) = outcome else {
    panic!("expected Recorded")
  };

  match feed.recv().await.unwrap() {
    StoreEvent::AttendanceRecorded { log_id, session_id } => {
      assert_eq!(log_id, log.log_id);
      assert_eq!(session_id, Some(session.session_id));
    }
    other => panic!("expected AttendanceRecorded, got {other:?}"),
  }

  // A duplicate commit emits nothing; stopping the session does.
  let dup = committer
    .submit(&ScanIdentity::Tag("AB12CD".into()), &session)
    .await
    .unwrap();
  assert!(matches!(dup, ScanOutcome::Duplicate));

  manager.stop(session.session_id).await.unwrap();
  match feed.recv().await.unwrap() {
    StoreEvent::SessionClosed { session_id } => {
      assert_eq!(session_id, session.session_id)
    }
    other => panic!("expected SessionClosed, got {other:?}"),
  }
}

#[tokio::test]
async fn display_order_matches_commit_order_despite_delivery_order() {
  let s = store().await;
  let lecturer = s.add_lecturer(new_lecturer("0001")).await.unwrap();
  let course = s
    .add_course(new_course("CS101", Some(lecturer.lecturer_id)))
    .await
    .unwrap();
  let manager = SessionManager::new(s.clone(), SessionPolicy::default());
  let committer = ScanCommitter::new(s.clone(), SessionPolicy::default());

  let session = manager
    .start(course.course_id, lecturer.lecturer_id)
    .await
    .unwrap();

  let mut committed = Vec::new();
  for (number, tag) in [("S001", "AA0001"), ("S002", "AA0002"), ("S003", "AA0003")] {
    s.add_student(new_student(number, Some(tag))).await.unwrap();
    let outcome = committer
      .submit(&ScanIdentity::Tag(tag.into()), &session)
      .await
      .unwrap();
    let ScanOutcome::Recorded(log) = outcome else {
      panic!("expected Recorded")
    };
    committed.push(log.log_id);
  }

  // Deliver notifications out of order: [C, A, B]. Each delivery re-fetches
  // the joined record, as the console does.
  let mut feed = SessionFeed::new(session.clone(), Vec::new());
  for &log_id in [&committed[2], &committed[0], &committed[1]] {
    let entry = s.log_entry(log_id).await.unwrap().unwrap();
    feed.merge(entry);
  }

  let displayed: Vec<_> =
    feed.entries().iter().map(|e| e.log.log_id).collect();
  assert_eq!(displayed, vec![committed[2], committed[1], committed[0]]);

  // And the bulk fetch agrees with the merged view.
  let bulk = s.logs_for_session(session.session_id).await.unwrap();
  let bulk_ids: Vec<_> = bulk.iter().map(|e| e.log.log_id).collect();
  assert_eq!(bulk_ids, displayed);
}

// ─── End-to-end scenario ─────────────────────────────────────────────────────

#[tokio::test]
async fn end_to_end_session_scenario() {
  let s = store().await;
  let (lecturer_id, course_id, _) = classroom(&s).await;
  let manager = SessionManager::new(s.clone(), SessionPolicy::default());
  let committer = ScanCommitter::new(s.clone(), SessionPolicy::default());

  // Start a session for CS101.
  let session = manager.start(course_id, lecturer_id).await.unwrap();

  // Scan S001 (tag AB12CD) → Recorded, present.
  let first = committer
    .submit(&ScanIdentity::Tag("AB12CD".into()), &session)
    .await
    .unwrap();
  let ScanOutcome::Recorded(log) = first else {
    panic!("expected Recorded")
  };
  assert_eq!(log.status, AttendanceStatus::Present);
  assert_eq!(log.session_id, Some(session.session_id));

  // Immediate re-scan → Duplicate.
  let again = committer
    .submit(&ScanIdentity::Tag("AB12CD".into()), &session)
    .await
    .unwrap();
  assert!(matches!(again, ScanOutcome::Duplicate));

  // Unknown tag → UnknownTag.
  let unknown = committer
    .submit(&ScanIdentity::Tag("ZZ99".into()), &session)
    .await
    .unwrap();
  assert!(matches!(unknown, ScanOutcome::UnknownTag));

  // Stop, then scan S001 again → session-inactive rejection, no new row.
  manager.stop(session.session_id).await.unwrap();
  let after_stop = committer
    .submit(&ScanIdentity::Tag("AB12CD".into()), &session)
    .await
    .unwrap();
  assert!(matches!(after_stop, ScanOutcome::SessionClosed));

  let logs = s.logs_for_session(session.session_id).await.unwrap();
  assert_eq!(logs.len(), 1);
  assert_eq!(logs[0].student.number, "S001");
}

// ─── Reports ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn attendance_totals_count_enrolled_students_only() {
  let s = store().await;
  let (lecturer_id, course_id, _) = classroom(&s).await;
  let manager = SessionManager::new(s.clone(), SessionPolicy::default());
  let committer = ScanCommitter::new(s.clone(), SessionPolicy::default());

  // Two sessions; S001 attends both.
  for _ in 0..2 {
    let session = manager.start(course_id, lecturer_id).await.unwrap();
    let outcome = committer
      .submit(&ScanIdentity::Tag("AB12CD".into()), &session)
      .await
      .unwrap();
    assert!(outcome.is_recorded());
    manager.stop(session.session_id).await.unwrap();
  }

  // An enrolled student who never scanned still appears, at zero.
  let absent = s.add_student(new_student("S002", None)).await.unwrap();
  s.add_enrollment(absent.student_id, course_id).await.unwrap();

  assert_eq!(s.sessions_held(course_id).await.unwrap(), 2);

  let totals = s.attendance_totals(course_id).await.unwrap();
  assert_eq!(totals.len(), 2);
  let by_number: Vec<_> = totals
    .iter()
    .map(|t| (t.student.number.as_str(), t.attended))
    .collect();
  assert!(by_number.contains(&("S001", 2)));
  assert!(by_number.contains(&("S002", 0)));
}
