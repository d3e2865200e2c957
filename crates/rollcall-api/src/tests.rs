//! Router-level tests against an in-memory store.

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use rollcall_core::{
  identity::{NewCourse, NewLecturer, NewStudent, StaffId},
  session::SessionPolicy,
  store::AttendanceStore,
};
use rollcall_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::util::ServiceExt as _;

use crate::api_router;

async fn fixture() -> (Router, SqliteStore, Value) {
  let store = SqliteStore::open_in_memory().await.unwrap();

  let lecturer = store
    .add_lecturer(NewLecturer {
      staff_id:   StaffId::parse("SMAF/0001").unwrap(),
      first_name: "Grace".into(),
      last_name:  "Hopper".into(),
      email:      "g.hopper@example.edu".into(),
      department: "Computer Science".into(),
    })
    .await
    .unwrap();
  let course = store
    .add_course(NewCourse {
      code:        "CS101".into(),
      name:        "Intro to Computing".into(),
      lecturer_id: Some(lecturer.lecturer_id),
      description: None,
    })
    .await
    .unwrap();
  let student = store
    .add_student(NewStudent {
      number:     "S001".into(),
      rfid_tag:   Some("AB12CD".into()),
      first_name: "Ada".into(),
      last_name:  "Lovelace".into(),
      email:      "a.lovelace@example.edu".into(),
      photo_url:  None,
    })
    .await
    .unwrap();
  store
    .add_enrollment(student.student_id, course.course_id)
    .await
    .unwrap();

  let router = api_router(store.clone(), SessionPolicy::default(), false);
  let ids = json!({
    "course_id": course.course_id,
    "staff_id": "SMAF/0001",
  });
  (router, store, ids)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
  Request::builder()
    .method("POST")
    .uri(uri)
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from(serde_json::to_vec(body).unwrap()))
    .unwrap()
}

fn get(uri: &str) -> Request<Body> {
  Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
  let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
    .await
    .unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn session_lifecycle_over_http() {
  let (router, _store, ids) = fixture().await;

  // Standby: no active session yet.
  let response = router.clone().oneshot(get("/sessions/active")).await.unwrap();
  assert_eq!(response.status(), StatusCode::NOT_FOUND);

  // Start.
  let response = router
    .clone()
    .oneshot(post_json("/sessions", &ids))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::CREATED);
  let session = body_json(response).await;
  let session_id = session["session_id"].as_str().unwrap().to_owned();

  // Resume sees the same session.
  let response = router.clone().oneshot(get("/sessions/active")).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  assert_eq!(body_json(response).await["session_id"], session["session_id"]);

  // Stop is a 204, and standby returns.
  let response = router
    .clone()
    .oneshot(post_json(&format!("/sessions/{session_id}/stop"), &json!({})))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::NO_CONTENT);

  let response = router.clone().oneshot(get("/sessions/active")).await.unwrap();
  assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn scan_classifications_over_http() {
  let (router, _store, ids) = fixture().await;

  let response = router
    .clone()
    .oneshot(post_json("/sessions", &ids))
    .await
    .unwrap();
  let session = body_json(response).await;
  let session_id = session["session_id"].as_str().unwrap().to_owned();

  // First scan records.
  let response = router
    .clone()
    .oneshot(post_json("/scans", &json!({ "tag": "AB12CD" })))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  let outcome = body_json(response).await;
  assert_eq!(outcome["outcome"], "recorded");
  assert_eq!(outcome["log"]["status"], "present");

  // Second scan is a duplicate, still a 200.
  let response = router
    .clone()
    .oneshot(post_json("/scans", &json!({ "tag": "AB12CD" })))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  assert_eq!(body_json(response).await["outcome"], "duplicate");

  // Unknown tag.
  let response = router
    .clone()
    .oneshot(post_json("/scans", &json!({ "tag": "ZZ99" })))
    .await
    .unwrap();
  assert_eq!(body_json(response).await["outcome"], "unknown_tag");

  // Exactly one log row for the session.
  let response = router
    .clone()
    .oneshot(get(&format!("/sessions/{session_id}/logs")))
    .await
    .unwrap();
  let logs = body_json(response).await;
  assert_eq!(logs.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn scan_body_must_name_exactly_one_identity() {
  let (router, _store, ids) = fixture().await;
  router
    .clone()
    .oneshot(post_json("/sessions", &ids))
    .await
    .unwrap();

  let response = router
    .clone()
    .oneshot(post_json("/scans", &json!({})))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::BAD_REQUEST);

  let response = router
    .clone()
    .oneshot(post_json(
      "/scans",
      &json!({ "tag": "AB12CD", "number": "S001" }),
    ))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn claim_and_summary_endpoints() {
  let (router, store, _ids) = fixture().await;

  let unassigned = store
    .add_course(NewCourse {
      code:        "MA202".into(),
      name:        "Linear Algebra".into(),
      lecturer_id: None,
      description: None,
    })
    .await
    .unwrap();

  let claim = json!({ "staff_id": "SMAF/0001" });
  let uri = format!("/courses/{}/claim", unassigned.course_id);

  let response = router.clone().oneshot(post_json(&uri, &claim)).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  assert!(body_json(response).await["lecturer_id"].is_string());

  // Claiming again conflicts.
  let response = router.clone().oneshot(post_json(&uri, &claim)).await.unwrap();
  assert_eq!(response.status(), StatusCode::CONFLICT);

  // Summary lists the enrolled student with zero attendance so far.
  let course_id = {
    let response = router.clone().oneshot(get("/courses")).await.unwrap();
    let courses = body_json(response).await;
    courses
      .as_array()
      .unwrap()
      .iter()
      .find(|c| c["code"] == "CS101")
      .unwrap()["course_id"]
      .as_str()
      .unwrap()
      .to_owned()
  };

  let response = router
    .clone()
    .oneshot(get(&format!("/courses/{course_id}/summary")))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  let summary = body_json(response).await;
  assert_eq!(summary["sessions_held"], 0);
  assert_eq!(summary["totals"].as_array().unwrap().len(), 1);
  assert_eq!(summary["totals"][0]["attended"], 0);
}
