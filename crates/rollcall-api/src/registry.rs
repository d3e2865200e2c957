//! Read endpoints over the registry (students, courses, rosters, summaries)
//! plus course claiming.
//!
//! CRUD forms, CSV export, and profile editing belong to the portal, not this
//! surface; these reads are what its pages consume.

use axum::{
  Json,
  extract::{Path, State},
};
use rollcall_core::{
  identity::{Course, StaffId, Student},
  store::{AttendanceStore, AttendanceTotal},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

// ─── Lists ────────────────────────────────────────────────────────────────────

/// `GET /students`
pub async fn list_students<S>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<Student>>, ApiError>
where
  S: AttendanceStore + Clone,
{
  let students = state.store.list_students().await.map_err(ApiError::store)?;
  Ok(Json(students))
}

/// `GET /courses`
pub async fn list_courses<S>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<Course>>, ApiError>
where
  S: AttendanceStore + Clone,
{
  let courses = state.store.list_courses().await.map_err(ApiError::store)?;
  Ok(Json(courses))
}

/// `GET /courses/:id/roster`
pub async fn roster<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Student>>, ApiError>
where
  S: AttendanceStore + Clone,
{
  require_course(&state, id).await?;
  let students = state.store.roster(id).await.map_err(ApiError::store)?;
  Ok(Json(students))
}

// ─── Claim ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ClaimBody {
  pub staff_id: StaffId,
}

/// `POST /courses/:id/claim` — assign an unassigned course to the caller.
/// 409 when the course is already claimed.
pub async fn claim<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ClaimBody>,
) -> Result<Json<Course>, ApiError>
where
  S: AttendanceStore + Clone,
{
  let lecturer = state
    .store
    .lecturer_by_staff_id(&body.staff_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("staff {} not found", body.staff_id)))?;

  require_course(&state, id).await?;

  let claimed = state
    .store
    .claim_course(id, lecturer.lecturer_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::Conflict(format!("course {id} is already claimed")))?;

  Ok(Json(claimed))
}

// ─── Summary ──────────────────────────────────────────────────────────────────

/// Per-course attendance report: how many sessions were held and how often
/// each enrolled student was recorded.
#[derive(Debug, Serialize)]
pub struct CourseSummary {
  pub course:        Course,
  pub sessions_held: u64,
  pub totals:        Vec<AttendanceTotal>,
}

/// `GET /courses/:id/summary`
pub async fn summary<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<CourseSummary>, ApiError>
where
  S: AttendanceStore + Clone,
{
  let course = require_course(&state, id).await?;
  let sessions_held =
    state.store.sessions_held(id).await.map_err(ApiError::store)?;
  let totals =
    state.store.attendance_totals(id).await.map_err(ApiError::store)?;
  Ok(Json(CourseSummary { course, sessions_held, totals }))
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

async fn require_course<S>(
  state: &ApiState<S>,
  id: Uuid,
) -> Result<Course, ApiError>
where
  S: AttendanceStore + Clone,
{
  state
    .store
    .get_course(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("course {id} not found")))
}
