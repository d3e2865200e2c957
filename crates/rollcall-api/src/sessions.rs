//! Handlers for `/sessions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/sessions` | Body: `{"course_id":"…","staff_id":"SMAF/0001"}` |
//! | `GET`  | `/sessions/active` | 404 when the system is in standby |
//! | `POST` | `/sessions/:id/stop` | Idempotent; 204 either way |
//! | `GET`  | `/sessions/:id/logs` | Joined entries, timestamp descending |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use rollcall_core::{
  attendance::AttendanceEntry,
  identity::StaffId,
  session::{Session, SessionManager},
  store::AttendanceStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

// ─── Start ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StartBody {
  pub course_id: Uuid,
  pub staff_id:  StaffId,
}

/// `POST /sessions` — deactivates any running session and starts a new one.
pub async fn start<S>(
  State(state): State<ApiState<S>>,
  Json(body): Json<StartBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore + Clone,
{
  let lecturer = state
    .store
    .lecturer_by_staff_id(&body.staff_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("staff {} not found", body.staff_id)))?;

  state
    .store
    .get_course(body.course_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("course {} not found", body.course_id))
    })?;

  let manager = SessionManager::new(state.store.clone(), state.policy);
  let session = manager
    .start(body.course_id, lecturer.lecturer_id)
    .await
    .map_err(ApiError::store)?;

  Ok((StatusCode::CREATED, Json(session)))
}

// ─── Active ───────────────────────────────────────────────────────────────────

/// `GET /sessions/active` — the resume path for reconnecting clients.
pub async fn active<S>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Session>, ApiError>
where
  S: AttendanceStore + Clone,
{
  let manager = SessionManager::new(state.store.clone(), state.policy);
  let session = manager
    .resolve_active()
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("no active session".into()))?;
  Ok(Json(session))
}

// ─── Stop ─────────────────────────────────────────────────────────────────────

/// `POST /sessions/:id/stop`
pub async fn stop<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: AttendanceStore + Clone,
{
  let manager = SessionManager::new(state.store.clone(), state.policy);
  manager.stop(id).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Logs ─────────────────────────────────────────────────────────────────────

/// `GET /sessions/:id/logs`
pub async fn logs<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<AttendanceEntry>>, ApiError>
where
  S: AttendanceStore + Clone,
{
  state
    .store
    .get_session(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("session {id} not found")))?;

  let entries = state
    .store
    .logs_for_session(id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(entries))
}
