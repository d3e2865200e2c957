//! Handler for `/scans` — scan submission against the active session.

use axum::{Json, extract::State};
use rollcall_core::{
  scan::{ScanCommitter, ScanIdentity, ScanOutcome},
  session::SessionManager,
  store::AttendanceStore,
};
use serde::Deserialize;

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ScanBody {
  /// Raw RFID card value.
  pub tag:    Option<String>,
  /// Student number, for keyed-in identities.
  pub number: Option<String>,
}

/// `POST /scans` — body: `{"tag":"AB12CD"}` or `{"number":"S001"}`.
///
/// The classification (recorded/duplicate/unknown/…) is the 200 response
/// body; only malformed requests, standby, and store failures are errors.
pub async fn submit<S>(
  State(state): State<ApiState<S>>,
  Json(body): Json<ScanBody>,
) -> Result<Json<ScanOutcome>, ApiError>
where
  S: AttendanceStore + Clone,
{
  let identity = match (body.tag, body.number) {
    (Some(tag), None) => ScanIdentity::Tag(tag),
    (None, Some(number)) => ScanIdentity::Number(number),
    _ => {
      return Err(ApiError::BadRequest(
        "exactly one of `tag` or `number` is required".into(),
      ));
    }
  };

  let manager = SessionManager::new(state.store.clone(), state.policy);
  let session = manager
    .resolve_active()
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("no active session".into()))?;

  let committer = ScanCommitter::new(state.store.clone(), state.policy)
    .with_enrollment_gate(state.require_enrollment);
  let outcome = committer
    .submit(&identity, &session)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(outcome))
}
