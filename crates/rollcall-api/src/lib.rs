//! JSON REST API for Rollcall.
//!
//! Exposes an axum [`Router`] backed by any
//! [`rollcall_core::store::AttendanceStore`]. Auth, TLS, and transport
//! concerns are the caller's responsibility, as is the browser UI.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", rollcall_api::api_router(store.clone(), policy, false))
//! ```

pub mod error;
pub mod registry;
pub mod scans;
pub mod sessions;

use axum::{
  Router,
  routing::{get, post},
};
use rollcall_core::{session::SessionPolicy, store::AttendanceStore};

pub use error::ApiError;

// ─── State ────────────────────────────────────────────────────────────────────

/// Shared handler state: a store handle plus deployment policy.
pub struct ApiState<S> {
  pub store:              S,
  pub policy:             SessionPolicy,
  pub require_enrollment: bool,
}

impl<S: Clone> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:              self.store.clone(),
      policy:             self.policy,
      require_enrollment: self.require_enrollment,
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(
  store: S,
  policy: SessionPolicy,
  require_enrollment: bool,
) -> Router<()>
where
  S: AttendanceStore + Clone + Send + Sync + 'static,
{
  let state = ApiState { store, policy, require_enrollment };

  Router::new()
    // Sessions
    .route("/sessions", post(sessions::start::<S>))
    .route("/sessions/active", get(sessions::active::<S>))
    .route("/sessions/{id}/stop", post(sessions::stop::<S>))
    .route("/sessions/{id}/logs", get(sessions::logs::<S>))
    // Scans
    .route("/scans", post(scans::submit::<S>))
    // Registry reads and claims
    .route("/students", get(registry::list_students::<S>))
    .route("/courses", get(registry::list_courses::<S>))
    .route("/courses/{id}/roster", get(registry::roster::<S>))
    .route("/courses/{id}/claim", post(registry::claim::<S>))
    .route("/courses/{id}/summary", get(registry::summary::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
