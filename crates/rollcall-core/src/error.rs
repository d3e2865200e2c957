//! Error types for `rollcall-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A staff identifier that does not match the `SMAF/` + 4-digit format.
  #[error("invalid staff id: {0:?}")]
  InvalidStaffId(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
