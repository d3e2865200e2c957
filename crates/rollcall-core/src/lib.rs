//! Core types and trait definitions for the Rollcall attendance system.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod attendance;
pub mod error;
pub mod feed;
pub mod identity;
pub mod scan;
pub mod session;
pub mod store;

pub use error::{Error, Result};
