//! PhotoMesh HTTP API.
//!
//! This crate provides the HTTP handlers, router setup, and application state.

mod api_doc;
mod handlers;

pub mod error;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
