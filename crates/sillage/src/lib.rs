//! sillage - position tracking and media sharing for a boat on the move
//!
//! This library provides:
//! - `positions`: capped in-memory store of GPS fixes, grouped by track
//! - `media`: uploaded files on disk plus their metadata
//! - `auth`: shared-secret guard for write endpoints
//! - `web`: axum router exposing the HTTP API
//! - `serve`: server lifecycle
//! - `telemetry`: tracing / OpenTelemetry setup

pub mod auth;
pub mod error;
pub mod media;
pub mod positions;
pub mod serve;
pub mod telemetry;
pub mod web;

pub use auth::TokenGuard;
pub use error::ApiError;
pub use media::{MediaRecord, MediaStore};
pub use positions::{NewPosition, Position, PositionStore};
pub use web::{router, AppState};
