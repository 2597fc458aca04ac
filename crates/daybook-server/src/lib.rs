// ABOUTME: HTTP server for daybook, exposing the journal API and health probes.
// ABOUTME: Uses Axum with a shared store and health reporter constructed once at startup.

pub mod api;
pub mod app_state;
pub mod config;
pub mod error;
pub mod routes;

pub use app_state::{AppState, SharedState};
pub use config::{BackendKind, ConfigError, DaybookConfig, LogFormat};
pub use error::ApiError;
pub use routes::create_router;
