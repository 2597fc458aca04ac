// ABOUTME: Pluggable key-value backend seam used by the backend link.
// ABOUTME: A Connector opens Connections; Connections expose get/set/delete/ping/scan primitives.

pub mod memory;
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by a backend connection.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The link itself failed: refused, dropped, timed out, or not established.
    #[error("connection error: {0}")]
    Connection(String),

    /// The backend answered but rejected the command.
    #[error("command error: {0}")]
    Command(String),
}

impl BackendError {
    pub fn is_connection(&self) -> bool {
        matches!(self, BackendError::Connection(_))
    }
}

impl From<BackendError> for daybook_core::JournalError {
    fn from(err: BackendError) -> Self {
        daybook_core::JournalError::BackendUnavailable(err.to_string())
    }
}

/// Opens connections to a backend. Called by the link supervisor on every
/// connection attempt.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Arc<dyn Connection>, BackendError>;

    /// Human-readable address for logs.
    fn describe(&self) -> String;
}

/// One established backend connection, shared by all concurrent callers.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Store `value` under `key`, expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), BackendError>;

    /// Remove `key`. Absent keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), BackendError>;

    async fn ping(&self) -> Result<(), BackendError>;

    /// All live keys starting with `prefix`, in no particular order.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, BackendError>;

    /// Politely close the connection.
    async fn quit(&self) -> Result<(), BackendError> {
        Ok(())
    }
}
