// ABOUTME: Error taxonomy for journal operations.
// ABOUTME: Each variant maps to one HTTP status class at the server boundary.

use thiserror::Error;

/// Errors surfaced by journal store operations.
#[derive(Debug, Error)]
pub enum JournalError {
    /// Missing or malformed caller input.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("entry not found: {owner}/{entry_id}")]
    NotFound { owner: String, entry_id: String },

    /// The backend call failed or the link is down.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl JournalError {
    pub fn not_found(owner: &str, entry_id: &str) -> Self {
        Self::NotFound {
            owner: owner.to_string(),
            entry_id: entry_id.to_string(),
        }
    }
}

impl From<serde_json::Error> for JournalError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("stored record is not valid json: {}", err))
    }
}
