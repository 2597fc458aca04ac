// ABOUTME: Shared application state for the daybook HTTP server.
// ABOUTME: Holds the journal store and health reporter built once over a single backend link.

use std::sync::Arc;
use std::time::Instant;

use daybook_store::{BackendLink, HealthReporter, JournalStore};

/// Shared application state accessible by all Axum handlers.
pub struct AppState {
    pub store: JournalStore,
    pub health: HealthReporter,
    /// Send internal error detail to clients (development only).
    pub expose_errors: bool,
    pub started_at: Instant,
}

/// Type alias for the Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(link: BackendLink, expose_errors: bool) -> Self {
        Self {
            health: HealthReporter::new(link.clone()),
            store: JournalStore::new(link),
            expose_errors,
            started_at: Instant::now(),
        }
    }

    pub fn link(&self) -> &BackendLink {
        self.store.link()
    }
}
