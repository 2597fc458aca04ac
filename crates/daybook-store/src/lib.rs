// ABOUTME: Persistence layer for daybook over an external key-value backend.
// ABOUTME: Provides the supervised backend link, the journal store, index reconciliation, and health signals.

pub mod backend;
pub mod backoff;
pub mod health;
pub mod link;
pub mod locks;
pub mod reconcile;
pub mod store;

pub use backend::memory::MemoryBackend;
pub use backend::redis::{RedisConnector, RedisSettings};
pub use backend::{BackendError, Connection, Connector};
pub use backoff::{Backoff, BackoffPolicy};
pub use health::{Health, HealthReport, HealthReporter, Readiness};
pub use link::{BackendLink, LinkConfig, LinkState, OpStatsSnapshot};
pub use reconcile::ReconcileReport;
pub use store::JournalStore;
