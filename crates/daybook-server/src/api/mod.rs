// ABOUTME: API module containing all HTTP handler functions for daybook.
// ABOUTME: Organized into journal CRUD/reconciliation and probe/metrics sub-modules.

pub mod journals;
pub mod probes;
