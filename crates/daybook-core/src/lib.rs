// ABOUTME: Core domain types for daybook: journal entries, index records, and patches.
// ABOUTME: Also owns the backend key layout and the error taxonomy shared by store and server.

pub mod error;
pub mod keys;
pub mod model;
pub mod patch;

pub use error::JournalError;
pub use model::{IndexRecord, JournalEntry, Mood, NewEntry};
pub use patch::{EntryPatch, FieldChange};
