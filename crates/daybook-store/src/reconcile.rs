// ABOUTME: Index reconciliation: rebuilds an owner's index from a scan of their entry keys.
// ABOUTME: Repairs entries orphaned by a failure between the entry write and the index rewrite.

use std::collections::{BTreeSet, HashSet};

use daybook_core::keys::{
    entry_prefix, index_key, namespace_prefix, owner_from_entry_key, owner_from_index_key,
};
use daybook_core::{IndexRecord, JournalEntry, JournalError};
use serde::Serialize;

use crate::store::JournalStore;

/// Outcome of rebuilding one owner's index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub owner: String,
    /// Records in the rebuilt index.
    pub entries: usize,
    /// Entries that were missing from the index.
    pub added: usize,
    /// Index records without a live entry.
    pub removed: usize,
    /// Records whose summary disagreed with the stored entry.
    pub refreshed: usize,
}

impl JournalStore {
    /// Replace `owner`'s index with one summary per live entry key.
    ///
    /// Records are ordered by creation time. Unparseable entries and entries
    /// claiming a different owner are skipped with a warning. An unparseable
    /// index is overwritten, with every rebuilt record counted as added.
    pub async fn rebuild_index(&self, owner: &str) -> Result<ReconcileReport, JournalError> {
        let _index = self.lock_index(owner).await;

        let keys = self.link.scan_prefix(&entry_prefix(owner)).await?;
        let mut entries: Vec<JournalEntry> = Vec::with_capacity(keys.len());
        for key in &keys {
            // Expired between the scan and the read.
            let Some(raw) = self.link.get(key).await? else {
                continue;
            };
            match serde_json::from_str::<JournalEntry>(&raw) {
                Ok(entry) if entry.owner == owner => entries.push(entry),
                Ok(entry) => {
                    tracing::warn!(key = %key, owner, stored_owner = %entry.owner, "skipping entry stored under another owner");
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "skipping unparseable entry");
                }
            }
        }
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        let rebuilt: Vec<IndexRecord> = entries.iter().map(JournalEntry::summary).collect();

        let (previous, corrupt) = self.read_previous_index(owner).await?;
        let report = diff(owner, &previous, &rebuilt);

        if previous.is_empty() && rebuilt.is_empty() && !corrupt {
            tracing::debug!(owner, "nothing to reconcile");
            return Ok(report);
        }
        self.write_index(owner, &rebuilt).await?;

        if corrupt || report.added + report.removed + report.refreshed > 0 {
            tracing::warn!(
                owner,
                added = report.added,
                removed = report.removed,
                refreshed = report.refreshed,
                "index repaired"
            );
        } else {
            tracing::info!(owner, entries = report.entries, "index consistent");
        }
        Ok(report)
    }

    /// The stored index, or an empty one flagged corrupt when it does not parse.
    async fn read_previous_index(
        &self,
        owner: &str,
    ) -> Result<(Vec<IndexRecord>, bool), JournalError> {
        let Some(raw) = self.link.get(&index_key(owner)).await? else {
            return Ok((Vec::new(), false));
        };
        match serde_json::from_str(&raw) {
            Ok(records) => Ok((records, false)),
            Err(e) => {
                tracing::warn!(owner, error = %e, "stored index is unparseable; replacing it");
                Ok((Vec::new(), true))
            }
        }
    }

    /// Rebuild the index of every owner that has an index or any entry.
    pub async fn reconcile_all(&self) -> Result<Vec<ReconcileReport>, JournalError> {
        let keys = self.link.scan_prefix(&namespace_prefix()).await?;
        let owners: BTreeSet<&str> = keys
            .iter()
            .filter_map(|key| owner_from_index_key(key).or_else(|| owner_from_entry_key(key)))
            .collect();

        let mut reports = Vec::with_capacity(owners.len());
        for owner in owners {
            reports.push(self.rebuild_index(owner).await?);
        }
        tracing::info!(owners = reports.len(), "reconciliation pass complete");
        Ok(reports)
    }
}

fn diff(owner: &str, previous: &[IndexRecord], rebuilt: &[IndexRecord]) -> ReconcileReport {
    let before: HashSet<&str> = previous.iter().map(|r| r.id.as_str()).collect();
    let after: HashSet<&str> = rebuilt.iter().map(|r| r.id.as_str()).collect();
    let refreshed = rebuilt
        .iter()
        .filter(|r| previous.iter().any(|p| p.id == r.id && p != *r))
        .count();

    ReconcileReport {
        owner: owner.to_string(),
        entries: rebuilt.len(),
        added: after.difference(&before).count(),
        removed: before.difference(&after).count(),
        refreshed,
    }
}
