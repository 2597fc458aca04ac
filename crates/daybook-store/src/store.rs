// ABOUTME: Journal store maintaining the entry + per-owner index dual representation.
// ABOUTME: Writes are two non-atomic steps; per-entry and per-index locks serialize them within the process.

use chrono::Utc;
use daybook_core::keys::{entry_key, index_key};
use daybook_core::model::sort_for_listing;
use daybook_core::{EntryPatch, IndexRecord, JournalEntry, JournalError, NewEntry};

use crate::link::BackendLink;
use crate::locks::{KeyGuard, KeyedLocks};

/// List/get/create/update/delete over the backend link.
///
/// Every full entry lives under its entry key and is mirrored by one
/// [`IndexRecord`] in its owner's index array. The entry write and the index
/// rewrite are separate backend calls, so a failure between them leaves an
/// entry missing from the index until [`JournalStore::rebuild_index`] runs.
pub struct JournalStore {
    pub(crate) link: BackendLink,
    entry_locks: KeyedLocks,
    index_locks: KeyedLocks,
}

impl JournalStore {
    pub fn new(link: BackendLink) -> Self {
        Self {
            link,
            entry_locks: KeyedLocks::new(),
            index_locks: KeyedLocks::new(),
        }
    }

    pub fn link(&self) -> &BackendLink {
        &self.link
    }

    /// Index records for `owner`, most recently updated first.
    pub async fn list(&self, owner: &str) -> Result<Vec<IndexRecord>, JournalError> {
        let mut records = self.read_index(owner).await?;
        sort_for_listing(&mut records);
        tracing::info!(owner, count = records.len(), "retrieved journal entries");
        Ok(records)
    }

    pub async fn get(&self, owner: &str, entry_id: &str) -> Result<JournalEntry, JournalError> {
        match self.read_entry(owner, entry_id).await? {
            Some(entry) => {
                tracing::info!(owner, entry_id, "retrieved journal entry");
                Ok(entry)
            }
            None => {
                tracing::warn!(owner, entry_id, "journal entry not found");
                Err(JournalError::not_found(owner, entry_id))
            }
        }
    }

    /// Write a new entry, then add its summary to the owner's index.
    ///
    /// A rebuild running between the two writes may already have indexed the
    /// entry; its record is then replaced rather than duplicated.
    pub async fn create(&self, owner: &str, new: NewEntry) -> Result<JournalEntry, JournalError> {
        let entry = JournalEntry::create(owner, new, Utc::now());
        let _entry = self.lock_entry(owner, &entry.id).await;
        self.write_entry(&entry).await?;

        {
            let _index = self.lock_index(owner).await;
            let mut records = self.read_index(owner).await?;
            match records.iter().position(|r| r.id == entry.id) {
                Some(pos) => records[pos] = entry.summary(),
                None => records.push(entry.summary()),
            }
            self.write_index(owner, &records).await?;
        }

        tracing::info!(owner, entry_id = %entry.id, title = %entry.title, "created journal entry");
        Ok(entry)
    }

    /// Merge `patch` onto the stored entry, rewrite it whole, then replace its
    /// index record. A missing index record is left missing.
    pub async fn update(
        &self,
        owner: &str,
        entry_id: &str,
        patch: EntryPatch,
    ) -> Result<JournalEntry, JournalError> {
        let _entry = self.lock_entry(owner, entry_id).await;

        let Some(existing) = self.read_entry(owner, entry_id).await? else {
            tracing::warn!(owner, entry_id, "journal entry not found for update");
            return Err(JournalError::not_found(owner, entry_id));
        };
        if patch.has_ignored_clears() {
            tracing::debug!(owner, entry_id, "empty values supplied for required fields were ignored");
        }

        let updated = patch.apply(&existing, Utc::now());
        self.write_entry(&updated).await?;

        {
            let _index = self.lock_index(owner).await;
            let mut records = self.read_index(owner).await?;
            match records.iter().position(|r| r.id == entry_id) {
                Some(pos) => {
                    records[pos] = updated.summary();
                    self.write_index(owner, &records).await?;
                }
                None => {
                    tracing::warn!(owner, entry_id, "index record missing for updated entry; index left unchanged");
                }
            }
        }

        tracing::info!(owner, entry_id, "updated journal entry");
        Ok(updated)
    }

    /// Remove the entry and its index record. Absent entries or records are
    /// not an error.
    pub async fn delete(&self, owner: &str, entry_id: &str) -> Result<(), JournalError> {
        let _entry = self.lock_entry(owner, entry_id).await;
        self.link.delete(&entry_key(owner, entry_id)).await?;

        {
            let _index = self.lock_index(owner).await;
            let mut records = self.read_index(owner).await?;
            records.retain(|r| r.id != entry_id);
            self.write_index(owner, &records).await?;
        }

        tracing::info!(owner, entry_id, "deleted journal entry");
        Ok(())
    }

    pub(crate) async fn lock_index(&self, owner: &str) -> KeyGuard {
        self.index_locks.lock(owner).await
    }

    async fn lock_entry(&self, owner: &str, entry_id: &str) -> KeyGuard {
        self.entry_locks.lock(&entry_key(owner, entry_id)).await
    }

    pub(crate) async fn read_index(&self, owner: &str) -> Result<Vec<IndexRecord>, JournalError> {
        match self.link.get(&index_key(owner)).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    pub(crate) async fn write_index(
        &self,
        owner: &str,
        records: &[IndexRecord],
    ) -> Result<(), JournalError> {
        let raw = serde_json::to_string(records)?;
        self.link.set(&index_key(owner), &raw).await?;
        Ok(())
    }

    async fn read_entry(
        &self,
        owner: &str,
        entry_id: &str,
    ) -> Result<Option<JournalEntry>, JournalError> {
        match self.link.get(&entry_key(owner, entry_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn write_entry(&self, entry: &JournalEntry) -> Result<(), JournalError> {
        let raw = serde_json::to_string(entry)?;
        self.link.set(&entry_key(&entry.owner, &entry.id), &raw).await?;
        Ok(())
    }
}
