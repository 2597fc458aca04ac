// ABOUTME: Partial-update semantics for journal entries.
// ABOUTME: Distinguishes omitted fields from fields supplied empty before merging onto a stored entry.

use chrono::{DateTime, Duration, Utc};

use crate::error::JournalError;
use crate::model::{JournalEntry, Mood, dedup_tags};

/// What an update request says about one field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldChange<T> {
    /// Field omitted (or null).
    #[default]
    Unchanged,
    /// Field supplied but empty.
    Cleared,
    Set(T),
}

impl<T> FieldChange<T> {
    /// Resolve against the stored value for fields that may not be empty:
    /// `Cleared` keeps the stored value just like `Unchanged`.
    fn or_keep(self, stored: T) -> T {
        match self {
            FieldChange::Set(value) => value,
            FieldChange::Unchanged | FieldChange::Cleared => stored,
        }
    }
}

impl FieldChange<String> {
    fn from_text(raw: Option<String>) -> Self {
        match raw {
            None => FieldChange::Unchanged,
            Some(s) if s.is_empty() => FieldChange::Cleared,
            Some(s) => FieldChange::Set(s),
        }
    }
}

/// A parsed update request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntryPatch {
    pub title: FieldChange<String>,
    pub content: FieldChange<String>,
    pub mood: FieldChange<Mood>,
    pub tags: FieldChange<Vec<String>>,
}

impl EntryPatch {
    pub fn new(
        title: Option<String>,
        content: Option<String>,
        mood: Option<String>,
        tags: Option<Vec<String>>,
    ) -> Result<Self, JournalError> {
        let mood = match FieldChange::from_text(mood) {
            FieldChange::Set(raw) => FieldChange::Set(raw.parse()?),
            FieldChange::Cleared => FieldChange::Cleared,
            FieldChange::Unchanged => FieldChange::Unchanged,
        };
        let tags = match tags {
            None => FieldChange::Unchanged,
            Some(t) if t.is_empty() => FieldChange::Cleared,
            Some(t) => FieldChange::Set(dedup_tags(t)),
        };

        Ok(Self {
            title: FieldChange::from_text(title),
            content: FieldChange::from_text(content),
            mood,
            tags,
        })
    }

    /// True when any field asked to be emptied but will keep its stored value.
    pub fn has_ignored_clears(&self) -> bool {
        self.title == FieldChange::Cleared
            || self.content == FieldChange::Cleared
            || self.mood == FieldChange::Cleared
    }

    /// Merge onto a stored entry, returning the full replacement record.
    ///
    /// Title, content and mood are never emptied: a cleared value falls back to
    /// the stored one. An empty tag list does clear the tags. The new
    /// `updated_at` is strictly later than the stored one.
    pub fn apply(self, existing: &JournalEntry, now: DateTime<Utc>) -> JournalEntry {
        let tags = match self.tags {
            FieldChange::Unchanged => existing.tags.clone(),
            FieldChange::Cleared => Vec::new(),
            FieldChange::Set(tags) => tags,
        };

        JournalEntry {
            id: existing.id.clone(),
            owner: existing.owner.clone(),
            title: self.title.or_keep(existing.title.clone()),
            content: self.content.or_keep(existing.content.clone()),
            mood: self.mood.or_keep(existing.mood),
            tags,
            created_at: existing.created_at,
            updated_at: now.max(existing.updated_at + Duration::milliseconds(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewEntry;

    fn stored() -> JournalEntry {
        let new = NewEntry::new(
            Some("Day 1".into()),
            Some("Hello".into()),
            Some("happy".into()),
            Some(vec!["work".into()]),
        )
        .unwrap();
        JournalEntry::create("u1", new, Utc::now())
    }

    #[test]
    fn subset_update_keeps_other_fields() {
        let before = stored();
        let patch = EntryPatch::new(None, Some("Hello world".into()), None, None).unwrap();
        let after = patch.apply(&before, Utc::now());

        assert_eq!(after.title, "Day 1");
        assert_eq!(after.content, "Hello world");
        assert_eq!(after.mood, Mood::Happy);
        assert_eq!(after.tags, vec!["work"]);
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at > before.updated_at);
    }

    #[test]
    fn empty_strings_fall_back_to_stored_values() {
        let before = stored();
        let patch =
            EntryPatch::new(Some("".into()), Some("".into()), Some("".into()), None).unwrap();
        assert!(patch.has_ignored_clears());
        let after = patch.apply(&before, Utc::now());

        assert_eq!(after.title, before.title);
        assert_eq!(after.content, before.content);
        assert_eq!(after.mood, before.mood);
    }

    #[test]
    fn empty_tag_list_clears_tags() {
        let before = stored();
        let patch = EntryPatch::new(None, None, None, Some(vec![])).unwrap();
        assert!(!patch.has_ignored_clears());
        assert!(patch.apply(&before, Utc::now()).tags.is_empty());
    }

    #[test]
    fn updated_at_is_strictly_monotonic() {
        let before = stored();
        // A clock that lags the stored timestamp still moves updated_at forward.
        let stale = before.updated_at - Duration::seconds(10);
        let after = EntryPatch::default().apply(&before, stale);
        assert!(after.updated_at > before.updated_at);
    }

    #[test]
    fn invalid_mood_in_patch_is_rejected() {
        let result = EntryPatch::new(None, None, Some("meh".into()), None);
        assert!(matches!(result, Err(JournalError::Validation(_))));
    }
}
