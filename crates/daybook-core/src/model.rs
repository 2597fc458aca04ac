// ABOUTME: Journal entry, index summary record, and mood types.
// ABOUTME: Entries are the full record; index records are the per-owner listing projection.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::JournalError;

/// Mood tag attached to every entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Sad,
    #[default]
    Neutral,
    Excited,
    Anxious,
    Calm,
    Grateful,
    Angry,
    Tired,
}

impl Mood {
    pub const ALL: [Mood; 9] = [
        Mood::Happy,
        Mood::Sad,
        Mood::Neutral,
        Mood::Excited,
        Mood::Anxious,
        Mood::Calm,
        Mood::Grateful,
        Mood::Angry,
        Mood::Tired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Sad => "sad",
            Mood::Neutral => "neutral",
            Mood::Excited => "excited",
            Mood::Anxious => "anxious",
            Mood::Calm => "calm",
            Mood::Grateful => "grateful",
            Mood::Angry => "angry",
            Mood::Tired => "tired",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Mood::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| JournalError::Validation(format!("unknown mood: {}", s)))
    }
}

/// A full journal record, stored under its entry key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: String,
    pub owner: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub mood: Mood,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Summary projection of an entry, stored in the owner's index array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub mood: Mood,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for creating an entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub title: String,
    pub content: String,
    pub mood: Mood,
    pub tags: Vec<String>,
}

impl NewEntry {
    /// Validate raw create input. Title and content must be non-empty;
    /// an absent or empty mood defaults to neutral and absent tags to none.
    pub fn new(
        title: Option<String>,
        content: Option<String>,
        mood: Option<String>,
        tags: Option<Vec<String>>,
    ) -> Result<Self, JournalError> {
        let title = title.filter(|t| !t.is_empty());
        let content = content.filter(|c| !c.is_empty());
        let (Some(title), Some(content)) = (title, content) else {
            return Err(JournalError::Validation(
                "Title and content are required".to_string(),
            ));
        };

        let mood = match mood.as_deref() {
            None | Some("") => Mood::default(),
            Some(raw) => raw.parse()?,
        };

        Ok(Self {
            title,
            content,
            mood,
            tags: dedup_tags(tags.unwrap_or_default()),
        })
    }
}

impl JournalEntry {
    /// Build a fresh entry with a new identifier; createdAt equals updatedAt.
    pub fn create(owner: &str, new: NewEntry, now: DateTime<Utc>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            owner: owner.to_string(),
            title: new.title,
            content: new.content,
            mood: new.mood,
            tags: new.tags,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn summary(&self) -> IndexRecord {
        IndexRecord {
            id: self.id.clone(),
            title: self.title.clone(),
            mood: self.mood,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Remove duplicate tags, keeping the first occurrence of each.
pub fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

/// Sort index records newest-updated first. The sort is stable, so records
/// with equal timestamps keep their stored order.
pub fn sort_for_listing(records: &mut [IndexRecord]) {
    records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}
