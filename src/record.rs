//! Idea record data model
//!
//! An `IdeaRecord` is the persisted unit of data for one captured idea:
//! the transcript, the generated plan, user notes, and resource links.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum label length before truncation
const LABEL_MAX_CHARS: usize = 60;

/// Stable identity of a persisted idea record.
///
/// A surrogate key generated at creation, so identities survive
/// reordering and deletion of other records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct RecordId(Uuid);

impl RecordId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One captured idea.
///
/// `id`, `timestamp`, `transcript`, and `label` are fixed at creation;
/// re-recording an idea creates a new record rather than mutating these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct IdeaRecord {
    pub id: RecordId,
    pub timestamp: DateTime<Utc>,
    pub transcript: String,
    pub response: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub resources: Vec<String>,
    pub label: String,
}

impl IdeaRecord {
    /// Create a fresh record from a transcript and its first generated plan.
    pub(crate) fn new(transcript: String, response: String) -> Self {
        let label = derive_label(&transcript);
        Self {
            id: RecordId::new(),
            timestamp: Utc::now(),
            transcript,
            response,
            notes: String::new(),
            resources: Vec::new(),
            label,
        }
    }
}

/// The mutable subset of an `IdeaRecord`.
///
/// Only `notes`, `resources`, and `response` may change after creation;
/// `None` fields are left untouched by `RecordStore::update`.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordPatch {
    pub notes: Option<String>,
    pub resources: Option<Vec<String>>,
    pub response: Option<String>,
}

/// Derive a short display title from a transcript: its first line,
/// truncated. Computed once at creation and never re-derived.
pub(crate) fn derive_label(transcript: &str) -> String {
    let first_line = transcript.lines().next().unwrap_or("").trim();
    if first_line.chars().count() <= LABEL_MAX_CHARS {
        first_line.to_string()
    } else {
        let truncated: String = first_line.chars().take(LABEL_MAX_CHARS).collect();
        format!("{}...", truncated.trim_end())
    }
}
