//! Transient state for the idea currently being viewed or edited
//!
//! The workspace mirrors one saved record while the user works on it.
//! It never persists anything itself; the pipeline writes to the store
//! after a successful generation.

use crate::record::{IdeaRecord, RecordId};

/// In-memory mirror of the current idea.
///
/// `current` is the identity of the saved record this state mirrors.
/// `None` means an unsaved draft in progress, which is not the same
/// thing as "the first saved record".
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionWorkspace {
    pub transcript: String,
    pub notes: String,
    pub resources: Vec<String>,
    pub response: String,
    pub current: Option<RecordId>,
}

impl SessionWorkspace {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Clear everything back to the initial empty state ("start new idea").
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    /// Mirror an existing saved record ("resume idea").
    pub(crate) fn load_from(&mut self, record: &IdeaRecord) {
        self.transcript = record.transcript.clone();
        self.notes = record.notes.clone();
        self.resources = record.resources.clone();
        self.response = record.response.clone();
        self.current = Some(record.id);
    }

    #[allow(dead_code)]
    pub(crate) fn set_transcript(&mut self, text: impl Into<String>) {
        self.transcript = text.into();
    }

    pub(crate) fn set_notes(&mut self, text: impl Into<String>) {
        self.notes = text.into();
    }

    /// Add a resource URL, preserving insertion order. Adding a URL
    /// that is already present is a no-op, not an error.
    pub(crate) fn add_resource(&mut self, url: impl Into<String>) {
        let url = url.into();
        if !self.resources.iter().any(|r| r == &url) {
            self.resources.push(url);
        }
    }

    /// Remove a resource URL. Returns whether it was present.
    pub(crate) fn remove_resource(&mut self, url: &str) -> bool {
        let before = self.resources.len();
        self.resources.retain(|r| r != url);
        self.resources.len() != before
    }

    pub(crate) fn set_response(&mut self, text: impl Into<String>) {
        self.response = text.into();
    }

    /// Whether a plan has been generated for the current idea yet.
    pub(crate) fn has_response(&self) -> bool {
        !self.response.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_resource_is_idempotent() {
        let mut workspace = SessionWorkspace::new();
        workspace.add_resource("http://example.com");
        workspace.add_resource("http://example.com");
        workspace.add_resource("http://other.example");
        assert_eq!(
            workspace.resources,
            vec!["http://example.com", "http://other.example"]
        );
    }

    #[test]
    fn test_remove_resource_reports_presence() {
        let mut workspace = SessionWorkspace::new();
        workspace.add_resource("http://example.com");
        assert!(workspace.remove_resource("http://example.com"));
        assert!(!workspace.remove_resource("http://example.com"));
        assert!(workspace.resources.is_empty());
    }

    #[test]
    fn test_reset_clears_current_reference() {
        let record = IdeaRecord::new("an idea".to_string(), "a plan".to_string());
        let mut workspace = SessionWorkspace::new();
        workspace.load_from(&record);
        assert_eq!(workspace.current, Some(record.id));
        assert!(workspace.has_response());

        workspace.reset();
        assert!(workspace.current.is_none());
        assert!(workspace.transcript.is_empty());
        assert!(!workspace.has_response());
    }

    #[test]
    fn test_load_from_copies_all_fields() {
        let mut record = IdeaRecord::new("an idea".to_string(), "a plan".to_string());
        record.notes = "some notes".to_string();
        record.resources = vec!["http://example.com".to_string()];

        let mut workspace = SessionWorkspace::new();
        workspace.load_from(&record);
        assert_eq!(workspace.transcript, "an idea");
        assert_eq!(workspace.notes, "some notes");
        assert_eq!(workspace.resources, record.resources);
        assert_eq!(workspace.response, "a plan");
    }
}
