//! Editor draft.
//!
//! # Responsibility
//! - Hold the fields being edited before they are saved as a note.
//! - Derive connections from mention markers in the body.
//!
//! # Invariants
//! - Body changes only add connections; removal is explicit via
//!   [`NoteDraft::remove_connection`].
//! - A draft is saveable only when title and body are non-blank.

use crate::model::note::{normalize_tags, Note, NoteKind};
use crate::service::mention::union_mentions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub kind: NoteKind,
    pub title: String,
    body: String,
    tags: Vec<String>,
    connections: Vec<String>,
}

impl NoteDraft {
    pub fn new(kind: NoteKind) -> Self {
        Self {
            kind,
            title: String::new(),
            body: String::new(),
            tags: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Starts editing an existing note.
    pub fn from_note(note: &Note) -> Self {
        Self {
            kind: note.kind,
            title: note.title.clone(),
            body: note.body.clone(),
            tags: note.tags.clone(),
            connections: note.connections.clone(),
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn connections(&self) -> &[String] {
        &self.connections
    }

    /// Replaces the body and unions its mentions into the connections.
    pub fn set_body(&mut self, html: impl Into<String>) {
        self.body = html.into();
        union_mentions(&mut self.connections, &self.body);
    }

    /// Editor callback for a freshly inserted mention.
    pub fn on_mention_inserted(&mut self, note_id: &str) {
        let note_id = note_id.trim();
        if !note_id.is_empty() && !self.connections.iter().any(|id| id == note_id) {
            self.connections.push(note_id.to_string());
        }
    }

    pub fn add_connection(&mut self, note_id: &str) {
        self.on_mention_inserted(note_id);
    }

    pub fn remove_connection(&mut self, note_id: &str) -> bool {
        let before = self.connections.len();
        self.connections.retain(|id| id != note_id);
        before != self.connections.len()
    }

    pub fn set_tags(&mut self, tags: &[String]) {
        self.tags = normalize_tags(tags);
    }

    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && !self.body.trim().is_empty()
    }

    /// Builds a new note with a fresh id.
    pub fn into_note(self) -> Note {
        let mut note = Note::new(self.kind, self.title, self.body, self.tags);
        for id in &self.connections {
            note.add_connection(id);
        }
        note
    }

    /// Writes the draft back onto an existing note and touches it.
    pub fn apply_to(&self, note: &mut Note) {
        note.kind = self.kind;
        note.title = self.title.clone();
        note.body = self.body.clone();
        note.tags = self.tags.clone();
        note.connections.clear();
        for id in &self.connections {
            note.add_connection(id);
        }
        note.touch();
    }
}
