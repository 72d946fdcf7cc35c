//! Note domain model and document schema.
//!
//! # Responsibility
//! - Define the canonical record shared by the local cache and remote documents.
//! - Provide lifecycle helpers (touch, promote, connect) used by mutation paths.
//! - Validate records read back from either store.
//!
//! # Invariants
//! - `id` is stable and never reused for another note.
//! - `created_at` never changes after creation.
//! - `updated_at` never moves backwards through `touch()`.
//! - `tags` and `connections` hold no duplicates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Schema version written into every serialized note.
pub const NOTE_SCHEMA_VERSION: u32 = 1;

/// Suffix of remote note documents (`<id>.json`).
pub const NOTE_FILE_SUFFIX: &str = ".json";

/// Opaque note identifier. New notes use UUID v4 text.
pub type NoteId = String;

/// Zettelkasten category of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    /// Quick capture, expected to be processed later.
    Fleeting,
    /// Notes taken from a source.
    Literature,
    /// Processed note; may hold outbound connections.
    Permanent,
}

impl NoteKind {
    pub const ALL: [NoteKind; 3] = [Self::Fleeting, Self::Literature, Self::Permanent];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fleeting => "fleeting",
            Self::Literature => "literature",
            Self::Permanent => "permanent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fleeting" => Some(Self::Fleeting),
            "literature" => Some(Self::Literature),
            "permanent" => Some(Self::Permanent),
            _ => None,
        }
    }
}

impl Display for NoteKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failures for notes read from storage or built by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteValidationError {
    EmptyId,
    InvalidId(String),
    UnsupportedSchemaVersion { found: u32, supported: u32 },
    UpdatedBeforeCreated(NoteId),
    Malformed(String),
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "note id cannot be empty"),
            Self::InvalidId(id) => write!(f, "note id contains unsupported characters: `{id}`"),
            Self::UnsupportedSchemaVersion { found, supported } => write!(
                f,
                "note schema version {found} is newer than supported {supported}"
            ),
            Self::UpdatedBeforeCreated(id) => {
                write!(f, "note {id} has updatedAt earlier than createdAt")
            }
            Self::Malformed(details) => write!(f, "malformed note document: {details}"),
        }
    }
}

impl Error for NoteValidationError {}

/// Canonical note record.
///
/// Field names follow the document format shared with other devices:
/// `kind` is serialized as `type` and `body` as `content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(default = "legacy_schema_version")]
    pub schema_version: u32,
    pub id: NoteId,
    #[serde(rename = "type")]
    pub kind: NoteKind,
    pub title: String,
    /// HTML produced by the editor, possibly holding mention markers.
    #[serde(rename = "content")]
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub connections: Vec<NoteId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Documents written before the version field existed are version 1.
fn legacy_schema_version() -> u32 {
    1
}

/// Partial update applied by edit flows. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteUpdate {
    pub kind: Option<NoteKind>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
    pub connections: Option<Vec<NoteId>>,
}

impl NoteUpdate {
    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.title.is_none()
            && self.body.is_none()
            && self.tags.is_none()
            && self.connections.is_none()
    }
}

impl Note {
    /// Creates a note with a generated id and both timestamps set to now.
    pub fn new(
        kind: NoteKind,
        title: impl Into<String>,
        body: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), kind, title, body, tags, Utc::now())
    }

    /// Creates a note with a caller-provided id and creation time.
    ///
    /// Used by import paths and tests where identity already exists.
    pub fn with_id(
        id: impl Into<NoteId>,
        kind: NoteKind,
        title: impl Into<String>,
        body: impl Into<String>,
        tags: Vec<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            schema_version: NOTE_SCHEMA_VERSION,
            id: id.into(),
            kind,
            title: title.into(),
            body: body.into(),
            tags: normalize_tags(&tags),
            connections: Vec::new(),
            created_at,
            updated_at: created_at,
        }
    }

    /// Remote document name for this note.
    pub fn file_name(&self) -> String {
        note_file_name(&self.id)
    }

    /// Marks the note as mutated now.
    ///
    /// `updated_at` never decreases, even if the wall clock stepped back.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Promotes the note to `permanent` and touches it.
    pub fn promote_to_permanent(&mut self) {
        self.kind = NoteKind::Permanent;
        self.touch();
    }

    /// Adds one outbound connection. Returns `false` when already present.
    ///
    /// Does not touch the note; callers batch mutations then touch once.
    pub fn add_connection(&mut self, target: &str) -> bool {
        let target = target.trim();
        if target.is_empty() || target == self.id {
            return false;
        }
        if self.connections.iter().any(|existing| existing == target) {
            return false;
        }
        self.connections.push(target.to_string());
        true
    }

    /// Removes one outbound connection. Returns `false` when absent.
    pub fn remove_connection(&mut self, target: &str) -> bool {
        let before = self.connections.len();
        self.connections.retain(|existing| existing != target);
        before != self.connections.len()
    }

    /// Applies a partial update and touches the note when anything changed.
    pub fn apply_update(&mut self, update: NoteUpdate) {
        if update.is_empty() {
            return;
        }
        if let Some(kind) = update.kind {
            self.kind = kind;
        }
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(body) = update.body {
            self.body = body;
        }
        if let Some(tags) = update.tags {
            self.tags = normalize_tags(&tags);
        }
        if let Some(connections) = update.connections {
            self.connections.clear();
            for target in connections {
                self.add_connection(&target);
            }
        }
        self.touch();
    }

    /// Checks structural invariants of a note read from storage.
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if self.id.trim().is_empty() {
            return Err(NoteValidationError::EmptyId);
        }
        if !is_valid_note_id(&self.id) {
            return Err(NoteValidationError::InvalidId(self.id.clone()));
        }
        if self.schema_version > NOTE_SCHEMA_VERSION {
            return Err(NoteValidationError::UnsupportedSchemaVersion {
                found: self.schema_version,
                supported: NOTE_SCHEMA_VERSION,
            });
        }
        if self.updated_at < self.created_at {
            return Err(NoteValidationError::UpdatedBeforeCreated(self.id.clone()));
        }
        Ok(())
    }

    /// Decodes and validates one JSON note value.
    ///
    /// Older documents are upgraded to the current schema version.
    pub fn from_value(value: serde_json::Value) -> Result<Self, NoteValidationError> {
        let mut note: Note = serde_json::from_value(value)
            .map_err(|err| NoteValidationError::Malformed(err.to_string()))?;
        note.validate()?;
        note.tags = normalize_tags(&note.tags);
        dedup_in_place(&mut note.connections);
        note.schema_version = NOTE_SCHEMA_VERSION;
        Ok(note)
    }

    /// Decodes and validates one JSON note document.
    pub fn from_document(text: &str) -> Result<Self, NoteValidationError> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|err| NoteValidationError::Malformed(err.to_string()))?;
        Self::from_value(value)
    }

    /// Encodes this note as a JSON document.
    pub fn to_document(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Remote document name for one note id.
pub fn note_file_name(id: &str) -> String {
    format!("{id}{NOTE_FILE_SUFFIX}")
}

/// Inverse of [`note_file_name`]. Returns `None` for foreign files.
pub fn note_id_from_file_name(name: &str) -> Option<&str> {
    name.strip_suffix(NOTE_FILE_SUFFIX)
        .filter(|id| !id.trim().is_empty())
}

/// Inserts `note` or replaces the entry with the same id.
///
/// Returns `true` when the note was inserted as new.
pub fn upsert_note(notes: &mut Vec<Note>, note: Note) -> bool {
    match notes.iter_mut().find(|existing| existing.id == note.id) {
        Some(existing) => {
            *existing = note;
            false
        }
        None => {
            notes.push(note);
            true
        }
    }
}

/// Normalizes a tag list: trims, drops blanks, removes duplicates.
///
/// First occurrence wins so display order stays stable.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() || normalized.iter().any(|seen| seen == trimmed) {
            continue;
        }
        normalized.push(trimmed.to_string());
    }
    normalized
}

fn dedup_in_place(values: &mut Vec<String>) {
    let mut seen: Vec<String> = Vec::with_capacity(values.len());
    values.retain(|value| {
        if seen.contains(value) {
            false
        } else {
            seen.push(value.clone());
            true
        }
    });
}

// Ids end up inside remote query strings and file names.
fn is_valid_note_id(value: &str) -> bool {
    value.trim() == value
        && !value
            .chars()
            .any(|c| c.is_control() || c == '/' || c == '\\')
}
