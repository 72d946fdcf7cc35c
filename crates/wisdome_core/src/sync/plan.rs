//! Reconciliation planning.
//!
//! # Responsibility
//! - Index remote documents by inferred note id.
//! - Decide which remote documents to pull and which local notes to push.
//!
//! # Invariants
//! - A remote document is pulled only when the note is missing locally or the
//!   remote `modifiedTime` is strictly later than local `updatedAt`.
//! - A local note is pushed only when no remote document carries its id;
//!   notes already present remotely are never pushed, whatever their age.

use crate::model::note::{note_id_from_file_name, Note, NoteId};
use crate::remote::api::RemoteFile;
use std::collections::BTreeMap;

/// Remote folder contents keyed by note id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteIndex {
    entries: BTreeMap<NoteId, RemoteFile>,
    skipped: Vec<String>,
}

impl RemoteIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one listed file. Files not named `<id>.json` are recorded as skipped.
    ///
    /// A later file with the same inferred id replaces the earlier one.
    pub fn insert(&mut self, file: RemoteFile) {
        match note_id_from_file_name(&file.name) {
            Some(id) => {
                self.entries.insert(id.to_string(), file);
            }
            None => self.skipped.push(file.name),
        }
    }

    pub fn get(&self, note_id: &str) -> Option<&RemoteFile> {
        self.entries.get(note_id)
    }

    pub fn contains(&self, note_id: &str) -> bool {
        self.entries.contains_key(note_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of listed files that do not map to a note id.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NoteId, &RemoteFile)> {
        self.entries.iter()
    }
}

impl FromIterator<RemoteFile> for RemoteIndex {
    fn from_iter<I: IntoIterator<Item = RemoteFile>>(iter: I) -> Self {
        let mut index = Self::new();
        for file in iter {
            index.insert(file);
        }
        index
    }
}

/// Work derived from comparing local notes against the remote index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan<'a> {
    /// Remote documents to download, in note id order.
    pub downloads: Vec<&'a RemoteFile>,
    /// Local notes with no remote counterpart, in local order.
    pub uploads: Vec<&'a Note>,
}

/// Returns whether the remote copy must replace `local`.
///
/// Remote documents without a modification time never win over a local copy.
pub fn remote_is_newer(local: &Note, remote: &RemoteFile) -> bool {
    remote
        .modified_time
        .is_some_and(|modified| local.updated_at < modified)
}

/// Compares local notes against the remote index.
pub fn plan_sync<'a>(local: &'a [Note], remote: &'a RemoteIndex) -> SyncPlan<'a> {
    let local_by_id: BTreeMap<&str, &Note> =
        local.iter().map(|note| (note.id.as_str(), note)).collect();

    let downloads = remote
        .iter()
        .filter(|(id, file)| match local_by_id.get(id.as_str()) {
            None => true,
            Some(note) => remote_is_newer(note, file),
        })
        .map(|(_, file)| file)
        .collect();

    let uploads = local
        .iter()
        .filter(|note| !remote.contains(&note.id))
        .collect();

    SyncPlan { downloads, uploads }
}
