//! On-device note collection cache.
//!
//! # Responsibility
//! - Persist the full note collection as one JSON array under `notes`.
//! - Upsert/delete single notes by rewriting the collection.
//! - Quarantine records that fail validation instead of losing them.
//!
//! # Invariants
//! - No operation returns an error; failures are logged.
//! - Read-modify-write sequences hold the store lock for their full duration.
//! - A malformed record is copied to `notes.quarantine` before the next
//!   rewrite drops it from `notes`.

use crate::db::DbResult;
use crate::logging::sanitize_message;
use crate::model::note::{upsert_note, Note};
use crate::repo::blob_store::{BlobStore, SqliteBlobStore};
use log::{debug, error, warn};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Key holding the JSON array of notes.
pub const NOTES_KEY: &str = "notes";
/// Key holding raw records that failed validation.
pub const QUARANTINE_KEY: &str = "notes.quarantine";

const MAX_LOGGED_ERROR_CHARS: usize = 200;

/// Decoded collection plus the raw records that failed validation.
struct Collection {
    notes: Vec<Note>,
    rejected: Vec<String>,
}

/// Local note cache over a device blob store.
pub struct LocalStore {
    blobs: Mutex<Box<dyn BlobStore>>,
}

impl LocalStore {
    pub fn new(blobs: impl BlobStore + 'static) -> Self {
        Self {
            blobs: Mutex::new(Box::new(blobs)),
        }
    }

    /// Opens (or creates) the SQLite-backed cache at `path`.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        SqliteBlobStore::open(path).map(Self::new)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        SqliteBlobStore::open_in_memory().map(Self::new)
    }

    /// Returns every valid cached note. Never fails.
    pub fn load_all(&self) -> Vec<Note> {
        let blobs = self.lock();
        read_collection(&**blobs).notes
    }

    /// Inserts or replaces one note by id.
    pub fn save_one(&self, note: &Note) {
        let blobs = self.lock();
        let mut collection = read_collection(&**blobs);
        let inserted = upsert_note(&mut collection.notes, note.clone());
        if write_collection(&**blobs, &collection) {
            debug!(
                "event=local_save module=local_store status=ok note_id={} inserted={} total={}",
                note.id,
                inserted,
                collection.notes.len()
            );
        }
    }

    /// Removes one note by id. Absent ids are a no-op.
    pub fn delete_one(&self, id: &str) {
        let blobs = self.lock();
        let mut collection = read_collection(&**blobs);
        let before = collection.notes.len();
        collection.notes.retain(|note| note.id != id);
        if collection.notes.len() == before && collection.rejected.is_empty() {
            debug!("event=local_delete module=local_store status=skip note_id={id} reason=absent");
            return;
        }
        if write_collection(&**blobs, &collection) {
            debug!(
                "event=local_delete module=local_store status=ok note_id={id} total={}",
                collection.notes.len()
            );
        }
    }

    /// Drops the whole collection. Quarantined records are kept.
    pub fn clear_all(&self) {
        let blobs = self.lock();
        let collection = read_collection(&**blobs);
        quarantine(&**blobs, &collection.rejected);
        if let Err(err) = blobs.remove(NOTES_KEY) {
            error!("event=local_clear module=local_store status=error error={err}");
        }
    }

    /// Returns raw records moved aside because they failed validation.
    pub fn quarantined(&self) -> Vec<String> {
        let blobs = self.lock();
        read_quarantine(&**blobs)
    }

    /// Returns whether a note with `id` is cached.
    pub fn contains(&self, id: &str) -> bool {
        self.load_all().iter().any(|note| note.id == id)
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn BlobStore>> {
        // Poisoning is ignored: the blob only ever changes through whole-value `set`.
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn read_collection(blobs: &dyn BlobStore) -> Collection {
    let raw = match blobs.get(NOTES_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            return Collection {
                notes: Vec::new(),
                rejected: Vec::new(),
            }
        }
        Err(err) => {
            error!("event=local_load module=local_store status=error error_code=read_failed error={err}");
            return Collection {
                notes: Vec::new(),
                rejected: Vec::new(),
            };
        }
    };

    let values: Vec<Value> = match serde_json::from_str(&raw) {
        Ok(values) => values,
        Err(err) => {
            error!(
                "event=local_load module=local_store status=error error_code=parse_failed error={}",
                sanitize_message(&err.to_string(), MAX_LOGGED_ERROR_CHARS)
            );
            return Collection {
                notes: Vec::new(),
                rejected: vec![raw],
            };
        }
    };

    let mut notes = Vec::with_capacity(values.len());
    let mut rejected = Vec::new();
    for value in values {
        let raw_record = value.to_string();
        match Note::from_value(value) {
            Ok(note) => {
                upsert_note(&mut notes, note);
            }
            Err(err) => {
                warn!(
                    "event=local_load module=local_store status=skip reason=invalid_record error={}",
                    sanitize_message(&err.to_string(), MAX_LOGGED_ERROR_CHARS)
                );
                rejected.push(raw_record);
            }
        }
    }

    Collection { notes, rejected }
}

fn write_collection(blobs: &dyn BlobStore, collection: &Collection) -> bool {
    quarantine(blobs, &collection.rejected);

    let encoded = match serde_json::to_string(&collection.notes) {
        Ok(encoded) => encoded,
        Err(err) => {
            error!("event=local_write module=local_store status=error error_code=encode_failed error={err}");
            return false;
        }
    };
    match blobs.set(NOTES_KEY, &encoded) {
        Ok(()) => true,
        Err(err) => {
            error!("event=local_write module=local_store status=error error_code=write_failed error={err}");
            false
        }
    }
}

fn read_quarantine(blobs: &dyn BlobStore) -> Vec<String> {
    match blobs.get(QUARANTINE_KEY) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!("event=local_quarantine module=local_store status=error error_code=parse_failed error={err}");
            Vec::new()
        }),
        Ok(None) => Vec::new(),
        Err(err) => {
            error!("event=local_quarantine module=local_store status=error error_code=read_failed error={err}");
            Vec::new()
        }
    }
}

fn quarantine(blobs: &dyn BlobStore, records: &[String]) {
    if records.is_empty() {
        return;
    }
    let mut stored = read_quarantine(blobs);
    let mut added = 0usize;
    for record in records {
        if !stored.contains(record) {
            stored.push(record.clone());
            added += 1;
        }
    }
    if added == 0 {
        return;
    }
    let result = serde_json::to_string(&stored)
        .map_err(|err| err.to_string())
        .and_then(|encoded| {
            blobs
                .set(QUARANTINE_KEY, &encoded)
                .map_err(|err| err.to_string())
        });
    match result {
        Ok(()) => warn!(
            "event=local_quarantine module=local_store status=ok added={added} total={}",
            stored.len()
        ),
        Err(err) => error!(
            "event=local_quarantine module=local_store status=error error_code=write_failed error={err}"
        ),
    }
}
