//! Remote note store adapter.
//!
//! # Responsibility
//! - Resolve (or create) the notes folder.
//! - Mirror single-note saves and deletes to `<id>.json` documents.
//! - Reconcile the local cache against the folder (`sync_notes`).
//!
//! # Invariants
//! - Every save/delete hits the local store first, whatever the network does.
//! - Every outbound call goes through the retry policy.
//! - Public operations never return errors: failures become `false` or the
//!   current local collection.
//! - Reconciliation pulls only; it pushes notes that are missing remotely and
//!   never overwrites an existing remote document.

use crate::config::SyncConfig;
use crate::logging::sanitize_message;
use crate::model::note::{note_file_name, Note};
use crate::remote::api::{
    file_by_name_query, folder_notes_query, folder_query, DriveApi, FileMetadata, FileQuery,
    RemoteFile, NOTE_MIME_TYPE,
};
use crate::remote::error::{RemoteError, RemoteResult};
use crate::remote::retry::RetryPolicy;
use crate::repo::local_store::LocalStore;
use crate::sync::plan::{plan_sync, RemoteIndex};
use futures::future::join_all;
use log::{debug, error, info, warn};
use std::sync::{Arc, RwLock};
use std::time::Instant;

const MAX_LOGGED_ERROR_CHARS: usize = 200;

/// Counters of one reconciliation pass, logged on completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub local_count: usize,
    pub remote_count: usize,
    pub downloaded: usize,
    pub download_failed: usize,
    pub pushed: usize,
    pub push_failed: usize,
}

pub struct RemoteNoteStore<A> {
    api: A,
    local: Arc<LocalStore>,
    retry: RetryPolicy,
    folder_name: String,
    batch_size: usize,
    page_size: u32,
    folder_id: RwLock<Option<String>>,
}

impl<A: DriveApi> RemoteNoteStore<A> {
    pub fn new(api: A, local: Arc<LocalStore>, config: &SyncConfig) -> Self {
        Self {
            api,
            local,
            retry: config.retry_policy(),
            folder_name: config.folder_name.clone(),
            batch_size: config.download_batch_size.max(1),
            page_size: config.page_size.max(1),
            folder_id: RwLock::new(None),
        }
    }

    /// Resolved folder id, if `initialize` has succeeded.
    pub fn folder_id(&self) -> Option<String> {
        self.folder_id
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn local(&self) -> &Arc<LocalStore> {
        &self.local
    }

    /// Finds or creates the notes folder. Safe to call repeatedly.
    ///
    /// On failure the previously resolved folder (if any) is kept.
    pub async fn initialize(&self) -> bool {
        let started_at = Instant::now();
        match self.resolve_folder().await {
            Ok(folder_id) => {
                info!(
                    "event=remote_init module=remote status=ok folder_id={folder_id} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                *self
                    .folder_id
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(folder_id);
                true
            }
            Err(err) => {
                error!(
                    "event=remote_init module=remote status=error auth={} duration_ms={} error={}",
                    err.is_auth(),
                    started_at.elapsed().as_millis(),
                    sanitize_message(&err.to_string(), MAX_LOGGED_ERROR_CHARS)
                );
                false
            }
        }
    }

    /// Saves locally, then creates or updates the remote document.
    ///
    /// Returns whether the remote write succeeded; `false` without a folder.
    pub async fn save_note(&self, note: &Note) -> bool {
        self.local.save_one(note);

        let Some(folder_id) = self.folder_id() else {
            debug!(
                "event=remote_save module=remote status=skip note_id={} reason=no_folder",
                note.id
            );
            return false;
        };

        match self.push_note(&folder_id, note).await {
            Ok(created) => {
                info!(
                    "event=remote_save module=remote status=ok note_id={} created={created}",
                    note.id
                );
                true
            }
            Err(err) => {
                warn!(
                    "event=remote_save module=remote status=error note_id={} error={}",
                    note.id,
                    sanitize_message(&err.to_string(), MAX_LOGGED_ERROR_CHARS)
                );
                false
            }
        }
    }

    /// Deletes locally, then deletes the remote document if one exists.
    pub async fn delete_note(&self, note_id: &str) -> bool {
        self.local.delete_one(note_id);

        let Some(folder_id) = self.folder_id() else {
            debug!("event=remote_delete module=remote status=skip note_id={note_id} reason=no_folder");
            return false;
        };

        match self.remove_note_file(&folder_id, note_id).await {
            Ok(existed) => {
                info!("event=remote_delete module=remote status=ok note_id={note_id} existed={existed}");
                true
            }
            Err(err) => {
                warn!(
                    "event=remote_delete module=remote status=error note_id={note_id} error={}",
                    sanitize_message(&err.to_string(), MAX_LOGGED_ERROR_CHARS)
                );
                false
            }
        }
    }

    /// Reconciles the local cache with the remote folder.
    ///
    /// Returns the local collection after merging; on any failure returns the
    /// local collection as it is.
    pub async fn sync_notes(&self) -> Vec<Note> {
        let Some(folder_id) = self.folder_id() else {
            debug!("event=sync module=remote status=skip reason=no_folder");
            return self.local.load_all();
        };

        let started_at = Instant::now();
        info!("event=sync module=remote status=start");
        match self.reconcile(&folder_id).await {
            Ok(report) => {
                info!(
                    "event=sync module=remote status=ok local={} remote={} downloaded={} download_failed={} pushed={} push_failed={} duration_ms={}",
                    report.local_count,
                    report.remote_count,
                    report.downloaded,
                    report.download_failed,
                    report.pushed,
                    report.push_failed,
                    started_at.elapsed().as_millis()
                );
            }
            Err(err) => {
                error!(
                    "event=sync module=remote status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    sanitize_message(&err.to_string(), MAX_LOGGED_ERROR_CHARS)
                );
            }
        }
        self.local.load_all()
    }

    async fn resolve_folder(&self) -> RemoteResult<String> {
        let query = FileQuery::new(folder_query(&self.folder_name));
        let found = self
            .retry
            .run("find_folder", || self.api.list_files(&query))
            .await?;
        if let Some(folder) = found.files.into_iter().next() {
            return Ok(folder.id);
        }

        let created = self
            .retry
            .run("create_folder", || self.api.create_folder(&self.folder_name))
            .await?;
        info!(
            "event=remote_folder_create module=remote status=ok folder_id={}",
            created.id
        );
        Ok(created.id)
    }

    async fn find_note_file(
        &self,
        folder_id: &str,
        note_id: &str,
    ) -> RemoteResult<Option<RemoteFile>> {
        let query = FileQuery::new(file_by_name_query(&note_file_name(note_id), folder_id));
        let found = self
            .retry
            .run("find_file", || self.api.list_files(&query))
            .await?;
        Ok(found.files.into_iter().next())
    }

    /// Returns `false` when no remote document existed.
    async fn remove_note_file(&self, folder_id: &str, note_id: &str) -> RemoteResult<bool> {
        match self.find_note_file(folder_id, note_id).await? {
            Some(file) => {
                self.retry
                    .run("delete_file", || self.api.delete_file(&file.id))
                    .await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns `true` when a new document was created.
    async fn push_note(&self, folder_id: &str, note: &Note) -> RemoteResult<bool> {
        let content = note
            .to_document()
            .map_err(|err| RemoteError::Encode(err.to_string()))?;
        let existing = self.find_note_file(folder_id, &note.id).await?;

        let mut metadata = FileMetadata {
            name: note.file_name(),
            mime_type: NOTE_MIME_TYPE.to_string(),
            parents: None,
        };
        match existing {
            Some(file) => {
                self.retry
                    .run("update_file", || {
                        self.api.update_file(&file.id, &metadata, &content)
                    })
                    .await?;
                Ok(false)
            }
            None => {
                metadata.parents = Some(vec![folder_id.to_string()]);
                self.retry
                    .run("create_file", || self.api.create_file(&metadata, &content))
                    .await?;
                Ok(true)
            }
        }
    }

    async fn list_remote_index(&self, folder_id: &str) -> RemoteResult<RemoteIndex> {
        let mut index = RemoteIndex::new();
        let mut query = FileQuery {
            q: folder_notes_query(folder_id),
            fields: Some("nextPageToken, files(id, name, modifiedTime)".to_string()),
            page_size: Some(self.page_size),
            page_token: None,
        };
        let mut pages = 0usize;
        loop {
            let page = self
                .retry
                .run("list_files", || self.api.list_files(&query))
                .await?;
            pages += 1;
            for file in page.files {
                index.insert(file);
            }
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => query.page_token = Some(token),
                None => break,
            }
        }
        if !index.skipped().is_empty() {
            warn!(
                "event=sync_list module=remote status=skip reason=foreign_file_names count={}",
                index.skipped().len()
            );
        }
        debug!(
            "event=sync_list module=remote status=ok pages={pages} files={}",
            index.len()
        );
        Ok(index)
    }

    async fn download_note(&self, file: &RemoteFile) -> RemoteResult<Note> {
        let text = self
            .retry
            .run("download_file", || self.api.download_file(&file.id))
            .await?;
        let note = Note::from_document(&text).map_err(|err| RemoteError::Decode(err.to_string()))?;
        if note_file_name(&note.id) != file.name {
            return Err(RemoteError::Decode(format!(
                "document {} holds note {}",
                file.name, note.id
            )));
        }
        self.local.save_one(&note);
        Ok(note)
    }

    async fn reconcile(&self, folder_id: &str) -> RemoteResult<SyncReport> {
        let local_notes = self.local.load_all();
        let index = self.list_remote_index(folder_id).await?;
        let plan = plan_sync(&local_notes, &index);

        let mut report = SyncReport {
            local_count: local_notes.len(),
            remote_count: index.len(),
            ..SyncReport::default()
        };

        for batch in plan.downloads.chunks(self.batch_size) {
            let results = join_all(batch.iter().map(|file| self.download_note(file))).await;
            for (file, result) in batch.iter().zip(results) {
                match result {
                    Ok(note) => {
                        debug!(
                            "event=sync_download module=remote status=ok file_id={} note_id={}",
                            file.id, note.id
                        );
                        report.downloaded += 1;
                    }
                    Err(err) => {
                        report.download_failed += 1;
                        warn!(
                            "event=sync_download module=remote status=error file_id={} error={}",
                            file.id,
                            sanitize_message(&err.to_string(), MAX_LOGGED_ERROR_CHARS)
                        );
                    }
                }
            }
        }

        for note in plan.uploads {
            if self.save_note(note).await {
                report.pushed += 1;
            } else {
                report.push_failed += 1;
            }
        }

        Ok(report)
    }
}
