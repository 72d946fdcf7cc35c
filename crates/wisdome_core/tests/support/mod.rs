#![allow(dead_code)]

//! In-memory Drive double with scripted failures and call counting.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use wisdome_core::remote::api::{
    DriveApi, FileList, FileMetadata, FileQuery, RemoteFile, FOLDER_MIME_TYPE, NOTE_MIME_TYPE,
};
use wisdome_core::remote::{RemoteError, RemoteResult};
use wisdome_core::sync::DriveConnector;
use wisdome_core::{Credential, Note, NoteKind, SyncConfig};

pub const LIST: &str = "list_files";
pub const CREATE_FOLDER: &str = "create_folder";
pub const CREATE: &str = "create_file";
pub const UPDATE: &str = "update_file";
pub const DOWNLOAD: &str = "download_file";
pub const DELETE: &str = "delete_file";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

pub fn note_at(id: &str, title: &str, updated_at: DateTime<Utc>) -> Note {
    let mut note = Note::with_id(id, NoteKind::Fleeting, title, "<p>body</p>", vec![], t0());
    note.updated_at = updated_at;
    note
}

pub fn test_config() -> SyncConfig {
    SyncConfig::default()
}

#[derive(Debug, Clone)]
pub struct FakeFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub parents: Vec<String>,
    pub content: String,
    pub modified_time: DateTime<Utc>,
}

impl FakeFile {
    fn to_remote(&self) -> RemoteFile {
        RemoteFile {
            id: self.id.clone(),
            name: self.name.clone(),
            mime_type: Some(self.mime_type.clone()),
            modified_time: Some(self.modified_time),
        }
    }
}

#[derive(Default)]
struct FakeState {
    files: Vec<FakeFile>,
    next_id: u64,
    calls: BTreeMap<&'static str, usize>,
    fail_next: BTreeMap<&'static str, VecDeque<RemoteError>>,
    broken_downloads: BTreeMap<String, RemoteError>,
    list_outage: Option<RemoteError>,
    download_delay: Option<Duration>,
    downloads_in_flight: usize,
    max_downloads_in_flight: usize,
}

impl FakeState {
    fn begin(&mut self, op: &'static str) -> RemoteResult<()> {
        *self.calls.entry(op).or_default() += 1;
        match self.fail_next.get_mut(op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn insert(
        &mut self,
        name: &str,
        mime_type: &str,
        parents: Vec<String>,
        content: &str,
        modified_time: DateTime<Utc>,
    ) -> String {
        self.next_id += 1;
        let id = format!("file-{}", self.next_id);
        self.files.push(FakeFile {
            id: id.clone(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            parents,
            content: content.to_string(),
            modified_time,
        });
        id
    }
}

#[derive(Clone, Default)]
pub struct FakeDrive {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDrive {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn add_folder(&self, name: &str) -> String {
        self.state()
            .insert(name, FOLDER_MIME_TYPE, Vec::new(), "", t0())
    }

    pub fn put_note(&self, folder_id: &str, note: &Note, modified_time: DateTime<Utc>) -> String {
        let content = note.to_document().unwrap();
        self.put_file(folder_id, &note.file_name(), &content, modified_time)
    }

    pub fn put_file(
        &self,
        folder_id: &str,
        name: &str,
        content: &str,
        modified_time: DateTime<Utc>,
    ) -> String {
        self.state().insert(
            name,
            NOTE_MIME_TYPE,
            vec![folder_id.to_string()],
            content,
            modified_time,
        )
    }

    pub fn calls(&self, op: &str) -> usize {
        self.state().calls.get(op).copied().unwrap_or(0)
    }

    /// Fails the next `times` calls of `op` with `err`.
    pub fn fail_next(&self, op: &'static str, err: RemoteError, times: usize) {
        let mut state = self.state();
        let queue = state.fail_next.entry(op).or_default();
        for _ in 0..times {
            queue.push_back(err.clone());
        }
    }

    /// Every download of `file_id` fails with `err`.
    pub fn break_download(&self, file_id: &str, err: RemoteError) {
        self.state()
            .broken_downloads
            .insert(file_id.to_string(), err);
    }

    /// Every list call fails with `err` until cleared.
    pub fn set_list_outage(&self, err: Option<RemoteError>) {
        self.state().list_outage = err;
    }

    /// Every download takes `delay` before answering.
    pub fn set_download_delay(&self, delay: Duration) {
        self.state().download_delay = Some(delay);
    }

    /// Highest number of downloads observed running at once.
    pub fn max_downloads_in_flight(&self) -> usize {
        self.state().max_downloads_in_flight
    }

    pub fn files_named(&self, name: &str) -> Vec<FakeFile> {
        self.state()
            .files
            .iter()
            .filter(|file| file.name == name)
            .cloned()
            .collect()
    }

    pub fn file(&self, file_id: &str) -> Option<FakeFile> {
        self.state()
            .files
            .iter()
            .find(|file| file.id == file_id)
            .cloned()
    }

    pub fn folders(&self) -> Vec<FakeFile> {
        self.state()
            .files
            .iter()
            .filter(|file| file.mime_type == FOLDER_MIME_TYPE)
            .cloned()
            .collect()
    }
}

enum Clause {
    Name(String),
    MimeType(String),
    InParents(String),
    NotTrashed,
}

fn unquote(literal: &str) -> String {
    literal
        .trim()
        .trim_start_matches('\'')
        .trim_end_matches('\'')
        .replace("\\'", "'")
        .replace("\\\\", "\\")
}

fn parse_query(q: &str) -> Vec<Clause> {
    q.split(" and ")
        .map(|clause| {
            let clause = clause.trim();
            if let Some(value) = clause.strip_prefix("name=") {
                Clause::Name(unquote(value))
            } else if let Some(value) = clause.strip_prefix("mimeType=") {
                Clause::MimeType(unquote(value))
            } else if let Some(value) = clause.strip_suffix(" in parents") {
                Clause::InParents(unquote(value))
            } else if clause == "trashed=false" {
                Clause::NotTrashed
            } else {
                panic!("unsupported query clause: {clause}")
            }
        })
        .collect()
}

fn matches(file: &FakeFile, clauses: &[Clause]) -> bool {
    clauses.iter().all(|clause| match clause {
        Clause::Name(name) => &file.name == name,
        Clause::MimeType(mime) => &file.mime_type == mime,
        Clause::InParents(parent) => file.parents.contains(parent),
        Clause::NotTrashed => true,
    })
}

#[async_trait]
impl DriveApi for FakeDrive {
    async fn list_files(&self, query: &FileQuery) -> RemoteResult<FileList> {
        let mut state = self.state();
        state.begin(LIST)?;
        if let Some(err) = &state.list_outage {
            return Err(err.clone());
        }

        let clauses = parse_query(&query.q);
        let matching: Vec<RemoteFile> = state
            .files
            .iter()
            .filter(|file| matches(file, &clauses))
            .map(FakeFile::to_remote)
            .collect();
        let offset: usize = query
            .page_token
            .as_deref()
            .map(|token| token.parse().unwrap())
            .unwrap_or(0);
        let page_size = query.page_size.unwrap_or(100) as usize;
        let end = (offset + page_size).min(matching.len());
        let next_page_token = (end < matching.len()).then(|| end.to_string());
        Ok(FileList {
            files: matching[offset.min(end)..end].to_vec(),
            next_page_token,
        })
    }

    async fn create_folder(&self, name: &str) -> RemoteResult<RemoteFile> {
        let mut state = self.state();
        state.begin(CREATE_FOLDER)?;
        let id = state.insert(name, FOLDER_MIME_TYPE, Vec::new(), "", Utc::now());
        Ok(RemoteFile {
            id,
            name: name.to_string(),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            modified_time: None,
        })
    }

    async fn create_file(
        &self,
        metadata: &FileMetadata,
        content: &str,
    ) -> RemoteResult<RemoteFile> {
        let mut state = self.state();
        state.begin(CREATE)?;
        let parents = metadata.parents.clone().unwrap_or_default();
        let id = state.insert(&metadata.name, &metadata.mime_type, parents, content, Utc::now());
        let file = state.files.iter().find(|file| file.id == id).unwrap();
        Ok(file.to_remote())
    }

    async fn update_file(
        &self,
        file_id: &str,
        metadata: &FileMetadata,
        content: &str,
    ) -> RemoteResult<RemoteFile> {
        let mut state = self.state();
        state.begin(UPDATE)?;
        assert!(metadata.parents.is_none(), "updates must not move files");
        let file = state
            .files
            .iter_mut()
            .find(|file| file.id == file_id)
            .ok_or_else(|| RemoteError::from_status(404, "file not found"))?;
        file.name = metadata.name.clone();
        file.content = content.to_string();
        file.modified_time = Utc::now();
        Ok(file.to_remote())
    }

    async fn download_file(&self, file_id: &str) -> RemoteResult<String> {
        let delay = {
            let mut state = self.state();
            state.begin(DOWNLOAD)?;
            state.downloads_in_flight += 1;
            state.max_downloads_in_flight = state
                .max_downloads_in_flight
                .max(state.downloads_in_flight);
            state.download_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state.downloads_in_flight -= 1;
        if let Some(err) = state.broken_downloads.get(file_id) {
            return Err(err.clone());
        }
        state
            .files
            .iter()
            .find(|file| file.id == file_id)
            .map(|file| file.content.clone())
            .ok_or_else(|| RemoteError::from_status(404, "file not found"))
    }

    async fn delete_file(&self, file_id: &str) -> RemoteResult<()> {
        let mut state = self.state();
        state.begin(DELETE)?;
        let before = state.files.len();
        state.files.retain(|file| file.id != file_id);
        if state.files.len() == before {
            return Err(RemoteError::from_status(404, "file not found"));
        }
        Ok(())
    }
}

/// Connector handing out clones of one shared fake.
pub struct FakeConnector {
    pub drive: FakeDrive,
    pub refuse: bool,
}

impl FakeConnector {
    pub fn new(drive: FakeDrive) -> Self {
        Self {
            drive,
            refuse: false,
        }
    }
}

impl DriveConnector for FakeConnector {
    type Api = FakeDrive;

    fn connect(&self, _credential: &Credential) -> RemoteResult<FakeDrive> {
        if self.refuse {
            return Err(RemoteError::Transport("connector refused".to_string()));
        }
        Ok(self.drive.clone())
    }
}
