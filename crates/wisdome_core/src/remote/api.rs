//! Remote file API contract.
//!
//! # Responsibility
//! - Define the transport seam (`DriveApi`) the adapter talks to.
//! - Define wire types and query builders for the Drive v3 file API.
//!
//! # Invariants
//! - Implementations perform exactly one network request per call; retries
//!   belong to the caller.
//! - Query literals are always escaped with [`escape_query_literal`].

use crate::remote::error::RemoteResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
pub const NOTE_MIME_TYPE: &str = "application/json";

/// Opaque bearer credential supplied by the auth collaborator.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn bearer_token(&self) -> &str {
        &self.0
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// File metadata as returned by list/create calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<DateTime<Utc>>,
}

/// One page of a file listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<RemoteFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Search/list request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileQuery {
    /// Drive query expression (`q`).
    pub q: String,
    /// Partial response selector (`fields`).
    pub fields: Option<String>,
    pub page_size: Option<u32>,
    pub page_token: Option<String>,
}

impl FileQuery {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            ..Self::default()
        }
    }
}

/// Metadata part of a two-part upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    pub mime_type: String,
    /// Set on create only; updates keep the existing parent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<String>>,
}

/// Remote file API transport.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Searches files; one page per call.
    async fn list_files(&self, query: &FileQuery) -> RemoteResult<FileList>;
    /// Creates a top-level folder.
    async fn create_folder(&self, name: &str) -> RemoteResult<RemoteFile>;
    /// Uploads a new file from a metadata part and a content part.
    async fn create_file(&self, metadata: &FileMetadata, content: &str)
        -> RemoteResult<RemoteFile>;
    /// Replaces content and metadata of an existing file.
    async fn update_file(
        &self,
        file_id: &str,
        metadata: &FileMetadata,
        content: &str,
    ) -> RemoteResult<RemoteFile>;
    /// Downloads file content as text.
    async fn download_file(&self, file_id: &str) -> RemoteResult<String>;
    async fn delete_file(&self, file_id: &str) -> RemoteResult<()>;
}

/// Escapes a string literal for use inside a single-quoted query value.
pub fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Query matching the notes folder by name.
pub fn folder_query(folder_name: &str) -> String {
    format!(
        "name='{}' and mimeType='{FOLDER_MIME_TYPE}' and trashed=false",
        escape_query_literal(folder_name)
    )
}

/// Query listing every note document inside `folder_id`.
pub fn folder_notes_query(folder_id: &str) -> String {
    format!(
        "'{}' in parents and mimeType='{NOTE_MIME_TYPE}' and trashed=false",
        escape_query_literal(folder_id)
    )
}

/// Query finding one document by exact name inside `folder_id`.
pub fn file_by_name_query(file_name: &str, folder_id: &str) -> String {
    format!(
        "name='{}' and '{}' in parents and trashed=false",
        escape_query_literal(file_name),
        escape_query_literal(folder_id)
    )
}

#[cfg(test)]
mod tests {
    use super::{
        escape_query_literal, file_by_name_query, folder_notes_query, folder_query, Credential,
        FileList, FileMetadata,
    };

    #[test]
    fn escapes_quotes_and_backslashes() {
        assert_eq!(escape_query_literal(r"it's\here"), r"it\'s\\here");
    }

    #[test]
    fn builds_drive_queries() {
        assert_eq!(
            folder_query("Wisdome Notes"),
            "name='Wisdome Notes' and mimeType='application/vnd.google-apps.folder' and trashed=false"
        );
        assert_eq!(
            folder_notes_query("f1"),
            "'f1' in parents and mimeType='application/json' and trashed=false"
        );
        assert_eq!(
            file_by_name_query("n.json", "f1"),
            "name='n.json' and 'f1' in parents and trashed=false"
        );
    }

    #[test]
    fn metadata_omits_parents_on_update() {
        let update = FileMetadata {
            name: "n.json".to_string(),
            mime_type: "application/json".to_string(),
            parents: None,
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["mimeType"], "application/json");
        assert!(value.get("parents").is_none());
    }

    #[test]
    fn decodes_file_list_page() {
        let page: FileList = serde_json::from_str(
            r#"{"nextPageToken":"t2","files":[{"id":"1","name":"a.json","modifiedTime":"2024-01-01T00:00:00.000Z"}]}"#,
        )
        .unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("t2"));
        assert!(page.files[0].modified_time.is_some());

        let empty: FileList = serde_json::from_str("{}").unwrap();
        assert!(empty.files.is_empty());
    }

    #[test]
    fn credential_debug_is_redacted() {
        let credential = Credential::new("secret-token");
        assert!(!format!("{credential:?}").contains("secret"));
        assert_eq!(credential.bearer_token(), "secret-token");
    }
}
