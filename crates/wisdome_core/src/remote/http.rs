//! Drive v3 HTTP transport.
//!
//! # Responsibility
//! - Implement `DriveApi` over `reqwest` with bearer authentication.
//! - Map HTTP statuses to `RemoteError` variants.
//!
//! # Invariants
//! - Every request carries `Authorization: Bearer <token>`.
//! - Uploads are two-part multipart bodies: `metadata` then `file`, both JSON.

use crate::config::SyncConfig;
use crate::logging::sanitize_message;
use crate::remote::api::{
    Credential, DriveApi, FileList, FileMetadata, FileQuery, RemoteFile, FOLDER_MIME_TYPE,
    NOTE_MIME_TYPE,
};
use crate::remote::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;

const MAX_ERROR_BODY_CHARS: usize = 200;
const FILE_FIELDS: &str = "id, name, mimeType, modifiedTime";
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, modifiedTime)";

pub struct HttpDriveApi {
    client: Client,
    credential: Credential,
    api_base_url: String,
    upload_base_url: String,
}

impl HttpDriveApi {
    pub fn new(credential: Credential, config: &SyncConfig) -> RemoteResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| RemoteError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            credential,
            api_base_url: config.api_base_url.clone(),
            upload_base_url: config.upload_base_url.clone(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.credential.bearer_token())
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|err| RemoteError::Transport(err.to_string()))?;
        check_status(response).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> RemoteResult<T> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|err| RemoteError::Decode(err.to_string()))
    }

    fn upload_form(metadata: &FileMetadata, content: &str) -> RemoteResult<Form> {
        let metadata_json =
            serde_json::to_string(metadata).map_err(|err| RemoteError::Encode(err.to_string()))?;
        let metadata_part = Part::text(metadata_json)
            .mime_str(NOTE_MIME_TYPE)
            .map_err(|err| RemoteError::Encode(err.to_string()))?;
        let file_part = Part::text(content.to_string())
            .file_name(metadata.name.clone())
            .mime_str(NOTE_MIME_TYPE)
            .map_err(|err| RemoteError::Encode(err.to_string()))?;
        Ok(Form::new()
            .part("metadata", metadata_part)
            .part("file", file_part))
    }
}

#[async_trait]
impl DriveApi for HttpDriveApi {
    async fn list_files(&self, query: &FileQuery) -> RemoteResult<FileList> {
        let mut params: Vec<(&str, String)> = vec![
            ("q", query.q.clone()),
            ("spaces", "drive".to_string()),
            (
                "fields",
                query.fields.clone().unwrap_or_else(|| LIST_FIELDS.to_string()),
            ),
        ];
        if let Some(page_size) = query.page_size {
            params.push(("pageSize", page_size.to_string()));
        }
        if let Some(token) = &query.page_token {
            params.push(("pageToken", token.clone()));
        }

        let request = self
            .client
            .get(format!("{}/files", self.api_base_url))
            .query(&params);
        self.send_json(request).await
    }

    async fn create_folder(&self, name: &str) -> RemoteResult<RemoteFile> {
        let request = self
            .client
            .post(format!("{}/files", self.api_base_url))
            .query(&[("fields", FILE_FIELDS)])
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
            }));
        self.send_json(request).await
    }

    async fn create_file(
        &self,
        metadata: &FileMetadata,
        content: &str,
    ) -> RemoteResult<RemoteFile> {
        let form = Self::upload_form(metadata, content)?;
        let request = self
            .client
            .post(format!("{}/files", self.upload_base_url))
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .multipart(form);
        self.send_json(request).await
    }

    async fn update_file(
        &self,
        file_id: &str,
        metadata: &FileMetadata,
        content: &str,
    ) -> RemoteResult<RemoteFile> {
        let form = Self::upload_form(metadata, content)?;
        let request = self
            .client
            .patch(format!("{}/files/{file_id}", self.upload_base_url))
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .multipart(form);
        self.send_json(request).await
    }

    async fn download_file(&self, file_id: &str) -> RemoteResult<String> {
        let request = self
            .client
            .get(format!("{}/files/{file_id}", self.api_base_url))
            .query(&[("alt", "media")]);
        self.send(request)
            .await?
            .text()
            .await
            .map_err(|err| RemoteError::Decode(err.to_string()))
    }

    async fn delete_file(&self, file_id: &str) -> RemoteResult<()> {
        let request = self
            .client
            .delete(format!("{}/files/{file_id}", self.api_base_url));
        self.send(request).await.map(|_| ())
    }
}

async fn check_status(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    // The body is only read for diagnostics; a failed read leaves it empty.
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::from_status(
        status.as_u16(),
        sanitize_message(body.trim(), MAX_ERROR_BODY_CHARS),
    ))
}

#[cfg(test)]
mod tests {
    use super::HttpDriveApi;
    use crate::config::SyncConfig;
    use crate::remote::api::{Credential, FileMetadata};

    #[test]
    fn builds_client_with_configured_timeout() {
        let config = SyncConfig {
            request_timeout: Some(std::time::Duration::from_secs(5)),
            ..SyncConfig::default()
        };
        let api = HttpDriveApi::new(Credential::new("token"), &config).unwrap();
        assert_eq!(api.api_base_url, config.api_base_url);
        assert_eq!(api.upload_base_url, config.upload_base_url);
    }

    #[test]
    fn upload_form_has_two_parts_with_boundary() {
        let metadata = FileMetadata {
            name: "n.json".to_string(),
            mime_type: "application/json".to_string(),
            parents: Some(vec!["folder".to_string()]),
        };
        let form = HttpDriveApi::upload_form(&metadata, "{}").unwrap();
        assert!(!form.boundary().is_empty());
    }
}
