//! Remote note storage.
//!
//! `api` defines the transport seam, `http` implements it over Drive v3,
//! `retry` wraps every call and `adapter` maps notes onto folder documents.

pub mod adapter;
pub mod api;
pub mod error;
pub mod http;
pub mod retry;

pub use adapter::{RemoteNoteStore, SyncReport};
pub use api::{Credential, DriveApi, FileList, FileMetadata, FileQuery, RemoteFile};
pub use error::{RemoteError, RemoteResult};
pub use http::HttpDriveApi;
pub use retry::RetryPolicy;
