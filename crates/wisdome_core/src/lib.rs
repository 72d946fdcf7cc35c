//! Core note sync engine for Wisdome.
//! Local cache, remote folder adapter, reconciliation and session state.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod remote;
pub mod repo;
pub mod service;
pub mod sync;

pub use config::{ConfigError, SyncConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::note::{Note, NoteId, NoteKind, NoteUpdate, NoteValidationError};
pub use remote::{Credential, DriveApi, RemoteError, RemoteNoteStore, RetryPolicy};
pub use repo::local_store::LocalStore;
pub use service::NoteDraft;
pub use sync::{
    DriveConnector, HttpConnector, NoteSession, SessionError, SessionPhase, SessionState,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
