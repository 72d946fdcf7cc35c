//! Reconciliation and session orchestration.
//!
//! `plan` decides what a sync pass pulls and pushes; `session` owns the
//! published collection and the credential lifecycle.

pub mod plan;
pub mod session;

pub use plan::{plan_sync, remote_is_newer, RemoteIndex, SyncPlan};
pub use session::{
    DriveConnector, HttpConnector, NoteSession, SessionError, SessionPhase, SessionState,
    INIT_FAILED_MESSAGE,
};
