//! Session controller.
//!
//! # Responsibility
//! - Own the in-memory note collection for one signed-in (or signed-out)
//!   session and publish it with readiness, sync and error flags.
//! - Bind the remote adapter lifecycle to credential login/logout.
//! - Route mutations to the adapter when ready, else to the local store.
//!
//! # Invariants
//! - Mutations update the published collection before any I/O.
//! - Only login/logout change the phase; there is no timer-based sync.
//! - A login superseded by a later login/logout never publishes its result.
//! - No std lock is held across an `.await`.

use crate::config::SyncConfig;
use crate::model::note::{upsert_note, Note, NoteId, NoteKind, NoteUpdate, NoteValidationError};
use crate::remote::adapter::RemoteNoteStore;
use crate::remote::api::{Credential, DriveApi};
use crate::remote::error::RemoteResult;
use crate::remote::http::HttpDriveApi;
use crate::repo::local_store::LocalStore;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::watch;

/// User-visible message published when the remote folder cannot be resolved.
pub const INIT_FAILED_MESSAGE: &str = "Failed to initialize Google Drive";

/// Builds a transport for one credential.
pub trait DriveConnector: Send + Sync {
    type Api: DriveApi + 'static;

    fn connect(&self, credential: &Credential) -> RemoteResult<Self::Api>;
}

/// Connector producing Drive v3 HTTP clients.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    config: SyncConfig,
}

impl HttpConnector {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }
}

impl DriveConnector for HttpConnector {
    type Api = HttpDriveApi;

    fn connect(&self, credential: &Credential) -> RemoteResult<HttpDriveApi> {
        HttpDriveApi::new(credential.clone(), &self.config)
    }
}

/// Credential lifecycle of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    SignedOut,
    Initializing,
    Ready,
    Failed { message: String },
}

/// Snapshot published to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub syncing: bool,
    pub notes: Vec<Note>,
}

impl SessionState {
    fn signed_out(notes: Vec<Note>) -> Self {
        Self {
            phase: SessionPhase::SignedOut,
            syncing: false,
            notes,
        }
    }

    pub fn ready(&self) -> bool {
        self.phase == SessionPhase::Ready
    }

    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            SessionPhase::Failed { message } => Some(message),
            _ => None,
        }
    }
}

/// Failure of an id-addressed edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    NoteNotFound(NoteId),
    /// Manual connections are only edited on permanent notes.
    ConnectionsNotAllowed(NoteKind),
    Validation(NoteValidationError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::ConnectionsNotAllowed(kind) => write!(
                f,
                "connections can only be added to permanent notes, not {}",
                kind.as_str()
            ),
            Self::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::NoteNotFound(_) | Self::ConnectionsNotAllowed(_) => None,
        }
    }
}

impl From<NoteValidationError> for SessionError {
    fn from(value: NoteValidationError) -> Self {
        Self::Validation(value)
    }
}

struct ActiveAdapter<A> {
    generation: u64,
    store: Arc<RemoteNoteStore<A>>,
}

pub struct NoteSession<C: DriveConnector> {
    connector: C,
    local: Arc<LocalStore>,
    config: SyncConfig,
    adapter: Mutex<Option<ActiveAdapter<C::Api>>>,
    generation: AtomicU64,
    state: watch::Sender<SessionState>,
}

impl<C: DriveConnector> NoteSession<C> {
    /// Starts signed out with the cached local collection.
    pub fn new(connector: C, local: Arc<LocalStore>, config: SyncConfig) -> Self {
        let notes = local.load_all();
        info!(
            "event=session_open module=session status=ok notes={}",
            notes.len()
        );
        let (state, _) = watch::channel(SessionState::signed_out(notes));
        Self {
            connector,
            local,
            config,
            adapter: Mutex::new(None),
            generation: AtomicU64::new(0),
            state,
        }
    }

    /// Current published snapshot.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn notes(&self) -> Vec<Note> {
        self.state.borrow().notes.clone()
    }

    pub fn find_note(&self, id: &str) -> Option<Note> {
        self.state
            .borrow()
            .notes
            .iter()
            .find(|note| note.id == id)
            .cloned()
    }

    /// Notes of one kind, most recently updated first.
    pub fn notes_of_kind(&self, kind: NoteKind) -> Vec<Note> {
        let mut notes: Vec<Note> = self
            .state
            .borrow()
            .notes
            .iter()
            .filter(|note| note.kind == kind)
            .cloned()
            .collect();
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        notes
    }

    /// Binds a credential: resolves the remote folder, then runs the first sync.
    ///
    /// Returns whether the session reached the ready phase.
    pub async fn login(&self, credential: Credential) -> bool {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let started_at = Instant::now();
        self.adapter_slot().take();
        self.state.send_modify(|state| {
            state.phase = SessionPhase::Initializing;
            state.syncing = false;
        });
        info!("event=session_login module=session status=start generation={generation}");

        let api = match self.connector.connect(&credential) {
            Ok(api) => api,
            Err(err) => {
                error!(
                    "event=session_login module=session status=error stage=connect error={err}"
                );
                self.fail_if_current(generation);
                return false;
            }
        };

        let store = Arc::new(RemoteNoteStore::new(
            api,
            Arc::clone(&self.local),
            &self.config,
        ));
        if !store.initialize().await {
            error!(
                "event=session_login module=session status=error stage=initialize duration_ms={}",
                started_at.elapsed().as_millis()
            );
            self.fail_if_current(generation);
            return false;
        }
        if !self.is_current(generation) {
            warn!("event=session_login module=session status=skip reason=superseded generation={generation}");
            return false;
        }

        *self.adapter_slot() = Some(ActiveAdapter {
            generation,
            store: Arc::clone(&store),
        });
        self.state.send_modify(|state| {
            state.phase = SessionPhase::Ready;
            state.syncing = true;
        });

        let notes = store.sync_notes().await;
        if self.is_current(generation) {
            self.state.send_modify(|state| {
                state.notes = notes;
                state.syncing = false;
            });
        }
        info!(
            "event=session_login module=session status=ok generation={generation} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        true
    }

    /// Drops the credential and falls back to the local collection.
    pub fn logout(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.adapter_slot().take();
        let notes = self.local.load_all();
        info!(
            "event=session_logout module=session status=ok generation={generation} notes={}",
            notes.len()
        );
        self.state.send_replace(SessionState::signed_out(notes));
    }

    /// Publishes `note` immediately, then persists it.
    ///
    /// Returns the persistence outcome: the remote write when ready, else
    /// `true` once cached locally. Invalid notes are rejected untouched.
    pub async fn save_note(&self, note: Note) -> bool {
        if let Err(err) = note.validate() {
            warn!(
                "event=session_save module=session status=error reason=invalid error={err}"
            );
            return false;
        }
        self.state.send_modify(|state| {
            upsert_note(&mut state.notes, note.clone());
        });

        match self.ready_store() {
            Some(store) => store.save_note(&note).await,
            None => {
                self.local.save_one(&note);
                true
            }
        }
    }

    /// Removes the note from the published collection, then persists the delete.
    pub async fn delete_note(&self, id: &str) -> bool {
        self.state.send_modify(|state| {
            state.notes.retain(|note| note.id != id);
        });

        match self.ready_store() {
            Some(store) => store.delete_note(id).await,
            None => {
                self.local.delete_one(id);
                true
            }
        }
    }

    /// Re-reads the collection: a full sync when ready, else the local cache.
    pub async fn refresh_notes(&self) -> Vec<Note> {
        let generation = self.generation.load(Ordering::SeqCst);
        let notes = match self.ready_store() {
            Some(store) => {
                self.state.send_modify(|state| state.syncing = true);
                store.sync_notes().await
            }
            None => self.local.load_all(),
        };

        if self.is_current(generation) {
            let published = notes.clone();
            self.state.send_modify(|state| {
                state.notes = published;
                state.syncing = false;
            });
        }
        info!(
            "event=session_refresh module=session status=ok notes={}",
            notes.len()
        );
        notes
    }

    /// Applies a partial edit to an existing note and saves it.
    pub async fn update_note(&self, id: &str, update: NoteUpdate) -> Result<bool, SessionError> {
        let mut note = self.require_note(id)?;
        note.apply_update(update);
        note.validate()?;
        Ok(self.save_note(note).await)
    }

    pub async fn promote_to_permanent(&self, id: &str) -> Result<bool, SessionError> {
        let mut note = self.require_note(id)?;
        note.promote_to_permanent();
        Ok(self.save_note(note).await)
    }

    /// Adds a manual connection from `source` to `target`.
    ///
    /// Only permanent notes accept manual connections; mention-derived
    /// connections go through the draft instead. An existing connection is
    /// left as is and reported as persisted.
    pub async fn add_connection(&self, source: &str, target: &str) -> Result<bool, SessionError> {
        let mut note = self.require_note(source)?;
        if note.kind != NoteKind::Permanent {
            return Err(SessionError::ConnectionsNotAllowed(note.kind));
        }
        if !note.add_connection(target) {
            return Ok(true);
        }
        note.touch();
        Ok(self.save_note(note).await)
    }

    fn require_note(&self, id: &str) -> Result<Note, SessionError> {
        self.find_note(id)
            .ok_or_else(|| SessionError::NoteNotFound(id.to_string()))
    }

    fn ready_store(&self) -> Option<Arc<RemoteNoteStore<C::Api>>> {
        let generation = self.generation.load(Ordering::SeqCst);
        self.adapter_slot()
            .as_ref()
            .filter(|active| active.generation == generation)
            .map(|active| Arc::clone(&active.store))
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn fail_if_current(&self, generation: u64) {
        if !self.is_current(generation) {
            return;
        }
        self.state.send_modify(|state| {
            state.phase = SessionPhase::Failed {
                message: INIT_FAILED_MESSAGE.to_string(),
            };
            state.syncing = false;
        });
    }

    fn adapter_slot(&self) -> MutexGuard<'_, Option<ActiveAdapter<C::Api>>> {
        self.adapter
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
