//! Device key-value database.
//!
//! # Responsibility
//! - Locate the durable on-device database file (`default_db_path`).
//! - Open SQLite connections holding the `kv_store` table that backs the
//!   local note cache, with migrations applied.
//!
//! # Invariants
//! - The default location is a per-user data directory, never a temp dir.
//! - `PRAGMA user_version` mirrors the last applied migration.
//! - No key is read or written on a connection before migrations succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

/// Directory created under the platform data directory.
pub const DATA_DIR_NAME: &str = "wisdome";
/// File name of the key-value database.
pub const DB_FILE_NAME: &str = "wisdome_notes.sqlite3";

pub type DbResult<T> = Result<T, DbError>;

/// Failure to open or migrate the key-value database.
#[derive(Debug)]
pub enum DbError {
    /// The directory holding the database file could not be created.
    StorageDir {
        path: PathBuf,
        source: std::io::Error,
    },
    Sqlite(rusqlite::Error),
    /// The file was written by a newer build with unknown migrations.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StorageDir { path, source } => {
                write!(f, "cannot create storage directory {}: {source}", path.display())
            }
            Self::Sqlite(err) => write!(f, "key-value store: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "local store schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StorageDir { source, .. } => Some(source),
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Default database location: `<data_local_dir>/wisdome/wisdome_notes.sqlite3`.
///
/// Falls back to the working directory on platforms without a data directory.
pub fn default_db_path() -> PathBuf {
    match dirs::data_local_dir() {
        Some(base) => base.join(DATA_DIR_NAME).join(DB_FILE_NAME),
        None => PathBuf::from(DB_FILE_NAME),
    }
}
