//! Connection bootstrap for the topic chain store.
//!
//! Every connection handed to a repository has passed through here: foreign
//! keys on, busy timeout set, and the topics / chain-field / revision schema
//! migrated to [`migrations::latest_version`]. Repositories re-check the
//! version in `try_new` and refuse connections that skipped this step.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory, open_db_with_config};

pub type DbResult<T> = Result<T, DbError>;

/// Failure while opening or migrating a topic chain database.
#[derive(Debug)]
pub enum DbError {
    /// SQLite rejected a pragma, a migration statement, or the file itself.
    Sqlite(rusqlite::Error),
    /// The file was written by a build with more migrations than this one.
    /// It is left untouched so the newer build can still open it.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "topic chain schema v{db_version} is ahead of this build (knows up to v{latest_supported})"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
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
