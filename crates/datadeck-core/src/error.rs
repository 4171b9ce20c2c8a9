//! Error types for DataDeck

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using DataDeck's Error
pub type Result<T> = std::result::Result<T, Error>;

/// DataDeck error types
#[derive(Error, Debug)]
pub enum Error {
    /// An active session already occupies the requested (teacher, section)
    /// slot and auto-archive was not requested. Carries the conflicting
    /// session so callers can offer archive-and-replace.
    #[error("An active session '{session_name}' already exists for this section")]
    Conflict {
        session_id: Uuid,
        session_name: String,
    },

    #[error("Invalid input: {0}")]
    Validation(String),

    /// The one-active-session-per-(teacher, section) invariant was violated
    /// at the database layer, or pre-existing corruption was detected.
    /// Distinct from `Conflict` so operators can spot races versus normal
    /// user-facing conflicts.
    #[error("Data integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Not authorized: {0}")]
    Authorization(String),

    /// The requested student count exceeds the unique-name pool for the
    /// chosen theme.
    #[error("Theme '{theme}' has only {available} names but {requested} were requested")]
    GenerationExhausted {
        theme: String,
        available: usize,
        requested: usize,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Whether this error is recoverable by the caller re-submitting with
    /// different choices (as opposed to an internal fault).
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. } | Self::Validation(_) | Self::GenerationExhausted { .. }
        )
    }
}

/// True when `err` is a SQLite UNIQUE violation mentioning `needle`
/// (a column list or index name).
pub(crate) fn is_unique_violation(err: &sqlx::Error, needle: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            let msg = db.message();
            msg.contains("UNIQUE constraint failed") && msg.contains(needle)
        }
        _ => false,
    }
}

/// True when `err` is SQLITE_BUSY or SQLITE_LOCKED surfaced by the driver,
/// meaning another writer held the database past the busy timeout.
pub(crate) fn is_locked(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            let msg = db.message();
            msg.contains("database is locked") || msg.contains("database table is locked")
        }
        _ => false,
    }
}
