//! Error types for SQLite operations.

use thiserror::Error;

/// Errors surfaced by the data-access layer.
///
/// Engine-level failures are carried unmodified; nothing here retries or
/// translates what SQLite reports.
#[derive(Debug, Error)]
pub enum DbError {
    /// The connection string is empty or whitespace-only. Raised at
    /// configuration time, before any I/O.
    #[error("connection string cannot be empty")]
    InvalidConfiguration,

    /// The engine could not open a connection.
    #[error("failed to open database connection: {0}")]
    Connection(#[source] rusqlite::Error),

    /// The engine rejected or failed to run a statement.
    #[error("statement execution failed: {0}")]
    Execution(#[source] rusqlite::Error),

    /// A result cell could not be decoded into the requested type.
    #[error("cannot decode {found} value as {requested}")]
    TypeMismatch {
        requested: &'static str,
        found: &'static str,
    },

    /// A table name was rejected by the identifier allow-list.
    #[error("invalid table identifier: {0:?}")]
    InvalidIdentifier(String),

    /// The blocking task running the statement failed to complete.
    #[error("blocking task failed: {0}")]
    Runtime(String),
}

// Errors raised after a connection is open are execution failures;
// open failures are mapped to `Connection` explicitly at the open site.
impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        DbError::Execution(err)
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
