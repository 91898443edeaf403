use std::time::Duration;

use rusqlite::{ErrorCode, ffi};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// Duplicate follower edge, or a post update against a stale version
    #[error("resource conflict")]
    Conflict,

    #[error("email already registered")]
    DuplicateEmail,

    #[error("username already taken")]
    DuplicateUsername,

    #[error("query exceeded {0:?}")]
    Timeout(Duration),

    #[error("connection pool: {0}")]
    Pool(#[from] deadpool::managed::PoolError<rusqlite::Error>),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("column encoding: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// If `err` is a UNIQUE/PRIMARY KEY violation, the SQLite detail message,
/// e.g. `UNIQUE constraint failed: users.email`.
pub(crate) fn unique_violation(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(e, msg)
            if e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY) =>
        {
            Some(msg.as_deref().unwrap_or_default())
        }
        _ => None,
    }
}

pub(crate) fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}
