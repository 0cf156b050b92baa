use scribe_core::ScribeError;
use thiserror::Error;

/// Errors raised inside the SQLite adapter before they cross into the core.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A previous holder panicked while using the connection.
    #[error("store connection poisoned")]
    Poisoned,
}

impl From<StoreError> for ScribeError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { kind, id } => ScribeError::NotFound { kind, id },
            StoreError::Database(rusqlite::Error::SqliteFailure(err, msg))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                ScribeError::AlreadyExists(msg.unwrap_or_else(|| err.to_string()))
            }
            other => ScribeError::Database(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
