//! Store error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("record not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("lock poisoned while accessing store")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;
