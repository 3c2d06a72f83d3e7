//! Worker pool error type

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] taskstore::StoreError),
}
