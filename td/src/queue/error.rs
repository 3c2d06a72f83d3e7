//! Job queue error type

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("job {0} cannot do this from status {1}")]
    InvalidTransition(String, String),

    #[error("dependency from {0} to {1} would create a cycle")]
    Cycle(String, String),

    #[error(transparent)]
    Store(#[from] taskstore::StoreError),
}
