//! Tool-call dispatch error type

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("prefix present with empty path")]
    EmptyPath,

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("no desktop agent connected")]
    NoAgent,

    #[error(transparent)]
    Router(#[from] crate::router::RouterError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] taskstore::StoreError),
}
