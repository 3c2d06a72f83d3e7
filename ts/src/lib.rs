//! taskstore: generic persistent record storage over SQLite, with a
//! per-collection JSONL log kept alongside for history and git-friendly
//! diffs.
//!
//! Callers implement [`Record`] for whatever domain type they want to
//! persist, then drive a [`Store`] through `create`/`get`/`update`/`delete`/
//! `list`. Filtering is limited to the fields a `Record` chooses to expose
//! via `indexed_fields`; everything else still round-trips through the
//! stored JSON blob.

pub mod cli;
pub mod config;
mod error;
mod record;
mod store;

pub use config::Config;
pub use error::{Result, StoreError};
pub use record::{Filter, FilterOp, IndexValue, Record, now_ms};
pub use store::Store;
