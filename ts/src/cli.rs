//! CLI argument parsing for taskstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "taskstore")]
#[command(author, version, about = "Generic persistent record store", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List known collections
    Collections,

    /// Dump every record in a collection as JSON
    Dump {
        /// Collection name
        #[arg(required = true)]
        collection: String,
    },

    /// Count records in a collection
    Count {
        /// Collection name
        #[arg(required = true)]
        collection: String,
    },

    /// Rebuild the SQLite index for a collection from its JSONL log
    Reindex {
        /// Collection name
        #[arg(required = true)]
        collection: String,
    },

    /// Checkpoint the WAL so store.db reflects every committed write
    Sync,
}
