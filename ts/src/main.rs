use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use taskstore::Store;
use taskstore::cli::{Cli, Command};
use taskstore::config::Config;

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("taskstore starting");

    match cli.command {
        Command::Collections => {
            let store = Store::open(&config.store_path)?;
            for name in store.collections()? {
                println!("{name}");
            }
        }
        Command::Dump { collection } => {
            let store = Store::open(&config.store_path)?;
            for record in store.list_raw(&collection)? {
                println!("{}", serde_json::to_string(&record)?);
            }
        }
        Command::Count { collection } => {
            let store = Store::open(&config.store_path)?;
            let count = store.count_raw(&collection)?;
            println!("{}: {}", collection.cyan(), count);
        }
        Command::Reindex { collection } => {
            let mut store = Store::open(&config.store_path)?;
            let count = store.rebuild_raw(&collection)?;
            println!("{} Reindexed {} records in {}", "✓".green(), count, collection.cyan());
        }
        Command::Sync => {
            let mut store = Store::open(&config.store_path)?;
            store.sync()?;
            println!("{} Synced", "✓".green());
        }
    }

    Ok(())
}
