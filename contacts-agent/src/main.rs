//! Contacts agent
//!
//! Hosts the contact sync core in a standalone process:
//! 1. Loads provider stores from a fixture file
//! 2. Reads `{"owner": "..."}` trigger lines from stdin and syncs each store
//!    into the aggregated index, persisting index and checkpoints in SQLite
//!
//! Usage:
//!   contacts-agent run --fixtures stores.json --checkpoints state.db --index index.db
//!   contacts-agent resolve --fixtures stores.json --entry '{"id":"x","entryData":[...]}'

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use contacts_agent::{build_registry, load_config, open_host, run_triggers, Fixtures, StatePaths};
use contacts_sync::memory::FillMissingMerger;
use contacts_sync::ContactResolver;
use tokio::io::BufReader;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "contacts-agent")]
#[command(about = "Syncs contact provider stores into the aggregated index")]
struct Args {
    /// JSON file with sync configuration overrides
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run sync sessions for triggers read from stdin
    Run {
        /// Fixture file describing the provider stores
        #[arg(short, long)]
        fixtures: PathBuf,

        /// Path to the checkpoint database
        #[arg(long, default_value = "checkpoints.db")]
        checkpoints: PathBuf,

        /// Path to the aggregated index database
        #[arg(long, default_value = "index.db")]
        index: PathBuf,

        /// Drop all checkpoints first and resync every store
        #[arg(long)]
        resync: bool,

        /// Exit after the first committed session
        #[arg(long)]
        exit_on_commit: bool,
    },
    /// Resolve one aggregate entry and print the merged contact
    Resolve {
        /// Fixture file describing the provider stores
        #[arg(short, long)]
        fixtures: PathBuf,

        /// Aggregate entry as JSON
        #[arg(short, long)]
        entry: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Run {
            fixtures,
            checkpoints,
            index,
            resync,
            exit_on_commit,
        } => {
            let fixtures = Fixtures::load(&fixtures)?;
            let registry = Arc::new(build_registry(&fixtures, &config)?);
            let paths = StatePaths { checkpoints, index };
            let host = open_host(registry, config, &paths, resync).await?;

            info!("Contacts agent waiting for triggers on stdin");
            let summary = run_triggers(&host, BufReader::new(tokio::io::stdin()), exit_on_commit)
                .await?;
            info!(
                "Done: {} committed, {} failed, {} malformed",
                summary.committed, summary.failed, summary.malformed
            );
        }
        Command::Resolve { fixtures, entry } => {
            let fixtures = Fixtures::load(&fixtures)?;
            let registry = Arc::new(build_registry(&fixtures, &config)?);
            let resolver = ContactResolver::new(
                registry,
                Arc::new(FillMissingMerger),
                config.primary_owner.clone(),
            );

            let entry: serde_json::Value =
                serde_json::from_str(&entry).context("Entry is not valid JSON")?;
            let merged = resolver.get_data(&entry).await?;
            println!("{}", serde_json::to_string_pretty(&merged)?);
        }
    }

    Ok(())
}
