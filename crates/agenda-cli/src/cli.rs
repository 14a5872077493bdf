use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "agenda")]
#[command(about = "Offline-first agenda store with a background sync queue")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a record locally and queue it for sync
    #[command(alias = "new")]
    Add {
        /// Table name (agendamentos, clientes, profissionais, servicos)
        table: String,
        /// Record fields as a JSON object
        json: String,
    },
    /// Overwrite a record locally and queue the update
    Update {
        /// Table name
        table: String,
        /// Record as a JSON object, including its "id"
        json: String,
    },
    /// Show one record
    Get {
        /// Table name
        table: String,
        /// Record ID
        id: String,
    },
    /// List records of a table
    List {
        /// Table name
        table: String,
        /// Only records whose indexed field matches, e.g. status=confirmado
        #[arg(long = "where", value_name = "FIELD=VALUE")]
        filter: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a record locally and queue the delete
    Delete {
        /// Table name
        table: String,
        /// Record ID
        id: String,
    },
    /// Show mutations waiting to be synced
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show mutations that gave up after too many failed attempts
    DeadLetters {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Push queued mutations to the backend
    Sync {
        /// Keep running, syncing periodically and when the backend comes back
        #[arg(long)]
        watch: bool,
        /// Seconds between passes in watch mode (defaults to AGENDA_SYNC_INTERVAL_SECS)
        #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },
    /// Erase all local records, queued mutations and dead letters
    Reset {
        /// Skip the confirmation check
        #[arg(long)]
        yes: bool,
    },
}
