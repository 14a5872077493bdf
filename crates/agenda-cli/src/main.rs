//! Agenda CLI - drive the offline store and sync queue from a terminal
//!
//! Writes land locally first; `agenda sync` pushes them to the backend.

mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::filter::Directive;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::resolve_db_path;
use crate::commands::dead_letters::run_dead_letters;
use crate::commands::delete::run_delete;
use crate::commands::get::run_get;
use crate::commands::list::run_list;
use crate::commands::queue::run_queue;
use crate::commands::reset::run_reset;
use crate::commands::sync::run_sync;
use crate::commands::update::run_update;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "agenda=info".parse::<Directive>() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path)?;

    match cli.command {
        Commands::Add { table, json } => run_add(&table, &json, &db_path).await?,
        Commands::Update { table, json } => run_update(&table, &json, &db_path).await?,
        Commands::Get { table, id } => run_get(&table, &id, &db_path).await?,
        Commands::List {
            table,
            filter,
            json,
        } => run_list(&table, filter.as_deref(), json, &db_path).await?,
        Commands::Delete { table, id } => run_delete(&table, &id, &db_path).await?,
        Commands::Queue { json } => run_queue(json, &db_path).await?,
        Commands::DeadLetters { json } => run_dead_letters(json, &db_path).await?,
        Commands::Sync { watch, interval } => run_sync(watch, interval, &db_path).await?,
        Commands::Reset { yes } => run_reset(yes, &db_path).await?,
    }

    Ok(())
}
