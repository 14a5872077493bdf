use std::path::Path;

use crate::commands::common::{format_mutation_lines, open_store, queue_report};
use crate::error::CliError;

pub async fn run_queue(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let report = queue_report(store.list_pending().await?);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.pending == 0 {
        println!("Nothing waiting to sync.");
        return Ok(());
    }

    for line in format_mutation_lines(&report.mutations) {
        println!("{line}");
    }
    println!("{} pending", report.pending);
    Ok(())
}
