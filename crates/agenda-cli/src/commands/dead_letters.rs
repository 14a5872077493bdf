use std::path::Path;

use crate::commands::common::{format_dead_letter_lines, open_store};
use crate::error::CliError;

pub async fn run_dead_letters(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let letters = store.list_dead_letters().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&letters)?);
        return Ok(());
    }

    if letters.is_empty() {
        println!("No dead-lettered mutations.");
        return Ok(());
    }

    for line in format_dead_letter_lines(&letters) {
        println!("{line}");
    }
    Ok(())
}
