use std::path::Path;

use crate::commands::common::{open_store, parse_object};
use crate::error::CliError;

pub async fn run_add(table: &str, json: &str, db_path: &Path) -> Result<(), CliError> {
    let fields = parse_object(json)?;

    let store = open_store(db_path).await?;
    let record = store.create_entity(table, fields).await?;

    println!("{}", record.id);
    Ok(())
}
