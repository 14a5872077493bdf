use std::path::Path;

use crate::commands::common::{open_store, parse_record};
use crate::error::CliError;

pub async fn run_update(table: &str, json: &str, db_path: &Path) -> Result<(), CliError> {
    let record = parse_record(json)?;

    let store = open_store(db_path).await?;
    if store.get(table, &record.id).await?.is_none() {
        return Err(CliError::RecordNotFound {
            table: table.to_string(),
            id: record.id.to_string(),
        });
    }
    store.update_entity(table, &record).await?;

    println!("{}", record.id);
    Ok(())
}
