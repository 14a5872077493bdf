use std::path::Path;

use crate::commands::common::{normalize_record_id, open_store};
use crate::error::CliError;

pub async fn run_delete(table: &str, id: &str, db_path: &Path) -> Result<(), CliError> {
    let id = normalize_record_id(id)?;
    let store = open_store(db_path).await?;

    if store.get(table, &id).await?.is_none() {
        return Err(CliError::RecordNotFound {
            table: table.to_string(),
            id: id.to_string(),
        });
    }
    store.delete_entity(table, &id).await?;

    println!("{id}");
    Ok(())
}
