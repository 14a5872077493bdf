use std::path::Path;

use crate::commands::common::{normalize_record_id, open_store};
use crate::error::CliError;

pub async fn run_get(table: &str, id: &str, db_path: &Path) -> Result<(), CliError> {
    let id = normalize_record_id(id)?;
    let store = open_store(db_path).await?;

    let Some(record) = store.get(table, &id).await? else {
        return Err(CliError::RecordNotFound {
            table: table.to_string(),
            id: id.to_string(),
        });
    };

    println!("{}", serde_json::to_string_pretty(&record.to_json())?);
    Ok(())
}
