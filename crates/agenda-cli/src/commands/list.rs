use std::path::Path;

use agenda_core::EntityRecord;
use serde_json::Value;

use crate::commands::common::{format_record_line, open_store, parse_filter};
use crate::error::CliError;

pub async fn run_list(
    table: &str,
    filter: Option<&str>,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let mut records = if let Some(filter) = filter {
        let (field, value) = parse_filter(filter)?;
        store.find_by_index(table, &field, &value).await?
    } else {
        store.get_all(table).await?
    };
    records.sort_by(|a, b| a.id.cmp(&b.id));

    if as_json {
        let json_items = records
            .iter()
            .map(EntityRecord::to_json)
            .collect::<Vec<Value>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for record in &records {
            println!("{}", format_record_line(record));
        }
    }

    Ok(())
}
