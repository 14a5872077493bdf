use std::path::Path;

use crate::commands::common::open_store;
use crate::error::CliError;

pub async fn run_reset(confirmed: bool, db_path: &Path) -> Result<(), CliError> {
    if !confirmed {
        return Err(CliError::ResetNotConfirmed);
    }

    let store = open_store(db_path).await?;
    let discarded = store.pending_count().await?;
    store.clear_all().await?;

    if discarded > 0 {
        tracing::warn!(discarded, "Reset discarded unsynced mutations");
    }
    println!("Local data erased");
    Ok(())
}
