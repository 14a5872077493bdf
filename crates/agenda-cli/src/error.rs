use std::io;

use agenda_core::config::ConfigError;
use agenda_core::sync::HttpSetupError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] agenda_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Remote setup error: {0}")]
    RemoteSetup(#[from] HttpSetupError),
    #[error("Record JSON must be an object, got: {0}")]
    NotAnObject(String),
    #[error("Record JSON must include an \"id\" to update")]
    MissingId,
    #[error("Record ID cannot be empty")]
    EmptyId,
    #[error("Filter must look like field=value, got: {0}")]
    InvalidFilter(String),
    #[error("Record not found in {table}: {id}")]
    RecordNotFound { table: String, id: String },
    #[error("Refusing to erase local data without --yes")]
    ResetNotConfirmed,
    #[error("Could not resolve a data directory; pass --db-path or set AGENDA_DB_PATH")]
    NoDataDir,
}
