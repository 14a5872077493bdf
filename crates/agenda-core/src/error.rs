//! Error types for agenda-core

use thiserror::Error;

use crate::models::MutationId;

/// Result type alias using agenda-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in agenda-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// The host has no usable persistent storage; fatal for the session
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A record with the same id already exists in the table
    #[error("Duplicate key in {table}: {id}")]
    DuplicateKey { table: String, id: String },

    /// A local write could not be queued for sync
    #[error("Failed to enqueue mutation {mutation_id}: {source}")]
    EnqueueFailure {
        mutation_id: MutationId,
        #[source]
        source: Box<Error>,
    },

    /// Table is not part of the local schema
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Field has no secondary index on the table
    #[error("No index on {table}.{field}")]
    UnknownIndex { table: String, field: String },

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
