//! Contract with the remote backend.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{EntityKey, EntityRecord};

/// Failure applying one mutation remotely
///
/// The engine treats every variant the same way: the mutation stays queued
/// and is retried on the next pass.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The backend answered and refused the operation
    #[error("Remote rejected request: {message}")]
    Rejected { status: Option<u16>, message: String },
    /// The request never got a usable answer
    #[error("Remote transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl RemoteError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            status: None,
            message: message.into(),
        }
    }

    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// One create/update/delete entry point per logical table
#[async_trait]
pub trait RemoteCollaborator: Send + Sync {
    /// Create an entity; `payload` never carries a temporary id
    async fn create(&self, table: &str, payload: &Map<String, Value>) -> RemoteResult<()>;

    async fn update(&self, table: &str, record: &EntityRecord) -> RemoteResult<()>;

    async fn delete(&self, table: &str, key: &EntityKey) -> RemoteResult<()>;
}
