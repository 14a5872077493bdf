//! Queued mutation model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::entity::{EntityId, EntityKey, EntityRecord};
use crate::error::{Error, Result};

/// Identifier of a queued mutation
///
/// Derived from table, entity id and enqueue time, so enqueuing the very same
/// event twice collides instead of producing two queue items.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationId(String);

impl MutationId {
    pub fn derive(table: &str, entity_id: &EntityId, timestamp: i64) -> Self {
        Self(format!("{table}:{entity_id}:{timestamp}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MutationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MutationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Discriminant of [`MutationAction`], as stored in the queue table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

impl ActionKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::InvalidInput(format!("unknown action '{other}'"))),
        }
    }
}

/// What a mutation does, with the data captured at enqueue time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "lowercase")]
pub enum MutationAction {
    Create(EntityRecord),
    Update(EntityRecord),
    Delete(EntityKey),
}

impl MutationAction {
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Create(_) => ActionKind::Create,
            Self::Update(_) => ActionKind::Update,
            Self::Delete(_) => ActionKind::Delete,
        }
    }

    /// Entity the mutation targets
    pub const fn entity_id(&self) -> &EntityId {
        match self {
            Self::Create(record) | Self::Update(record) => &record.id,
            Self::Delete(key) => &key.id,
        }
    }

    /// JSON stored in the queue's payload column
    pub fn payload_json(&self) -> Result<String> {
        let payload = match self {
            Self::Create(record) | Self::Update(record) => serde_json::to_string(record)?,
            Self::Delete(key) => serde_json::to_string(key)?,
        };
        Ok(payload)
    }

    /// Rebuild an action from its stored kind and payload columns
    pub fn from_parts(kind: ActionKind, payload: &str) -> Result<Self> {
        Ok(match kind {
            ActionKind::Create => Self::Create(serde_json::from_str(payload)?),
            ActionKind::Update => Self::Update(serde_json::from_str(payload)?),
            ActionKind::Delete => Self::Delete(serde_json::from_str(payload)?),
        })
    }
}

/// A pending mutation waiting to be applied remotely
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub id: MutationId,
    /// Logical table the mutation targets
    pub table: String,
    #[serde(flatten)]
    pub action: MutationAction,
    /// Enqueue time (Unix ms), used for ordering
    pub timestamp: i64,
    /// Failed dispatch attempts so far
    pub retries: u32,
    /// Most recent dispatch failure, if any
    pub last_error: Option<String>,
}

impl MutationRecord {
    /// Build a fresh queue item enqueued at `timestamp`
    pub fn new(table: impl Into<String>, action: MutationAction, timestamp: i64) -> Self {
        let table = table.into();
        let id = MutationId::derive(&table, action.entity_id(), timestamp);
        Self {
            id,
            table,
            action,
            timestamp,
            retries: 0,
            last_error: None,
        }
    }

    pub const fn entity_id(&self) -> &EntityId {
        self.action.entity_id()
    }

    pub const fn kind(&self) -> ActionKind {
        self.action.kind()
    }
}

/// A mutation removed from the queue after exhausting its retries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub mutation: MutationRecord,
    pub reason: String,
    /// When the mutation was moved out of the queue (Unix ms)
    pub dead_lettered_at: i64,
}
