//! Entity record model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Prefix marking ids generated locally for entities the backend has not seen yet
pub const TEMP_ID_PREFIX: &str = "offline_";

/// Identifier of an entity within its table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a temporary id for an entity created locally
    #[must_use]
    pub fn temporary() -> Self {
        Self(format!("{TEMP_ID_PREFIX}{}", Uuid::now_v7().simple()))
    }

    /// Whether this id was generated locally and is unknown to the backend
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_ID_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifying key sent for deletes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityKey {
    pub id: EntityId,
}

/// A table-scoped document snapshot
///
/// Serialized as a flat JSON object: `{ "id": ..., ...fields }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl EntityRecord {
    /// Create a record; an `id` key inside `fields` is dropped in favor of `id`
    pub fn new(id: impl Into<EntityId>, mut fields: Map<String, Value>) -> Self {
        fields.remove("id");
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Create a record with a fresh temporary id
    pub fn with_temporary_id(fields: Map<String, Value>) -> Self {
        Self::new(EntityId::temporary(), fields)
    }

    /// Parse a JSON object carrying a string or numeric `id`
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            return Err(Error::InvalidInput("entity must be a JSON object".into()));
        };

        let id = match fields.remove("id") {
            Some(Value::String(id)) if !id.trim().is_empty() => id,
            Some(Value::Number(id)) => id.to_string(),
            Some(_) => {
                return Err(Error::InvalidInput(
                    "entity id must be a non-empty string or number".into(),
                ))
            }
            None => return Err(Error::InvalidInput("entity is missing an id".into())),
        };

        Ok(Self::new(id, fields))
    }

    /// Flat JSON form including the id
    pub fn to_json(&self) -> Value {
        let mut object = Map::with_capacity(self.fields.len() + 1);
        object.insert("id".to_string(), Value::String(self.id.to_string()));
        object.extend(self.fields.clone());
        Value::Object(object)
    }

    pub fn key(&self) -> EntityKey {
        EntityKey {
            id: self.id.clone(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Payload to send when creating this entity remotely
    ///
    /// Temporary ids are left out so the backend assigns the real one.
    pub fn remote_payload(&self) -> Map<String, Value> {
        match self.to_json() {
            Value::Object(mut object) => {
                if self.id.is_temporary() {
                    object.remove("id");
                }
                object
            }
            _ => Map::new(),
        }
    }
}
