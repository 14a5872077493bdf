//! Data models for the local store and sync queue

mod entity;
mod mutation;

pub use entity::{EntityId, EntityKey, EntityRecord, TEMP_ID_PREFIX};
pub use mutation::{ActionKind, DeadLetter, MutationAction, MutationId, MutationRecord};
