//! agenda-core - Offline mutation queue and sync engine for Agenda
//!
//! Local writes land in a libSQL store together with a queued mutation. The
//! [`sync::SyncEngine`] drains that queue against a remote collaborator when
//! the host is online, one mutation at a time, retrying failures on later
//! passes.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{EntityId, EntityKey, EntityRecord, MutationAction, MutationId, MutationRecord};
pub use services::LocalStore;
pub use state::EngineState;
