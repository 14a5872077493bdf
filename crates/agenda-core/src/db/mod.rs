//! Local durable store

mod connection;
mod entity_repository;
pub mod migrations;
mod queue_repository;
pub mod schema;

pub(crate) use connection::transaction;
pub use connection::Database;
pub use entity_repository::{EntityRepository, LibSqlEntityRepository};
pub use queue_repository::{LibSqlSyncQueueRepository, SyncQueueRepository};
