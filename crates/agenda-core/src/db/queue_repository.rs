//! Sync queue repository

use crate::error::{Error, Result};
use crate::models::{DeadLetter, EntityId, MutationAction, MutationId, MutationRecord};
use libsql::{Connection, Row};

use super::connection::transaction;
use super::schema::{DEAD_LETTER_TABLE, SYNC_QUEUE_TABLE};

const QUEUE_COLUMNS: &str = "id, table_name, action, payload, timestamp, retries, last_error";

/// Trait for pending-mutation storage (async)
#[allow(async_fn_in_trait)]
pub trait SyncQueueRepository {
    /// Insert a mutation, failing with `DuplicateKey` if its id is queued already
    async fn insert(&self, mutation: &MutationRecord) -> Result<()>;

    /// All queued mutations; callers sort before processing
    async fn list(&self) -> Result<Vec<MutationRecord>>;

    /// Queued mutations targeting one entity
    async fn list_for_entity(&self, table: &str, entity_id: &EntityId)
        -> Result<Vec<MutationRecord>>;

    /// Queued create for an entity that no sync pass is dispatching
    async fn unclaimed_create(
        &self,
        table: &str,
        entity_id: &EntityId,
    ) -> Result<Option<MutationRecord>>;

    /// Mark a mutation as being dispatched and return it as currently stored
    ///
    /// `None` when the mutation left the queue in the meantime.
    async fn claim(&self, id: &MutationId, at: i64) -> Result<Option<MutationRecord>>;

    /// Overwrite the action payload of a queued mutation of the same kind
    async fn replace_action(&self, id: &MutationId, action: &MutationAction) -> Result<()>;

    /// Remove a mutation; removing an absent id is not an error
    async fn remove(&self, id: &MutationId) -> Result<()>;

    /// Number of queued mutations
    async fn count(&self) -> Result<usize>;

    /// Bump the retry counter, store the failure and release the claim;
    /// `None` if the id is gone
    async fn record_failure(&self, id: &MutationId, error: &str) -> Result<Option<u32>>;

    /// Move a mutation to the dead-letter table
    async fn dead_letter(&self, id: &MutationId, reason: &str, at: i64) -> Result<()>;

    /// Dead-lettered mutations, most recent first
    async fn list_dead_letters(&self) -> Result<Vec<DeadLetter>>;

    /// Empty the queue and the dead-letter table
    async fn clear(&self) -> Result<()>;
}

/// libSQL implementation of `SyncQueueRepository`
pub struct LibSqlSyncQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSyncQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn query_mutations(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<MutationRecord>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut mutations = Vec::new();
        while let Some(row) = rows.next().await? {
            mutations.push(Self::parse_mutation(&row)?);
        }
        Ok(mutations)
    }

    /// Parse a mutation from the leading `QUEUE_COLUMNS` of a row
    fn parse_mutation(row: &Row) -> Result<MutationRecord> {
        let id: String = row.get(0)?;
        let action: String = row.get(2)?;
        let payload: String = row.get(3)?;
        let retries: i64 = row.get(5)?;

        Ok(MutationRecord {
            id: id.into(),
            table: row.get(1)?,
            action: MutationAction::from_parts(action.parse()?, &payload)?,
            timestamp: row.get(4)?,
            retries: u32::try_from(retries).unwrap_or(u32::MAX),
            last_error: optional_text(row, 6)?,
        })
    }

    /// Copy a mutation into the dead-letter table and drop it from the queue.
    ///
    /// Runs in the caller's transaction.
    pub(crate) async fn move_to_dead_letter(
        &self,
        id: &MutationId,
        reason: &str,
        at: i64,
    ) -> Result<()> {
        let moved = self
            .conn
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO {DEAD_LETTER_TABLE}
                     ({QUEUE_COLUMNS}, reason, dead_lettered_at)
                     SELECT {QUEUE_COLUMNS}, ?, ? FROM {SYNC_QUEUE_TABLE} WHERE id = ?"
                ),
                libsql::params![reason, at, id.as_str()],
            )
            .await?;

        if moved == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        self.remove(id).await
    }
}

impl SyncQueueRepository for LibSqlSyncQueueRepository<'_> {
    async fn insert(&self, mutation: &MutationRecord) -> Result<()> {
        let payload = mutation.action.payload_json()?;

        let inserted = self
            .conn
            .execute(
                &format!(
                    "INSERT OR IGNORE INTO {SYNC_QUEUE_TABLE}
                     (id, table_name, action, payload, timestamp, retries, last_error)
                     VALUES (?, ?, ?, ?, ?, ?, ?)"
                ),
                libsql::params![
                    mutation.id.as_str(),
                    mutation.table.as_str(),
                    mutation.kind().as_str(),
                    payload,
                    mutation.timestamp,
                    i64::from(mutation.retries),
                    mutation.last_error.clone(),
                ],
            )
            .await?;

        if inserted == 0 {
            return Err(Error::DuplicateKey {
                table: SYNC_QUEUE_TABLE.to_string(),
                id: mutation.id.to_string(),
            });
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<MutationRecord>> {
        self.query_mutations(&format!("SELECT {QUEUE_COLUMNS} FROM {SYNC_QUEUE_TABLE}"), ())
            .await
    }

    async fn list_for_entity(
        &self,
        table: &str,
        entity_id: &EntityId,
    ) -> Result<Vec<MutationRecord>> {
        self.query_mutations(
            &format!(
                "SELECT {QUEUE_COLUMNS} FROM {SYNC_QUEUE_TABLE}
                 WHERE table_name = ? AND json_extract(payload, '$.id') = ?
                 ORDER BY timestamp, id"
            ),
            [table, entity_id.as_str()],
        )
        .await
    }

    async fn unclaimed_create(
        &self,
        table: &str,
        entity_id: &EntityId,
    ) -> Result<Option<MutationRecord>> {
        let mut found = self
            .query_mutations(
                &format!(
                    "SELECT {QUEUE_COLUMNS} FROM {SYNC_QUEUE_TABLE}
                     WHERE table_name = ? AND json_extract(payload, '$.id') = ?
                       AND action = 'create' AND claimed_at IS NULL
                     ORDER BY timestamp, id LIMIT 1"
                ),
                [table, entity_id.as_str()],
            )
            .await?;
        Ok(found.pop())
    }

    async fn claim(&self, id: &MutationId, at: i64) -> Result<Option<MutationRecord>> {
        let mut claimed = self
            .query_mutations(
                &format!(
                    "UPDATE {SYNC_QUEUE_TABLE} SET claimed_at = ?
                     WHERE id = ? RETURNING {QUEUE_COLUMNS}"
                ),
                libsql::params![at, id.as_str()],
            )
            .await?;
        Ok(claimed.pop())
    }

    async fn replace_action(&self, id: &MutationId, action: &MutationAction) -> Result<()> {
        let updated = self
            .conn
            .execute(
                &format!("UPDATE {SYNC_QUEUE_TABLE} SET payload = ? WHERE id = ? AND action = ?"),
                libsql::params![action.payload_json()?, id.as_str(), action.kind().as_str()],
            )
            .await?;

        if updated == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn remove(&self, id: &MutationId) -> Result<()> {
        self.conn
            .execute(
                &format!("DELETE FROM {SYNC_QUEUE_TABLE} WHERE id = ?"),
                [id.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query(&format!("SELECT COUNT(*) FROM {SYNC_QUEUE_TABLE}"), ())
            .await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn record_failure(&self, id: &MutationId, error: &str) -> Result<Option<u32>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "UPDATE {SYNC_QUEUE_TABLE}
                     SET retries = retries + 1, last_error = ?, claimed_at = NULL
                     WHERE id = ? RETURNING retries"
                ),
                [error, id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let retries: i64 = row.get(0)?;
                Ok(Some(u32::try_from(retries).unwrap_or(u32::MAX)))
            }
            None => Ok(None),
        }
    }

    async fn dead_letter(&self, id: &MutationId, reason: &str, at: i64) -> Result<()> {
        transaction(self.conn, self.move_to_dead_letter(id, reason, at)).await
    }

    async fn list_dead_letters(&self) -> Result<Vec<DeadLetter>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {QUEUE_COLUMNS}, reason, dead_lettered_at FROM {DEAD_LETTER_TABLE}
                     ORDER BY dead_lettered_at DESC"
                ),
                (),
            )
            .await?;

        let mut letters = Vec::new();
        while let Some(row) = rows.next().await? {
            letters.push(DeadLetter {
                mutation: Self::parse_mutation(&row)?,
                reason: row.get(7)?,
                dead_lettered_at: row.get(8)?,
            });
        }
        Ok(letters)
    }

    async fn clear(&self) -> Result<()> {
        self.conn
            .execute(&format!("DELETE FROM {SYNC_QUEUE_TABLE}"), ())
            .await?;
        self.conn
            .execute(&format!("DELETE FROM {DEAD_LETTER_TABLE}"), ())
            .await?;
        Ok(())
    }
}

fn optional_text(row: &Row, index: i32) -> Result<Option<String>> {
    match row.get_value(index)? {
        libsql::Value::Text(text) => Ok(Some(text)),
        _ => Ok(None),
    }
}
