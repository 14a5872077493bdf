//! Shared local store service used by the sync engine and clients.

use std::path::Path;
use std::sync::Arc;

use libsql::Connection;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::db::{
    schema, transaction, Database, EntityRepository, LibSqlEntityRepository,
    LibSqlSyncQueueRepository, SyncQueueRepository,
};
use crate::error::{Error, Result};
use crate::models::{
    DeadLetter, EntityId, EntityKey, EntityRecord, MutationAction, MutationId, MutationRecord,
};
use crate::util::unix_millis_now;

const STRANDED_REASON: &str =
    "entity was created remotely before this change synced; reapply it to the authoritative record";

/// Thread-safe handle to the local durable store and its sync queue.
///
/// Clones share the same connection.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
}

impl LocalStore {
    /// Open the store at the given filesystem path.
    pub async fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::open(path).await?;
        Ok(Self::from_database(db))
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self::from_database(db))
    }

    pub fn from_database(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    // -----------------------------------------------------------------------
    // Entity tables
    // -----------------------------------------------------------------------

    /// Insert a new record; `DuplicateKey` if the id exists.
    pub async fn add(&self, table: &str, record: &EntityRecord) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .add(table, record)
            .await
    }

    /// Insert or overwrite a record.
    pub async fn upsert(&self, table: &str, record: &EntityRecord) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .upsert(table, record)
            .await
    }

    /// Fetch a record by id.
    pub async fn get(&self, table: &str, id: &EntityId) -> Result<Option<EntityRecord>> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .get(table, id)
            .await
    }

    /// Every record in a table, unordered.
    pub async fn get_all(&self, table: &str) -> Result<Vec<EntityRecord>> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .get_all(table)
            .await
    }

    /// Records matching an indexed field.
    pub async fn find_by_index(
        &self,
        table: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<EntityRecord>> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .find_by_index(table, field, value)
            .await
    }

    /// Delete a record by id (idempotent).
    pub async fn remove(&self, table: &str, id: &EntityId) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .remove(table, id)
            .await
    }

    /// Empty every table, queue included. Meant for full resets such as logout.
    pub async fn clear_all(&self) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        transaction(conn, async {
            LibSqlEntityRepository::new(conn).clear_all().await?;
            LibSqlSyncQueueRepository::new(conn).clear().await
        })
        .await?;

        tracing::info!("Cleared local store");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sync queue
    // -----------------------------------------------------------------------

    /// Queue a mutation stamped with the current time.
    pub async fn enqueue(&self, table: &str, action: MutationAction) -> Result<MutationRecord> {
        let mutation = MutationRecord::new(table, action, unix_millis_now());
        self.enqueue_record(&mutation).await?;
        Ok(mutation)
    }

    /// Queue an already-built mutation.
    pub async fn enqueue_record(&self, mutation: &MutationRecord) -> Result<()> {
        let db = self.db.lock().await;
        enqueue_on(db.connection(), mutation).await
    }

    /// All pending mutations; storage order carries no meaning.
    pub async fn list_pending(&self) -> Result<Vec<MutationRecord>> {
        let db = self.db.lock().await;
        LibSqlSyncQueueRepository::new(db.connection()).list().await
    }

    /// Remove a mutation once the remote side applied it.
    pub async fn dequeue(&self, id: &MutationId) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlSyncQueueRepository::new(db.connection())
            .remove(id)
            .await
    }

    /// Mark a mutation as being dispatched.
    ///
    /// Returns the mutation as stored right now, so changes folded in since
    /// the queue was read go out with it. A claimed create no longer absorbs
    /// later local writes. `None` means the mutation left the queue.
    pub async fn claim(&self, id: &MutationId) -> Result<Option<MutationRecord>> {
        let db = self.db.lock().await;
        LibSqlSyncQueueRepository::new(db.connection())
            .claim(id, unix_millis_now())
            .await
    }

    /// Settle a mutation the remote side accepted.
    ///
    /// Dequeues it and, for the creation of a temporary entity, drops the
    /// local temporary snapshot; the authoritative record arrives through
    /// reconciliation. Changes queued against the temporary id while the
    /// create was in flight can no longer reach the backend and are
    /// dead-lettered; returns how many.
    pub async fn acknowledge(&self, mutation: &MutationRecord) -> Result<usize> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let stranded = transaction(conn, async {
            let queue = LibSqlSyncQueueRepository::new(conn);
            queue.remove(&mutation.id).await?;

            let MutationAction::Create(record) = &mutation.action else {
                return Ok(0);
            };
            if !record.id.is_temporary() {
                return Ok(0);
            }

            let follow_ups = queue.list_for_entity(&mutation.table, &record.id).await?;
            let at = unix_millis_now();
            for follow_up in &follow_ups {
                queue
                    .move_to_dead_letter(&follow_up.id, STRANDED_REASON, at)
                    .await?;
            }
            LibSqlEntityRepository::new(conn)
                .remove(&mutation.table, &record.id)
                .await?;
            Ok(follow_ups.len())
        })
        .await?;

        if stranded > 0 {
            tracing::warn!(
                mutation_id = %mutation.id,
                table = %mutation.table,
                stranded,
                "Dead-lettered changes made while the create was in flight"
            );
        }
        Ok(stranded)
    }

    /// Number of mutations waiting to be synced.
    pub async fn pending_count(&self) -> Result<usize> {
        let db = self.db.lock().await;
        LibSqlSyncQueueRepository::new(db.connection())
            .count()
            .await
    }

    /// Record a failed dispatch and release its claim, returning the new
    /// retry count.
    ///
    /// Changes queued against a temporary entity while its create was in
    /// flight fold back into that create: a later delete cancels it, a later
    /// update becomes its payload. `None` if nothing is left to retry.
    pub async fn record_failure(
        &self,
        mutation: &MutationRecord,
        error: &str,
    ) -> Result<Option<u32>> {
        let db = self.db.lock().await;
        let conn = db.connection();
        transaction(conn, async {
            let queue = LibSqlSyncQueueRepository::new(conn);
            let Some(retries) = queue.record_failure(&mutation.id, error).await? else {
                return Ok(None);
            };

            let MutationAction::Create(record) = &mutation.action else {
                return Ok(Some(retries));
            };
            if !record.id.is_temporary() {
                return Ok(Some(retries));
            }

            let follow_ups: Vec<_> = queue
                .list_for_entity(&mutation.table, &record.id)
                .await?
                .into_iter()
                .filter(|queued| queued.id != mutation.id)
                .collect();

            if follow_ups
                .iter()
                .any(|queued| matches!(queued.action, MutationAction::Delete(_)))
            {
                queue.remove(&mutation.id).await?;
                for queued in &follow_ups {
                    queue.remove(&queued.id).await?;
                }
                tracing::debug!(
                    table = %mutation.table,
                    entity_id = %record.id,
                    "Dropped create deleted while in flight"
                );
                return Ok(None);
            }

            let latest = follow_ups.iter().rev().find_map(|queued| match &queued.action {
                MutationAction::Update(latest) => Some(latest.clone()),
                _ => None,
            });
            if let Some(latest) = latest {
                queue
                    .replace_action(&mutation.id, &MutationAction::Create(latest))
                    .await?;
            }
            for queued in &follow_ups {
                queue.remove(&queued.id).await?;
            }
            Ok(Some(retries))
        })
        .await
    }

    /// Move a mutation out of the queue into the dead-letter table.
    pub async fn dead_letter(&self, id: &MutationId, reason: &str) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlSyncQueueRepository::new(db.connection())
            .dead_letter(id, reason, unix_millis_now())
            .await
    }

    /// Dead-lettered mutations, most recent first.
    pub async fn list_dead_letters(&self) -> Result<Vec<DeadLetter>> {
        let db = self.db.lock().await;
        LibSqlSyncQueueRepository::new(db.connection())
            .list_dead_letters()
            .await
    }

    // -----------------------------------------------------------------------
    // Local writes (snapshot + queued mutation in one transaction)
    // -----------------------------------------------------------------------

    /// Create an entity locally under a temporary id and queue its creation.
    pub async fn create_entity(
        &self,
        table: &str,
        fields: Map<String, Value>,
    ) -> Result<EntityRecord> {
        let record = EntityRecord::with_temporary_id(fields);
        let mutation = MutationRecord::new(
            table,
            MutationAction::Create(record.clone()),
            unix_millis_now(),
        );

        let db = self.db.lock().await;
        let conn = db.connection();
        transaction(conn, async {
            LibSqlEntityRepository::new(conn).add(table, &record).await?;
            enqueue_on(conn, &mutation).await
        })
        .await?;

        tracing::debug!(table, entity_id = %record.id, "Created entity offline");
        Ok(record)
    }

    /// Overwrite an entity locally and queue the update.
    ///
    /// An entity whose creation is still queued and not yet claimed by a
    /// sync pass has the update folded into that pending create, so its
    /// temporary id never reaches the backend. Otherwise the update is
    /// queued on its own.
    pub async fn update_entity(&self, table: &str, record: &EntityRecord) -> Result<()> {
        schema::table(table)?;
        let mutation = MutationRecord::new(
            table,
            MutationAction::Update(record.clone()),
            unix_millis_now(),
        );

        let db = self.db.lock().await;
        let conn = db.connection();
        transaction(conn, async {
            LibSqlEntityRepository::new(conn).upsert(table, record).await?;

            if let Some(pending) = unclaimed_create(conn, table, &record.id).await? {
                return LibSqlSyncQueueRepository::new(conn)
                    .replace_action(&pending.id, &MutationAction::Create(record.clone()))
                    .await;
            }
            enqueue_on(conn, &mutation).await
        })
        .await?;

        tracing::debug!(table, entity_id = %record.id, "Updated entity locally");
        Ok(())
    }

    /// Delete an entity locally and queue the delete.
    ///
    /// Deleting an entity whose creation is queued and not yet claimed drops
    /// its queued mutations instead. A claimed create gets the delete queued
    /// behind it.
    pub async fn delete_entity(&self, table: &str, id: &EntityId) -> Result<()> {
        schema::table(table)?;
        let mutation = MutationRecord::new(
            table,
            MutationAction::Delete(EntityKey { id: id.clone() }),
            unix_millis_now(),
        );

        let db = self.db.lock().await;
        let conn = db.connection();
        transaction(conn, async {
            LibSqlEntityRepository::new(conn).remove(table, id).await?;

            if unclaimed_create(conn, table, id).await?.is_some() {
                let queue = LibSqlSyncQueueRepository::new(conn);
                for pending in queue.list_for_entity(table, id).await? {
                    queue.remove(&pending.id).await?;
                }
                return Ok(());
            }
            enqueue_on(conn, &mutation).await
        })
        .await?;

        tracing::debug!(table, entity_id = %id, "Deleted entity locally");
        Ok(())
    }
}

/// Insert a mutation, reporting any failure as `EnqueueFailure`
async fn enqueue_on(conn: &Connection, mutation: &MutationRecord) -> Result<()> {
    let inserted = async {
        schema::table(&mutation.table)?;
        LibSqlSyncQueueRepository::new(conn).insert(mutation).await
    }
    .await;

    inserted.map_err(|source| {
        tracing::error!(
            mutation_id = %mutation.id,
            table = %mutation.table,
            "Failed to enqueue mutation: {source}"
        );
        Error::EnqueueFailure {
            mutation_id: mutation.id.clone(),
            source: Box::new(source),
        }
    })
}

/// Queued create for a temporary entity that no sync pass has claimed
async fn unclaimed_create(
    conn: &Connection,
    table: &str,
    id: &EntityId,
) -> Result<Option<MutationRecord>> {
    if !id.is_temporary() {
        return Ok(None);
    }

    LibSqlSyncQueueRepository::new(conn)
        .unclaimed_create(table, id)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActionKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_entity_writes_snapshot_and_mutation() {
        let store = LocalStore::open_in_memory().await.unwrap();

        let record = store
            .create_entity("agendamentos", fields(json!({"cliente_id": "c1"})))
            .await
            .unwrap();
        assert!(record.id.is_temporary());

        let snapshot = store.get("agendamentos", &record.id).await.unwrap();
        assert_eq!(snapshot, Some(record.clone()));

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].action, MutationAction::Create(record));
        assert_eq!(pending[0].retries, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pending_count_grows_by_one_per_enqueue() {
        let store = LocalStore::open_in_memory().await.unwrap();

        let before = store.pending_count().await.unwrap();
        store
            .enqueue(
                "clientes",
                MutationAction::Delete(EntityKey { id: "c1".into() }),
            )
            .await
            .unwrap();
        let after = store.pending_count().await.unwrap();

        assert_eq!(after - before, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn enqueue_unknown_table_is_an_enqueue_failure() {
        let store = LocalStore::open_in_memory().await.unwrap();

        let error = store
            .enqueue("faturas", MutationAction::Delete(EntityKey { id: "f1".into() }))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            Error::EnqueueFailure { ref source, .. } if matches!(**source, Error::UnknownTable(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_enqueue_rolls_back_local_write() {
        let store = LocalStore::open_in_memory().await.unwrap();
        {
            let db = store.db.lock().await;
            db.connection()
                .execute(
                    "CREATE TRIGGER reject_enqueue BEFORE INSERT ON sync_queue
                     BEGIN SELECT RAISE(ABORT, 'queue rejected'); END",
                    (),
                )
                .await
                .unwrap();
        }

        let record = EntityRecord::from_json(json!({"id": "c1", "nome": "Ana"})).unwrap();
        let error = store.update_entity("clientes", &record).await.unwrap_err();

        assert!(matches!(error, Error::EnqueueFailure { .. }));
        assert_eq!(store.get("clientes", &record.id).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_of_synced_entity_queues_update() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let record = EntityRecord::from_json(json!({"id": "srv-1", "status": "ok"})).unwrap();
        store.upsert("profissionais", &record).await.unwrap();

        store.update_entity("profissionais", &record).await.unwrap();

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind(), ActionKind::Update);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_of_unsynced_entity_folds_into_create() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let mut record = store
            .create_entity("clientes", fields(json!({"nome": "Ana"})))
            .await
            .unwrap();

        record.fields.insert("nome".into(), json!("Ana Maria"));
        store.update_entity("clientes", &record).await.unwrap();

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].action, MutationAction::Create(record.clone()));
        assert_eq!(
            store.get("clientes", &record.id).await.unwrap(),
            Some(record)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_of_unsynced_entity_drops_queued_create() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let record = store
            .create_entity("servicos", fields(json!({"categoria": "corte"})))
            .await
            .unwrap();

        store.delete_entity("servicos", &record.id).await.unwrap();

        assert_eq!(store.pending_count().await.unwrap(), 0);
        assert_eq!(store.get("servicos", &record.id).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_of_synced_entity_queues_delete() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let record = EntityRecord::from_json(json!({"id": "7"})).unwrap();
        store.add("servicos", &record).await.unwrap();

        store.delete_entity("servicos", &record.id).await.unwrap();

        let pending = store.list_pending().await.unwrap();
        assert_eq!(
            pending[0].action,
            MutationAction::Delete(EntityKey { id: "7".into() })
        );
        assert_eq!(store.get("servicos", &record.id).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn acknowledge_create_drops_temporary_snapshot() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let record = store
            .create_entity("agendamentos", fields(json!({"status": "pendente"})))
            .await
            .unwrap();
        let mutation = store.list_pending().await.unwrap().remove(0);

        store.acknowledge(&mutation).await.unwrap();

        assert_eq!(store.pending_count().await.unwrap(), 0);
        assert_eq!(store.get("agendamentos", &record.id).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn acknowledge_update_keeps_snapshot() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let record = EntityRecord::from_json(json!({"id": "a1", "status": "ok"})).unwrap();
        store.upsert("agendamentos", &record).await.unwrap();
        store.update_entity("agendamentos", &record).await.unwrap();
        let mutation = store.list_pending().await.unwrap().remove(0);

        store.acknowledge(&mutation).await.unwrap();

        assert_eq!(store.pending_count().await.unwrap(), 0);
        assert_eq!(store.get("agendamentos", &record.id).await.unwrap(), Some(record));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dequeue_removes_only_that_mutation() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let first = store
            .enqueue("clientes", MutationAction::Delete(EntityKey { id: "c1".into() }))
            .await
            .unwrap();
        let second = store
            .enqueue("clientes", MutationAction::Delete(EntityKey { id: "c2".into() }))
            .await
            .unwrap();

        store.dequeue(&first.id).await.unwrap();
        store.dequeue(&first.id).await.unwrap();

        assert_eq!(store.list_pending().await.unwrap(), vec![second]);
    }

    /// Create an entity and claim its queued create, as a sync pass would.
    async fn claimed_create(store: &LocalStore, table: &str, value: Value) -> MutationRecord {
        store.create_entity(table, fields(value)).await.unwrap();
        let queued = store.list_pending().await.unwrap().remove(0);
        let claimed = store.claim(&queued.id).await.unwrap().unwrap();
        // follow-up ids embed the enqueue millisecond
        tokio::time::sleep(Duration::from_millis(5)).await;
        claimed
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn claim_returns_folded_payload() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let mut record = store
            .create_entity("clientes", fields(json!({"nome": "Ana"})))
            .await
            .unwrap();
        record.fields.insert("nome".into(), json!("Ana Maria"));
        store.update_entity("clientes", &record).await.unwrap();

        let queued = store.list_pending().await.unwrap().remove(0);
        let claimed = store.claim(&queued.id).await.unwrap().unwrap();
        assert_eq!(claimed.action, MutationAction::Create(record));

        store.dequeue(&queued.id).await.unwrap();
        assert_eq!(store.claim(&queued.id).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_after_claim_is_queued_separately() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let create = claimed_create(&store, "clientes", json!({"nome": "Ana"})).await;
        let MutationAction::Create(mut record) = create.action.clone() else {
            panic!("expected create");
        };

        record.fields.insert("nome".into(), json!("Ana Maria"));
        store.update_entity("clientes", &record).await.unwrap();

        let mut pending = store.list_pending().await.unwrap();
        pending.sort_by_key(|queued| queued.timestamp);
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].action, create.action);
        assert_eq!(pending[1].action, MutationAction::Update(record));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_after_claim_is_queued_behind_create() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let create = claimed_create(&store, "servicos", json!({"categoria": "corte"})).await;
        let entity_id = create.entity_id().clone();

        store.delete_entity("servicos", &entity_id).await.unwrap();

        let kinds: Vec<_> = {
            let mut pending = store.list_pending().await.unwrap();
            pending.sort_by_key(|queued| queued.timestamp);
            pending.iter().map(MutationRecord::kind).collect()
        };
        assert_eq!(kinds, vec![ActionKind::Create, ActionKind::Delete]);
        assert_eq!(store.get("servicos", &entity_id).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn acknowledge_dead_letters_changes_made_in_flight() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let create = claimed_create(&store, "clientes", json!({"nome": "Ana"})).await;
        let MutationAction::Create(mut record) = create.action.clone() else {
            panic!("expected create");
        };
        record.fields.insert("nome".into(), json!("Ana Maria"));
        store.update_entity("clientes", &record).await.unwrap();

        let stranded = store.acknowledge(&create).await.unwrap();

        assert_eq!(stranded, 1);
        assert_eq!(store.pending_count().await.unwrap(), 0);
        assert_eq!(store.get("clientes", &record.id).await.unwrap(), None);
        let letters = store.list_dead_letters().await.unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].mutation.action, MutationAction::Update(record));
        assert_eq!(letters[0].reason, STRANDED_REASON);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_create_absorbs_update_made_in_flight() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let create = claimed_create(&store, "clientes", json!({"nome": "Ana"})).await;
        let MutationAction::Create(mut record) = create.action.clone() else {
            panic!("expected create");
        };
        record.fields.insert("nome".into(), json!("Ana Maria"));
        store.update_entity("clientes", &record).await.unwrap();

        let retries = store.record_failure(&create, "HTTP 503").await.unwrap();

        assert_eq!(retries, Some(1));
        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, create.id);
        assert_eq!(pending[0].action, MutationAction::Create(record.clone()));
        assert_eq!(pending[0].last_error.as_deref(), Some("HTTP 503"));

        // released: the next local write folds again
        record.fields.insert("nome".into(), json!("Ana M."));
        store.update_entity("clientes", &record).await.unwrap();
        assert_eq!(store.pending_count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_create_is_cancelled_by_delete_made_in_flight() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let create = claimed_create(&store, "servicos", json!({"categoria": "corte"})).await;
        store
            .delete_entity("servicos", create.entity_id())
            .await
            .unwrap();

        let retries = store.record_failure(&create, "timeout").await.unwrap();

        assert_eq!(retries, None);
        assert_eq!(store.pending_count().await.unwrap(), 0);
        assert!(store.list_dead_letters().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clear_all_empties_tables_and_queue() {
        let store = LocalStore::open_in_memory().await.unwrap();
        store
            .create_entity("clientes", fields(json!({"nome": "Bia"})))
            .await
            .unwrap();

        store.clear_all().await.unwrap();

        assert!(store.get_all("clientes").await.unwrap().is_empty());
        assert_eq!(store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn store_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("agenda.db");

        {
            let store = LocalStore::open_path(&path).await.unwrap();
            store
                .create_entity("clientes", fields(json!({"nome": "Caio"})))
                .await
                .unwrap();
        }

        let store = LocalStore::open_path(&path).await.unwrap();
        assert_eq!(store.pending_count().await.unwrap(), 1);
        assert_eq!(store.get_all("clientes").await.unwrap().len(), 1);
    }
}
