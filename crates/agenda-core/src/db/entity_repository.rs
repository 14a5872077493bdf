//! Entity table repository

use crate::error::{Error, Result};
use crate::models::{EntityId, EntityRecord};
use libsql::Connection;
use serde_json::Value;

use super::schema::{self, ENTITY_TABLES};

/// Trait for per-table entity storage (async)
#[allow(async_fn_in_trait)]
pub trait EntityRepository {
    /// Insert a new record, failing with `DuplicateKey` if the id exists
    async fn add(&self, table: &str, record: &EntityRecord) -> Result<()>;

    /// Insert or overwrite a record by id
    async fn upsert(&self, table: &str, record: &EntityRecord) -> Result<()>;

    /// Get a record by id
    async fn get(&self, table: &str, id: &EntityId) -> Result<Option<EntityRecord>>;

    /// Every record in the table, in no particular order
    async fn get_all(&self, table: &str) -> Result<Vec<EntityRecord>>;

    /// Records whose indexed `field` equals `value`
    async fn find_by_index(&self, table: &str, field: &str, value: &Value)
        -> Result<Vec<EntityRecord>>;

    /// Delete a record by id; deleting an absent id is not an error
    async fn remove(&self, table: &str, id: &EntityId) -> Result<()>;

    /// Empty every entity table
    async fn clear_all(&self) -> Result<()>;
}

/// libSQL implementation of `EntityRepository`
pub struct LibSqlEntityRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlEntityRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn query_records(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<EntityRecord>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            let data: String = row.get(0)?;
            records.push(serde_json::from_str(&data)?);
        }
        Ok(records)
    }
}

impl EntityRepository for LibSqlEntityRepository<'_> {
    async fn add(&self, table: &str, record: &EntityRecord) -> Result<()> {
        let table = schema::table(table)?;
        let data = serde_json::to_string(record)?;

        let inserted = self
            .conn
            .execute(
                &format!("INSERT OR IGNORE INTO {} (id, data) VALUES (?, ?)", table.name),
                libsql::params![record.id.as_str(), data],
            )
            .await?;

        if inserted == 0 {
            return Err(Error::DuplicateKey {
                table: table.name.to_string(),
                id: record.id.to_string(),
            });
        }
        Ok(())
    }

    async fn upsert(&self, table: &str, record: &EntityRecord) -> Result<()> {
        let table = schema::table(table)?;
        let data = serde_json::to_string(record)?;

        self.conn
            .execute(
                &format!(
                    "INSERT INTO {} (id, data) VALUES (?, ?)
                     ON CONFLICT(id) DO UPDATE SET data = excluded.data",
                    table.name
                ),
                libsql::params![record.id.as_str(), data],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, table: &str, id: &EntityId) -> Result<Option<EntityRecord>> {
        let table = schema::table(table)?;
        let mut records = self
            .query_records(
                &format!("SELECT data FROM {} WHERE id = ?", table.name),
                [id.as_str()],
            )
            .await?;
        Ok(records.pop())
    }

    async fn get_all(&self, table: &str) -> Result<Vec<EntityRecord>> {
        let table = schema::table(table)?;
        self.query_records(&format!("SELECT data FROM {}", table.name), ())
            .await
    }

    async fn find_by_index(
        &self,
        table: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<EntityRecord>> {
        let table = schema::indexed_field(table, field)?;
        let value = index_value(value)?;

        self.query_records(
            &format!(
                "SELECT data FROM {} WHERE json_extract(data, '$.{field}') = ?",
                table.name
            ),
            [value],
        )
        .await
    }

    async fn remove(&self, table: &str, id: &EntityId) -> Result<()> {
        let table = schema::table(table)?;
        self.conn
            .execute(
                &format!("DELETE FROM {} WHERE id = ?", table.name),
                [id.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        for table in ENTITY_TABLES {
            self.conn
                .execute(&format!("DELETE FROM {}", table.name), ())
                .await?;
        }
        Ok(())
    }
}

/// Convert a JSON scalar into the value `json_extract` yields for it
fn index_value(value: &Value) -> Result<libsql::Value> {
    match value {
        Value::String(text) => Ok(libsql::Value::Text(text.clone())),
        Value::Bool(flag) => Ok(libsql::Value::Integer(i64::from(*flag))),
        Value::Number(number) => number
            .as_i64()
            .map(libsql::Value::Integer)
            .or_else(|| number.as_f64().map(libsql::Value::Real))
            .ok_or_else(|| Error::InvalidInput(format!("unsupported index value {number}"))),
        Value::Null | Value::Array(_) | Value::Object(_) => Err(Error::InvalidInput(
            "index lookups take a string, number or boolean".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn record(value: Value) -> EntityRecord {
        EntityRecord::from_json(value).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_add_and_get() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        let cliente = record(json!({"id": "c1", "nome": "Ana", "email": "ana@example.com"}));
        repo.add("clientes", &cliente).await.unwrap();

        let fetched = repo.get("clientes", &"c1".into()).await.unwrap();
        assert_eq!(fetched, Some(cliente));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_add_rejects_duplicate_id() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        let cliente = record(json!({"id": "c1"}));
        repo.add("clientes", &cliente).await.unwrap();

        let error = repo.add("clientes", &cliente).await.unwrap_err();
        assert!(matches!(error, Error::DuplicateKey { ref id, .. } if id == "c1"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_same_id_in_different_tables() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        repo.add("clientes", &record(json!({"id": "1"}))).await.unwrap();
        repo.add("servicos", &record(json!({"id": "1"}))).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_overwrites() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        repo.upsert("servicos", &record(json!({"id": "s1", "preco": 50})))
            .await
            .unwrap();
        repo.upsert("servicos", &record(json!({"id": "s1", "preco": 70})))
            .await
            .unwrap();

        let all = repo.get_all("servicos").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].field("preco"), Some(&json!(70)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_missing_returns_none() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        assert_eq!(repo.get("clientes", &"nope".into()).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remove_is_idempotent() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        repo.add("clientes", &record(json!({"id": "c1"}))).await.unwrap();
        repo.remove("clientes", &"c1".into()).await.unwrap();
        repo.remove("clientes", &"c1".into()).await.unwrap();

        assert!(repo.get_all("clientes").await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_find_by_index() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        repo.add(
            "agendamentos",
            &record(json!({"id": "a1", "cliente_id": "c1", "status": "confirmado"})),
        )
        .await
        .unwrap();
        repo.add(
            "agendamentos",
            &record(json!({"id": "a2", "cliente_id": "c1", "status": "pendente"})),
        )
        .await
        .unwrap();
        repo.add(
            "agendamentos",
            &record(json!({"id": "a3", "cliente_id": "c2", "status": "pendente"})),
        )
        .await
        .unwrap();

        let by_client = repo
            .find_by_index("agendamentos", "cliente_id", &json!("c1"))
            .await
            .unwrap();
        assert_eq!(by_client.len(), 2);

        let pending = repo
            .find_by_index("agendamentos", "status", &json!("pendente"))
            .await
            .unwrap();
        let mut ids: Vec<_> = pending.iter().map(|r| r.id.to_string()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a2", "a3"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_find_by_unindexed_field_fails() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        let error = repo
            .find_by_index("agendamentos", "observacoes", &json!("x"))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::UnknownIndex { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unknown_table_is_rejected() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        let error = repo.get_all("sync_queue").await.unwrap_err();
        assert!(matches!(error, Error::UnknownTable(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_clear_all() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        repo.add("clientes", &record(json!({"id": "c1"}))).await.unwrap();
        repo.add("servicos", &record(json!({"id": "s1"}))).await.unwrap();
        repo.clear_all().await.unwrap();

        assert!(repo.get_all("clientes").await.unwrap().is_empty());
        assert!(repo.get_all("servicos").await.unwrap().is_empty());
    }

    #[test]
    fn index_value_maps_json_scalars() {
        assert!(matches!(index_value(&json!("x")), Ok(libsql::Value::Text(ref t)) if t == "x"));
        assert!(matches!(index_value(&json!(true)), Ok(libsql::Value::Integer(1))));
        assert!(matches!(index_value(&json!(3)), Ok(libsql::Value::Integer(3))));
        assert!(index_value(&json!(null)).is_err());
        assert!(index_value(&json!([1])).is_err());
    }
}
