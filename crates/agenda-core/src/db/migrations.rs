//! Database migrations

use crate::error::Result;
use libsql::Connection;

use super::schema::{DEAD_LETTER_TABLE, ENTITY_TABLES, SYNC_QUEUE_TABLE};

/// Current schema version
pub const CURRENT_VERSION: i32 = 4;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        apply(conn, 1, &v1_statements()).await?;
    }
    if version < 2 {
        apply(conn, 2, &v2_statements()).await?;
    }
    if version < 3 {
        apply(conn, 3, &v3_statements()).await?;
    }
    if version < 4 {
        apply(conn, 4, &v4_statements()).await?;
    }

    Ok(())
}

/// Get the current schema version
pub async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Version 1: schema version tracking, entity tables, sync queue
fn v1_statements() -> Vec<String> {
    let mut statements = vec!["CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )"
    .to_string()];

    statements.extend(ENTITY_TABLES.iter().map(|table| {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL
            )",
            table.name
        )
    }));

    statements.push(format!(
        "CREATE TABLE IF NOT EXISTS {SYNC_QUEUE_TABLE} (
            id TEXT PRIMARY KEY,
            table_name TEXT NOT NULL,
            action TEXT NOT NULL CHECK (action IN ('create', 'update', 'delete')),
            payload TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            retries INTEGER NOT NULL DEFAULT 0
        )"
    ));

    statements
}

/// Version 2: secondary indexes for entity lookups and queue ordering
fn v2_statements() -> Vec<String> {
    let mut statements: Vec<String> = ENTITY_TABLES
        .iter()
        .flat_map(|table| {
            table.indexes.iter().map(move |field| {
                format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {}(json_extract(data, '$.{field}'))",
                    table.index_name(field),
                    table.name
                )
            })
        })
        .collect();

    statements.push(format!(
        "CREATE INDEX IF NOT EXISTS idx_sync_queue_timestamp ON {SYNC_QUEUE_TABLE}(timestamp)"
    ));
    statements.push(format!(
        "CREATE INDEX IF NOT EXISTS idx_sync_queue_table ON {SYNC_QUEUE_TABLE}(table_name)"
    ));

    statements
}

/// Version 3: failure details on queued items and the dead-letter table
fn v3_statements() -> Vec<String> {
    vec![
        format!("ALTER TABLE {SYNC_QUEUE_TABLE} ADD COLUMN last_error TEXT"),
        format!(
            "CREATE TABLE IF NOT EXISTS {DEAD_LETTER_TABLE} (
                id TEXT PRIMARY KEY,
                table_name TEXT NOT NULL,
                action TEXT NOT NULL,
                payload TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                retries INTEGER NOT NULL,
                last_error TEXT,
                reason TEXT NOT NULL,
                dead_lettered_at INTEGER NOT NULL
            )"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_sync_dead_letter_at ON {DEAD_LETTER_TABLE}(dead_lettered_at DESC)"
        ),
    ]
}

/// Version 4: mark queue rows a sync pass is dispatching
fn v4_statements() -> Vec<String> {
    vec![format!(
        "ALTER TABLE {SYNC_QUEUE_TABLE} ADD COLUMN claimed_at INTEGER"
    )]
}

/// Run one migration's statements and record its version atomically
async fn apply(conn: &Connection, version: i32, statements: &[String]) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    conn.execute("BEGIN TRANSACTION", ()).await?;

    let record_version = format!("INSERT INTO schema_version (version) VALUES ({version})");
    let all = statements
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(record_version.as_str()));

    for stmt in all {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {version}");
    Ok(())
}
