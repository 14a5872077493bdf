//! Database connection management

use crate::error::{Error, Result};
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::fmt::Display;
use std::future::Future;
use std::path::Path;

use super::migrations;

/// Database wrapper for a local libSQL connection
pub struct Database {
    _db: LibSqlDatabase,
    conn: Connection,
}

impl Database {
    /// Open a local database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically. Every failure, including a parent
    /// directory that cannot be created, is reported as
    /// [`Error::StorageUnavailable`].
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|error| {
                unavailable(format!("cannot create {}: {error}", parent.display()))
            })?;
        }

        Self::open_at(&path.to_string_lossy()).await
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        Self::open_at(":memory:").await
    }

    async fn open_at(location: &str) -> Result<Self> {
        let db = Builder::new_local(location)
            .build()
            .await
            .map_err(unavailable)?;
        let conn = db.connect().map_err(unavailable)?;

        let database = Self { _db: db, conn };
        database.configure().await.map_err(into_unavailable)?;
        database.migrate().await.map_err(into_unavailable)?;
        tracing::debug!("Opened local store at {location}");
        Ok(database)
    }

    /// Configure `SQLite` for optimal performance
    async fn configure(&self) -> Result<()> {
        // journal_mode is rejected for in-memory databases
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        Ok(())
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn).await
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Run `work` inside a transaction on `conn`, rolling back if it fails
pub(crate) async fn transaction<T>(
    conn: &Connection,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    conn.execute("BEGIN IMMEDIATE", ()).await?;

    match work.await {
        Ok(value) => {
            if let Err(e) = conn.execute("COMMIT", ()).await {
                conn.execute("ROLLBACK", ()).await.ok();
                return Err(e.into());
            }
            Ok(value)
        }
        Err(error) => {
            conn.execute("ROLLBACK", ()).await.ok();
            Err(error)
        }
    }
}

fn unavailable(error: impl Display) -> Error {
    Error::StorageUnavailable(error.to_string())
}

fn into_unavailable(error: Error) -> Error {
    match error {
        Error::StorageUnavailable(_) => error,
        other => unavailable(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory().await.unwrap();
        let mut rows = db.connection().query("SELECT 1", ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i32>(0).unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_creates_parent_directories() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("agenda.db");

        Database::open(&path).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_reports_unusable_directory() {
        let tmp = tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let result = Database::open(blocker.join("agenda.db")).await;
        assert!(matches!(result, Err(Error::StorageUnavailable(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_reports_corrupt_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("agenda.db");
        std::fs::write(&path, vec![0x5a_u8; 4096]).unwrap();

        let result = Database::open(&path).await;
        assert!(matches!(result, Err(Error::StorageUnavailable(_))));
    }
}
