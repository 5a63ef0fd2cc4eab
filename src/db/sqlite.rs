//! SQLite-backed store
//!
//! Wraps a single `rusqlite::Connection` owned by the loader. There is never
//! more than one write in flight, so no locking is needed.

use crate::db::Storage;
use crate::error::{LoaderError, Result};
use crate::ingestion::literal::quote_identifier;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open or create the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LoaderError::SchemaCreationFailed(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(&path).map_err(|e| {
            LoaderError::SchemaCreationFailed(format!(
                "Failed to open database {}: {}",
                path.display(),
                e
            ))
        })?;

        info!("Opened database {}", path.display());

        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            LoaderError::SchemaCreationFailed(format!("Failed to open in-memory database: {}", e))
        })?;

        Ok(Self { conn, path: None })
    }

    /// Switch the journal to write-ahead logging. Returns the mode SQLite
    /// reports back (in-memory databases stay in `memory` mode).
    pub fn enable_write_ahead_log(&self) -> Result<String> {
        let mode: String = self
            .conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(|e| {
                LoaderError::SchemaCreationFailed(format!("Failed to set journal mode: {}", e))
            })?;

        debug!("journal_mode = {}", mode);
        Ok(mode)
    }

    /// Number of rows currently stored in `table`
    pub fn row_count(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
        let count: i64 = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| LoaderError::StorageWriteFailed(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Storage for SqliteStore {
    fn execute_ddl(&mut self, ddl: &str) -> Result<()> {
        self.conn.execute(ddl, []).map_err(|e| {
            LoaderError::SchemaCreationFailed(format!("Failed to create table: {}", e))
        })?;

        Ok(())
    }

    fn write_batch(&mut self, statement: &str) -> Result<usize> {
        let tx = self.conn.transaction().map_err(|e| {
            LoaderError::StorageWriteFailed(format!("Failed to start transaction: {}", e))
        })?;

        let inserted = tx.execute(statement, []).map_err(|e| {
            LoaderError::StorageWriteFailed(format!("Failed to insert batch: {}", e))
        })?;

        tx.commit().map_err(|e| {
            LoaderError::StorageWriteFailed(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_batch_reports_inserted_rows() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .execute_ddl("CREATE TABLE IF NOT EXISTS \"t\" (\"a\" REAL, \"b\" TEXT)")
            .unwrap();

        let inserted = store
            .write_batch("INSERT INTO \"t\" (\"a\",\"b\") VALUES (1,'x'),(2,'y'),(NULL,NULL)")
            .unwrap();
        assert_eq!(inserted, 3);
        assert_eq!(store.row_count("t").unwrap(), 3);
    }

    #[test]
    fn test_failed_batch_leaves_nothing_behind() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.execute_ddl("CREATE TABLE \"t\" (\"a\" REAL)").unwrap();
        store.write_batch("INSERT INTO \"t\" (\"a\") VALUES (1)").unwrap();

        let err = store
            .write_batch("INSERT INTO \"t\" (\"a\",\"missing\") VALUES (2,3)")
            .unwrap_err();
        assert!(matches!(err, LoaderError::StorageWriteFailed(_)));
        assert_eq!(store.row_count("t").unwrap(), 1);
    }

    #[test]
    fn test_open_creates_parent_dirs_and_enables_wal() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("data.sqlite");

        let store = SqliteStore::open(&db_path).unwrap();
        assert_eq!(store.enable_write_ahead_log().unwrap().to_lowercase(), "wal");
        assert!(db_path.exists());
        assert_eq!(store.path(), Some(db_path.as_path()));
    }
}
