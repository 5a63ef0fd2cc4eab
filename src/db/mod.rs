//! Storage module for the embedded SQLite database
//!
//! The loader only needs two operations from storage: run the idempotent
//! table DDL once, and run each batch insert as one atomic unit.

pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;

/// Write side of the store as seen by the loader
pub trait Storage {
    /// Execute a schema statement (expected to be idempotent)
    fn execute_ddl(&mut self, ddl: &str) -> Result<()>;

    /// Execute one multi-row insert inside a single transaction.
    /// Returns the number of rows inserted.
    fn write_batch(&mut self, statement: &str) -> Result<usize>;
}

impl<S: Storage + ?Sized> Storage for &mut S {
    fn execute_ddl(&mut self, ddl: &str) -> Result<()> {
        (**self).execute_ddl(ddl)
    }

    fn write_batch(&mut self, statement: &str) -> Result<usize> {
        (**self).write_batch(statement)
    }
}
