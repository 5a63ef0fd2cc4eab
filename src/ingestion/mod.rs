//! Ingestion Module - Schema-driven streaming load of a CSV export into SQLite
//!
//! - Type registry and literal coercion per declared column type
//! - Idempotent table creation from the dataset metadata
//! - Bounded-memory streaming with batched multi-row inserts
//! - Progress accounting against the metadata row count

pub mod batch;
pub mod literal;
pub mod loader;
pub mod progress;
pub mod row;
pub mod schema;
pub mod type_registry;

pub use batch::{BatchAccumulator, DrainedBatch};
pub use literal::{escape_string_literal, quote_identifier};
pub use loader::{LoadSummary, LoaderState, StreamingLoader};
pub use progress::{LogProgress, ProgressReport, ProgressSink, ProgressState};
pub use row::{coerce_row, RawRecord};
pub use schema::{ResolvedSchema, SchemaResolver};
pub use type_registry::{ColumnDescriptor, ColumnKind, ResolvedColumn, StorageType, TypeRegistry};

use crate::config::LoaderConfig;
use crate::db::SqliteStore;
use crate::error::Result;
use crate::metadata::DatasetMetadata;
use std::fs::File;
use std::io::BufReader;
use tracing::info;

/// Load the configured CSV file into the configured database.
///
/// The CSV file is opened before the database is touched, so a missing
/// input fails without creating anything.
pub fn run(config: &LoaderConfig, metadata: DatasetMetadata) -> Result<LoadSummary> {
    config.validate()?;

    let csv_file = File::open(&config.csv_path)?;
    info!(
        "Loading {} ({} rows expected) into {}",
        config.csv_path.display(),
        metadata.total_row_count,
        config.database_path.display()
    );

    let schema = SchemaResolver::new(config.table_name.clone()).build_schema(&metadata.columns)?;

    let mut store = SqliteStore::open(&config.database_path)?;
    schema.provision(&mut store)?;
    if config.write_ahead_log {
        store.enable_write_ahead_log()?;
    }

    let mut loader = StreamingLoader::new(
        schema,
        &mut store,
        config.flush_threshold,
        metadata.total_row_count,
        LogProgress,
    )?;
    loader.load(BufReader::new(csv_file))
}
