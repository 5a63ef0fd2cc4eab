//! Streaming Loader - Drives the CSV parser into batched inserts
//!
//! One sequential pipeline: parse a record, coerce it, append it to the
//! batch, and flush when the batch is full. Parsing pauses while a flush is
//! written, so at most one batch is in flight and one is being filled.

use crate::db::Storage;
use crate::error::{LoaderError, Result};
use crate::ingestion::batch::BatchAccumulator;
use crate::ingestion::progress::{ProgressSink, ProgressState};
use crate::ingestion::row::{coerce_row, RawRecord};
use crate::ingestion::schema::ResolvedSchema;
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoaderState {
    Idle,
    Streaming,
    Flushing,
    Done,
    Failed,
}

/// Outcome of a completed run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoadSummary {
    pub run_id: Uuid,
    /// Target table name
    pub table: String,
    /// Rows committed to storage
    pub rows_loaded: u64,
    /// Row count reported by the metadata when the run started
    pub total_rows: u64,
    /// Insert statements written
    pub flushes: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl LoadSummary {
    /// True when the stream held a different number of rows than the metadata promised
    pub fn count_mismatch(&self) -> bool {
        self.rows_loaded != self.total_rows
    }
}

/// Sequential CSV-to-storage pipeline for one run
pub struct StreamingLoader<S: Storage, P: ProgressSink> {
    /// Tags the tracing span and the summary
    run_id: Uuid,
    schema: ResolvedSchema,
    /// Target of every flushed batch
    storage: S,
    /// Rows coerced since the last flush
    batch: BatchAccumulator,
    /// Committed rows against the metadata total
    progress: ProgressState,
    sink: P,
    state: LoaderState,
    /// Number of batches written so far
    flushes: usize,
}

impl<S: Storage, P: ProgressSink> StreamingLoader<S, P> {
    /// The table must already be provisioned in `storage`.
    pub fn new(
        schema: ResolvedSchema,
        storage: S,
        flush_threshold: usize,
        total_rows: u64,
        sink: P,
    ) -> Result<Self> {
        if flush_threshold == 0 {
            return Err(LoaderError::Config(
                "Flush threshold must be at least 1".to_string(),
            ));
        }

        let batch = BatchAccumulator::new(schema.insert_prefix(), flush_threshold);

        Ok(Self {
            run_id: Uuid::new_v4(),
            schema,
            storage,
            batch,
            progress: ProgressState::new(total_rows),
            sink,
            state: LoaderState::Idle,
            flushes: 0,
        })
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    pub fn progress(&self) -> &ProgressState {
        &self.progress
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Stream every record from `source` into storage.
    ///
    /// Any parser or storage error is fatal and leaves the loader `Failed`.
    /// Batches committed before the error stay in storage.
    pub fn load<R: Read>(&mut self, source: R) -> Result<LoadSummary> {
        if self.state != LoaderState::Idle {
            return Err(LoaderError::Config(format!(
                "Loader already ran (state {:?})",
                self.state
            )));
        }

        let span = info_span!("load", run_id = %self.run_id, table = %self.schema.table_name());
        let _guard = span.enter();

        let started_at = Utc::now();
        match self.stream(source) {
            Ok(()) => {
                self.state = LoaderState::Done;
                let summary = LoadSummary {
                    run_id: self.run_id,
                    table: self.schema.table_name().to_string(),
                    rows_loaded: self.progress.rows_processed(),
                    total_rows: self.progress.total_rows(),
                    flushes: self.flushes,
                    started_at,
                    finished_at: Utc::now(),
                };

                if summary.count_mismatch() {
                    warn!(
                        "Loaded {} rows but metadata reported {}",
                        summary.rows_loaded, summary.total_rows
                    );
                }
                info!("Parsing complete");
                Ok(summary)
            }
            Err(e) => {
                self.state = LoaderState::Failed;
                warn!(
                    "Load failed after {} committed rows: {}",
                    self.progress.rows_processed(),
                    e
                );
                Err(e)
            }
        }
    }

    fn stream<R: Read>(&mut self, source: R) -> Result<()> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::Headers)
            .from_reader(source);

        let headers = reader
            .headers()
            .map_err(|e| malformed(&e, 1))?
            .clone();
        self.check_header(&headers);

        let mut record = StringRecord::new();
        loop {
            let has_record = reader.read_record(&mut record).map_err(|e| {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                malformed(&e, line)
            })?;
            if !has_record {
                break;
            }

            if record.len() > headers.len() {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                return Err(LoaderError::MalformedRecord {
                    line,
                    reason: format!(
                        "found {} fields but the header names {}",
                        record.len(),
                        headers.len()
                    ),
                });
            }

            if self.state == LoaderState::Idle {
                self.state = LoaderState::Streaming;
            }

            let tuple = coerce_row(&RawRecord::from_csv(&headers, &record), self.schema.registry());
            self.batch.append(tuple);

            if self.batch.should_flush() {
                self.flush()?;
            }
        }

        // End of stream: write whatever is left, even a partial batch
        self.flush()
    }

    fn flush(&mut self) -> Result<()> {
        self.state = LoaderState::Flushing;

        if let Some(drained) = self.batch.drain() {
            let inserted = self.storage.write_batch(&drained.statement)?;
            if inserted != drained.rows {
                return Err(LoaderError::StorageWriteFailed(format!(
                    "Inserted {} rows for a batch of {}",
                    inserted, drained.rows
                )));
            }

            self.flushes += 1;
            let report = self.progress.advance(drained.rows);
            debug!("Flushed batch {} ({} rows)", self.flushes, drained.rows);
            self.sink.on_progress(&report);
        }

        self.state = LoaderState::Streaming;
        Ok(())
    }

    fn check_header(&self, headers: &StringRecord) {
        let present: HashSet<&str> = headers.iter().collect();

        let missing: Vec<&str> = self
            .schema
            .canonical_order()
            .filter(|name| !present.contains(name))
            .collect();
        if !missing.is_empty() {
            warn!(
                "Columns missing from the CSV header will be stored as NULL: {}",
                missing.join(", ")
            );
        }

        let unknown: Vec<&str> = headers
            .iter()
            .filter(|name| self.schema.registry().get(name).is_none())
            .collect();
        if !unknown.is_empty() {
            warn!("Ignoring CSV columns not in the schema: {}", unknown.join(", "));
        }
    }
}

fn malformed(err: &csv::Error, line: u64) -> LoaderError {
    LoaderError::MalformedRecord {
        line,
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::progress::ProgressReport;
    use crate::ingestion::schema::SchemaResolver;
    use crate::ingestion::type_registry::{ColumnDescriptor, ColumnKind};

    /// Records statements instead of executing them
    #[derive(Default)]
    struct RecordingStorage {
        batches: Vec<String>,
    }

    impl Storage for RecordingStorage {
        fn execute_ddl(&mut self, _ddl: &str) -> Result<()> {
            Ok(())
        }

        fn write_batch(&mut self, statement: &str) -> Result<usize> {
            self.batches.push(statement.to_string());
            Ok(statement.matches("),(").count() + 1)
        }
    }

    fn schema() -> ResolvedSchema {
        SchemaResolver::new("data")
            .build_schema(&[
                ColumnDescriptor::new("id", ColumnKind::Numeric),
                ColumnDescriptor::new("name", ColumnKind::Text),
            ])
            .unwrap()
    }

    #[test]
    fn test_state_moves_to_done() {
        let mut reports: Vec<ProgressReport> = Vec::new();
        let mut loader = StreamingLoader::new(
            schema(),
            RecordingStorage::default(),
            2,
            3,
            |r: &ProgressReport| reports.push(*r),
        )
        .unwrap();
        assert_eq!(loader.state(), LoaderState::Idle);

        let summary = loader.load("id,name\n1,a\n2,b\n3,c\n".as_bytes()).unwrap();
        assert_eq!(loader.state(), LoaderState::Done);
        assert_eq!(summary.rows_loaded, 3);
        assert_eq!(summary.flushes, 2);
        assert!(!summary.count_mismatch());

        let storage = loader.into_storage();
        assert_eq!(
            storage.batches,
            vec![
                "INSERT INTO \"data\" (\"id\",\"name\") VALUES (1,'a'),(2,'b')".to_string(),
                "INSERT INTO \"data\" (\"id\",\"name\") VALUES (3,'c')".to_string(),
            ]
        );
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].percentage, 100.0);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let result = StreamingLoader::new(
            schema(),
            RecordingStorage::default(),
            0,
            0,
            |_: &ProgressReport| {},
        );
        assert!(matches!(result, Err(LoaderError::Config(_))));
    }

    #[test]
    fn test_loader_runs_once() {
        let mut loader = StreamingLoader::new(
            schema(),
            RecordingStorage::default(),
            10,
            1,
            |_: &ProgressReport| {},
        )
        .unwrap();
        loader.load("id,name\n1,a\n".as_bytes()).unwrap();
        assert!(matches!(
            loader.load("id,name\n1,a\n".as_bytes()),
            Err(LoaderError::Config(_))
        ));
    }

    #[test]
    fn test_extra_field_is_fatal() {
        let mut loader = StreamingLoader::new(
            schema(),
            RecordingStorage::default(),
            10,
            2,
            |_: &ProgressReport| {},
        )
        .unwrap();

        let err = loader.load("id,name\n1,a\n2,b,oops\n".as_bytes()).unwrap_err();
        match err {
            LoaderError::MalformedRecord { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(loader.state(), LoaderState::Failed);
        assert!(loader.storage().batches.is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_fatal() {
        let mut loader = StreamingLoader::new(
            schema(),
            RecordingStorage::default(),
            10,
            2,
            |_: &ProgressReport| {},
        )
        .unwrap();

        let err = loader.load(&b"id,name\n1,ok\n2,a\xffb\n"[..]).unwrap_err();
        match err {
            LoaderError::MalformedRecord { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(loader.state(), LoaderState::Failed);
        assert_eq!(loader.progress().rows_processed(), 0);
        assert!(loader.storage().batches.is_empty());
    }

    #[test]
    fn test_empty_lines_skipped() {
        let mut loader = StreamingLoader::new(
            schema(),
            RecordingStorage::default(),
            10,
            2,
            |_: &ProgressReport| {},
        )
        .unwrap();

        let summary = loader.load("id,name\n1,a\n\n2,b\n\n".as_bytes()).unwrap();
        assert_eq!(summary.rows_loaded, 2);
        assert_eq!(summary.flushes, 1);
    }
}
