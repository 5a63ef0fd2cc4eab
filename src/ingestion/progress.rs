//! Progress accounting against the metadata row count

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Snapshot handed to progress sinks after every flush
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    /// Rows committed so far
    pub rows_processed: u64,
    /// Row count reported by the metadata
    pub total_rows: u64,
    /// Percent of `total_rows`, rounded to two decimals. May exceed 100 when
    /// the source holds more rows than the metadata reported.
    pub percentage: f64,
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({:.2}%)",
            self.rows_processed, self.total_rows, self.percentage
        )
    }
}

/// Rows flushed so far. `total_rows` is fixed when the run starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProgressState {
    rows_processed: u64,
    total_rows: u64,
}

impl ProgressState {
    pub fn new(total_rows: u64) -> Self {
        Self {
            rows_processed: 0,
            total_rows,
        }
    }

    pub fn advance(&mut self, rows: usize) -> ProgressReport {
        self.rows_processed += rows as u64;
        self.report()
    }

    pub fn rows_processed(&self) -> u64 {
        self.rows_processed
    }

    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    pub fn report(&self) -> ProgressReport {
        ProgressReport {
            rows_processed: self.rows_processed,
            total_rows: self.total_rows,
            percentage: percentage(self.rows_processed, self.total_rows),
        }
    }
}

fn percentage(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let raw = done as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

/// Observer notified after each successful flush
pub trait ProgressSink {
    fn on_progress(&mut self, report: &ProgressReport);
}

impl<F: FnMut(&ProgressReport)> ProgressSink for F {
    fn on_progress(&mut self, report: &ProgressReport) {
        self(report)
    }
}

/// Logs each report through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_progress(&mut self, report: &ProgressReport) {
        info!("Done with {}", report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(50_000, 120_001), 41.67);
        assert_eq!(percentage(120_001, 120_001), 100.0);
        assert_eq!(percentage(0, 0), 100.0);
    }

    #[test]
    fn test_advance_accumulates() {
        let mut state = ProgressState::new(10);
        state.advance(4);
        let report = state.advance(4);
        assert_eq!(report.rows_processed, 8);
        assert_eq!(report.total_rows, 10);
        assert_eq!(report.percentage, 80.0);
        assert_eq!(report.to_string(), "8/10 (80.00%)");
    }

    #[test]
    fn test_overshoot_is_reported_not_clamped() {
        let mut state = ProgressState::new(4);
        let report = state.advance(5);
        assert_eq!(report.percentage, 125.0);
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |r: &ProgressReport| seen.push(r.rows_processed);
            sink.on_progress(&ProgressState::new(2).advance(1));
        }
        assert_eq!(seen, vec![1]);
    }
}
