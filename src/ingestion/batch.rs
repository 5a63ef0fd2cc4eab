//! Batch Accumulator - Bounded buffer of coerced rows

/// A drained batch ready to be written as one insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainedBatch {
    /// Complete multi-row `INSERT` statement
    pub statement: String,
    /// Number of tuples in `statement`
    pub rows: usize,
}

/// Collects coerced tuples until the flush threshold is reached
pub struct BatchAccumulator {
    /// `INSERT INTO ... VALUES ` shared by every statement
    insert_prefix: String,
    /// Coerced `(lit,...)` tuples in arrival order
    tuples: Vec<String>,
    /// Rows per flush, never zero
    threshold: usize,
}

impl BatchAccumulator {
    /// `insert_prefix` is the `INSERT INTO ... VALUES ` head every drained
    /// statement starts with. `threshold` must be non-zero.
    pub fn new(insert_prefix: String, threshold: usize) -> Self {
        Self {
            insert_prefix,
            tuples: Vec::with_capacity(threshold.min(65_536)),
            threshold,
        }
    }

    pub fn append(&mut self, tuple: String) {
        self.tuples.push(tuple);
    }

    pub fn should_flush(&self) -> bool {
        self.tuples.len() >= self.threshold
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// Join the buffered tuples into one insert statement and clear the buffer.
    /// Returns `None` when there is nothing to write.
    pub fn drain(&mut self) -> Option<DrainedBatch> {
        if self.is_empty() {
            return None;
        }

        let body_len: usize = self.tuples.iter().map(|t| t.len() + 1).sum();
        let mut statement = String::with_capacity(self.insert_prefix.len() + body_len);
        statement.push_str(&self.insert_prefix);
        for (idx, tuple) in self.tuples.iter().enumerate() {
            if idx > 0 {
                statement.push(',');
            }
            statement.push_str(tuple);
        }

        let rows = self.tuples.len();
        self.tuples.clear();

        Some(DrainedBatch { statement, rows })
    }
}
