//! # Batch Metrics
//!
//! Append-only per-run accumulator of timing observations. One recorder is
//! owned by each job run, starts empty, is never reset mid-run, and remains
//! inspectable after the run completes.

use parking_lot::Mutex;
use std::time::Duration;

/// One sub-batch attempt observation.
#[derive(Debug, Clone)]
pub struct TimingSample {
    /// Rendered range predicate the attempt executed under.
    pub predicate: String,
    /// Wall-clock duration of the unit-of-work call.
    pub duration: Duration,
    /// Rows the attempt reported as affected (zero for failed attempts).
    pub rows_affected: u64,
    /// 1-based attempt number within the sub-batch.
    pub attempt: u32,
    /// Whether the attempt succeeded.
    pub succeeded: bool,
}

/// Mutable, append-only recorder of per-attempt samples.
#[derive(Debug, Default)]
pub struct BatchMetrics {
    timings: Mutex<Vec<TimingSample>>,
}

impl BatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, sample: TimingSample) {
        self.timings.lock().push(sample);
    }

    /// Snapshot of all samples recorded so far, in observation order.
    pub fn timings(&self) -> Vec<TimingSample> {
        self.timings.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.timings.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.timings.lock().len()
    }

    /// Total rows affected across successful attempts.
    pub fn rows_affected_total(&self) -> u64 {
        self.timings
            .lock()
            .iter()
            .filter(|sample| sample.succeeded)
            .map(|sample| sample.rows_affected)
            .sum()
    }

    /// Total attempts that ended in an error.
    pub fn failed_attempts(&self) -> usize {
        self.timings
            .lock()
            .iter()
            .filter(|sample| !sample.succeeded)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(rows: u64, attempt: u32, succeeded: bool) -> TimingSample {
        TimingSample {
            predicate: r#""id" BETWEEN $1 AND $2"#.to_string(),
            duration: Duration::from_millis(3),
            rows_affected: rows,
            attempt,
            succeeded,
        }
    }

    #[test]
    fn starts_empty() {
        let metrics = BatchMetrics::new();
        assert!(metrics.is_empty());
        assert_eq!(metrics.len(), 0);
        assert_eq!(metrics.rows_affected_total(), 0);
    }

    #[test]
    fn accumulates_samples_in_order() {
        let metrics = BatchMetrics::new();
        metrics.record(sample(2, 1, true));
        metrics.record(sample(0, 1, false));
        metrics.record(sample(2, 2, true));

        let timings = metrics.timings();
        assert_eq!(timings.len(), 3);
        assert_eq!(metrics.rows_affected_total(), 4);
        assert_eq!(metrics.failed_attempts(), 1);
        assert_eq!(timings[1].attempt, 1);
        assert!(!timings[1].succeeded);
    }
}
