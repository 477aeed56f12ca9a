//! Metrics for AoE share operations
//!
//! Recorded through the `metrics` facade; they are dropped unless the
//! embedding process installs a recorder.

use std::time::Instant;

use metrics::{counter, gauge, histogram};

/// Metric names
pub mod names {
    /// Counter: Total share operations by type and status
    pub const SHARE_OPERATIONS_TOTAL: &str = "aoe_share_operations_total";
    /// Histogram: Duration of share operations in seconds
    pub const SHARE_OPERATION_DURATION_SECONDS: &str = "aoe_share_operation_duration_seconds";
    /// Gauge: Exports seen by the most recent scan
    pub const DISCOVERED_EXPORTS: &str = "aoe_share_discovered_exports";
}

/// Record a share operation with its result
pub fn record_operation(operation: &str, status: &str, duration_secs: f64) {
    counter!(names::SHARE_OPERATIONS_TOTAL, "operation" => operation.to_string(), "status" => status.to_string())
        .increment(1);
    histogram!(names::SHARE_OPERATION_DURATION_SECONDS, "operation" => operation.to_string())
        .record(duration_secs);
}

/// Set the number of exports found by the latest scan
pub fn set_discovered_count(count: usize) {
    gauge!(names::DISCOVERED_EXPORTS).set(count as f64);
}

/// Helper for timing operations
pub struct OperationTimer {
    operation: &'static str,
    start: Instant,
}

impl OperationTimer {
    /// Start timing an operation
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    /// Record the outcome of `result` and pass it through.
    pub fn finish<T>(self, result: crate::aoe::Result<T>) -> crate::aoe::Result<T> {
        let duration = self.start.elapsed().as_secs_f64();
        match &result {
            Ok(_) => record_operation(self.operation, "success", duration),
            Err(e) => record_operation(self.operation, &e.kind().to_string(), duration),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aoe::AoeError;

    #[test]
    fn test_operation_timer_passes_result_through() {
        let ok = OperationTimer::new("enable").finish(Ok(7));
        assert_eq!(ok.unwrap(), 7);

        let err = OperationTimer::new("enable").finish::<()>(Err(AoeError::NoMemory));
        assert!(matches!(err, Err(AoeError::NoMemory)));
    }
}
