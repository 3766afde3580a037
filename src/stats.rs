//! Internal diagnostic counters for the pipeline.
//!
//! Terminal export outcomes are reported here rather than to producers;
//! a dropped batch is always counted, never silently discarded.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct PipelineStats {
    submitted: AtomicU64,
    exported_records: AtomicU64,
    exported_batches: AtomicU64,
    dropped_overflow: AtomicU64,
    dropped_fatal: AtomicU64,
    dropped_timeout: AtomicU64,
    export_attempt_failures: AtomicU64,
    flush_timeouts: AtomicU64,
}

/// Point-in-time copy of the counters, served by `/v1/stats` and logged
/// at shutdown
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub exported_records: u64,
    pub exported_batches: u64,
    pub dropped_overflow: u64,
    pub dropped_fatal: u64,
    pub dropped_timeout: u64,
    pub export_attempt_failures: u64,
    pub flush_timeouts: u64,
}

impl PipelineStats {
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exported(&self, records: u64) {
        self.exported_records.fetch_add(records, Ordering::Relaxed);
        self.exported_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overflow_drop(&self) {
        self.dropped_overflow.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fatal_drop(&self, records: u64) {
        self.dropped_fatal.fetch_add(records, Ordering::Relaxed);
    }

    pub fn record_timeout_drop(&self, records: u64) {
        self.dropped_timeout.fetch_add(records, Ordering::Relaxed);
    }

    pub fn record_export_attempt_failure(&self) {
        self.export_attempt_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush_timeout(&self) {
        self.flush_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            exported_records: self.exported_records.load(Ordering::Relaxed),
            exported_batches: self.exported_batches.load(Ordering::Relaxed),
            dropped_overflow: self.dropped_overflow.load(Ordering::Relaxed),
            dropped_fatal: self.dropped_fatal.load(Ordering::Relaxed),
            dropped_timeout: self.dropped_timeout.load(Ordering::Relaxed),
            export_attempt_failures: self.export_attempt_failures.load(Ordering::Relaxed),
            flush_timeouts: self.flush_timeouts.load(Ordering::Relaxed),
        }
    }
}
