//! In-memory record model: spans, metric points, log records, and the
//! resource identity attached to every batch.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::signal::Signal;

mod ids;
mod log;
mod metric;
mod resource;
mod span;

pub use ids::{ParseIdError, SpanId, TraceId};
pub use log::{LogRecord, Severity};
pub use metric::{MetricKind, MetricPoint};
pub use resource::{AttrValue, KeyValue, Resource};
pub use span::{Span, SpanStatus};

/// Current wall-clock time as unix nanoseconds
pub(crate) fn now_unix_nanos() -> u64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default()
        .max(0) as u64
}

/// A single telemetry record of any signal kind
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Span(Span),
    Metric(MetricPoint),
    Log(LogRecord),
}

impl Record {
    /// The signal kind this record belongs to, used for buffer routing
    pub fn signal(&self) -> Signal {
        match self {
            Record::Span(_) => Signal::Traces,
            Record::Metric(_) => Signal::Metrics,
            Record::Log(_) => Signal::Logs,
        }
    }

    /// Structural validity check. Violations here mean a caller bypassed
    /// the constructors, so the batch carrying this record is malformed.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Record::Span(span) => span.validate(),
            Record::Metric(point) => point.validate(),
            Record::Log(log) => log.validate(),
        }
    }
}

impl From<Span> for Record {
    fn from(span: Span) -> Self {
        Record::Span(span)
    }
}

impl From<MetricPoint> for Record {
    fn from(point: MetricPoint) -> Self {
        Record::Metric(point)
    }
}

impl From<LogRecord> for Record {
    fn from(log: LogRecord) -> Self {
        Record::Log(log)
    }
}

/// An ordered group of same-kind records plus the emitting resource.
/// Immutable once formed; handed to the exporter as a unit.
#[derive(Clone, Debug)]
pub struct Batch {
    pub signal: Signal,
    pub resource: Arc<Resource>,
    pub records: Vec<Record>,
}

impl Batch {
    pub fn new(signal: Signal, resource: Arc<Resource>, records: Vec<Record>) -> Self {
        Self {
            signal,
            resource,
            records,
        }
    }

    pub fn empty(signal: Signal, resource: Arc<Resource>) -> Self {
        Self::new(signal, resource, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check kind homogeneity and per-record invariants before export
    pub fn validate(&self) -> Result<(), String> {
        for (idx, record) in self.records.iter().enumerate() {
            if record.signal() != self.signal {
                return Err(format!(
                    "record {} is {} in a {} batch",
                    idx,
                    record.signal(),
                    self.signal
                ));
            }
            record
                .validate()
                .map_err(|e| format!("record {}: {}", idx, e))?;
        }
        Ok(())
    }
}
