use serde::{Deserialize, Serialize};

use super::ids::{SpanId, TraceId};
use super::now_unix_nanos;
use super::resource::{AttrValue, KeyValue};

/// Log severity, with the conventional numeric values used on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Severity {
    pub fn number(&self) -> u8 {
        match self {
            Severity::Trace => 1,
            Severity::Debug => 5,
            Severity::Info => 9,
            Severity::Warn => 13,
            Severity::Error => 17,
            Severity::Fatal => 21,
        }
    }

    pub fn is_error(&self) -> bool {
        *self >= Severity::Error
    }
}

/// A log line, immutable from creation. Trace/span ids are optional
/// correlation handles the caller passes explicitly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub severity: Severity,
    pub message: String,
    pub time_unix_nano: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<KeyValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<TraceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<SpanId>,
}

impl LogRecord {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            time_unix_nano: now_unix_nanos(),
            attributes: Vec::new(),
            trace_id: None,
            span_id: None,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.push(KeyValue::new(key, value));
        self
    }

    /// Correlate this log line with a span
    pub fn in_span(mut self, trace_id: TraceId, span_id: SpanId) -> Self {
        self.trace_id = Some(trace_id);
        self.span_id = Some(span_id);
        self
    }

    pub fn at(mut self, time_unix_nano: u64) -> Self {
        self.time_unix_nano = time_unix_nano;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.span_id.is_some() && self.trace_id.is_none() {
            return Err("log record has a span id without a trace id".to_string());
        }
        Ok(())
    }
}
