use serde::{Deserialize, Serialize};

use super::ids::{SpanId, TraceId};
use super::now_unix_nanos;
use super::resource::{AttrValue, KeyValue};

/// Terminal status of a span
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    #[default]
    Unset,
    Ok,
    Error,
}

/// A timed operation. Spans without a parent are trace roots; children
/// carry the parent span id explicitly, there is no ambient context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    pub name: String,
    pub start_time_unix_nano: u64,
    /// Zero while the span is still open
    #[serde(default)]
    pub end_time_unix_nano: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<KeyValue>,
    #[serde(default)]
    pub status: SpanStatus,
}

impl Span {
    /// Start a root span now
    pub fn start(trace_id: TraceId, span_id: SpanId, name: impl Into<String>) -> Self {
        Self::start_at(trace_id, span_id, name, now_unix_nanos())
    }

    pub fn start_at(
        trace_id: TraceId,
        span_id: SpanId,
        name: impl Into<String>,
        start_time_unix_nano: u64,
    ) -> Self {
        Self {
            trace_id,
            span_id,
            parent_span_id: None,
            name: name.into(),
            start_time_unix_nano,
            end_time_unix_nano: 0,
            attributes: Vec::new(),
            status: SpanStatus::Unset,
        }
    }

    /// Start a child span now, inheriting the parent's trace id
    pub fn child_of(parent: &Span, span_id: SpanId, name: impl Into<String>) -> Self {
        let mut span = Self::start(parent.trace_id, span_id, name);
        span.parent_span_id = Some(parent.span_id);
        span
    }

    /// Attributes may only accumulate while the span is open
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        debug_assert!(!self.is_ended(), "attribute set on an ended span");
        if !self.is_ended() {
            self.attributes.push(KeyValue::new(key, value));
        }
    }

    pub fn set_status(&mut self, status: SpanStatus) {
        self.status = status;
    }

    /// Close the span now
    pub fn end(&mut self) {
        self.end_at(now_unix_nanos());
    }

    /// Close the span at an explicit timestamp, clamped to the start time
    pub fn end_at(&mut self, end_time_unix_nano: u64) {
        self.end_time_unix_nano = end_time_unix_nano.max(self.start_time_unix_nano);
    }

    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    pub fn is_ended(&self) -> bool {
        self.end_time_unix_nano != 0
    }

    pub fn duration_ns(&self) -> u64 {
        self.end_time_unix_nano
            .saturating_sub(self.start_time_unix_nano)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if !self.trace_id.is_valid() {
            return Err("span has an all-zero trace id".to_string());
        }
        if !self.span_id.is_valid() {
            return Err("span has an all-zero span id".to_string());
        }
        if !self.is_ended() {
            return Err(format!("span {:?} is still open", self.name));
        }
        if self.end_time_unix_nano < self.start_time_unix_nano {
            return Err(format!(
                "span {:?} ends before it starts ({} < {})",
                self.name, self.end_time_unix_nano, self.start_time_unix_nano
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_inherits_trace_and_parent() {
        let mut root = Span::start(TraceId::random(), SpanId::random(), "main-operation");
        let child = Span::child_of(&root, SpanId::random(), "database-query");

        assert!(root.is_root());
        assert!(!child.is_root());
        assert_eq!(child.trace_id, root.trace_id);
        assert_eq!(child.parent_span_id, Some(root.span_id));

        root.end();
        assert!(root.is_ended());
    }

    #[test]
    fn end_is_clamped_to_start() {
        let mut span = Span::start_at(TraceId::random(), SpanId::random(), "op", 1_000);
        span.end_at(500);
        assert_eq!(span.end_time_unix_nano, 1_000);
        assert_eq!(span.duration_ns(), 0);
        assert!(span.validate().is_ok());
    }

    #[test]
    fn open_span_fails_validation() {
        let span = Span::start(TraceId::random(), SpanId::random(), "op");
        assert!(span.validate().is_err());
    }

    #[test]
    fn attributes_stick_in_insertion_order() {
        let mut span = Span::start_at(TraceId::random(), SpanId::random(), "op", 1);
        span.set_attribute("http.method", "POST");
        span.set_attribute("http.status_code", 200i64);
        span.end_at(2);

        let keys: Vec<_> = span.attributes.iter().map(|kv| kv.key.as_str()).collect();
        assert_eq!(keys, vec!["http.method", "http.status_code"]);
    }
}
