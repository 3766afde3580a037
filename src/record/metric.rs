use serde::{Deserialize, Serialize};

use super::now_unix_nanos;
use super::resource::{AttrValue, KeyValue};

/// Instrument kind for a metric data point
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Histogram,
}

/// A single metric measurement, immutable from creation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub name: String,
    #[serde(rename = "metric_kind")]
    pub kind: MetricKind,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<KeyValue>,
    pub time_unix_nano: u64,
}

impl MetricPoint {
    /// A counter increment. Counter values are non-negative.
    pub fn counter(name: impl Into<String>, value: f64) -> Self {
        debug_assert!(value >= 0.0, "counter increment must be non-negative");
        Self::point(name, MetricKind::Counter, value)
    }

    /// A histogram observation
    pub fn histogram(name: impl Into<String>, value: f64) -> Self {
        Self::point(name, MetricKind::Histogram, value)
    }

    fn point(name: impl Into<String>, kind: MetricKind, value: f64) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
            attributes: Vec::new(),
            time_unix_nano: now_unix_nanos(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.push(KeyValue::new(key, value));
        self
    }

    pub fn at(mut self, time_unix_nano: u64) -> Self {
        self.time_unix_nano = time_unix_nano;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("metric point has an empty instrument name".to_string());
        }
        if !self.value.is_finite() {
            return Err(format!(
                "metric {:?} has a non-finite value {}",
                self.name, self.value
            ));
        }
        if self.kind == MetricKind::Counter && self.value < 0.0 {
            return Err(format!(
                "counter {:?} has a negative increment {}",
                self.name, self.value
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_point_is_valid() {
        let point = MetricPoint::counter("http.requests", 1.0).with_attribute("route", "/v1/data");
        assert!(point.validate().is_ok());
        assert_eq!(point.kind, MetricKind::Counter);
    }

    #[test]
    fn negative_counter_fails_validation() {
        let point = MetricPoint {
            name: "http.requests".into(),
            kind: MetricKind::Counter,
            value: -1.0,
            attributes: Vec::new(),
            time_unix_nano: 1,
        };
        assert!(point.validate().is_err());
    }

    #[test]
    fn histogram_may_be_negative_but_not_nan() {
        let point = MetricPoint::histogram("temperature.delta", -2.5);
        assert!(point.validate().is_ok());

        let nan = MetricPoint {
            value: f64::NAN,
            ..point
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn empty_name_fails_validation() {
        let point = MetricPoint::counter("", 1.0);
        assert!(point.validate().is_err());
    }
}
