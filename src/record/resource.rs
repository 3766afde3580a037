use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attribute value: the small scalar set carried by records and resources
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

/// One attribute pair. Records keep these as an ordered list so that
/// submission order survives the round trip to the sink.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: AttrValue,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

pub(crate) const SERVICE_NAME_KEY: &str = "service.name";

/// Static identity of the emitting process. Built once at startup and
/// shared by reference with every batch; immutable after construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    attributes: BTreeMap<String, AttrValue>,
}

impl Resource {
    pub fn new(service_name: impl Into<String>) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            SERVICE_NAME_KEY.to_string(),
            AttrValue::Str(service_name.into()),
        );
        Self { attributes }
    }

    /// Builder-style attribute insertion, for use before the resource is shared
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    pub fn service_name(&self) -> &str {
        match self.attributes.get(SERVICE_NAME_KEY) {
            Some(AttrValue::Str(name)) => name,
            _ => "unknown_service",
        }
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_carries_service_identity() {
        let resource = Resource::new("checkout")
            .with("service.version", "1.4.2")
            .with("deployment.environment", "staging");

        assert_eq!(resource.service_name(), "checkout");
        assert_eq!(
            resource.get("deployment.environment"),
            Some(&AttrValue::Str("staging".into()))
        );
        assert_eq!(resource.len(), 3);
    }

    #[test]
    fn attr_values_serialize_as_bare_scalars() {
        let json = serde_json::to_string(&AttrValue::Int(42)).unwrap();
        assert_eq!(json, "42");
        let json = serde_json::to_string(&AttrValue::Bool(true)).unwrap();
        assert_eq!(json, "true");

        let back: AttrValue = serde_json::from_str("\"hello\"").unwrap();
        assert_eq!(back, AttrValue::Str("hello".into()));
        let back: AttrValue = serde_json::from_str("2.5").unwrap();
        assert_eq!(back, AttrValue::Float(2.5));
    }

    #[test]
    fn missing_service_name_falls_back() {
        let resource = Resource {
            attributes: BTreeMap::new(),
        };
        assert_eq!(resource.service_name(), "unknown_service");
    }
}
