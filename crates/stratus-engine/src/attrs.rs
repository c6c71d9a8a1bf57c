//! Attribute maps, desired-state specs and persisted records
//!
//! Only primitive values (string, bool, int64) cross the engine boundary.
//! Maps are ordered so that chains and records come out identical for
//! identical input.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute name → primitive value
pub type Attributes = BTreeMap<String, AttrValue>;

/// Record key holding the primary backend-assigned identifier
pub const ID_KEY: &str = "id";

/// Record key holding the canonical backend tag
pub const BACKEND_KEY: &str = "type";

/// A primitive attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    String(String),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::String(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::String(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

/// Typed accessors shared by specs, records and adapter inputs
pub trait AttributesExt {
    fn str_attr(&self, key: &str) -> Option<&str>;
    fn bool_attr(&self, key: &str) -> Option<bool>;
    fn int_attr(&self, key: &str) -> Option<i64>;

    /// Non-empty string attribute or the given default
    fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.str_attr(key) {
            Some(value) if !value.is_empty() => value,
            _ => default,
        }
    }
}

impl AttributesExt for Attributes {
    fn str_attr(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(AttrValue::as_str)
    }

    fn bool_attr(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(AttrValue::as_bool)
    }

    fn int_attr(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(AttrValue::as_int)
    }
}

/// Immutable desired state declared by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Declared backend tag, validated by the dispatcher
    pub backend: String,

    /// Declared attributes
    #[serde(default)]
    pub attributes: Attributes,
}

impl ResourceSpec {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }
}

/// Persisted representation of a provisioned resource
///
/// A flat attribute map: the normalized spec attributes, the identifier of
/// every chain step under its output key, and any extra adapter outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceRecord {
    pub attributes: Attributes,
}

impl ResourceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_attributes(attributes: Attributes) -> Self {
        Self { attributes }
    }

    /// Primary backend-assigned identifier
    pub fn id(&self) -> Option<&str> {
        self.attributes.str_attr(ID_KEY)
    }

    /// Backend tag the record was provisioned on
    pub fn backend_tag(&self) -> Option<&str> {
        self.attributes.str_attr(BACKEND_KEY)
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Rebuild the desired-state view of this record
    ///
    /// Used to re-derive the chain for Read/Delete; the record's attribute
    /// set is a superset of the normalized spec it was created from.
    pub fn as_spec(&self) -> ResourceSpec {
        ResourceSpec {
            backend: self.backend_tag().unwrap_or_default().to_string(),
            attributes: self.attributes.clone(),
        }
    }

    /// Attribute names whose declared value differs from the stored one
    ///
    /// Keys present only in the record (identifiers, adapter outputs) are
    /// not differences.
    pub fn diverging_keys(&self, desired: &Attributes) -> Vec<String> {
        desired
            .iter()
            .filter(|(key, value)| self.attributes.get(key.as_str()) != Some(*value))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_value_json_is_primitive() {
        let mut attrs = Attributes::new();
        attrs.insert("name".into(), "web".into());
        attrs.insert("public_ip".into(), true.into());
        attrs.insert("node_count".into(), 3i64.into());

        let json = serde_json::to_string(&attrs).unwrap();
        assert_eq!(json, r#"{"name":"web","node_count":3,"public_ip":true}"#);

        let back: Attributes = serde_json::from_str(&json).unwrap();
        assert_eq!(back, attrs);
    }

    #[test]
    fn test_str_or_skips_empty() {
        let mut attrs = Attributes::new();
        attrs.insert("region".into(), "".into());
        assert_eq!(attrs.str_or("region", "us-east-1"), "us-east-1");
        attrs.insert("region".into(), "eu-west-1".into());
        assert_eq!(attrs.str_or("region", "us-east-1"), "eu-west-1");
    }

    #[test]
    fn test_record_diverging_keys() {
        let mut record = ResourceRecord::new();
        record.set("id", "vm-1");
        record.set("size", "t3.small");
        record.set("name", "web");

        let mut desired = Attributes::new();
        desired.insert("name".into(), "web".into());
        desired.insert("size".into(), "t3.large".into());

        assert_eq!(record.diverging_keys(&desired), vec!["size".to_string()]);
    }
}
