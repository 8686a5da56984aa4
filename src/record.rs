//! Structured records as delivered by the host pipeline.
//!
//! A [`SinkRecord`] carries an optional key and value, each with an optional
//! [`Schema`]. Values are dynamically typed ([`Value`]); only the
//! [`Value::Struct`] shape is ever serialized into a row.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A dynamically typed record value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Struct(Struct),
}

impl Value {
    /// Returns the inner struct when this value has the structured-tuple shape.
    #[must_use]
    pub const fn as_struct(&self) -> Option<&Struct> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_struct(&self) -> bool {
        matches!(self, Self::Struct(_))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Struct> for Value {
    fn from(v: Struct) -> Self {
        Self::Struct(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// A named-field tuple. Field order is insertion order and is significant:
/// it drives column order when no schema is available.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Struct {
    fields: Vec<(String, Value)>,
}

/// Serializes as a map so nested structs render as JSON objects.
impl Serialize for Struct {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl Struct {
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Set a field, replacing any previous value under the same name.
    #[must_use]
    pub fn put(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One column of a struct schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub optional: bool,
    /// Nested schema when the field itself holds a struct.
    pub schema: Option<Arc<Schema>>,
}

impl Field {
    #[must_use]
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: false,
            schema: None,
        }
    }

    #[must_use]
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: true,
            schema: None,
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: Arc<Schema>) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Schema describing a struct value. An empty field list means "schemaless".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    pub name: Option<String>,
    pub fields: Vec<Field>,
}

impl Schema {
    #[must_use]
    pub fn new(fields: Vec<Field>) -> Self {
        Self { name: None, fields }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Nested schema of a struct-typed field.
    #[must_use]
    pub fn field_schema(&self, name: &str) -> Option<&Schema> {
        self.field(name).and_then(|f| f.schema.as_deref())
    }
}

/// A record handed to a writer by the host pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub timestamp: Option<i64>,
    pub key: Option<Value>,
    pub key_schema: Option<Arc<Schema>>,
    pub value: Option<Value>,
    pub value_schema: Option<Arc<Schema>>,
}

impl SinkRecord {
    /// A record with only a value and no schema.
    #[must_use]
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, value: impl Into<Value>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            timestamp: None,
            key: None,
            key_schema: None,
            value: Some(value.into()),
            value_schema: None,
        }
    }

    #[must_use]
    pub fn with_value_schema(mut self, schema: Arc<Schema>) -> Self {
        self.value_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<Value>, schema: Option<Arc<Schema>>) -> Self {
        self.key = Some(key.into());
        self.key_schema = schema;
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, ts: i64) -> Self {
        self.timestamp = Some(ts);
        self
    }

    /// A tombstone: key only, no value.
    #[must_use]
    pub fn tombstone(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            timestamp: None,
            key: None,
            key_schema: None,
            value: None,
            value_schema: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_put_replaces_existing_field() {
        let s = Struct::new().put("a", 1).put("b", "x").put("a", 2);
        assert_eq!(s.len(), 2);
        assert_eq!(s.get("a"), Some(&Value::Int(2)));
        assert_eq!(s.field_names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_option_into_value() {
        let none: Option<i64> = None;
        assert_eq!(Value::from(none), Value::Null);
        assert_eq!(Value::from(Some("y")), Value::String("y".into()));
    }

    #[test]
    fn test_schema_field_lookup() {
        let inner = Arc::new(Schema::new(vec![Field::required("id")]));
        let schema = Schema::new(vec![
            Field::optional("before").with_schema(inner.clone()),
            Field::required("op"),
        ])
        .named("envelope");
        assert_eq!(schema.field_schema("before"), Some(inner.as_ref()));
        assert!(schema.field_schema("op").is_none());
        assert!(schema.field("missing").is_none());
    }

    #[test]
    fn test_nested_struct_serializes_as_object() {
        let value = Value::from(Struct::new().put("id", 1).put("inner", Struct::new().put("k", "v")));
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"id":1,"inner":{"k":"v"}}"#);
    }
}
