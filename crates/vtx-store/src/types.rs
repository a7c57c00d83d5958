//! Firestore REST API types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Firestore document value types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(String), // Firestore sends integers as strings
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    ReferenceValue(String),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayValue {
    pub values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapValue {
    pub fields: Option<HashMap<String, Value>>,
}

/// Firestore document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name
    pub name: Option<String>,
    /// Document fields
    pub fields: Option<HashMap<String, Value>>,
    /// Create time
    pub create_time: Option<String>,
    /// Update time
    pub update_time: Option<String>,
}

impl Document {
    /// Create a new document with the given fields.
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: None,
        }
    }

    /// Document id, the last path segment of the resource name.
    pub fn doc_id(&self) -> Option<&str> {
        self.name.as_deref().and_then(|n| n.rsplit('/').next())
    }

    /// Look up a field value.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.as_ref().and_then(|f| f.get(name))
    }
}

// ============================================================================
// Query Types
// ============================================================================

/// Structured query over one collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    pub from: Vec<CollectionSelector>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Vec<Order>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSelector {
    pub collection_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_descendants: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub field_filter: FieldFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldFilter {
    pub field: FieldReference,
    pub op: String,
    pub value: Value,
}

impl Filter {
    /// Equality filter on a field.
    pub fn equal(field_path: impl Into<String>, value: Value) -> Self {
        Self {
            field_filter: FieldFilter {
                field: FieldReference {
                    field_path: field_path.into(),
                },
                op: "EQUAL".to_string(),
                value,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReference {
    pub field_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub field: FieldReference,
    pub direction: String,
}

impl Order {
    pub fn ascending(field_path: impl Into<String>) -> Self {
        Self {
            field: FieldReference {
                field_path: field_path.into(),
            },
            direction: "ASCENDING".to_string(),
        }
    }

    pub fn descending(field_path: impl Into<String>) -> Self {
        Self {
            field: FieldReference {
                field_path: field_path.into(),
            },
            direction: "DESCENDING".to_string(),
        }
    }
}

/// runQuery request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    pub structured_query: StructuredQuery,
}

/// One element of the runQuery response array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
}

// ============================================================================
// Value Conversions
// ============================================================================

/// Convert a Rust value to a Firestore Value.
pub trait ToStoreValue {
    fn to_store_value(&self) -> Value;
}

impl ToStoreValue for String {
    fn to_store_value(&self) -> Value {
        Value::StringValue(self.clone())
    }
}

impl ToStoreValue for &str {
    fn to_store_value(&self) -> Value {
        Value::StringValue(self.to_string())
    }
}

impl ToStoreValue for i64 {
    fn to_store_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl ToStoreValue for u32 {
    fn to_store_value(&self) -> Value {
        Value::IntegerValue((*self as i64).to_string())
    }
}

impl ToStoreValue for f64 {
    fn to_store_value(&self) -> Value {
        Value::DoubleValue(*self)
    }
}

impl ToStoreValue for bool {
    fn to_store_value(&self) -> Value {
        Value::BooleanValue(*self)
    }
}

impl ToStoreValue for DateTime<Utc> {
    fn to_store_value(&self) -> Value {
        Value::TimestampValue(self.to_rfc3339())
    }
}

impl<T: ToStoreValue> ToStoreValue for Option<T> {
    fn to_store_value(&self) -> Value {
        match self {
            Some(v) => v.to_store_value(),
            None => Value::NullValue(()),
        }
    }
}

impl<T: ToStoreValue> ToStoreValue for Vec<T> {
    fn to_store_value(&self) -> Value {
        Value::ArrayValue(ArrayValue {
            values: Some(self.iter().map(|v| v.to_store_value()).collect()),
        })
    }
}

/// Convert a Firestore Value to a Rust type.
pub trait FromStoreValue: Sized {
    fn from_store_value(value: &Value) -> Option<Self>;
}

impl FromStoreValue for String {
    fn from_store_value(value: &Value) -> Option<Self> {
        match value {
            Value::StringValue(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromStoreValue for i64 {
    fn from_store_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse().ok(),
            Value::DoubleValue(f) => Some(*f as i64),
            _ => None,
        }
    }
}

impl FromStoreValue for f64 {
    fn from_store_value(value: &Value) -> Option<Self> {
        match value {
            Value::DoubleValue(f) => Some(*f),
            Value::IntegerValue(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl FromStoreValue for bool {
    fn from_store_value(value: &Value) -> Option<Self> {
        match value {
            Value::BooleanValue(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromStoreValue for DateTime<Utc> {
    fn from_store_value(value: &Value) -> Option<Self> {
        match value {
            Value::TimestampValue(s) => DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.into()),
            _ => None,
        }
    }
}

impl FromStoreValue for Vec<String> {
    fn from_store_value(value: &Value) -> Option<Self> {
        match value {
            Value::ArrayValue(arr) => Some(
                arr.values
                    .as_deref()
                    .unwrap_or(&[])
                    .iter()
                    .filter_map(String::from_store_value)
                    .collect(),
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_serde_shape() {
        let v = Value::StringValue("hello".to_string());
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"stringValue":"hello"}"#);

        let v = Value::IntegerValue("42".to_string());
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"integerValue":"42"}"#);
    }

    #[test]
    fn test_string_array_round_trip() {
        let keys = vec!["videos/j1/720p.mp4".to_string(), "videos/j1/480p.mp4".to_string()];
        let value = keys.to_store_value();
        let back = Vec::<String>::from_store_value(&value).unwrap();
        assert_eq!(back, keys);
    }

    #[test]
    fn test_doc_id_from_name() {
        let doc = Document {
            name: Some("projects/p/databases/(default)/documents/transcodingJobs/j1".to_string()),
            fields: None,
            create_time: None,
            update_time: None,
        };
        assert_eq!(doc.doc_id(), Some("j1"));
    }

    #[test]
    fn test_equal_filter_shape() {
        let filter = Filter::equal("userId", Value::StringValue("u1".to_string()));
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["fieldFilter"]["op"], "EQUAL");
        assert_eq!(json["fieldFilter"]["field"]["fieldPath"], "userId");
    }
}
