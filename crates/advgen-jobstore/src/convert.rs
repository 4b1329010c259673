//! Bridges `serde_json::Value` and Firestore's typed [`Value`] wire format so
//! [`crate::job_repo::JobRepository`] and [`crate::scene_repo::SceneRepository`]
//! can convert whole `advgen_models` structs instead of hand-assembling a
//! `HashMap<String, Value>` field by field.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{ArrayValue, Document, MapValue, Value};

/// Serialize `value` to Firestore document fields.
pub fn to_fields<T: Serialize>(value: &T) -> FirestoreResult<HashMap<String, Value>> {
    let json = serde_json::to_value(value)
        .map_err(|e| FirestoreError::SerializationError(e.to_string()))?;

    match json_to_value(json) {
        Value::MapValue(MapValue { fields: Some(fields) }) => Ok(fields),
        _ => Err(FirestoreError::SerializationError(
            "expected a JSON object at the document root".into(),
        )),
    }
}

/// Deserialize a document's fields back into `T`.
pub fn from_document<T: DeserializeOwned>(doc: &Document) -> FirestoreResult<T> {
    let fields = doc
        .fields
        .clone()
        .ok_or_else(|| FirestoreError::InvalidResponse("document has no fields".into()))?;

    let json = value_to_json(&Value::MapValue(MapValue { fields: Some(fields) }));
    serde_json::from_value(json).map_err(|e| FirestoreError::SerializationError(e.to_string()))
}

fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::NullValue(()),
        serde_json::Value::Bool(b) => Value::BooleanValue(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::IntegerValue(i.to_string())
            } else {
                Value::DoubleValue(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Value::StringValue(s),
        serde_json::Value::Array(items) => Value::ArrayValue(ArrayValue {
            values: Some(items.into_iter().map(json_to_value).collect()),
        }),
        serde_json::Value::Object(map) => Value::MapValue(MapValue {
            fields: Some(
                map.into_iter()
                    .map(|(k, v)| (k, json_to_value(v)))
                    .collect(),
            ),
        }),
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::NullValue(()) => serde_json::Value::Null,
        Value::BooleanValue(b) => serde_json::Value::Bool(*b),
        Value::IntegerValue(s) => s
            .parse::<i64>()
            .map(|i| serde_json::Value::Number(i.into()))
            .unwrap_or(serde_json::Value::Null),
        Value::DoubleValue(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::TimestampValue(s) | Value::StringValue(s) | Value::BytesValue(s) | Value::ReferenceValue(s) => {
            serde_json::Value::String(s.clone())
        }
        Value::GeoPointValue(g) => serde_json::json!({ "latitude": g.latitude, "longitude": g.longitude }),
        Value::ArrayValue(ArrayValue { values }) => serde_json::Value::Array(
            values
                .as_ref()
                .map(|v| v.iter().map(value_to_json).collect())
                .unwrap_or_default(),
        ),
        Value::MapValue(MapValue { fields }) => serde_json::Value::Object(
            fields
                .as_ref()
                .map(|f| f.iter().map(|(k, v)| (k.clone(), value_to_json(v))).collect())
                .unwrap_or_default(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        count: u32,
        tags: Vec<String>,
        nested: Nested,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Nested {
        flag: bool,
    }

    #[test]
    fn test_roundtrip_through_firestore_values() {
        let sample = Sample {
            name: "scene-0".into(),
            count: 3,
            tags: vec!["a".into(), "b".into()],
            nested: Nested { flag: true },
        };

        let fields = to_fields(&sample).unwrap();
        let doc = Document {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: None,
        };

        let back: Sample = from_document(&doc).unwrap();
        assert_eq!(sample, back);
    }
}
