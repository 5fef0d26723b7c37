//! Bidirectional conversion between JSON documents and Firestore values.
//!
//! API routes persist dynamic JSON payloads; this codec marshals them onto
//! the tagged wire format and back. Both directions are exhaustive matches
//! over [`Value`].

use std::collections::HashMap;

use serde_json::{Map, Number};

use crate::types::{ArrayValue, MapValue, Value};

/// Encode one JSON value onto the wire format.
///
/// Numbers become `integerValue` when representable as `i64`, otherwise
/// `doubleValue`. Objects and arrays recurse.
pub fn encode_value(native: &serde_json::Value) -> Value {
    match native {
        serde_json::Value::Null => Value::NullValue(()),
        serde_json::Value::Bool(b) => Value::BooleanValue(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::IntegerValue(i.to_string()),
            None => Value::DoubleValue(n.as_f64().unwrap_or(0.0)),
        },
        serde_json::Value::String(s) => Value::StringValue(s.clone()),
        serde_json::Value::Array(items) => Value::ArrayValue(ArrayValue {
            values: Some(items.iter().map(encode_value).collect()),
        }),
        serde_json::Value::Object(map) => Value::MapValue(MapValue {
            fields: Some(
                map.iter()
                    .map(|(k, v)| (k.clone(), encode_value(v)))
                    .collect(),
            ),
        }),
    }
}

/// Decode one wire value back to JSON.
///
/// Timestamps decode to their RFC 3339 string. Wire kinds outside the
/// document model (bytes, references, geo points) decode to `null`, as does
/// an unparseable integer payload.
pub fn decode_value(value: &Value) -> serde_json::Value {
    match value {
        Value::NullValue(()) => serde_json::Value::Null,
        Value::BooleanValue(b) => serde_json::Value::Bool(*b),
        Value::IntegerValue(s) => s
            .parse::<i64>()
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
        Value::DoubleValue(f) => Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::TimestampValue(s) | Value::StringValue(s) => {
            serde_json::Value::String(s.clone())
        }
        Value::ArrayValue(array) => serde_json::Value::Array(
            array
                .values
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(decode_value)
                .collect(),
        ),
        Value::MapValue(map) => {
            let mut decoded = Map::new();
            if let Some(fields) = &map.fields {
                for (key, value) in fields {
                    decoded.insert(key.clone(), decode_value(value));
                }
            }
            serde_json::Value::Object(decoded)
        }
        Value::BytesValue(_) | Value::ReferenceValue(_) | Value::GeoPointValue(_) => {
            serde_json::Value::Null
        }
    }
}

/// Encode a top-level document body.
pub fn encode_fields(data: &Map<String, serde_json::Value>) -> HashMap<String, Value> {
    data.iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

/// Decode a top-level document body.
pub fn decode_fields(fields: &HashMap<String, Value>) -> Map<String, serde_json::Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), decode_value(v)))
        .collect()
}
