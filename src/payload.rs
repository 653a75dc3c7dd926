// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Collector request bodies.
//!
//! Traces go out as newline-delimited JSON objects, logs and RUM as a single
//! JSON array. Stored records are already serialized JSON objects, so
//! encoding is framing only.

use crate::error::{PayloadError, PayloadResult};
use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayloadFormat {
    NdJson,
    JsonArray,
}

impl PayloadFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            PayloadFormat::NdJson => "text/plain;charset=UTF-8",
            PayloadFormat::JsonArray => "application/json",
        }
    }

    /// Guesses the format of a recorded body from its first significant byte.
    pub fn detect(body: &[u8]) -> Self {
        match body.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'[') => PayloadFormat::JsonArray,
            _ => PayloadFormat::NdJson,
        }
    }
}

/// Joins pre-serialized records into one request body.
pub fn encode(format: PayloadFormat, records: &[Vec<u8>]) -> Vec<u8> {
    let content: usize = records.iter().map(Vec::len).sum();
    let mut body = Vec::with_capacity(content + records.len() + 2);

    match format {
        PayloadFormat::NdJson => {
            for (i, record) in records.iter().enumerate() {
                if i > 0 {
                    body.push(b'\n');
                }
                body.extend_from_slice(record);
            }
        }
        PayloadFormat::JsonArray => {
            body.push(b'[');
            for (i, record) in records.iter().enumerate() {
                if i > 0 {
                    body.push(b',');
                }
                body.extend_from_slice(record);
            }
            body.push(b']');
        }
    }

    body
}

pub fn decode<T: DeserializeOwned>(format: PayloadFormat, body: &[u8]) -> PayloadResult<Vec<T>> {
    match format {
        PayloadFormat::JsonArray => Ok(serde_json::from_slice(body)?),
        PayloadFormat::NdJson => {
            let mut items = Vec::new();
            for (index, line) in body.split(|b| *b == b'\n').enumerate() {
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                let item = serde_json::from_slice(line)
                    .map_err(|source| PayloadError::Line { line: index + 1, source })?;
                items.push(item);
            }
            Ok(items)
        }
    }
}

/// Untyped decode; every item must be a JSON object.
pub fn decode_values(format: PayloadFormat, body: &[u8]) -> PayloadResult<Vec<Value>> {
    let values: Vec<Value> = decode(format, body)?;
    if values.iter().any(|v| !v.is_object()) {
        return Err(PayloadError::NotAnObject);
    }
    Ok(values)
}

/// Value at a dotted key path, e.g. `"_dd.session.plan"`.
///
/// Keys that themselves contain dots (`"dd.trace_id"` on logs) are matched
/// before descending.
pub fn value_at<'a>(value: &'a Value, key_path: &str) -> Option<&'a Value> {
    if let Some(found) = value.get(key_path) {
        return Some(found);
    }
    let (head, rest) = key_path.split_once('.')?;
    value_at(value.get(head)?, rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(PayloadFormat::detect(b"  [{}]"), PayloadFormat::JsonArray);
        assert_eq!(PayloadFormat::detect(b"{}\n{}"), PayloadFormat::NdJson);
        assert_eq!(PayloadFormat::detect(b""), PayloadFormat::NdJson);
    }

    #[test]
    fn test_empty_batch_encodings() {
        assert_eq!(encode(PayloadFormat::JsonArray, &[]), b"[]".to_vec());
        assert!(encode(PayloadFormat::NdJson, &[]).is_empty());
    }

    #[test]
    fn test_value_at_prefers_dotted_keys() {
        let value: Value = serde_json::json!({
            "dd.trace_id": "42",
            "_dd": { "session": { "plan": 1 } }
        });
        assert_eq!(value_at(&value, "dd.trace_id"), Some(&Value::from("42")));
        assert_eq!(value_at(&value, "_dd.session.plan"), Some(&Value::from(1)));
        assert_eq!(value_at(&value, "_dd.missing"), None);
    }
}
