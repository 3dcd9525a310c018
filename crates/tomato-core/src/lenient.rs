//! Per-field extraction from loosely typed JSON documents.
//!
//! Persisted and imported documents may be partial, hand-edited, or written
//! by older versions. Entities decode field by field so that one bad field
//! falls back to its default instead of discarding the whole document.

use serde_json::{Map, Value};

pub(crate) type Object = Map<String, Value>;

static EMPTY: std::sync::OnceLock<Object> = std::sync::OnceLock::new();

/// The value as an object, or an empty object for any other JSON type.
pub(crate) fn object(value: &Value) -> &Object {
    match value {
        Value::Object(map) => map,
        _ => EMPTY.get_or_init(Object::new),
    }
}

/// Non-negative integer, accepting integral floats (`1500.0`).
pub(crate) fn u64_field(obj: &Object, key: &str) -> Option<u64> {
    let value = obj.get(key)?;
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
            .map(|f| f as u64)
    })
}

/// Signed integer, accepting integral floats.
pub(crate) fn i64_field(obj: &Object, key: &str) -> Option<i64> {
    as_i64(obj.get(key)?)
}

pub(crate) fn as_i64(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

/// Strictly positive integer that fits in `u32`.
pub(crate) fn positive_u32(obj: &Object, key: &str) -> Option<u32> {
    u64_field(obj, key)
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
}

pub(crate) fn bool_field(obj: &Object, key: &str) -> Option<bool> {
    obj.get(key)?.as_bool()
}

pub(crate) fn str_field<'a>(obj: &'a Object, key: &str) -> Option<&'a str> {
    obj.get(key)?.as_str().filter(|s| !s.is_empty())
}

/// Deserialize a field with its own serde impl, dropping it on failure.
pub(crate) fn typed_field<T: serde::de::DeserializeOwned>(obj: &Object, key: &str) -> Option<T> {
    obj.get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}
