//! Structural equality used to tell real value changes from no-op refreshes.
//!
//! Objects compare by key set and recursively compared values, independent of key order. Arrays
//! compare element-wise in order. Numbers compare by numeric value, so `1` and `1.0` are equal.
//! Values of different kinds are never equal.
use serde_json::{Map, Number, Value};

use crate::FlagValue;

/// Deep structural equality of two JSON values.
///
/// ```
/// # use edgeflags::deep_equal;
/// # use serde_json::json;
/// assert!(deep_equal(&json!({"a": 1, "b": 2}), &json!({"b": 2, "a": 1})));
/// assert!(!deep_equal(&json!([1, 2]), &json!([2, 1])));
/// ```
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| deep_equal(a, b))
        }
        (Value::Object(a), Value::Object(b)) => objects_equal(a, b),
        _ => false,
    }
}

/// Deep structural equality of two flag values.
pub fn flags_equal(a: &FlagValue, b: &FlagValue) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }
    match (a, b) {
        (FlagValue::Boolean(a), FlagValue::Boolean(b)) => a == b,
        (FlagValue::Number(a), FlagValue::Number(b)) => a == b,
        (FlagValue::String(a), FlagValue::String(b)) => a == b,
        (FlagValue::Object(a), FlagValue::Object(b)) => objects_equal(a, b),
        _ => false,
    }
}

/// Compare a possibly-absent value with another. Absent equals only absent.
pub(crate) fn optional_equal<T>(a: Option<&T>, b: Option<&T>, eq: fn(&T, &T) -> bool) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => eq(a, b),
        _ => false,
    }
}

fn objects_equal(a: &Map<String, Value>, b: &Map<String, Value>) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(key, a)| b.get(key).is_some_and(|b| deep_equal(a, b)))
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return a == b;
    }
    a.as_f64() == b.as_f64()
}
