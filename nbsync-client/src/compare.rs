//! Structural comparison between a remote resource and a write request.
//!
//! `desired` is treated as a subset: every field it carries must match the
//! corresponding field of `existing`; fields only present on `existing` are
//! ignored. Nautobot answers with nested objects where requests carry bare
//! values, so two asymmetries are reconciled:
//!
//! - `{"id": "uuid", "name": ...}` vs `"uuid"` (foreign keys)
//! - `{"label": "SFP+ (10GE)", "value": "10gbase-x-sfpp"}` vs `"10gbase-x-sfpp"` (choices)
//!
//! `id` wins over `value` when a nested object has both. Anything else whose
//! shapes disagree compares unequal, which forces an update attempt.

use serde::Serialize;
use serde_json::{Map, Value};

/// Compare two serializable values. Returns `false` if either side fails to
/// serialize or is not a JSON object.
pub fn equal<E: Serialize, D: Serialize>(existing: &E, desired: &D) -> bool {
    let (Ok(existing), Ok(desired)) =
        (serde_json::to_value(existing), serde_json::to_value(desired))
    else {
        return false;
    };
    equal_json(&existing, &desired)
}

/// Compare two JSON documents. Both must be objects.
pub fn equal_json(existing: &Value, desired: &Value) -> bool {
    match (existing, desired) {
        (Value::Object(existing), Value::Object(desired)) => compare_maps(existing, desired),
        _ => false,
    }
}

fn compare_maps(existing: &Map<String, Value>, desired: &Map<String, Value>) -> bool {
    desired.iter().all(|(key, desired_value)| {
        existing
            .get(key)
            .is_some_and(|existing_value| compare_values(existing_value, desired_value))
    })
}

fn compare_values(existing: &Value, desired: &Value) -> bool {
    match (existing, desired) {
        (_, Value::Null) => existing.is_null(),
        (Value::Null, _) => false,
        (Value::Object(e), Value::Object(d)) => compare_maps(e, d),
        (Value::Object(e), d) if !d.is_array() => nested_matches_primitive(e, d),
        (e, Value::Object(d)) if !e.is_array() => nested_matches_primitive(d, e),
        (Value::Array(e), Value::Array(d)) => {
            e.len() == d.len() && e.iter().zip(d).all(|(e, d)| compare_values(e, d))
        }
        (Value::Array(_), _) | (_, Value::Array(_)) => false,
        (e, d) => compare_primitives(e, d),
    }
}

/// Match a nested reference object against a bare value via its `id`, falling
/// back to `value`.
fn nested_matches_primitive(nested: &Map<String, Value>, primitive: &Value) -> bool {
    if let Some(id) = nested.get("id") {
        return compare_primitives(id, primitive);
    }
    if let Some(value) = nested.get("value") {
        return compare_primitives(value, primitive);
    }
    false
}

fn compare_primitives(existing: &Value, desired: &Value) -> bool {
    match (existing, desired) {
        (Value::Number(e), Value::Number(d)) => {
            if let (Some(e), Some(d)) = (e.as_i64(), d.as_i64()) {
                return e == d;
            }
            if let (Some(e), Some(d)) = (e.as_u64(), d.as_u64()) {
                return e == d;
            }
            match (e.as_f64(), d.as_f64()) {
                (Some(e), Some(d)) => e == d,
                _ => false,
            }
        }
        (Value::String(e), Value::String(d)) => e == d,
        (Value::Bool(e), Value::Bool(d)) => e == d,
        _ => false,
    }
}
