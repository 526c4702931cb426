//! Change detection between profiles
//!
//! The appliance returns some lists in an order unrelated to the one the
//! caller sent. [`normalize`] puts those lists into a canonical order and
//! [`equivalent`] compares the results with the appliance's own notion of
//! equality: a missing field equals null and numbers compare by value.

use serde_json::Value;

use crate::document::{ProfileDocument, keys, sort_records_by};

/// Lists with no intrinsic order, as (path segments, sort field).
///
/// A `[]` segment walks into every record of a list.
const CANONICAL_ORDER: &[(&[&str], &str)] = &[
    (
        &[
            keys::SAN_STORAGE,
            keys::VOLUME_ATTACHMENTS,
            "[]",
            keys::STORAGE_PATHS,
        ],
        "connectionId",
    ),
    (&[keys::LOCAL_STORAGE, keys::SAS_LOGICAL_JBODS], "id"),
    (&[keys::LOCAL_STORAGE, keys::CONTROLLERS], "deviceSlot"),
];

/// Returns a copy of `profile` with order-insensitive lists sorted.
///
/// The sort is stable, so records sharing a key keep their relative order.
pub fn normalize(profile: &ProfileDocument) -> ProfileDocument {
    let mut root = Value::Object(profile.clone());
    for (segments, field) in CANONICAL_ORDER {
        sort_at(&mut root, segments, field);
    }

    match root {
        Value::Object(map) => map,
        _ => profile.clone(),
    }
}

fn sort_at(value: &mut Value, segments: &[&str], field: &str) {
    let Some((head, rest)) = segments.split_first() else {
        if let Value::Array(records) = value {
            sort_records_by(records, field);
        }
        return;
    };

    if *head == "[]" {
        if let Value::Array(records) = value {
            for record in records {
                sort_at(record, rest, field);
            }
        }
    } else if let Some(child) = value.get_mut(*head) {
        sort_at(child, rest, field);
    }
}

/// True when two documents describe the same profile.
pub fn profiles_equivalent(left: &ProfileDocument, right: &ProfileDocument) -> bool {
    objects_equivalent(left, right)
}

/// Deep equality with appliance semantics.
///
/// * a missing key equals a key holding null
/// * scalars compare by canonical text, so `1` equals `1.0` and `"1"`
/// * lists compare element-wise, in order
pub fn equivalent(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Object(l), Value::Object(r)) => objects_equivalent(l, r),
        (Value::Array(l), Value::Array(r)) => {
            l.len() == r.len() && l.iter().zip(r).all(|(a, b)| equivalent(a, b))
        }
        (Value::Object(_) | Value::Array(_), _) | (_, Value::Object(_) | Value::Array(_)) => {
            false
        }
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (l, r) => canonical_scalar(l) == canonical_scalar(r),
    }
}

fn objects_equivalent(
    left: &serde_json::Map<String, Value>,
    right: &serde_json::Map<String, Value>,
) -> bool {
    let null = Value::Null;
    left.keys()
        .chain(right.keys())
        .all(|key| equivalent(left.get(key).unwrap_or(&null), right.get(key).unwrap_or(&null)))
}

fn canonical_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => match number.as_f64() {
            Some(float) if number.is_f64() && float.fract() == 0.0 && float.abs() < 1e15 => {
                format!("{}", float as i64)
            }
            _ => number.to_string(),
        },
        other => other.to_string(),
    }
}
