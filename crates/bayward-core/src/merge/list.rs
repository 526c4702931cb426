//! Keyed-list merging
//!
//! The desired list decides membership and order: records it omits are
//! dropped, records it names are merged into their existing counterpart,
//! and records without a counterpart are taken as given.

use serde_json::{Map, Value};

use super::merge_object;
use super::rules::{KeyStrategy, ListRule, item_path};
use crate::compare::equivalent;
use crate::document::{has_value, sort_records_by, type_name};
use crate::error::MergeError;

/// Merges two lists of records according to `rule`.
///
/// # Arguments
/// * `existing` - Records currently on the appliance
/// * `desired` - Records the caller asked for
/// * `rule` - Pairing, sorting and null-handling behavior
/// * `path` - Field path of the list, used in error messages
pub fn merge_list(
    existing: &[Value],
    desired: &[Value],
    rule: &ListRule,
    path: &str,
) -> Result<Vec<Value>, MergeError> {
    let record_path = item_path(path);
    let key = resolve_key(desired, rule.key);
    let mut claimed = vec![false; existing.len()];
    let mut merged = Vec::with_capacity(desired.len());

    for (index, record) in desired.iter().enumerate() {
        let desired_record = as_record(record, &record_path)?;

        let counterpart = match key {
            Some(field) => find_counterpart(existing, &claimed, field, record),
            None => (index < existing.len() && !claimed[index]).then_some(index),
        };

        match counterpart {
            Some(position) => {
                claimed[position] = true;
                let existing_record = as_record(&existing[position], &record_path)?;
                let desired_record = strip_nulls(desired_record, rule.ignore_when_null);
                merged.push(Value::Object(merge_object(
                    existing_record,
                    &desired_record,
                    &record_path,
                )?));
            }
            None => merged.push(Value::Object(desired_record.clone())),
        }
    }

    if let Some(field) = rule.sort_by {
        sort_records_by(&mut merged, field);
    }

    if rule.keep_order_when_unchanged && is_permutation(existing, &merged) {
        return Ok(existing.to_vec());
    }

    Ok(merged)
}

/// Picks the identity field for this merge, or `None` for positional pairing.
fn resolve_key(desired: &[Value], strategy: KeyStrategy) -> Option<&'static str> {
    match strategy {
        KeyStrategy::Field(field) => Some(field),
        KeyStrategy::FirstComplete(candidates) => candidates
            .iter()
            .copied()
            .find(|field| desired.iter().all(|record| has_value(record, field))),
    }
}

fn find_counterpart(
    existing: &[Value],
    claimed: &[bool],
    field: &str,
    record: &Value,
) -> Option<usize> {
    if !has_value(record, field) {
        return None;
    }
    let wanted = record.get(field)?;

    existing.iter().enumerate().position(|(position, candidate)| {
        !claimed[position]
            && candidate
                .get(field)
                .is_some_and(|value| equivalent(value, wanted))
    })
}

fn as_record<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, MergeError> {
    value.as_object().ok_or_else(|| MergeError::ShapeMismatch {
        path: path.to_string(),
        expected: "object",
        found: type_name(value),
    })
}

fn strip_nulls(record: &Map<String, Value>, fields: &[&str]) -> Map<String, Value> {
    let mut record = record.clone();
    for field in fields {
        if record.get(*field).is_some_and(Value::is_null) {
            record.remove(*field);
        }
    }
    record
}

/// True when `merged` holds the same records as `existing` in any order.
fn is_permutation(existing: &[Value], merged: &[Value]) -> bool {
    if existing.len() != merged.len() {
        return false;
    }

    let mut used = vec![false; existing.len()];
    merged.iter().all(|record| {
        match existing
            .iter()
            .enumerate()
            .position(|(i, candidate)| !used[i] && equivalent(candidate, record))
        {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}
