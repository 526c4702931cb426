//! Recursive profile merging
//!
//! Combines the profile currently on the appliance with a partial desired
//! profile. Fields the desired document omits keep their existing value;
//! an explicit null clears the field. How each field merges is looked up
//! in [`rules`].

pub mod list;
pub mod rules;

use serde_json::{Map, Value};

use crate::document::{ProfileDocument, type_name};
use crate::error::MergeError;
use rules::{ListRule, Rule, child_path, rule_for};

pub use list::merge_list;

/// Merges `desired` onto `existing`.
///
/// Neither input is modified. The result contains every existing field,
/// with the desired fields merged in by their rules.
///
/// # Errors
/// Returns [`MergeError::ShapeMismatch`] when a field holds an object or a
/// list on one side and an incompatible type on the other.
///
/// # Example
/// ```ignore
/// let merged = merge(&existing, &desired)?;
/// ```
pub fn merge(
    existing: &ProfileDocument,
    desired: &ProfileDocument,
) -> Result<ProfileDocument, MergeError> {
    merge_object(existing, desired, "")
}

pub(crate) fn merge_object(
    existing: &Map<String, Value>,
    desired: &Map<String, Value>,
    path: &str,
) -> Result<Map<String, Value>, MergeError> {
    let mut merged = existing.clone();

    for (key, desired_value) in desired {
        let field_path = child_path(path, key);
        let value = merge_field(existing.get(key), desired_value, &field_path)?;
        merged.insert(key.clone(), value);
    }

    Ok(merged)
}

fn merge_field(
    existing: Option<&Value>,
    desired: &Value,
    path: &str,
) -> Result<Value, MergeError> {
    match rule_for(path) {
        Rule::Replace => Ok(desired.clone()),
        Rule::Object { cleared } => merge_object_field(existing, desired, cleared, path),
        Rule::List(rule) => merge_list_field(existing, desired, &rule, path),
    }
}

fn merge_object_field(
    existing: Option<&Value>,
    desired: &Value,
    cleared: Option<fn() -> Value>,
    path: &str,
) -> Result<Value, MergeError> {
    let clears = match desired {
        Value::Null => true,
        Value::Object(map) => map.is_empty() && cleared.is_some(),
        _ => false,
    };

    if clears {
        // A skeleton only replaces a field the profile already had.
        return Ok(match (cleared, existing) {
            (Some(skeleton), Some(_)) => skeleton(),
            _ => Value::Null,
        });
    }

    let Value::Object(desired_map) = desired else {
        return Err(mismatch(path, "object", desired));
    };

    match existing {
        None | Some(Value::Null) => Ok(desired.clone()),
        Some(Value::Object(existing_map)) => Ok(Value::Object(merge_object(
            existing_map,
            desired_map,
            path,
        )?)),
        Some(other) => Err(mismatch(path, "object", other)),
    }
}

fn merge_list_field(
    existing: Option<&Value>,
    desired: &Value,
    rule: &ListRule,
    path: &str,
) -> Result<Value, MergeError> {
    let desired_items = match desired {
        Value::Null => return Ok(Value::Array(Vec::new())),
        Value::Array(items) if items.is_empty() => return Ok(Value::Array(Vec::new())),
        Value::Array(items) => items,
        other => return Err(mismatch(path, "list", other)),
    };

    let existing_items: &[Value] = match existing {
        None | Some(Value::Null) => &[],
        Some(Value::Array(items)) => items,
        Some(other) => return Err(mismatch(path, "list", other)),
    };

    Ok(Value::Array(merge_list(
        existing_items,
        desired_items,
        rule,
        path,
    )?))
}

fn mismatch(path: &str, expected: &'static str, found: &Value) -> MergeError {
    MergeError::ShapeMismatch {
        path: path.to_string(),
        expected,
        found: type_name(found),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> ProfileDocument {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_merge_with_empty_desired_is_identity() {
        let existing = doc(json!({"name": "web", "bios": {"manageBios": false}}));

        assert_eq!(merge(&existing, &ProfileDocument::new()).unwrap(), existing);
    }

    #[test]
    fn test_omitted_keeps_and_null_clears() {
        let existing = doc(json!({"name": "web", "bios": {"manageBios": true}, "boot": {"order": []}}));
        let desired = doc(json!({"bios": null}));

        let merged = merge(&existing, &desired).unwrap();

        assert_eq!(merged["bios"], Value::Null);
        assert_eq!(merged["boot"], json!({"order": []}));
    }

    #[test]
    fn test_unlisted_objects_are_replaced_wholesale() {
        let existing = doc(json!({"firmware": {"manageFirmware": false, "forceInstallFirmware": false}}));
        let desired = doc(json!({"firmware": {"manageFirmware": true}}));

        let merged = merge(&existing, &desired).unwrap();

        assert_eq!(merged["firmware"], json!({"manageFirmware": true}));
    }

    #[test]
    fn test_partial_bios_keeps_existing_settings() {
        let existing = doc(json!({"bios": {"manageBios": false, "overriddenSettings": []}}));
        let desired = doc(json!({"bios": {"newField": "123"}}));

        let merged = merge(&existing, &desired).unwrap();

        assert_eq!(
            merged["bios"],
            json!({"manageBios": false, "overriddenSettings": [], "newField": "123"})
        );
    }

    #[test]
    fn test_nested_connection_boot_is_merged() {
        let existing = doc(json!({"connections": [
            {"id": 1, "mac": "AA", "boot": {"priority": "NotBootable", "chapLevel": "none"}}
        ]}));
        let desired = doc(json!({"connections": [{"id": 1, "boot": {"priority": "Primary"}}]}));

        let merged = merge(&existing, &desired).unwrap();

        assert_eq!(
            merged["connections"],
            json!([{"id": 1, "mac": "AA", "boot": {"priority": "Primary", "chapLevel": "none"}}])
        );
    }

    #[test]
    fn test_clearing_storage_uses_skeleton_only_when_present() {
        let with_storage = doc(json!({"localStorage": {"controllers": [{"deviceSlot": "Embedded"}]}}));
        let basic = doc(json!({"name": "basic"}));
        let desired = doc(json!({"localStorage": null, "sanStorage": {}}));

        let merged = merge(&with_storage, &desired).unwrap();
        assert_eq!(
            merged["localStorage"],
            json!({"sasLogicalJBODs": [], "controllers": []})
        );
        assert_eq!(merged["sanStorage"], Value::Null);

        let merged = merge(&basic, &desired).unwrap();
        assert_eq!(merged["localStorage"], Value::Null);
    }

    #[test]
    fn test_shape_mismatch_reports_path() {
        let existing = doc(json!({"sanStorage": {"volumeAttachments": {"id": 1}}}));
        let desired = doc(json!({"sanStorage": {"volumeAttachments": [{"id": 1}]}}));

        let err = merge(&existing, &desired).unwrap_err();

        assert_eq!(
            err.to_string(),
            "shape mismatch at 'sanStorage.volumeAttachments': expected list, found object"
        );
    }

    #[test]
    fn test_merge_is_idempotent_for_storage() {
        let existing = doc(json!({
            "localStorage": {
                "sasLogicalJBODs": [{"id": 2, "uri": "/b"}, {"id": 1, "uri": "/a"}],
                "controllers": [{"deviceSlot": "Mezz 1", "logicalDrives": [{"name": "d1", "raidLevel": "RAID1"}]}]
            }
        }));
        let desired = doc(json!({
            "localStorage": {
                "sasLogicalJBODs": [{"id": 1, "sasLogicalJBODUri": null}, {"id": 2}],
                "controllers": [{"deviceSlot": "Mezz 1", "logicalDrives": [{"name": "d1", "raidLevel": "RAID0"}]}]
            }
        }));

        let once = merge(&existing, &desired).unwrap();
        let twice = merge(&once, &desired).unwrap();

        assert_eq!(once, twice);
    }
}
