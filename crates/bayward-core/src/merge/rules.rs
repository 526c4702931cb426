//! Per-field merge rules
//!
//! Paths are dotted field names from the profile root. A `[]` suffix
//! addresses every record of a list, so `connections[].boot` is the boot
//! object inside each connection. Fields without an entry are replaced
//! wholesale by the desired value.

use serde_json::{Value, json};

use crate::document::keys;

/// How list records are paired between the existing and desired lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Records are paired on a single identity field.
    Field(&'static str),
    /// The first field that every desired record carries a value for.
    ///
    /// When no candidate qualifies the records are paired by position.
    FirstComplete(&'static [&'static str]),
}

/// Merge behavior for a keyed list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListRule {
    pub key: KeyStrategy,
    /// Field the merged list is sorted by, if any.
    pub sort_by: Option<&'static str>,
    /// Fields dropped from a desired record when they are null, so the
    /// existing value survives.
    pub ignore_when_null: &'static [&'static str],
    /// Keep the existing list verbatim when the merge only reorders it.
    pub keep_order_when_unchanged: bool,
}

/// The merge rule for one field.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// The desired value overwrites the existing one.
    Replace,
    /// Merge recursively. `cleared` builds the skeleton used when the
    /// desired value clears a field the existing profile carries.
    Object { cleared: Option<fn() -> Value> },
    /// Merge as a keyed list.
    List(ListRule),
}

struct Entry {
    path: &'static str,
    rule: Rule,
}

const CONNECTIONS: &str = keys::CONNECTIONS;
const CONNECTION_BOOT: &str = "connections[].boot";
const SAN_STORAGE: &str = keys::SAN_STORAGE;
const VOLUME_ATTACHMENTS: &str = "sanStorage.volumeAttachments";
const STORAGE_PATHS: &str = "sanStorage.volumeAttachments[].storagePaths";
const LOCAL_STORAGE: &str = keys::LOCAL_STORAGE;
const SAS_LOGICAL_JBODS: &str = "localStorage.sasLogicalJBODs";
const CONTROLLERS: &str = "localStorage.controllers";
const LOGICAL_DRIVES: &str = "localStorage.controllers[].logicalDrives";
const OS_DEPLOYMENT: &str = keys::OS_DEPLOYMENT;
const OS_CUSTOM_ATTRIBUTES: &str = "osDeploymentSettings.osCustomAttributes";

fn cleared_san_storage() -> Value {
    json!({"manageSanStorage": false, "volumeAttachments": []})
}

fn cleared_local_storage() -> Value {
    json!({"sasLogicalJBODs": [], "controllers": []})
}

const fn keyed(field: &'static str) -> ListRule {
    ListRule {
        key: KeyStrategy::Field(field),
        sort_by: None,
        ignore_when_null: &[],
        keep_order_when_unchanged: false,
    }
}

static RULES: &[Entry] = &[
    Entry {
        path: keys::BIOS,
        rule: Rule::Object { cleared: None },
    },
    Entry {
        path: keys::BOOT,
        rule: Rule::Object { cleared: None },
    },
    Entry {
        path: keys::BOOT_MODE,
        rule: Rule::Object { cleared: None },
    },
    Entry {
        path: CONNECTIONS,
        rule: Rule::List(keyed("id")),
    },
    Entry {
        path: CONNECTION_BOOT,
        rule: Rule::Object { cleared: None },
    },
    Entry {
        path: SAN_STORAGE,
        rule: Rule::Object {
            cleared: Some(cleared_san_storage),
        },
    },
    Entry {
        path: VOLUME_ATTACHMENTS,
        rule: Rule::List(keyed("id")),
    },
    Entry {
        path: STORAGE_PATHS,
        rule: Rule::List(ListRule {
            sort_by: Some("connectionId"),
            ..keyed("connectionId")
        }),
    },
    Entry {
        path: LOCAL_STORAGE,
        rule: Rule::Object {
            cleared: Some(cleared_local_storage),
        },
    },
    Entry {
        path: SAS_LOGICAL_JBODS,
        rule: Rule::List(ListRule {
            sort_by: Some("id"),
            ignore_when_null: &["sasLogicalJBODUri"],
            ..keyed("id")
        }),
    },
    Entry {
        path: CONTROLLERS,
        rule: Rule::List(ListRule {
            sort_by: Some("deviceSlot"),
            ..keyed("deviceSlot")
        }),
    },
    Entry {
        path: LOGICAL_DRIVES,
        rule: Rule::List(ListRule {
            key: KeyStrategy::FirstComplete(&["name", "sasLogicalJBODId"]),
            sort_by: None,
            ignore_when_null: &[],
            keep_order_when_unchanged: false,
        }),
    },
    Entry {
        path: OS_DEPLOYMENT,
        rule: Rule::Object { cleared: None },
    },
    Entry {
        path: OS_CUSTOM_ATTRIBUTES,
        rule: Rule::List(ListRule {
            keep_order_when_unchanged: true,
            ..keyed("name")
        }),
    },
];

/// Looks up the rule for a field path.
pub fn rule_for(path: &str) -> Rule {
    RULES
        .iter()
        .find(|entry| entry.path == path)
        .map(|entry| entry.rule)
        .unwrap_or(Rule::Replace)
}

/// Path of a named child field.
pub fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// Path addressing each record of a list.
pub fn item_path(list: &str) -> String {
    format!("{list}[]")
}
