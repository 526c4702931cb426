//! Profile documents and field-presence helpers
//!
//! A profile is an untyped JSON object whose schema belongs to the
//! appliance. Every component reads it through the helpers here so the
//! three states of a field (omitted, null, present) are never conflated.

use std::cmp::Ordering;

use anyhow::Context;
use serde_json::{Map, Value};

/// A server profile as exchanged with the appliance.
pub type ProfileDocument = Map<String, Value>;

/// Well-known profile field names.
pub mod keys {
    pub const NAME: &str = "name";
    pub const URI: &str = "uri";
    pub const SERVER_HARDWARE_URI: &str = "serverHardwareUri";
    pub const SERVER_HARDWARE_TYPE_URI: &str = "serverHardwareTypeUri";
    pub const ENCLOSURE_GROUP_URI: &str = "enclosureGroupUri";
    pub const TEMPLATE_URI: &str = "serverProfileTemplateUri";
    pub const TEMPLATE_COMPLIANCE: &str = "templateCompliance";
    pub const SERIAL_NUMBER: &str = "serialNumber";
    pub const SERIAL_NUMBER_TYPE: &str = "serialNumberType";
    pub const UUID: &str = "uuid";
    pub const MAC_TYPE: &str = "macType";

    pub const BIOS: &str = "bios";
    pub const BOOT: &str = "boot";
    pub const BOOT_MODE: &str = "bootMode";
    pub const CONNECTIONS: &str = "connections";
    pub const SAN_STORAGE: &str = "sanStorage";
    pub const VOLUME_ATTACHMENTS: &str = "volumeAttachments";
    pub const STORAGE_PATHS: &str = "storagePaths";
    pub const LOCAL_STORAGE: &str = "localStorage";
    pub const SAS_LOGICAL_JBODS: &str = "sasLogicalJBODs";
    pub const CONTROLLERS: &str = "controllers";
    pub const LOGICAL_DRIVES: &str = "logicalDrives";
    pub const OS_DEPLOYMENT: &str = "osDeploymentSettings";
    pub const OS_CUSTOM_ATTRIBUTES: &str = "osCustomAttributes";

    /// Directive naming a template; never sent to the appliance.
    pub const DIRECTIVE_TEMPLATE: &str = "server_template";
    /// Directive naming a server hardware; never sent to the appliance.
    pub const DIRECTIVE_HARDWARE: &str = "server_hardware";
}

/// The state of a single field in a document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Presence<'a> {
    /// The key is not in the document.
    Omitted,
    /// The key is present with an explicit null.
    Null,
    /// The key carries a value.
    Present(&'a Value),
}

impl<'a> Presence<'a> {
    pub fn of(document: &'a ProfileDocument, key: &str) -> Self {
        Self::from_option(document.get(key))
    }

    pub fn from_option(value: Option<&'a Value>) -> Self {
        match value {
            None => Presence::Omitted,
            Some(Value::Null) => Presence::Null,
            Some(value) => Presence::Present(value),
        }
    }

    pub fn value(&self) -> Option<&'a Value> {
        match self {
            Presence::Present(value) => Some(value),
            _ => None,
        }
    }
}

/// Returns the string value of `key` when present and non-empty.
pub fn str_field<'a>(document: &'a ProfileDocument, key: &str) -> Option<&'a str> {
    document
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// True when a record carries a usable value for `key`.
///
/// Null and the empty string do not count.
pub fn has_value(record: &Value, key: &str) -> bool {
    match record.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::String(value)) => !value.is_empty(),
        Some(_) => true,
    }
}

/// Total order used when sorting records by a field.
///
/// Records missing the field sort first; numbers compare numerically and
/// strings lexicographically. Mixed types fall back to their rendered text.
pub fn compare_field(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(Value::Number(l)), Some(Value::Number(r))) => match (l.as_f64(), r.as_f64()) {
            (Some(l), Some(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
            _ => l.to_string().cmp(&r.to_string()),
        },
        (Some(Value::String(l)), Some(Value::String(r))) => l.cmp(r),
        (Some(l), Some(r)) => l.to_string().cmp(&r.to_string()),
    }
}

/// Stable in-place sort of a list of records by one field.
pub fn sort_records_by(records: &mut [Value], field: &str) {
    records.sort_by(|a, b| compare_field(a.get(field), b.get(field)));
}

/// Parses a JSON text that must hold an object.
pub fn parse_document(text: &str) -> anyhow::Result<ProfileDocument> {
    let value: Value = serde_json::from_str(text).context("Failed to parse profile JSON")?;
    match value {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!(
            "Profile JSON must be an object, found {}",
            type_name(&other)
        ),
    }
}

/// Human-readable name of a JSON value's type.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
