//! Creation-time cleanup of identifiers the appliance assigns itself
//!
//! When a profile asks the appliance to generate MACs, WWNs or serial
//! numbers, any concrete values left in the document (often copied from
//! another profile) make creation fail. They are dropped here.

use serde_json::{Map, Value};

use crate::document::{ProfileDocument, keys};

const GENERATED: &[&str] = &["Virtual", "Physical"];

fn is_generated(record: &Map<String, Value>, key: &str) -> bool {
    record
        .get(key)
        .and_then(Value::as_str)
        .is_some_and(|kind| GENERATED.contains(&kind))
}

fn records_mut<'a>(
    parent: Option<&'a mut Value>,
) -> impl Iterator<Item = &'a mut Map<String, Value>> {
    parent
        .and_then(Value::as_array_mut)
        .into_iter()
        .flat_map(|items| items.iter_mut().filter_map(Value::as_object_mut))
}

/// Removes values that conflict with appliance-generated identifiers.
pub fn remove_inconsistent_data(profile: &mut ProfileDocument) {
    let generated_macs = is_generated(profile, keys::MAC_TYPE);

    for connection in records_mut(profile.get_mut(keys::CONNECTIONS)) {
        if generated_macs {
            connection.remove("mac");
        }
        if is_generated(connection, "wwpnType") {
            connection.remove("wwnn");
            connection.remove("wwpn");
        }
    }

    if is_generated(profile, keys::SERIAL_NUMBER_TYPE) {
        profile.remove(keys::UUID);
        profile.remove(keys::SERIAL_NUMBER);
    }

    if let Some(Value::Object(local_storage)) = profile.get_mut(keys::LOCAL_STORAGE) {
        for controller in records_mut(local_storage.get_mut(keys::CONTROLLERS)) {
            for drive in records_mut(controller.get_mut(keys::LOGICAL_DRIVES)) {
                drive.remove("driveNumber");
            }
        }
    }

    if let Some(Value::Object(san_storage)) = profile.get_mut(keys::SAN_STORAGE) {
        for attachment in records_mut(san_storage.get_mut(keys::VOLUME_ATTACHMENTS)) {
            if attachment.get("lunType").and_then(Value::as_str) == Some("Auto") {
                attachment.remove("lun");
            }
        }
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
    fn test_generated_macs_and_wwns_are_dropped() {
        let mut profile = doc(json!({
            "macType": "Virtual",
            "connections": [
                {"id": 1, "mac": "AA:BB", "wwpnType": "Physical", "wwnn": "10:00", "wwpn": "10:01"},
                {"id": 2, "mac": "CC:DD", "wwpnType": "UserDefined", "wwnn": "20:00", "wwpn": "20:01"}
            ]
        }));

        remove_inconsistent_data(&mut profile);

        assert_eq!(
            profile["connections"],
            json!([
                {"id": 1, "wwpnType": "Physical"},
                {"id": 2, "wwpnType": "UserDefined", "wwnn": "20:00", "wwpn": "20:01"}
            ])
        );
    }

    #[test]
    fn test_user_defined_identifiers_are_kept() {
        let mut profile = doc(json!({
            "macType": "UserDefined",
            "serialNumberType": "UserDefined",
            "serialNumber": "VCGGU8800W",
            "uuid": "1234",
            "connections": [{"id": 1, "mac": "AA:BB"}]
        }));
        let before = profile.clone();

        remove_inconsistent_data(&mut profile);

        assert_eq!(profile, before);
    }

    #[test]
    fn test_generated_serial_number_drops_uuid() {
        let mut profile = doc(json!({
            "serialNumberType": "Virtual",
            "serialNumber": "VCGGU8800W",
            "uuid": "1234"
        }));

        remove_inconsistent_data(&mut profile);

        assert_eq!(profile, doc(json!({"serialNumberType": "Virtual"})));
    }

    #[test]
    fn test_drive_numbers_and_auto_luns_are_dropped() {
        let mut profile = doc(json!({
            "localStorage": {"controllers": [
                {"deviceSlot": "Embedded", "logicalDrives": [{"name": "d1", "driveNumber": 1}]},
                {"deviceSlot": "Mezz 1", "logicalDrives": null}
            ]},
            "sanStorage": {"volumeAttachments": [
                {"id": 1, "lunType": "Auto", "lun": "1"},
                {"id": 2, "lunType": "Manual", "lun": "7"}
            ]}
        }));

        remove_inconsistent_data(&mut profile);

        assert_eq!(
            profile["localStorage"]["controllers"][0]["logicalDrives"],
            json!([{"name": "d1"}])
        );
        assert_eq!(
            profile["sanStorage"]["volumeAttachments"],
            json!([{"id": 1, "lunType": "Auto"}, {"id": 2, "lunType": "Manual", "lun": "7"}])
        );
    }
}
