//! Name-to-URI resolution
//!
//! Callers may reference related resources by name. Before a profile is
//! merged or created, each `<thing>Name` field is looked up and replaced by
//! the matching `<thing>Uri` field.

use serde_json::{Map, Value};
use tracing::debug;

use crate::client::{ProfileService, ResourceKind};
use crate::document::{ProfileDocument, keys};
use crate::error::ReconcileError;

struct NameField {
    name: &'static str,
    uri: &'static str,
    /// Collections searched in order; the first hit wins.
    kinds: &'static [ResourceKind],
}

const ROOT_FIELDS: &[NameField] = &[
    NameField {
        name: "enclosureGroupName",
        uri: keys::ENCLOSURE_GROUP_URI,
        kinds: &[ResourceKind::EnclosureGroup],
    },
    NameField {
        name: "serverHardwareTypeName",
        uri: keys::SERVER_HARDWARE_TYPE_URI,
        kinds: &[ResourceKind::ServerHardwareType],
    },
    NameField {
        name: "enclosureName",
        uri: "enclosureUri",
        kinds: &[ResourceKind::Enclosure],
    },
];

const OS_DEPLOYMENT_FIELDS: &[NameField] = &[NameField {
    name: "osDeploymentPlanName",
    uri: "osDeploymentPlanUri",
    kinds: &[ResourceKind::OsDeploymentPlan],
}];

const CONNECTION_FIELDS: &[NameField] = &[NameField {
    name: "networkName",
    uri: "networkUri",
    kinds: &[ResourceKind::FcNetwork, ResourceKind::EthernetNetwork],
}];

const VOLUME_ATTACHMENT_FIELDS: &[NameField] = &[
    NameField {
        name: "volumeName",
        uri: "volumeUri",
        kinds: &[ResourceKind::Volume],
    },
    NameField {
        name: "volumeStoragePoolName",
        uri: "volumeStoragePoolUri",
        kinds: &[ResourceKind::StoragePool],
    },
    NameField {
        name: "volumeStorageSystemName",
        uri: "volumeStorageSystemUri",
        kinds: &[ResourceKind::StorageSystem],
    },
];

/// Replaces resource names in `desired` with their URIs.
///
/// # Errors
/// [`ReconcileError::NotFound`] for the first name that matches nothing.
pub fn replace_names_by_uris<S: ProfileService + ?Sized>(
    service: &S,
    desired: &mut ProfileDocument,
) -> Result<(), ReconcileError> {
    if let Some(Value::Object(os_deployment)) = desired.get_mut(keys::OS_DEPLOYMENT) {
        replace_fields(service, os_deployment, OS_DEPLOYMENT_FIELDS)?;
    }

    replace_fields(service, desired, ROOT_FIELDS)?;

    if let Some(Value::Array(connections)) = desired.get_mut(keys::CONNECTIONS) {
        for connection in connections.iter_mut().filter_map(Value::as_object_mut) {
            replace_fields(service, connection, CONNECTION_FIELDS)?;
        }
    }

    if let Some(Value::Object(san_storage)) = desired.get_mut(keys::SAN_STORAGE)
        && let Some(Value::Array(attachments)) = san_storage.get_mut(keys::VOLUME_ATTACHMENTS)
    {
        for attachment in attachments.iter_mut().filter_map(Value::as_object_mut) {
            replace_fields(service, attachment, VOLUME_ATTACHMENT_FIELDS)?;
        }
    }

    Ok(())
}

fn replace_fields<S: ProfileService + ?Sized>(
    service: &S,
    record: &mut Map<String, Value>,
    fields: &[NameField],
) -> Result<(), ReconcileError> {
    for field in fields {
        let Some(name) = record
            .get(field.name)
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
        else {
            continue;
        };

        let uri = lookup(service, field.kinds, &name)?;
        debug!(field = field.name, %name, %uri, "Resolved name");

        record.remove(field.name);
        record.insert(field.uri.to_string(), Value::String(uri));
    }

    Ok(())
}

fn lookup<S: ProfileService + ?Sized>(
    service: &S,
    kinds: &[ResourceKind],
    name: &str,
) -> Result<String, ReconcileError> {
    for kind in kinds {
        if let Some(uri) = service.find_uri_by_name(*kind, name)? {
            return Ok(uri);
        }
    }

    let label = kinds.first().map(ResourceKind::label).unwrap_or("Resource");
    Err(ReconcileError::not_found(label, name))
}
