//! Appliance access
//!
//! [`ProfileService`] is the seam between the reconciliation workflows and
//! the management appliance. [`rest::RestProfileService`] talks to a real
//! appliance; tests substitute an in-memory implementation.

pub mod rest;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::document::ProfileDocument;

pub use rest::RestProfileService;

/// Task error code the appliance reports when another profile claimed the
/// chosen bay between target selection and creation.
pub const ALLOCATION_RACE_CODE: &str = "AssignProfileToDeviceBayError";

/// Error reported by the appliance or the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// An asynchronous task finished in error.
    #[error("{message}")]
    Task {
        code: Option<String>,
        message: String,
    },
    /// A request was rejected.
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("Request to appliance failed: {0}")]
    Transport(String),
    #[error("Unexpected appliance response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn task(code: Option<&str>, message: impl Into<String>) -> Self {
        RemoteError::Task {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// Error code attached by the appliance, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            RemoteError::Task { code, .. } | RemoteError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// True when the failure is the transient bay-assignment race.
    pub fn is_allocation_race(&self) -> bool {
        matches!(self, RemoteError::Task { .. }) && self.code() == Some(ALLOCATION_RACE_CODE)
    }
}

/// An entry of the available-targets feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableTarget {
    #[serde(default)]
    pub server_hardware_uri: Option<String>,
    #[serde(default)]
    pub enclosure_bay: Option<u32>,
    #[serde(default)]
    pub enclosure_uri: Option<String>,
}

impl AvailableTarget {
    /// The hardware URI when the target can actually take a profile.
    pub fn hardware_uri(&self) -> Option<&str> {
        self.server_hardware_uri
            .as_deref()
            .filter(|uri| !uri.is_empty())
    }
}

/// Filters for the available-targets feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetQuery {
    pub server_hardware_type_uri: Option<String>,
    pub enclosure_group_uri: Option<String>,
}

/// A power transition for a server hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerRequest {
    pub power_state: &'static str,
    pub power_control: &'static str,
}

impl PowerRequest {
    pub const OFF: PowerRequest = PowerRequest {
        power_state: "Off",
        power_control: "PressAndHold",
    };
    pub const ON: PowerRequest = PowerRequest {
        power_state: "On",
        power_control: "MomentaryPress",
    };
}

/// Collections that can be searched by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    OsDeploymentPlan,
    EnclosureGroup,
    Enclosure,
    FcNetwork,
    EthernetNetwork,
    ServerHardwareType,
    Volume,
    StoragePool,
    StorageSystem,
}

impl ResourceKind {
    /// REST collection path.
    pub fn collection(&self) -> &'static str {
        match self {
            ResourceKind::OsDeploymentPlan => "/rest/os-deployment-plans",
            ResourceKind::EnclosureGroup => "/rest/enclosure-groups",
            ResourceKind::Enclosure => "/rest/enclosures",
            ResourceKind::FcNetwork => "/rest/fc-networks",
            ResourceKind::EthernetNetwork => "/rest/ethernet-networks",
            ResourceKind::ServerHardwareType => "/rest/server-hardware-types",
            ResourceKind::Volume => "/rest/storage-volumes",
            ResourceKind::StoragePool => "/rest/storage-pools",
            ResourceKind::StorageSystem => "/rest/storage-systems",
        }
    }

    /// Label used in user-facing messages.
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::OsDeploymentPlan => "OS Deployment Plan",
            ResourceKind::EnclosureGroup => "Enclosure Group",
            ResourceKind::Enclosure => "Enclosure",
            ResourceKind::FcNetwork | ResourceKind::EthernetNetwork => "Network",
            ResourceKind::ServerHardwareType => "Server Hardware Type",
            ResourceKind::Volume => "Volume",
            ResourceKind::StoragePool => "Storage Pool",
            ResourceKind::StorageSystem => "Storage System",
        }
    }
}

/// Operations the workflows need from the appliance.
///
/// Every write returns once the appliance has finished the change; the
/// returned document is the resource as stored.
pub trait ProfileService {
    fn profile_by_name(&self, name: &str) -> Result<Option<ProfileDocument>, RemoteError>;

    fn available_targets(&self, query: &TargetQuery) -> Result<Vec<AvailableTarget>, RemoteError>;

    fn hardware_by_name(&self, name: &str) -> Result<Option<ProfileDocument>, RemoteError>;

    fn hardware_by_uri(&self, uri: &str) -> Result<ProfileDocument, RemoteError>;

    fn template_by_name(&self, name: &str) -> Result<Option<ProfileDocument>, RemoteError>;

    fn template_by_uri(&self, uri: &str) -> Result<ProfileDocument, RemoteError>;

    /// A new profile document derived from a template.
    fn new_profile_from_template(&self, template_uri: &str)
    -> Result<ProfileDocument, RemoteError>;

    /// URI of the first resource of `kind` with the given name.
    fn find_uri_by_name(&self, kind: ResourceKind, name: &str)
    -> Result<Option<String>, RemoteError>;

    fn create(&self, profile: &ProfileDocument) -> Result<ProfileDocument, RemoteError>;

    fn update(&self, profile: &ProfileDocument, uri: &str) -> Result<ProfileDocument, RemoteError>;

    fn patch(
        &self,
        uri: &str,
        operation: &str,
        path: &str,
        value: &Value,
    ) -> Result<ProfileDocument, RemoteError>;

    fn delete(&self, profile: &ProfileDocument) -> Result<(), RemoteError>;

    fn set_power_state(&self, hardware_uri: &str, request: PowerRequest) -> Result<(), RemoteError>;

    fn compliance_preview(&self, profile_uri: &str) -> Result<Value, RemoteError>;
}
