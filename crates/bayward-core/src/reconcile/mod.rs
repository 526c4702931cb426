//! Profile reconciliation workflows
//!
//! [`ProfileReconciler`] drives the appliance toward a desired state:
//! present (create or update), compliant with its template, or absent.

mod absent;
mod compliance;
mod present;

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::allocation::{Backoff, FixedBackoff, RetryBudget};
use crate::client::{PowerRequest, ProfileService, RemoteError};
use crate::config::AllocationConfig;
use crate::document::{ProfileDocument, keys, str_field};
use crate::error::ReconcileError;

/// User-facing result messages.
pub mod messages {
    pub const CREATED: &str = "Server Profile created.";
    pub const UPDATED: &str = "Server profile updated";
    pub const ALREADY_UPDATED: &str = "Server Profile is already updated.";
    pub const ALREADY_COMPLIANT: &str = "Server Profile is already compliant.";
    pub const REMEDIATED_COMPLIANCE: &str = "Remediated compliance issues";
    pub const DELETED: &str = "Deleted profile";
    pub const ALREADY_ABSENT: &str = "Nothing to do.";
}

/// What the caller wants the profile to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredState {
    Present,
    Compliant,
    Absent,
}

/// Result of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub changed: bool,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facts: Option<ProfileFacts>,
}

impl Outcome {
    fn changed(message: &'static str, facts: Option<ProfileFacts>) -> Self {
        Self {
            changed: true,
            message,
            facts,
        }
    }

    fn unchanged(message: &'static str, facts: Option<ProfileFacts>) -> Self {
        Self {
            changed: false,
            message,
            facts,
        }
    }
}

/// State of the profile after a workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileFacts {
    pub server_profile: ProfileDocument,
    pub serial_number: Option<String>,
    pub server_hardware: Option<ProfileDocument>,
    pub compliance_preview: Option<Value>,
    pub created: bool,
}

/// Tunables for the reconciler.
pub struct ReconcileSettings {
    pub budget: RetryBudget,
    pub backoff: Box<dyn Backoff>,
}

impl ReconcileSettings {
    pub fn from_config(allocation: &AllocationConfig) -> Self {
        Self {
            budget: allocation.budget(),
            backoff: Box::new(allocation.backoff()),
        }
    }
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            budget: RetryBudget::DEFAULT,
            backoff: Box::new(FixedBackoff::new(Duration::from_secs(2))),
        }
    }
}

/// Runs reconciliation workflows against a [`ProfileService`].
pub struct ProfileReconciler<'a, S: ProfileService + ?Sized> {
    service: &'a S,
    settings: ReconcileSettings,
}

impl<'a, S: ProfileService + ?Sized> ProfileReconciler<'a, S> {
    pub fn new(service: &'a S, settings: ReconcileSettings) -> Self {
        Self { service, settings }
    }

    /// Dispatches to the workflow for `state`.
    ///
    /// `desired` must carry the profile `name`; for `Present` it is the
    /// whole desired document.
    pub fn run(
        &self,
        state: DesiredState,
        desired: ProfileDocument,
    ) -> Result<Outcome, ReconcileError> {
        match state {
            DesiredState::Present => self.present(desired),
            DesiredState::Compliant => self.compliant(&required_name(&desired)?),
            DesiredState::Absent => self.absent(&required_name(&desired)?),
        }
    }

    /// Collects the facts reported after a workflow.
    fn gather_facts(
        &self,
        profile: ProfileDocument,
        created: bool,
    ) -> Result<ProfileFacts, ReconcileError> {
        let server_hardware = match str_field(&profile, keys::SERVER_HARDWARE_URI) {
            Some(uri) => Some(self.service.hardware_by_uri(uri)?),
            None => None,
        };

        let compliance_preview = match (
            str_field(&profile, keys::TEMPLATE_URI),
            str_field(&profile, keys::URI),
        ) {
            (Some(_), Some(uri)) => Some(self.service.compliance_preview(uri)?),
            _ => None,
        };

        Ok(ProfileFacts {
            serial_number: str_field(&profile, keys::SERIAL_NUMBER).map(str::to_string),
            server_profile: profile,
            server_hardware,
            compliance_preview,
            created,
        })
    }

    /// Applies a power transition when hardware is assigned.
    fn set_power(
        &self,
        hardware_uri: Option<&str>,
        request: PowerRequest,
    ) -> Result<(), ReconcileError> {
        if let Some(uri) = hardware_uri {
            info!(
                hardware = uri,
                state = request.power_state,
                "Changing server hardware power state"
            );
            self.service.set_power_state(uri, request)?;
        }
        Ok(())
    }
}

fn required_name(document: &ProfileDocument) -> Result<String, ReconcileError> {
    str_field(document, keys::NAME)
        .map(str::to_string)
        .ok_or_else(|| ReconcileError::InvalidInput("'name' is required".to_string()))
}

/// URI of a resource the appliance returned.
fn resource_uri(resource: &ProfileDocument) -> Result<String, ReconcileError> {
    str_field(resource, keys::URI)
        .map(str::to_string)
        .ok_or_else(|| RemoteError::Decode("resource without uri".to_string()).into())
}
