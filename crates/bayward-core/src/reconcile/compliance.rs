use serde_json::Value;
use tracing::info;

use super::{Outcome, ProfileReconciler, messages, resource_uri};
use crate::client::{PowerRequest, ProfileService};
use crate::document::{keys, str_field};
use crate::error::ReconcileError;

const COMPLIANT: &str = "Compliant";

impl<S: ProfileService + ?Sized> ProfileReconciler<'_, S> {
    /// Brings the profile back in line with its template.
    ///
    /// When the appliance cannot apply the changes online, the assigned
    /// hardware is powered off around the update.
    pub fn compliant(&self, name: &str) -> Result<Outcome, ReconcileError> {
        let profile = self
            .service
            .profile_by_name(name)?
            .ok_or_else(|| ReconcileError::ProfileNotFound {
                name: name.to_string(),
            })?;

        if str_field(&profile, keys::TEMPLATE_URI).is_none() {
            return Err(ReconcileError::ComplianceUnsupported {
                name: name.to_string(),
            });
        }

        if str_field(&profile, keys::TEMPLATE_COMPLIANCE) == Some(COMPLIANT) {
            let facts = self.gather_facts(profile, false)?;
            return Ok(Outcome::unchanged(messages::ALREADY_COMPLIANT, Some(facts)));
        }

        let uri = resource_uri(&profile)?;
        let preview = self.service.compliance_preview(&uri)?;
        let online = preview
            .get("isOnlineUpdate")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let hardware_uri = if online {
            None
        } else {
            str_field(&profile, keys::SERVER_HARDWARE_URI)
        };

        self.set_power(hardware_uri, PowerRequest::OFF)?;
        let updated = self.service.patch(
            &uri,
            "replace",
            "/templateCompliance",
            &Value::String(COMPLIANT.to_string()),
        )?;
        info!(%uri, online, "Remediated template compliance");
        self.set_power(hardware_uri, PowerRequest::ON)?;

        let facts = self.gather_facts(updated, false)?;
        Ok(Outcome::changed(messages::REMEDIATED_COMPLIANCE, Some(facts)))
    }
}
