use serde_json::Value;
use tracing::{debug, info};

use super::{Outcome, ProfileReconciler, messages, required_name, resource_uri};
use crate::allocation::{HardwareSource, acquire_and_create};
use crate::client::{PowerRequest, ProfileService};
use crate::compare::{normalize, profiles_equivalent};
use crate::document::{ProfileDocument, keys, str_field};
use crate::error::ReconcileError;
use crate::merge::merge;
use crate::resolve::replace_names_by_uris;
use crate::sanitize::remove_inconsistent_data;

impl<S: ProfileService + ?Sized> ProfileReconciler<'_, S> {
    /// Creates the profile, or updates it when it differs from `desired`.
    ///
    /// `desired` may carry the directives `server_template` and
    /// `server_hardware`, which name a template and a hardware to use.
    pub fn present(&self, mut desired: ProfileDocument) -> Result<Outcome, ReconcileError> {
        let name = required_name(&desired)?;
        let template_name = take_directive(&mut desired, keys::DIRECTIVE_TEMPLATE);
        let hardware_name = take_directive(&mut desired, keys::DIRECTIVE_HARDWARE);

        replace_names_by_uris(self.service, &mut desired)?;

        if let Some(hardware_name) = hardware_name {
            let hardware = self
                .service
                .hardware_by_name(&hardware_name)?
                .ok_or_else(|| ReconcileError::not_found("Server Hardware", &hardware_name))?;
            desired.insert(
                keys::SERVER_HARDWARE_URI.to_string(),
                Value::String(resource_uri(&hardware)?),
            );
        }

        let template = match template_name {
            Some(template_name) => {
                let template = self
                    .service
                    .template_by_name(&template_name)?
                    .ok_or_else(|| {
                        ReconcileError::not_found("Server Profile Template", &template_name)
                    })?;
                desired.insert(
                    keys::TEMPLATE_URI.to_string(),
                    Value::String(resource_uri(&template)?),
                );
                Some(template)
            }
            None => match str_field(&desired, keys::TEMPLATE_URI) {
                Some(uri) => Some(self.service.template_by_uri(uri)?),
                None => None,
            },
        };

        match self.service.profile_by_name(&name)? {
            None => self.create_profile(desired, template.as_ref()),
            Some(existing) => self.update_profile(existing, &desired),
        }
    }

    fn create_profile(
        &self,
        mut desired: ProfileDocument,
        template: Option<&ProfileDocument>,
    ) -> Result<Outcome, ReconcileError> {
        remove_inconsistent_data(&mut desired);

        let document = match template {
            Some(template) => {
                let mut base = self
                    .service
                    .new_profile_from_template(&resource_uri(template)?)?;
                base.extend(desired);
                base
            }
            None => desired,
        };

        let source = HardwareSource::for_document(&document);
        debug!(?source, "Allocating server hardware");

        let created = acquire_and_create(
            self.service,
            &document,
            &source,
            self.settings.budget,
            self.settings.backoff.as_ref(),
        )?;

        let facts = self.gather_facts(created, true)?;
        Ok(Outcome::changed(messages::CREATED, Some(facts)))
    }

    fn update_profile(
        &self,
        existing: ProfileDocument,
        desired: &ProfileDocument,
    ) -> Result<Outcome, ReconcileError> {
        let merged = merge(&existing, desired)?;

        if profiles_equivalent(&normalize(&existing), &normalize(&merged)) {
            debug!("Server profile already matches the desired state");
            let facts = self.gather_facts(existing, false)?;
            return Ok(Outcome::unchanged(messages::ALREADY_UPDATED, Some(facts)));
        }

        let uri = resource_uri(&existing)?;
        let hardware_uri = str_field(&existing, keys::SERVER_HARDWARE_URI);

        self.set_power(hardware_uri, PowerRequest::OFF)?;
        let updated = self.service.update(&merged, &uri)?;
        info!(%uri, "Server profile updated");
        self.set_power(hardware_uri, PowerRequest::ON)?;

        let facts = self.gather_facts(updated, false)?;
        Ok(Outcome::changed(messages::UPDATED, Some(facts)))
    }
}

/// Removes a directive field, returning its name when one was given.
fn take_directive(desired: &mut ProfileDocument, key: &str) -> Option<String> {
    match desired.remove(key) {
        Some(Value::String(name)) if !name.is_empty() => Some(name),
        _ => None,
    }
}
