use tracing::info;

use super::{Outcome, ProfileReconciler, messages};
use crate::client::{PowerRequest, ProfileService};
use crate::document::{keys, str_field};
use crate::error::ReconcileError;

impl<S: ProfileService + ?Sized> ProfileReconciler<'_, S> {
    /// Deletes the profile, powering off its hardware first.
    pub fn absent(&self, name: &str) -> Result<Outcome, ReconcileError> {
        let Some(profile) = self.service.profile_by_name(name)? else {
            return Ok(Outcome::unchanged(messages::ALREADY_ABSENT, None));
        };

        self.set_power(
            str_field(&profile, keys::SERVER_HARDWARE_URI),
            PowerRequest::OFF,
        )?;
        self.service.delete(&profile)?;
        info!(name, "Server profile deleted");

        Ok(Outcome::changed(messages::DELETED, None))
    }
}
