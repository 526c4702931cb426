//! Hardware allocation with retry
//!
//! Between reading the available-targets feed and creating the profile,
//! another client may claim the same bay. The appliance then fails the
//! creation task with [`ALLOCATION_RACE_CODE`]; that failure, and only
//! that one, is retried with a fresh candidate.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{ALLOCATION_RACE_CODE, ProfileService, TargetQuery};
use crate::document::{ProfileDocument, keys};
use crate::error::ReconcileError;

/// Maximum number of creation attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget(u32);

impl RetryBudget {
    pub const DEFAULT: RetryBudget = RetryBudget(25);

    /// A budget of at least one attempt.
    pub fn new(attempts: u32) -> Self {
        Self(attempts.max(1))
    }

    pub const fn attempts(&self) -> u32 {
        self.0
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Pause between allocation attempts.
pub trait Backoff {
    /// Called after failed attempt number `attempt` (1-based) when another
    /// attempt follows.
    fn pause(&self, attempt: u32);
}

/// Sleeps the calling thread for a fixed delay.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff {
    delay: Duration,
}

impl FixedBackoff {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Backoff for FixedBackoff {
    fn pause(&self, _attempt: u32) {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
    }
}

/// Retries immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl Backoff for NoBackoff {
    fn pause(&self, _attempt: u32) {}
}

/// A server hardware a profile may be assigned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareCandidate {
    pub uri: String,
    pub bay: Option<u32>,
}

/// Where creation attempts take their hardware from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareSource {
    /// The caller named the hardware; every attempt reuses it.
    Informed(HardwareCandidate),
    /// Each attempt picks the first usable entry of a fresh feed.
    AvailableTargets(TargetQuery),
}

impl HardwareSource {
    /// Chooses the source for a creation document.
    ///
    /// A document that already names its hardware is informed; anything
    /// else is placed from the feed, filtered by the document's hardware
    /// type and enclosure group.
    pub fn for_document(document: &ProfileDocument) -> Self {
        let field = |key: &str| {
            document
                .get(key)
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        match field(keys::SERVER_HARDWARE_URI) {
            Some(uri) => HardwareSource::Informed(HardwareCandidate { uri, bay: None }),
            None => HardwareSource::AvailableTargets(TargetQuery {
                server_hardware_type_uri: field(keys::SERVER_HARDWARE_TYPE_URI),
                enclosure_group_uri: field(keys::ENCLOSURE_GROUP_URI),
            }),
        }
    }

    fn candidate<S: ProfileService + ?Sized>(
        &self,
        service: &S,
    ) -> Result<Option<HardwareCandidate>, ReconcileError> {
        match self {
            HardwareSource::Informed(candidate) => Ok(Some(candidate.clone())),
            HardwareSource::AvailableTargets(query) => {
                let targets = service.available_targets(query)?;
                Ok(targets.iter().find_map(|target| {
                    target.hardware_uri().map(|uri| HardwareCandidate {
                        uri: uri.to_string(),
                        bay: target.enclosure_bay,
                    })
                }))
            }
        }
    }
}

/// Creates `desired`, retrying while the chosen bay is lost to a race.
///
/// # Arguments
/// * `service` - Appliance access
/// * `desired` - The profile to create; never modified
/// * `source` - Where each attempt takes its hardware from
/// * `budget` - Maximum number of attempts
/// * `backoff` - Pause between attempts
///
/// # Errors
/// * [`ReconcileError::AllocationExhausted`] when every attempt lost the race
/// * [`ReconcileError::Remote`] on the first failure of any other kind
pub fn acquire_and_create<S: ProfileService + ?Sized>(
    service: &S,
    desired: &ProfileDocument,
    source: &HardwareSource,
    budget: RetryBudget,
    backoff: &dyn Backoff,
) -> Result<ProfileDocument, ReconcileError> {
    let attempts = budget.attempts();

    for attempt in 1..=attempts {
        let candidate = source.candidate(service)?;

        let mut document = desired.clone();
        match &candidate {
            Some(candidate) => {
                document.insert(
                    keys::SERVER_HARDWARE_URI.to_string(),
                    Value::String(candidate.uri.clone()),
                );
            }
            None => {
                document.remove(keys::SERVER_HARDWARE_URI);
            }
        }

        debug!(
            attempt,
            max_attempts = attempts,
            hardware = candidate.as_ref().map(|c| c.uri.as_str()).unwrap_or("<none>"),
            "Creating server profile"
        );

        match service.create(&document) {
            Ok(created) => {
                info!(
                    name = created.get(keys::NAME).and_then(serde_json::Value::as_str).unwrap_or_default(),
                    attempt,
                    "Server profile created"
                );
                return Ok(created);
            }
            Err(err) if err.is_allocation_race() => {
                warn!(
                    attempt,
                    max_attempts = attempts,
                    code = ALLOCATION_RACE_CODE,
                    "Server hardware was claimed concurrently: {}",
                    err
                );
                if attempt < attempts {
                    backoff.pause(attempt);
                }
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(ReconcileError::AllocationExhausted { attempts })
}
