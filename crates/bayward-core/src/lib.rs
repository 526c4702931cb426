//! Bayward Core Library
//!
//! Reconciles server profiles on a management appliance: merges a partial
//! desired profile onto the existing one, detects real changes, and places
//! new profiles on free hardware while other clients compete for it.

pub mod allocation;
pub mod client;
pub mod compare;
pub mod config;
pub mod document;
pub mod error;
pub mod merge;
pub mod reconcile;
pub mod resolve;
pub mod sanitize;

/// Re-exports of commonly used types
pub mod prelude {
    // Documents
    pub use crate::document::{Presence, ProfileDocument, keys};

    // Merge and comparison
    pub use crate::compare::{equivalent, normalize, profiles_equivalent};
    pub use crate::merge::merge;

    // Allocation
    pub use crate::allocation::{
        Backoff, FixedBackoff, HardwareCandidate, HardwareSource, NoBackoff, RetryBudget,
        acquire_and_create,
    };

    // Appliance access
    pub use crate::client::{
        AvailableTarget, PowerRequest, ProfileService, RemoteError, ResourceKind,
        RestProfileService, TargetQuery,
    };

    // Workflows
    pub use crate::reconcile::{
        DesiredState, Outcome, ProfileFacts, ProfileReconciler, ReconcileSettings,
    };

    // Configuration
    pub use crate::config::{BaywardConfig, load_config};

    // Errors
    pub use crate::error::{MergeError, ReconcileError};
}
