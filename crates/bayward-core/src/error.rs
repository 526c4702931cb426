//! Error types for reconciliation

use thiserror::Error;

use crate::client::RemoteError;

/// The desired and existing documents disagree on a field's shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("shape mismatch at '{path}': expected {expected}, found {found}")]
    ShapeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Failure of a reconciliation workflow.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A resource named in the desired document does not exist.
    #[error("Informed {kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    /// Every allocation attempt lost the race for hardware.
    #[error("Could not allocate server hardware")]
    AllocationExhausted { attempts: u32 },

    /// The profile to remediate has no template to comply with.
    #[error("Server profile '{name}' is not associated with a server profile template")]
    ComplianceUnsupported { name: String },

    /// The profile to remediate does not exist.
    #[error("Server profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Merge(#[from] MergeError),

    /// Propagated unchanged from the appliance.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl ReconcileError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        ReconcileError::NotFound {
            kind,
            name: name.into(),
        }
    }
}
