//! Interfaces of the colony's external collaborators
//!
//! The colony never implements these itself. The network registry, the
//! token-locking ledger, the permission hierarchy and the tree-proof
//! primitive all live elsewhere; the colony only calls them.

pub mod network;
pub mod permissions;
pub mod proof;
pub mod staking;

pub use network::NetworkRegistry;
pub use permissions::PermissionGate;
pub use proof::ProofPrimitive;
pub use staking::StakeLocking;

#[cfg(feature = "mocks")]
pub use network::MockNetworkRegistry;
#[cfg(feature = "mocks")]
pub use permissions::MockPermissionGate;
#[cfg(feature = "mocks")]
pub use proof::MockProofPrimitive;
#[cfg(feature = "mocks")]
pub use staking::MockStakeLocking;

use thiserror::Error;

/// Failure reported by an external collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExternalError {
    /// The collaborator rejected the call
    #[error("Call rejected by {collaborator}: {reason}")]
    Rejected {
        collaborator: &'static str,
        reason: String,
    },

    /// The collaborator could not be reached
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),
}

impl ExternalError {
    /// Shorthand for a rejection
    pub fn rejected(collaborator: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            collaborator,
            reason: reason.into(),
        }
    }
}

/// Result type for collaborator calls
pub type ExternalResult<T> = Result<T, ExternalError>;
