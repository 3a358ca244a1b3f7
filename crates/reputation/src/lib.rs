//! Reputation for the colony
//!
//! Two concerns live here. The proof verifier answers whether a caller's
//! claimed reputation in this colony is included under the network's
//! canonical reputation root. The reward emitter appends reputation
//! adjustments to the network's update log on behalf of permissioned
//! callers.

use thiserror::Error;

use colony_core::ExternalError;

pub mod proof;
pub mod rewards;

pub use proof::{ReputationKey, ReputationProof, ReputationProofVerifier, KEY_LEN};
pub use rewards::ReputationRewards;

/// Error types for reputation operations
#[derive(Error, Debug)]
pub enum ReputationError {
    /// The caller lacks the required permission
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The amount has the wrong sign for the operation
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Error reported by a collaborator
    #[error("External error: {0}")]
    External(#[from] ExternalError),
}

/// Result type for reputation operations
pub type ReputationResult<T> = Result<T, ReputationError>;
