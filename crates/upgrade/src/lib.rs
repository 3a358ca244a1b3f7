//! Self-upgrade for the colony
//!
//! The colony's behavior is provided by a versioned logic implementation.
//! This crate moves the colony from one version to the next, runs the new
//! version's migration, and keeps user-derived storage addresses away from
//! the reserved configuration slots.

use thiserror::Error;

use colony_core::{ExternalError, Hash32, Resolver, StorageError, Version};

pub mod controller;
pub mod nonces;
pub mod slots;

pub use controller::{ColonyLogic, LogicRegistry, UpgradeController};
pub use nonces::MetaTransactionNonces;
pub use slots::{derive_slot, protect_slot, ReservedConfig, SlotAddress, SlotStore};

/// Error types for upgrade and slot operations
#[derive(Error, Debug)]
pub enum UpgradeError {
    /// The caller lacks the required permission
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Upgrades must advance the version by exactly one
    #[error("Cannot move from {current} to {requested}: versions advance by exactly one")]
    VersionSkipOrDowngrade { current: Version, requested: Version },

    /// No resolver, or no installed logic, exists for the version
    #[error("Version {0} is not registered")]
    UnregisteredVersion(Version),

    /// Storage points at a resolver with no installed logic
    #[error("No logic installed for {0}")]
    UnknownResolver(Resolver),

    /// A derived slot collides with a reserved slot
    #[error("Protected variable: slot {0} is reserved")]
    ProtectedVariable(Hash32),

    /// The new version's migration failed
    #[error("Migration to {version} failed: {reason}")]
    Migration { version: Version, reason: String },

    /// A counter would exceed its maximum value
    #[error("Overflow: {0}")]
    Overflow(String),

    /// Error with storage
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    /// Error reported by a collaborator
    #[error("External error: {0}")]
    External(#[from] ExternalError),
}

/// Result type for upgrade operations
pub type UpgradeResult<T> = Result<T, UpgradeError>;
