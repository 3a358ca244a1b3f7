//! Colony
//!
//! A colony is an organization split into domains. This crate puts the
//! pieces together: the stake authorization ledger, reputation proofs and
//! rewards, meta-transaction nonces, and self-upgrade, all behind one
//! [`Colony`] that checks domains and roles before delegating.

use thiserror::Error;

use colony_core::{ExternalError, StorageError};

pub mod colony;

pub use colony::{Collaborators, Colony};

pub use colony_config::{ColonyConfig, ConfigError};
pub use colony_core::{
    Address, ColonyEvent, Domain, DomainId, EventLog, Hash32, Resolver, Role, SkillId, Version,
    ROOT_DOMAIN_ID,
};
pub use colony_ledger::{LedgerError, StakeTransfer};
pub use colony_reputation::{ReputationError, ReputationKey, ReputationProof};
pub use colony_upgrade::{ColonyLogic, LogicRegistry, UpgradeError};

/// Error types for colony operations
#[derive(Error, Debug)]
pub enum ColonyError {
    /// No domain with this id has been registered
    #[error("Domain not found: {0}")]
    DomainNotFound(DomainId),

    /// A domain with this id already exists
    #[error("Domain already registered: {0}")]
    DomainExists(DomainId),

    /// The caller lacks the required permission
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Configuration is missing or inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// An address in the configuration could not be parsed
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Reputation error: {0}")]
    Reputation(#[from] ReputationError),

    #[error("Upgrade error: {0}")]
    Upgrade(#[from] UpgradeError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("External error: {0}")]
    External(#[from] ExternalError),
}

impl From<ConfigError> for ColonyError {
    fn from(e: ConfigError) -> Self {
        ColonyError::Config(e.to_string())
    }
}

/// Result type for colony operations
pub type ColonyResult<T> = Result<T, ColonyError>;
