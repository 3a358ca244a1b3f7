//! Stake Authorization Ledger for the colony
//!
//! This crate tracks the three-party stake lifecycle: a depositor approves an
//! obligator to lock stake in a domain, the obligator obligates (locks) part
//! of that allowance, and the stake is later released or transferred to a
//! beneficiary. Every local change is mirrored into the external
//! token-locking ledger.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use colony_core::{Address, DomainId, ExternalError, StorageError};

/// Error types for ledger operations
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The obligator has not been approved for this much stake
    #[error("Insufficient allowance: requested {requested}, available {available}")]
    InsufficientAllowance { requested: u128, available: u128 },

    /// Less stake is locked than the operation needs
    #[error("Insufficient obligation: requested {requested}, available {available}")]
    InsufficientObligation { requested: u128, available: u128 },

    /// The caller lacks the required permission
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A counter would exceed its maximum value
    #[error("Overflow: {0}")]
    Overflow(String),

    /// A counter would drop below zero while undoing a change
    #[error("Underflow: {0}")]
    Underflow(String),

    /// Error with storage
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    /// Error reported by a collaborator
    #[error("External error: {0}")]
    External(#[from] ExternalError),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Composite key of every allowance and obligation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StakeKey {
    /// Whose tokens are at stake
    pub depositor: Address,
    /// Who may lock them
    pub obligator: Address,
    /// The domain the stake is scoped to
    pub domain: DomainId,
}

impl StakeKey {
    /// Create a new key
    pub fn new(depositor: Address, obligator: Address, domain: DomainId) -> Self {
        Self {
            depositor,
            obligator,
            domain,
        }
    }

    /// Storage key segment for this entry
    pub(crate) fn storage_segment(&self) -> String {
        format!("{}_{}_{}", self.depositor.to_hex(), self.obligator.to_hex(), self.domain.0)
    }
}

impl fmt::Display for StakeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} -> {} in domain {})", self.depositor, self.obligator, self.domain)
    }
}

/// A request to move locked stake to a beneficiary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StakeTransfer {
    /// Who is asking
    pub caller: Address,
    /// Domain in which the caller holds the arbitration role
    pub permission_domain_id: DomainId,
    /// Index locating `domain` among the children of `permission_domain_id`
    pub child_skill_index: u64,
    /// The obligator that locked the stake
    pub obligator: Address,
    /// Whose locked stake is moved
    pub user: Address,
    /// Domain the stake was locked in
    pub domain: DomainId,
    /// How much to move
    pub amount: u128,
    /// Who receives it
    pub beneficiary: Address,
}

/// The stake authorization operations
#[async_trait]
pub trait StakeLedger: Send + Sync {
    /// Allow `obligator` to lock up to `amount` more of `depositor`'s stake in `domain`
    async fn approve(
        &self,
        depositor: Address,
        obligator: Address,
        domain: DomainId,
        amount: u128,
    ) -> LedgerResult<()>;

    /// Lock `amount` of `user`'s approved stake on behalf of `obligator`
    async fn obligate(
        &self,
        user: Address,
        obligator: Address,
        domain: DomainId,
        amount: u128,
    ) -> LedgerResult<()>;

    /// Release `amount` of `user`'s stake locked by `obligator`
    ///
    /// The released amount does not return to the allowance.
    async fn deobligate(
        &self,
        user: Address,
        obligator: Address,
        domain: DomainId,
        amount: u128,
    ) -> LedgerResult<()>;

    /// Move locked stake to a beneficiary; needs the arbitration role
    async fn transfer(&self, request: StakeTransfer) -> LedgerResult<()>;

    /// Current allowance for the given triple
    async fn allowance(&self, user: Address, obligator: Address, domain: DomainId) -> u128;

    /// Current obligation for the given triple
    async fn obligation(&self, user: Address, obligator: Address, domain: DomainId) -> u128;
}

pub mod stake_ledger;

// Re-exports
pub use stake_ledger::AuthorizationLedger;
