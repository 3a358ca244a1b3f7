//! Meta-transaction nonces
//!
//! One counter per identity, stored at a slot derived from the identity.

use tracing::debug;

use colony_core::Address;

use crate::slots::{derive_slot, SlotStore, METATRANSACTION_NONCES_SLOT};
use crate::{UpgradeError, UpgradeResult};

/// Per-identity replay counters for relayed transactions
#[derive(Clone)]
pub struct MetaTransactionNonces {
    slots: SlotStore,
}

impl MetaTransactionNonces {
    /// Create the nonce mapping on top of a slot store
    pub fn new(slots: SlotStore) -> Self {
        Self { slots }
    }

    /// Current nonce of `user`
    pub async fn nonce(&self, user: &Address) -> UpgradeResult<u128> {
        self.slots.read_u128(&derive_slot(user, METATRANSACTION_NONCES_SLOT)).await
    }

    /// Advance the nonce of `user`, returning the new value
    pub async fn increment_nonce(&self, user: &Address) -> UpgradeResult<u128> {
        let slot = derive_slot(user, METATRANSACTION_NONCES_SLOT);
        let current = self.slots.read_u128(&slot).await?;
        let next = current
            .checked_add(1)
            .ok_or_else(|| UpgradeError::Overflow(format!("nonce of {} is exhausted", user)))?;

        self.slots.write_u128(&slot, next).await?;
        debug!("Nonce of {} is now {}", user, next);
        Ok(next)
    }
}
