use async_trait::async_trait;

use super::ExternalResult;
use crate::types::Address;

/// The token-locking ledger that colony stake operations are mirrored into
///
/// Calls are made by the colony, so the colony is the implicit obligator
/// on the other side.
#[cfg_attr(feature = "mocks", mockall::automock)]
#[async_trait]
pub trait StakeLocking: Send + Sync {
    /// Allow the colony to lock up to `amount` more of `depositor`'s tokens
    async fn approve_stake(&self, depositor: Address, amount: u128, token: Address) -> ExternalResult<()>;

    /// Lock `amount` of `user`'s approved tokens
    async fn obligate_stake(&self, user: Address, amount: u128, token: Address) -> ExternalResult<()>;

    /// Release `amount` of `user`'s locked tokens
    async fn deobligate_stake(&self, user: Address, amount: u128, token: Address) -> ExternalResult<()>;

    /// Move `amount` of `user`'s locked tokens to `beneficiary`
    async fn transfer_stake(
        &self,
        user: Address,
        amount: u128,
        token: Address,
        beneficiary: Address,
    ) -> ExternalResult<()>;
}
