//! Reputation rewards and penalties
//!
//! Adjustments are appended to the network's reputation update log; the
//! reputation mining process picks them up from there.

use std::sync::Arc;

use tracing::{info, warn};

use colony_core::{
    Address, ColonyEvent, Domain, DomainId, EventSink, NetworkRegistry, PermissionGate, Role,
    SkillId, ROOT_DOMAIN_ID,
};

use crate::{ReputationError, ReputationResult};

/// Emits reputation adjustments for a colony
pub struct ReputationRewards {
    registry: Arc<dyn NetworkRegistry>,
    permissions: Arc<dyn PermissionGate>,
    events: Arc<dyn EventSink>,
}

impl ReputationRewards {
    /// Create a new reward emitter
    pub fn new(
        registry: Arc<dyn NetworkRegistry>,
        permissions: Arc<dyn PermissionGate>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self { registry, permissions, events }
    }

    /// Reward `user` with `amount` of reputation in `domain`'s skill
    ///
    /// Needs the root role; `amount` must be positive.
    pub async fn emit_domain_reputation_reward(
        &self,
        caller: Address,
        domain: Domain,
        user: Address,
        amount: i128,
    ) -> ReputationResult<()> {
        self.require_root(caller).await?;
        if amount <= 0 {
            return Err(ReputationError::InvalidAmount(format!(
                "domain reward must be positive, got {}",
                amount
            )));
        }

        self.append(caller, domain.skill_id, user, amount).await
    }

    /// Penalize `user` by `amount` (zero or negative) in `domain`'s skill
    ///
    /// Needs the arbitration role over `domain`.
    pub async fn emit_domain_reputation_penalty(
        &self,
        caller: Address,
        permission_domain_id: DomainId,
        child_skill_index: u64,
        domain: Domain,
        user: Address,
        amount: i128,
    ) -> ReputationResult<()> {
        let authorized = self.permissions.check(
            caller,
            permission_domain_id,
            child_skill_index,
            domain.id,
            Role::Arbitration,
        ).await?;
        if !authorized {
            warn!("Rejected reputation penalty by {} in domain {}", caller, domain.id);
            return Err(ReputationError::Unauthorized(format!(
                "{} lacks the {} role over domain {}",
                caller,
                Role::Arbitration,
                domain.id
            )));
        }

        if amount > 0 {
            return Err(ReputationError::InvalidAmount(format!(
                "penalty must not be positive, got {}",
                amount
            )));
        }

        self.append(caller, domain.skill_id, user, amount).await
    }

    /// Reward `user` with `amount` of reputation directly in `skill_id`
    ///
    /// Needs the root role; `amount` must be positive.
    pub async fn emit_skill_reputation_reward(
        &self,
        caller: Address,
        skill_id: SkillId,
        user: Address,
        amount: i128,
    ) -> ReputationResult<()> {
        self.require_root(caller).await?;
        if amount <= 0 {
            return Err(ReputationError::InvalidAmount(format!(
                "skill reward must be positive, got {}",
                amount
            )));
        }

        self.append(caller, skill_id, user, amount).await
    }

    async fn require_root(&self, caller: Address) -> ReputationResult<()> {
        if self.permissions.has_role(caller, ROOT_DOMAIN_ID, Role::Root).await? {
            Ok(())
        } else {
            warn!("Rejected reputation reward by {}: not root", caller);
            Err(ReputationError::Unauthorized(format!("{} lacks the {} role", caller, Role::Root)))
        }
    }

    async fn append(
        &self,
        caller: Address,
        skill_id: SkillId,
        user: Address,
        amount: i128,
    ) -> ReputationResult<()> {
        self.registry.append_reputation_update_log(user, amount, skill_id).await?;

        info!("Adjusted reputation of {} in skill {} by {}", user, skill_id, amount);
        self.events.emit(ColonyEvent::ReputationRewardAdjusted {
            caller,
            skill_id,
            user,
            amount,
        }).await;

        Ok(())
    }
}
