//! The colony facade

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use colony_config::ColonyConfig;
use colony_core::{
    Address, ColonyEvent, Domain, DomainId, EventSink, FileStorage, Hash32, JsonStorage,
    MemoryStorage, NetworkRegistry, PermissionGate, ProofPrimitive, Role, SkillId, StakeLocking,
    Storage, Version, ROOT_DOMAIN_ID,
};
use colony_ledger::{AuthorizationLedger, StakeLedger, StakeTransfer};
use colony_reputation::{ReputationProof, ReputationProofVerifier, ReputationRewards};
use colony_upgrade::{
    ColonyLogic, LogicRegistry, MetaTransactionNonces, ReservedConfig, SlotStore,
    UpgradeController,
};

use crate::{ColonyError, ColonyResult};

const DOMAINS_PATH: &str = "domains";

/// The external services a colony talks to
#[derive(Clone)]
pub struct Collaborators {
    pub registry: Arc<dyn NetworkRegistry>,
    pub stake_locking: Arc<dyn StakeLocking>,
    pub permissions: Arc<dyn PermissionGate>,
    pub proof: Arc<dyn ProofPrimitive>,
    pub events: Arc<dyn EventSink>,
}

/// A colony and its domains
pub struct Colony {
    address: Address,
    permissions: Arc<dyn PermissionGate>,
    events: Arc<dyn EventSink>,
    storage: Arc<dyn Storage>,
    reserved: ReservedConfig,
    domains: RwLock<BTreeMap<DomainId, Domain>>,
    ledger: AuthorizationLedger,
    verifier: ReputationProofVerifier,
    rewards: ReputationRewards,
    nonces: MetaTransactionNonces,
    upgrades: UpgradeController,
}

impl Colony {
    /// Build a colony on top of `storage`
    ///
    /// A fresh storage is initialized from `config`; a populated one must
    /// agree with it on the reserved configuration.
    pub async fn new(
        config: &ColonyConfig,
        collaborators: Collaborators,
        storage: Arc<dyn Storage>,
        logic: LogicRegistry,
    ) -> ColonyResult<Self> {
        let address = parse_address(&config.colony_address)?;
        let token = parse_address(&config.token_address)?;
        let reserved = ReservedConfig {
            network_registry: parse_address(&config.network_registry)?,
            root_local_skill: SkillId(config.root_skill_id),
        };

        match ReservedConfig::load(storage.as_ref()).await? {
            Some(stored) if stored != reserved => {
                return Err(ColonyError::Config(format!(
                    "stored configuration (registry {}, root skill {}) does not match the configured one",
                    stored.network_registry, stored.root_local_skill
                )));
            }
            Some(_) => {}
            None => reserved.store(storage.as_ref()).await?,
        }

        let ledger = AuthorizationLedger::open(
            token,
            collaborators.stake_locking.clone(),
            collaborators.permissions.clone(),
            storage.clone(),
        ).await?;

        let upgrades = UpgradeController::open(
            logic,
            collaborators.registry.clone(),
            collaborators.permissions.clone(),
            collaborators.events.clone(),
            storage.clone(),
        ).await?;

        let colony = Self {
            address,
            permissions: collaborators.permissions.clone(),
            events: collaborators.events.clone(),
            storage: storage.clone(),
            reserved,
            domains: RwLock::new(BTreeMap::new()),
            ledger,
            verifier: ReputationProofVerifier::new(
                address,
                collaborators.registry.clone(),
                collaborators.proof.clone(),
            ),
            rewards: ReputationRewards::new(
                collaborators.registry.clone(),
                collaborators.permissions.clone(),
                collaborators.events.clone(),
            ),
            nonces: MetaTransactionNonces::new(SlotStore::new(storage)),
            upgrades,
        };

        colony.load_domains().await?;
        if !colony.domains.read().await.contains_key(&ROOT_DOMAIN_ID) {
            let root = Domain::new(ROOT_DOMAIN_ID, colony.reserved.root_local_skill);
            colony.insert_domain(root).await?;
        }

        info!(
            "Colony {} ready at {} with {} domain(s)",
            colony.address,
            colony.upgrades.current_version().await,
            colony.domains.read().await.len()
        );
        Ok(colony)
    }

    /// Build a colony with storage chosen by the configuration
    ///
    /// `storage_dir` selects file storage; without it state is kept in memory.
    /// Tracing is installed at the configured log level.
    pub async fn from_config(
        config: &ColonyConfig,
        collaborators: Collaborators,
        logic: LogicRegistry,
    ) -> ColonyResult<Self> {
        colony_core::init_tracing(&config.log_level);

        let storage: Arc<dyn Storage> = match &config.storage_dir {
            Some(dir) => Arc::new(FileStorage::new(dir.clone()).await?),
            None => Arc::new(MemoryStorage::new()),
        };
        Self::new(config, collaborators, storage, logic).await
    }

    /// This colony's address
    pub fn address(&self) -> Address {
        self.address
    }

    /// The reserved configuration
    pub fn reserved_config(&self) -> ReservedConfig {
        self.reserved
    }

    // Domains

    /// Look up a domain
    pub async fn domain(&self, id: DomainId) -> ColonyResult<Domain> {
        self.domains.read().await.get(&id).copied().ok_or(ColonyError::DomainNotFound(id))
    }

    /// Number of registered domains
    pub async fn domain_count(&self) -> usize {
        self.domains.read().await.len()
    }

    /// Register a new domain; needs the root role
    pub async fn register_domain(&self, caller: Address, domain: Domain) -> ColonyResult<()> {
        self.require_root(caller).await?;
        self.insert_domain(domain).await?;
        info!("Registered domain {} with skill {}", domain.id, domain.skill_id);
        Ok(())
    }

    /// Replace the colony metadata; needs the root role
    ///
    /// Only an audit event is recorded, the metadata itself is not kept.
    pub async fn edit_colony_metadata(&self, caller: Address, metadata: String) -> ColonyResult<()> {
        self.require_root(caller).await?;
        self.events.emit(ColonyEvent::ColonyMetadata { caller, metadata }).await;
        Ok(())
    }

    // Stake

    /// Let `obligator` lock up to `amount` more of the caller's stake in `domain`
    pub async fn approve_stake(
        &self,
        caller: Address,
        obligator: Address,
        domain: DomainId,
        amount: u128,
    ) -> ColonyResult<()> {
        self.domain(domain).await?;
        Ok(self.ledger.approve(caller, obligator, domain, amount).await?)
    }

    /// Lock `amount` of `user`'s stake, the caller acting as obligator
    pub async fn obligate_stake(
        &self,
        caller: Address,
        user: Address,
        domain: DomainId,
        amount: u128,
    ) -> ColonyResult<()> {
        self.domain(domain).await?;
        Ok(self.ledger.obligate(user, caller, domain, amount).await?)
    }

    /// Release `amount` of `user`'s stake the caller has locked
    pub async fn deobligate_stake(
        &self,
        caller: Address,
        user: Address,
        domain: DomainId,
        amount: u128,
    ) -> ColonyResult<()> {
        self.domain(domain).await?;
        Ok(self.ledger.deobligate(user, caller, domain, amount).await?)
    }

    /// Move locked stake to a beneficiary
    pub async fn transfer_stake(&self, request: StakeTransfer) -> ColonyResult<()> {
        self.domain(request.domain).await?;
        self.domain(request.permission_domain_id).await?;
        Ok(self.ledger.transfer(request).await?)
    }

    /// Current allowance of `obligator` over `user`'s stake in `domain`
    pub async fn allowance(&self, user: Address, obligator: Address, domain: DomainId) -> u128 {
        self.ledger.allowance(user, obligator, domain).await
    }

    /// Stake of `user` currently locked by `obligator` in `domain`
    pub async fn obligation(&self, user: Address, obligator: Address, domain: DomainId) -> u128 {
        self.ledger.obligation(user, obligator, domain).await
    }

    // Reputation

    /// Whether the caller's reputation entry is included under the network root
    pub async fn verify_reputation_proof(
        &self,
        caller: Address,
        key: &[u8],
        value: &[u8],
        branch_mask: Hash32,
        siblings: &[Hash32],
    ) -> bool {
        self.verifier.verify(caller, key, value, branch_mask, siblings).await
    }

    /// [`verify_reputation_proof`](Self::verify_reputation_proof) for a bundled proof
    pub async fn verify_proof(&self, caller: Address, proof: &ReputationProof) -> bool {
        self.verifier.verify_proof(caller, proof).await
    }

    /// Reward `user` in the skill of `domain`
    pub async fn emit_domain_reputation_reward(
        &self,
        caller: Address,
        domain: DomainId,
        user: Address,
        amount: i128,
    ) -> ColonyResult<()> {
        let domain = self.domain(domain).await?;
        Ok(self.rewards.emit_domain_reputation_reward(caller, domain, user, amount).await?)
    }

    /// Penalize `user` in the skill of `domain`
    pub async fn emit_domain_reputation_penalty(
        &self,
        caller: Address,
        permission_domain_id: DomainId,
        child_skill_index: u64,
        domain: DomainId,
        user: Address,
        amount: i128,
    ) -> ColonyResult<()> {
        self.domain(permission_domain_id).await?;
        let domain = self.domain(domain).await?;
        Ok(self.rewards.emit_domain_reputation_penalty(
            caller,
            permission_domain_id,
            child_skill_index,
            domain,
            user,
            amount,
        ).await?)
    }

    /// Reward `user` directly in `skill_id`
    pub async fn emit_skill_reputation_reward(
        &self,
        caller: Address,
        skill_id: SkillId,
        user: Address,
        amount: i128,
    ) -> ColonyResult<()> {
        Ok(self.rewards.emit_skill_reputation_reward(caller, skill_id, user, amount).await?)
    }

    // Meta-transactions

    /// Current meta-transaction nonce of `user`
    pub async fn metatransaction_nonce(&self, user: Address) -> ColonyResult<u128> {
        Ok(self.nonces.nonce(&user).await?)
    }

    /// Consume the current meta-transaction nonce of `user`
    pub async fn increment_metatransaction_nonce(&self, user: Address) -> ColonyResult<u128> {
        Ok(self.nonces.increment_nonce(&user).await?)
    }

    // Upgrade

    /// Version of the active logic
    pub async fn version(&self) -> Version {
        self.upgrades.current_version().await
    }

    /// The active logic
    pub async fn active_logic(&self) -> Arc<dyn ColonyLogic> {
        self.upgrades.active_logic().await
    }

    /// Upgrade to `new_version`
    pub async fn upgrade(&self, caller: Address, new_version: Version) -> ColonyResult<()> {
        Ok(self.upgrades.upgrade(caller, new_version).await?)
    }

    async fn require_root(&self, caller: Address) -> ColonyResult<()> {
        if self.permissions.has_role(caller, ROOT_DOMAIN_ID, Role::Root).await? {
            Ok(())
        } else {
            warn!("Rejected call by {}: not root", caller);
            Err(ColonyError::Unauthorized(format!("{} lacks the {} role", caller, Role::Root)))
        }
    }

    /// Persist and add a domain; the write lock is held across the
    /// existence check and the insert
    async fn insert_domain(&self, domain: Domain) -> ColonyResult<()> {
        let mut domains = self.domains.write().await;
        if domains.contains_key(&domain.id) {
            return Err(ColonyError::DomainExists(domain.id));
        }

        let key = format!("{}/{}", DOMAINS_PATH, domain.id.0);
        self.storage.put_json(&key, &domain).await?;
        domains.insert(domain.id, domain);
        Ok(())
    }

    async fn load_domains(&self) -> ColonyResult<()> {
        let keys = self.storage.list(&format!("{}/", DOMAINS_PATH)).await?;
        let mut domains = self.domains.write().await;
        for key in keys {
            let domain: Domain = self.storage.get_json(&key).await?;
            domains.insert(domain.id, domain);
        }
        debug!("Loaded {} domain(s)", domains.len());
        Ok(())
    }
}

fn parse_address(value: &str) -> ColonyResult<Address> {
    value.parse().map_err(|_| ColonyError::InvalidAddress(value.to_string()))
}
