//! End-to-end tests of the colony facade
//!
//! Collaborators are mockall mocks; storage is in memory unless a test
//! checks persistence.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::predicate::eq;

use colony::{
    Address, Collaborators, Colony, ColonyConfig, ColonyError, ColonyEvent, ColonyLogic, Domain,
    DomainId, EventLog, Hash32, LedgerError, LogicRegistry, ReputationError, ReputationKey, Resolver, Role,
    SkillId, StakeTransfer, UpgradeError, Version, ROOT_DOMAIN_ID,
};
use colony_core::interfaces::{
    MockNetworkRegistry, MockPermissionGate, MockProofPrimitive, MockStakeLocking,
};
use colony_core::{JsonStorage, MemoryStorage, Storage};
use colony_upgrade::{ReservedConfig, UpgradeResult};

const COLONY: &str = "0xc0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0";
const TOKEN: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";
const REGISTRY: &str = "0x0606060606060606060606060606060606060606";

const DOMAIN: DomainId = DomainId(2);

fn addr(n: u8) -> Address {
    Address::new([n; 20])
}

fn root_user() -> Address {
    addr(0xaa)
}

fn arbiter() -> Address {
    addr(0xab)
}

fn config() -> ColonyConfig {
    ColonyConfig {
        colony_address: COLONY.to_string(),
        token_address: TOKEN.to_string(),
        network_registry: REGISTRY.to_string(),
        root_skill_id: 1,
        log_level: "debug".to_string(),
        storage_dir: None,
    }
}

struct StaticLogic(Version);

#[async_trait]
impl ColonyLogic for StaticLogic {
    fn version(&self) -> Version {
        self.0
    }

    async fn finish_upgrade(&self) -> UpgradeResult<()> {
        Ok(())
    }
}

fn logic() -> LogicRegistry {
    LogicRegistry::new(Arc::new(StaticLogic(Version(1))))
        .with_handler(Resolver(addr(0x02)), Arc::new(StaticLogic(Version(2))))
}

fn permissions() -> MockPermissionGate {
    let mut gate = MockPermissionGate::new();
    gate.expect_has_role()
        .returning(|caller, domain, role| {
            Ok(caller == root_user() && domain == ROOT_DOMAIN_ID && role == Role::Root)
        });
    gate.expect_check()
        .returning(|caller, _, _, _, role| Ok(caller == arbiter() && role == Role::Arbitration));
    gate
}

fn accepting_stake_locking() -> MockStakeLocking {
    let mut locking = MockStakeLocking::new();
    locking.expect_approve_stake().returning(|_, _, _| Ok(()));
    locking.expect_obligate_stake().returning(|_, _, _| Ok(()));
    locking.expect_deobligate_stake().returning(|_, _, _| Ok(()));
    locking.expect_transfer_stake().returning(|_, _, _, _| Ok(()));
    locking
}

struct Harness {
    registry: MockNetworkRegistry,
    stake_locking: MockStakeLocking,
    proof: MockProofPrimitive,
}

impl Harness {
    fn new() -> Self {
        Self {
            registry: MockNetworkRegistry::new(),
            stake_locking: accepting_stake_locking(),
            proof: MockProofPrimitive::new(),
        }
    }

    fn collaborators(self, events: Arc<EventLog>) -> Collaborators {
        Collaborators {
            registry: Arc::new(self.registry),
            stake_locking: Arc::new(self.stake_locking),
            permissions: Arc::new(permissions()),
            proof: Arc::new(self.proof),
            events,
        }
    }

    async fn build(self, storage: Arc<dyn Storage>) -> (Colony, Arc<EventLog>) {
        let events = Arc::new(EventLog::new());
        let colony = Colony::new(&config(), self.collaborators(events.clone()), storage, logic())
            .await
            .unwrap();
        (colony, events)
    }
}

async fn colony_with_domain(harness: Harness) -> (Colony, Arc<EventLog>) {
    let (colony, events) = harness.build(Arc::new(MemoryStorage::new())).await;
    colony.register_domain(root_user(), Domain::new(DOMAIN, SkillId(7))).await.unwrap();
    (colony, events)
}

#[test_log::test(tokio::test)]
async fn test_fresh_colony_has_root_domain() {
    let storage = Arc::new(MemoryStorage::new());
    let (colony, _) = Harness::new().build(storage.clone()).await;

    assert_eq!(colony.address(), COLONY.parse::<Address>().unwrap());
    assert_eq!(colony.domain(ROOT_DOMAIN_ID).await.unwrap(), Domain::new(ROOT_DOMAIN_ID, SkillId(1)));
    assert_eq!(colony.domain_count().await, 1);
    assert_eq!(colony.version().await, Version(1));

    let stored = ReservedConfig::load(storage.as_ref()).await.unwrap().unwrap();
    assert_eq!(stored.network_registry, REGISTRY.parse::<Address>().unwrap());
    assert_eq!(stored.root_local_skill, SkillId(1));
}

#[tokio::test]
async fn test_register_domain_requires_root() {
    let (colony, _) = Harness::new().build(Arc::new(MemoryStorage::new())).await;

    let err = colony.register_domain(addr(1), Domain::new(DOMAIN, SkillId(7))).await.unwrap_err();
    assert!(matches!(err, ColonyError::Unauthorized(_)));

    colony.register_domain(root_user(), Domain::new(DOMAIN, SkillId(7))).await.unwrap();
    assert_eq!(colony.domain(DOMAIN).await.unwrap().skill_id, SkillId(7));

    let err = colony.register_domain(root_user(), Domain::new(DOMAIN, SkillId(8))).await.unwrap_err();
    assert!(matches!(err, ColonyError::DomainExists(DomainId(2))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_of_one_domain() {
    for _ in 0..16 {
        let storage = Arc::new(MemoryStorage::new());
        let (colony, _) = Harness::new().build(storage.clone()).await;

        let (first, second) = tokio::join!(
            colony.register_domain(root_user(), Domain::new(DOMAIN, SkillId(7))),
            colony.register_domain(root_user(), Domain::new(DOMAIN, SkillId(8))),
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes.iter().any(|r| matches!(r, Err(ColonyError::DomainExists(DomainId(2))))));

        let stored: Domain = storage.get_json("domains/2").await.unwrap();
        assert_eq!(colony.domain(DOMAIN).await.unwrap(), stored);
        assert_eq!(colony.domain_count().await, 2);
    }
}

#[tokio::test]
async fn test_unknown_domain_is_rejected_before_mirroring() {
    let mut harness = Harness::new();
    harness.stake_locking = MockStakeLocking::new();
    harness.stake_locking.expect_approve_stake().never();
    let (colony, _) = harness.build(Arc::new(MemoryStorage::new())).await;

    let err = colony.approve_stake(addr(1), addr(2), DomainId(9), 100).await.unwrap_err();
    assert!(matches!(err, ColonyError::DomainNotFound(DomainId(9))));
    assert_eq!(colony.allowance(addr(1), addr(2), DomainId(9)).await, 0);

    let err = colony.emit_domain_reputation_reward(root_user(), DomainId(9), addr(1), 5).await.unwrap_err();
    assert!(matches!(err, ColonyError::DomainNotFound(DomainId(9))));
}

#[tokio::test]
async fn test_stake_lifecycle() {
    let (colony, _) = colony_with_domain(Harness::new()).await;
    let (user, obligator) = (addr(1), addr(2));

    colony.approve_stake(user, obligator, DOMAIN, 100).await.unwrap();
    colony.obligate_stake(obligator, user, DOMAIN, 60).await.unwrap();
    assert_eq!(colony.allowance(user, obligator, DOMAIN).await, 40);
    assert_eq!(colony.obligation(user, obligator, DOMAIN).await, 60);

    let err = colony.obligate_stake(obligator, user, DOMAIN, 50).await.unwrap_err();
    assert!(matches!(err, ColonyError::Ledger(LedgerError::InsufficientAllowance { .. })));

    colony.deobligate_stake(obligator, user, DOMAIN, 20).await.unwrap();
    assert_eq!(colony.obligation(user, obligator, DOMAIN).await, 40);
    assert_eq!(colony.allowance(user, obligator, DOMAIN).await, 40);

    let transfer = StakeTransfer {
        caller: arbiter(),
        permission_domain_id: ROOT_DOMAIN_ID,
        child_skill_index: 0,
        obligator,
        user,
        domain: DOMAIN,
        amount: 30,
        beneficiary: addr(4),
    };
    colony.transfer_stake(transfer).await.unwrap();
    assert_eq!(colony.obligation(user, obligator, DOMAIN).await, 10);

    let err = colony.transfer_stake(StakeTransfer { amount: 20, ..transfer }).await.unwrap_err();
    assert!(matches!(err, ColonyError::Ledger(LedgerError::InsufficientObligation { .. })));

    let err = colony.transfer_stake(StakeTransfer { caller: addr(9), amount: 5, ..transfer }).await.unwrap_err();
    assert!(matches!(err, ColonyError::Ledger(LedgerError::Unauthorized(_))));
}

#[tokio::test]
async fn test_metadata_edit_is_audited() {
    let (colony, events) = Harness::new().build(Arc::new(MemoryStorage::new())).await;

    let err = colony.edit_colony_metadata(addr(1), "ipfs://nope".into()).await.unwrap_err();
    assert!(matches!(err, ColonyError::Unauthorized(_)));
    assert!(events.is_empty().await);

    colony.edit_colony_metadata(root_user(), "ipfs://colony".into()).await.unwrap();
    assert_eq!(events.events().await, vec![ColonyEvent::ColonyMetadata {
        caller: root_user(),
        metadata: "ipfs://colony".into(),
    }]);
}

#[tokio::test]
async fn test_domain_reputation_uses_domain_skill() {
    let mut harness = Harness::new();
    harness.registry.expect_append_reputation_update_log()
        .with(eq(addr(1)), eq(25i128), eq(SkillId(7)))
        .times(1)
        .returning(|_, _, _| Ok(()));
    harness.registry.expect_append_reputation_update_log()
        .with(eq(addr(1)), eq(-5i128), eq(SkillId(7)))
        .times(1)
        .returning(|_, _, _| Ok(()));
    let (colony, events) = colony_with_domain(harness).await;

    colony.emit_domain_reputation_reward(root_user(), DOMAIN, addr(1), 25).await.unwrap();
    colony.emit_domain_reputation_penalty(arbiter(), ROOT_DOMAIN_ID, 0, DOMAIN, addr(1), -5).await.unwrap();

    let err = colony.emit_domain_reputation_reward(root_user(), DOMAIN, addr(1), 0).await.unwrap_err();
    assert!(matches!(err, ColonyError::Reputation(ReputationError::InvalidAmount(_))));

    assert_eq!(events.len().await, 2);
}

#[tokio::test]
async fn test_reputation_proof_through_colony() {
    let root = Hash32::new([0x42; 32]);
    let mut harness = Harness::new();
    harness.registry.expect_reputation_root_hash().returning(move || Ok(root));
    harness.proof.expect_implied_root_hash().returning(move |_, _, _, _| Ok(root));
    let (colony, _) = harness.build(Arc::new(MemoryStorage::new())).await;

    let user = addr(5);
    let key = ReputationKey::new(colony.address(), SkillId(1), user).encode();
    let value = vec![0u8; 64];

    assert!(colony.verify_reputation_proof(user, &key, &value, Hash32::ZERO, &[]).await);
    assert!(!colony.verify_reputation_proof(addr(6), &key, &value, Hash32::ZERO, &[]).await);
}

#[tokio::test]
async fn test_nonces_and_upgrade() {
    let mut harness = Harness::new();
    harness.registry.expect_colony_version_resolver()
        .with(eq(Version(2)))
        .returning(|_| Ok(Some(Resolver(addr(0x02)))));
    let (colony, events) = harness.build(Arc::new(MemoryStorage::new())).await;

    assert_eq!(colony.metatransaction_nonce(addr(1)).await.unwrap(), 0);
    assert_eq!(colony.increment_metatransaction_nonce(addr(1)).await.unwrap(), 1);

    let err = colony.upgrade(root_user(), Version(3)).await.unwrap_err();
    assert!(matches!(err, ColonyError::Upgrade(UpgradeError::VersionSkipOrDowngrade { .. })));

    colony.upgrade(root_user(), Version(2)).await.unwrap();
    assert_eq!(colony.version().await, Version(2));
    assert_eq!(colony.active_logic().await.version(), Version(2));
    assert_eq!(events.len().await, 1);

    // Nonces survive the upgrade
    assert_eq!(colony.metatransaction_nonce(addr(1)).await.unwrap(), 1);
}

#[tokio::test]
async fn test_state_survives_reopen_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = ColonyConfig {
        storage_dir: Some(dir.path().to_path_buf()),
        ..config()
    };
    let (user, obligator) = (addr(1), addr(2));

    {
        let events = Arc::new(EventLog::new());
        let colony = Colony::from_config(&config, Harness::new().collaborators(events), logic())
            .await
            .unwrap();
        colony.register_domain(root_user(), Domain::new(DOMAIN, SkillId(7))).await.unwrap();
        colony.approve_stake(user, obligator, DOMAIN, 100).await.unwrap();
        colony.obligate_stake(obligator, user, DOMAIN, 60).await.unwrap();
        colony.increment_metatransaction_nonce(user).await.unwrap();
    }

    let events = Arc::new(EventLog::new());
    let colony = Colony::from_config(&config, Harness::new().collaborators(events), logic())
        .await
        .unwrap();
    assert_eq!(colony.domain_count().await, 2);
    assert_eq!(colony.domain(DOMAIN).await.unwrap().skill_id, SkillId(7));
    assert_eq!(colony.allowance(user, obligator, DOMAIN).await, 40);
    assert_eq!(colony.obligation(user, obligator, DOMAIN).await, 60);
    assert_eq!(colony.metatransaction_nonce(user).await.unwrap(), 1);
}

#[tokio::test]
async fn test_configuration_errors() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    Harness::new().build(storage.clone()).await;

    let changed = ColonyConfig { root_skill_id: 2, ..config() };
    let events = Arc::new(EventLog::new());
    let err = Colony::new(&changed, Harness::new().collaborators(events), storage, logic())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ColonyError::Config(_)));

    let bad = ColonyConfig { token_address: "0x1234".into(), ..config() };
    let events = Arc::new(EventLog::new());
    let err = Colony::new(&bad, Harness::new().collaborators(events), Arc::new(MemoryStorage::new()), logic())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ColonyError::InvalidAddress(a) if a == "0x1234"));
}
