//! Upgrade controller
//!
//! The network registry maps each version to a resolver; the colony maps
//! each resolver to the logic it stands for. An upgrade checks that the
//! target is the next version, repoints the colony at the new logic, and
//! then runs that logic's migration, so the migration always executes as
//! the new version.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use colony_core::{
    Address, ColonyEvent, EventSink, JsonStorage, NetworkRegistry, PermissionGate, Resolver, Role,
    Storage, Version, ROOT_DOMAIN_ID,
};

use crate::{UpgradeError, UpgradeResult};

const ACTIVE_RESOLVER_KEY: &str = "reserved/active_resolver";

/// One version of the colony logic
#[async_trait]
pub trait ColonyLogic: Send + Sync {
    /// The version this logic implements
    fn version(&self) -> Version;

    /// Migration entry point, run once right after this logic becomes active
    ///
    /// Versions without a migration return `Ok(())`.
    async fn finish_upgrade(&self) -> UpgradeResult<()>;
}

/// The logic implementations this colony knows how to run
pub struct LogicRegistry {
    genesis: Arc<dyn ColonyLogic>,
    handlers: HashMap<Resolver, Arc<dyn ColonyLogic>>,
}

impl LogicRegistry {
    /// Start from the logic a fresh colony runs
    pub fn new(genesis: Arc<dyn ColonyLogic>) -> Self {
        Self {
            genesis,
            handlers: HashMap::new(),
        }
    }

    /// Install the logic behind `resolver`
    pub fn with_handler(mut self, resolver: Resolver, logic: Arc<dyn ColonyLogic>) -> Self {
        self.handlers.insert(resolver, logic);
        self
    }

    fn get(&self, resolver: &Resolver) -> Option<Arc<dyn ColonyLogic>> {
        self.handlers.get(resolver).cloned()
    }
}

/// Moves the colony between logic versions
pub struct UpgradeController {
    logic: LogicRegistry,
    registry: Arc<dyn NetworkRegistry>,
    permissions: Arc<dyn PermissionGate>,
    events: Arc<dyn EventSink>,
    storage: Arc<dyn Storage>,
    /// The logic currently in effect, with the resolver it came from
    active: RwLock<(Option<Resolver>, Arc<dyn ColonyLogic>)>,
    /// Serializes upgrades
    upgrade_lock: Mutex<()>,
}

impl UpgradeController {
    /// Open the controller, restoring the active logic from storage
    pub async fn open(
        logic: LogicRegistry,
        registry: Arc<dyn NetworkRegistry>,
        permissions: Arc<dyn PermissionGate>,
        events: Arc<dyn EventSink>,
        storage: Arc<dyn Storage>,
    ) -> UpgradeResult<Self> {
        let stored: Option<Resolver> = storage.try_get_json(ACTIVE_RESOLVER_KEY).await?;

        let active = match stored {
            Some(resolver) => {
                let active = logic.get(&resolver).ok_or(UpgradeError::UnknownResolver(resolver))?;
                (Some(resolver), active)
            }
            None => (None, logic.genesis.clone()),
        };

        info!("Colony logic at {}", active.1.version());

        Ok(Self {
            logic,
            registry,
            permissions,
            events,
            storage,
            active: RwLock::new(active),
            upgrade_lock: Mutex::new(()),
        })
    }

    /// The version of the active logic
    pub async fn current_version(&self) -> Version {
        self.active.read().await.1.version()
    }

    /// The active logic
    pub async fn active_logic(&self) -> Arc<dyn ColonyLogic> {
        self.active.read().await.1.clone()
    }

    /// Advance the colony to `new_version`, which must be the next version
    pub async fn upgrade(&self, caller: Address, new_version: Version) -> UpgradeResult<()> {
        let _guard = self.upgrade_lock.lock().await;

        if !self.permissions.has_role(caller, ROOT_DOMAIN_ID, Role::Root).await? {
            warn!("Rejected upgrade by {}: not root", caller);
            return Err(UpgradeError::Unauthorized(format!(
                "{} lacks the {} role",
                caller,
                Role::Root
            )));
        }

        let current = self.current_version().await;
        if current.next() != Some(new_version) {
            return Err(UpgradeError::VersionSkipOrDowngrade {
                current,
                requested: new_version,
            });
        }

        let resolver = self
            .registry
            .colony_version_resolver(new_version)
            .await?
            .ok_or(UpgradeError::UnregisteredVersion(new_version))?;

        let next = match self.logic.get(&resolver) {
            Some(logic) if logic.version() == new_version => logic,
            Some(logic) => {
                error!(
                    "{} is registered for {} but its logic reports {}",
                    resolver,
                    new_version,
                    logic.version()
                );
                return Err(UpgradeError::UnregisteredVersion(new_version));
            }
            None => return Err(UpgradeError::UnregisteredVersion(new_version)),
        };

        let previous = self.repoint(Some(resolver), next.clone()).await;
        if let Err(e) = self.store_pointer(Some(resolver)).await {
            self.repoint(previous.0, previous.1).await;
            return Err(e);
        }

        // Runs with the new logic already active
        if let Err(e) = next.finish_upgrade().await {
            warn!("Migration to {} failed, restoring {}: {}", new_version, current, e);
            self.repoint(previous.0, previous.1).await;
            if let Err(store_err) = self.store_pointer(previous.0).await {
                error!("Failed to restore stored logic pointer: {}", store_err);
            }
            return Err(match e {
                UpgradeError::Migration { .. } => e,
                other => UpgradeError::Migration {
                    version: new_version,
                    reason: other.to_string(),
                },
            });
        }

        info!("Upgraded colony from {} to {} via {}", current, new_version, resolver);
        self.events.emit(ColonyEvent::ColonyUpgraded {
            caller,
            old_version: current,
            new_version,
        }).await;

        Ok(())
    }

    /// Swap the active logic, returning what was active before
    async fn repoint(
        &self,
        resolver: Option<Resolver>,
        logic: Arc<dyn ColonyLogic>,
    ) -> (Option<Resolver>, Arc<dyn ColonyLogic>) {
        let mut active = self.active.write().await;
        std::mem::replace(&mut *active, (resolver, logic))
    }

    async fn store_pointer(&self, resolver: Option<Resolver>) -> UpgradeResult<()> {
        match resolver {
            Some(resolver) => self.storage.put_json(ACTIVE_RESOLVER_KEY, &resolver).await?,
            None => self.storage.delete(ACTIVE_RESOLVER_KEY).await?,
        }
        Ok(())
    }
}
