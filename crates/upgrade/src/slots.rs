//! Storage slots
//!
//! Per-identity values live at slot addresses derived by hashing the
//! identity together with a namespace index. Two fixed slots hold global
//! configuration: the network registry reference and the root local skill.
//! A derived address that equals either of them would let the owner of the
//! identity overwrite that configuration.
//!
//! Two layers keep that from happening. Reserved configuration is stored
//! under its own `reserved/` namespace as a typed [`ReservedConfig`], and
//! [`SlotStore`] can only address `slots/`, so a derived slot never reaches
//! it. On top of that every derived write goes through [`protect_slot`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use colony_core::{sha256, Address, Hash32, JsonStorage, SkillId, Storage};

use crate::{UpgradeError, UpgradeResult};

/// Slot index of the network registry reference
pub const NETWORK_REGISTRY_SLOT: u64 = 6;
/// Slot index of the root local skill reference
pub const ROOT_LOCAL_SKILL_SLOT: u64 = 36;
/// Namespace index of the meta-transaction nonce mapping
pub const METATRANSACTION_NONCES_SLOT: u64 = 35;

const RESERVED_CONFIG_KEY: &str = "reserved/config";
const SLOTS_PATH: &str = "slots";

/// A 32-byte storage location
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotAddress(pub Hash32);

impl SlotAddress {
    /// The fixed slot with the given index
    pub fn fixed(index: u64) -> Self {
        Self(Hash32::from_u64(index))
    }

    /// The slots that derived addresses must never equal
    pub fn reserved() -> [SlotAddress; 2] {
        [Self::fixed(NETWORK_REGISTRY_SLOT), Self::fixed(ROOT_LOCAL_SKILL_SLOT)]
    }
}

impl fmt::Display for SlotAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derive the slot of `identity` in the mapping at `namespace`
///
/// `sha256(pad32(identity) || be32(namespace))`
pub fn derive_slot(identity: &Address, namespace: u64) -> SlotAddress {
    let mut preimage = [0u8; 64];
    preimage[12..32].copy_from_slice(identity.as_bytes());
    preimage[32..].copy_from_slice(Hash32::from_u64(namespace).as_bytes());
    SlotAddress(sha256(&preimage))
}

/// Refuse any write to `slot` if it is one of the reserved slots
pub fn protect_slot(slot: &SlotAddress) -> UpgradeResult<()> {
    if SlotAddress::reserved().contains(slot) {
        error!("Refusing write to reserved slot {}", slot);
        return Err(UpgradeError::ProtectedVariable(slot.0));
    }
    Ok(())
}

/// Global configuration kept out of reach of derived slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedConfig {
    /// The network registry this colony belongs to
    pub network_registry: Address,
    /// Root of this colony's local skill tree
    pub root_local_skill: SkillId,
}

impl ReservedConfig {
    /// Load the reserved configuration, if it has been written
    pub async fn load(storage: &dyn Storage) -> UpgradeResult<Option<Self>> {
        Ok(storage.try_get_json(RESERVED_CONFIG_KEY).await?)
    }

    /// Write the reserved configuration
    pub async fn store(&self, storage: &dyn Storage) -> UpgradeResult<()> {
        storage.put_json(RESERVED_CONFIG_KEY, self).await?;
        info!("Stored reserved configuration: registry {}, root skill {}", self.network_registry, self.root_local_skill);
        Ok(())
    }
}

/// Storage for values at derived slot addresses
#[derive(Clone)]
pub struct SlotStore {
    storage: Arc<dyn Storage>,
}

impl SlotStore {
    /// Create a slot store on top of `storage`
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    fn storage_key(slot: &SlotAddress) -> String {
        format!("{}/{}", SLOTS_PATH, slot.0.to_hex())
    }

    /// Read the counter at `slot`; unset slots read as zero
    pub async fn read_u128(&self, slot: &SlotAddress) -> UpgradeResult<u128> {
        let value: Option<u128> = self.storage.try_get_json(&Self::storage_key(slot)).await?;
        Ok(value.unwrap_or(0))
    }

    /// Write the counter at `slot`
    pub async fn write_u128(&self, slot: &SlotAddress, value: u128) -> UpgradeResult<()> {
        protect_slot(slot)?;
        self.storage.put_json(&Self::storage_key(slot), &value).await?;
        Ok(())
    }
}
