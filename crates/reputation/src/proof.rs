//! Reputation inclusion proofs
//!
//! A reputation entry is keyed by the positional concatenation of colony
//! address, skill id and user address. The layout has no length or version
//! tag; existing proof producers depend on it byte for byte:
//!
//! ```text
//! offset  0..20   colony address
//! offset 20..52   skill id, 32-byte big-endian word
//! offset 52..72   user address
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use colony_core::{Address, Hash32, NetworkRegistry, ProofPrimitive, SkillId};

/// Length of an encoded reputation key
pub const KEY_LEN: usize = 72;

const COLONY_OFFSET: usize = 0;
const SKILL_OFFSET: usize = 20;
const USER_OFFSET: usize = 52;

/// The decoded form of a reputation key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReputationKey {
    pub colony: Address,
    pub skill_id: SkillId,
    pub user: Address,
}

impl ReputationKey {
    /// Create a new key
    pub fn new(colony: Address, skill_id: SkillId, user: Address) -> Self {
        Self { colony, skill_id, user }
    }

    /// Encode the key in its fixed positional layout
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(KEY_LEN);
        bytes.extend_from_slice(self.colony.as_bytes());
        bytes.extend_from_slice(&self.skill_id.to_word());
        bytes.extend_from_slice(self.user.as_bytes());
        bytes
    }

    /// Decode a key; `None` unless `bytes` is exactly one well-formed key
    /// whose skill id fits a [`SkillId`]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let (colony, word, user) = split_key(bytes)?;
        let skill_id = SkillId::from_word(&word)?;
        Some(Self { colony, skill_id, user })
    }
}

/// Split a key into colony, raw skill word and user without interpreting
/// the skill
fn split_key(bytes: &[u8]) -> Option<(Address, [u8; 32], Address)> {
    if bytes.len() != KEY_LEN {
        return None;
    }

    let colony = Address::from_slice(&bytes[COLONY_OFFSET..SKILL_OFFSET]).ok()?;
    let word: [u8; 32] = bytes[SKILL_OFFSET..USER_OFFSET].try_into().ok()?;
    let user = Address::from_slice(&bytes[USER_OFFSET..KEY_LEN]).ok()?;
    Some((colony, word, user))
}

/// A complete claim: key, value and the proof binding them to a root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationProof {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub branch_mask: Hash32,
    pub siblings: Vec<Hash32>,
}

/// Checks reputation claims against the network's canonical root
///
/// Verification is read-only and never fails: every negative outcome,
/// including a collaborator error, is reported as `false`.
pub struct ReputationProofVerifier {
    /// This colony's own address
    colony: Address,
    /// Source of the canonical root hash
    registry: Arc<dyn NetworkRegistry>,
    /// Tree-proof primitive
    primitive: Arc<dyn ProofPrimitive>,
}

impl ReputationProofVerifier {
    /// Create a verifier for `colony`
    pub fn new(
        colony: Address,
        registry: Arc<dyn NetworkRegistry>,
        primitive: Arc<dyn ProofPrimitive>,
    ) -> Self {
        Self { colony, registry, primitive }
    }

    /// Whether `caller`'s reputation entry `key`/`value` is included under
    /// the canonical root
    ///
    /// Only self-attestation is accepted: the key must name this colony and
    /// the caller. The skill word is opaque here and may use all 32 bytes.
    pub async fn verify(
        &self,
        caller: Address,
        key: &[u8],
        value: &[u8],
        branch_mask: Hash32,
        siblings: &[Hash32],
    ) -> bool {
        let (colony, skill_word, user) = match split_key(key) {
            Some(parts) => parts,
            None => {
                debug!("Rejected reputation proof: malformed key of {} bytes", key.len());
                return false;
            }
        };

        if colony != self.colony {
            debug!("Rejected reputation proof: key names colony {}", colony);
            return false;
        }

        if user != caller {
            debug!("Rejected reputation proof: key names {}, caller is {}", user, caller);
            return false;
        }

        let root = match self.registry.reputation_root_hash().await {
            Ok(root) => root,
            Err(e) => {
                warn!("Could not fetch reputation root hash: {}", e);
                return false;
            }
        };

        let implied = match self.primitive.implied_root_hash(
            key.to_vec(),
            value.to_vec(),
            branch_mask,
            siblings.to_vec(),
        ).await {
            Ok(implied) => implied,
            Err(e) => {
                warn!("Could not compute implied root hash: {}", e);
                return false;
            }
        };

        let included = implied == root;
        debug!(
            "Reputation proof for {} in skill 0x{}: {}",
            caller,
            hex::encode(skill_word),
            if included { "included" } else { "root mismatch" }
        );
        included
    }

    /// Convenience wrapper over [`verify`](Self::verify) for a bundled proof
    pub async fn verify_proof(&self, caller: Address, proof: &ReputationProof) -> bool {
        self.verify(caller, &proof.key, &proof.value, proof.branch_mask, &proof.siblings).await
    }
}
