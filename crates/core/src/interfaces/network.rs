use async_trait::async_trait;

use super::ExternalResult;
use crate::crypto::Hash32;
use crate::types::{Address, Resolver, SkillId, Version};

/// The network-wide registry every colony is attached to
#[cfg_attr(feature = "mocks", mockall::automock)]
#[async_trait]
pub trait NetworkRegistry: Send + Sync {
    /// Append a signed reputation change for `user` in `skill_id`
    async fn append_reputation_update_log(
        &self,
        user: Address,
        amount: i128,
        skill_id: SkillId,
    ) -> ExternalResult<()>;

    /// The canonical root hash of the reputation tree
    async fn reputation_root_hash(&self) -> ExternalResult<Hash32>;

    /// The resolver registered for a colony logic version, if any
    async fn colony_version_resolver(&self, version: Version) -> ExternalResult<Option<Resolver>>;
}
