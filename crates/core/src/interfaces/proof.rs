use async_trait::async_trait;

use super::ExternalResult;
use crate::crypto::Hash32;

/// Reconstruction of a root hash from a key/value pair and its proof
#[cfg_attr(feature = "mocks", mockall::automock)]
#[async_trait]
pub trait ProofPrimitive: Send + Sync {
    /// The root hash implied by `key`/`value` under `branch_mask` and `siblings`
    async fn implied_root_hash(
        &self,
        key: Vec<u8>,
        value: Vec<u8>,
        branch_mask: Hash32,
        siblings: Vec<Hash32>,
    ) -> ExternalResult<Hash32>;
}
