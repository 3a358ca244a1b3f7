use async_trait::async_trait;

use super::ExternalResult;
use crate::types::{Address, DomainId, Role};

/// Domain-scoped authorization checks against the permission hierarchy
#[cfg_attr(feature = "mocks", mockall::automock)]
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Whether `caller` holds `role` in `permission_domain_id` and
    /// `target_domain_id` is reachable from it through `child_skill_index`
    async fn check(
        &self,
        caller: Address,
        permission_domain_id: DomainId,
        child_skill_index: u64,
        target_domain_id: DomainId,
        role: Role,
    ) -> ExternalResult<bool>;

    /// Whether `caller` holds `role` directly in `domain_id`
    async fn has_role(&self, caller: Address, domain_id: DomainId, role: Role) -> ExternalResult<bool>;
}
