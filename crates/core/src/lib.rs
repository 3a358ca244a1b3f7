//! Core colony module
//!
//! This module provides the fundamental components shared by the colony
//! ledger crates: identity and domain types, hashing, storage, audit
//! events, and the interfaces of the external collaborators.

pub mod types;
pub mod crypto;
pub mod storage;
pub mod events;
pub mod interfaces;

// Re-export key components
pub use types::{Address, Domain, DomainId, Resolver, Role, SkillId, Version, ROOT_DOMAIN_ID};
pub use crypto::{sha256, Hash32};
pub use storage::{FileStorage, JsonStorage, MemoryStorage, Storage, StorageError, StorageResult};
pub use events::{ColonyEvent, EventLog, EventSink};
pub use interfaces::{
    ExternalError, ExternalResult, NetworkRegistry, PermissionGate, ProofPrimitive, StakeLocking,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for the colony
///
/// `RUST_LOG` takes precedence; `default_level` is used when it is unset.
/// Calling this more than once is harmless, later calls are ignored.
pub fn init_tracing(default_level: &str) {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("Global tracing subscriber already installed");
    }
}
