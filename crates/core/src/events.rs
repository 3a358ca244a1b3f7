//! Audit records emitted by the colony
//!
//! Events are informational only; nothing in the colony reads them back.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::types::{Address, SkillId, Version};

/// An audit record of a successful operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColonyEvent {
    /// Reputation of `user` in `skill_id` was adjusted by `amount`
    ReputationRewardAdjusted {
        caller: Address,
        skill_id: SkillId,
        user: Address,
        amount: i128,
    },
    /// Colony metadata was replaced
    ColonyMetadata {
        caller: Address,
        metadata: String,
    },
    /// The active logic moved from `old_version` to `new_version`
    ColonyUpgraded {
        caller: Address,
        old_version: Version,
        new_version: Version,
    },
}

/// Destination for audit records
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Record an event
    async fn emit(&self, event: ColonyEvent);
}

/// An in-memory, append-only event log
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<RwLock<Vec<ColonyEvent>>>,
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, oldest first
    pub async fn events(&self) -> Vec<ColonyEvent> {
        self.events.read().await.clone()
    }

    /// Number of recorded events
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// Whether the log is empty
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl EventSink for EventLog {
    async fn emit(&self, event: ColonyEvent) {
        info!(?event, "Colony event");
        self.events.write().await.push(event);
    }
}
