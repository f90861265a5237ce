/// Inhibitor trait and registry.
///
/// Inhibitors are async predicates that block a message or a command.
/// All inhibitors of one stage run concurrently; among those that block, the
/// highest priority wins and ties go to the earliest registered.
use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use herald_core::{CommandInfo, HeraldError, InboundMessage};

use crate::types::InhibitorStage;

// ---------------------------------------------------------------------------
// Inhibitor trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Inhibitor: Send + Sync {
    /// Unique id of the inhibitor.
    fn id(&self) -> &str;

    /// Reason reported when this inhibitor blocks.
    fn reason(&self) -> &str;

    fn stage(&self) -> InhibitorStage;

    fn priority(&self) -> i32 {
        0
    }

    /// Return `true` to block. `command` is only set for the `Post` stage.
    async fn exec(&self, message: &InboundMessage, command: Option<&CommandInfo>) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

type InhibitorBox = Arc<dyn Inhibitor>;

/// Thread-safe registry of inhibitors in registration order.
#[derive(Default, Clone)]
pub struct InhibitorRegistry {
    inhibitors: Arc<RwLock<Vec<InhibitorBox>>>,
}

impl InhibitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, inhibitor: Arc<dyn Inhibitor>) -> Result<(), HeraldError> {
        let mut list = self.inhibitors.write().await;
        if list.iter().any(|i| i.id() == inhibitor.id()) {
            return Err(HeraldError::DuplicateInhibitor(inhibitor.id().to_string()));
        }
        debug!(id = inhibitor.id(), stage = ?inhibitor.stage(), "[Inhibitors] Registered");
        list.push(inhibitor);
        Ok(())
    }

    pub async fn deregister(&self, id: &str) -> bool {
        let mut list = self.inhibitors.write().await;
        let before = list.len();
        list.retain(|i| i.id() != id);
        list.len() != before
    }

    pub async fn ids(&self) -> Vec<String> {
        self.inhibitors
            .read()
            .await
            .iter()
            .map(|i| i.id().to_string())
            .collect()
    }

    /// Ids without waiting; `None` while a registration holds the lock.
    pub fn try_ids(&self) -> Option<Vec<String>> {
        self.inhibitors
            .try_read()
            .ok()
            .map(|list| list.iter().map(|i| i.id().to_string()).collect())
    }

    /// Run every inhibitor of `stage` and return the winning block reason.
    pub async fn test(
        &self,
        stage: InhibitorStage,
        message: &InboundMessage,
        command: Option<&CommandInfo>,
    ) -> Option<String> {
        let chain: Vec<InhibitorBox> = {
            let list = self.inhibitors.read().await;
            list.iter().filter(|i| i.stage() == stage).cloned().collect()
        };
        if chain.is_empty() {
            return None;
        }

        let results = join_all(chain.iter().map(|inhibitor| async move {
            match inhibitor.exec(message, command).await {
                Ok(blocked) => blocked,
                Err(e) => {
                    // Errors in inhibitors are non-fatal
                    warn!("[Inhibitors] {} returned error: {}", inhibitor.id(), e);
                    false
                }
            }
        }))
        .await;

        let mut blocking: Vec<&InhibitorBox> = chain
            .iter()
            .zip(results)
            .filter_map(|(inhibitor, blocked)| blocked.then_some(inhibitor))
            .collect();
        // Stable sort keeps registration order among equal priorities.
        blocking.sort_by_key(|i| std::cmp::Reverse(i.priority()));
        blocking.first().map(|i| {
            debug!(id = i.id(), stage = ?stage, "[Inhibitors] Blocked");
            i.reason().to_string()
        })
    }
}
