//! In-prompt bookkeeping: which (channel, user) pairs are answering an
//! argument prompt, and delivery of their next message.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

use herald_core::InboundMessage;

type PromptKey = (String, String);

#[derive(Default)]
struct PromptSlot {
    /// Open prompts for this pair; nested collections are possible.
    depth: usize,
    waiter: Option<oneshot::Sender<InboundMessage>>,
}

#[derive(Default)]
pub struct PromptRegistry {
    slots: Mutex<HashMap<PromptKey, PromptSlot>>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the pair as in-prompt until the guard drops.
    pub fn begin(&self, channel_id: &str, user_id: &str) -> PromptGuard<'_> {
        let key = (channel_id.to_string(), user_id.to_string());
        self.lock().entry(key.clone()).or_default().depth += 1;
        debug!(channel = %channel_id, user = %user_id, "[Prompts] Opened");
        PromptGuard {
            registry: self,
            key,
        }
    }

    pub fn has_prompt(&self, channel_id: &str, user_id: &str) -> bool {
        self.lock()
            .get(&(channel_id.to_string(), user_id.to_string()))
            .is_some_and(|slot| slot.depth > 0)
    }

    /// Whether someone is currently awaiting the pair's next message.
    pub fn is_waiting(&self, channel_id: &str, user_id: &str) -> bool {
        self.lock()
            .get(&(channel_id.to_string(), user_id.to_string()))
            .is_some_and(|slot| slot.waiter.is_some())
    }

    /// Wait up to `time` for the next message of `user_id` in `channel_id`.
    /// The waiter is removed when the time runs out.
    pub async fn next_message(
        &self,
        channel_id: &str,
        user_id: &str,
        time: Duration,
    ) -> Option<InboundMessage> {
        let key = (channel_id.to_string(), user_id.to_string());
        let (tx, rx) = oneshot::channel();
        self.lock().entry(key.clone()).or_default().waiter = Some(tx);

        match tokio::time::timeout(time, rx).await {
            Ok(Ok(message)) => Some(message),
            _ => {
                let mut slots = self.lock();
                if let Some(slot) = slots.get_mut(&key) {
                    slot.waiter = None;
                    if slot.depth == 0 {
                        slots.remove(&key);
                    }
                }
                debug!(channel = %channel_id, user = %user_id, "[Prompts] Wait timed out");
                None
            }
        }
    }

    /// Hand a message to a waiting prompt. Returns `true` when the author is
    /// in a prompt in that channel, whether or not a waiter took it.
    pub fn offer(&self, message: &InboundMessage) -> bool {
        let Some(author) = message.author_id() else {
            return false;
        };
        let mut slots = self.lock();
        let Some(slot) = slots.get_mut(&(message.channel.id.clone(), author.to_string())) else {
            return false;
        };
        if let Some(waiter) = slot.waiter.take() {
            let _ = waiter.send(message.clone());
        }
        slot.depth > 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PromptKey, PromptSlot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Clears the in-prompt mark on drop.
pub struct PromptGuard<'a> {
    registry: &'a PromptRegistry,
    key: PromptKey,
}

impl Drop for PromptGuard<'_> {
    fn drop(&mut self) {
        let mut slots = self.registry.lock();
        if let Some(slot) = slots.get_mut(&self.key) {
            slot.depth = slot.depth.saturating_sub(1);
            if slot.depth == 0 {
                slots.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn guard_clears_prompt() {
        let prompts = PromptRegistry::new();
        {
            let _outer = prompts.begin("c1", "u1");
            let _inner = prompts.begin("c1", "u1");
            assert!(prompts.has_prompt("c1", "u1"));
        }
        assert!(!prompts.has_prompt("c1", "u1"));
    }

    #[tokio::test]
    async fn offer_delivers_to_waiter() {
        let prompts = Arc::new(PromptRegistry::new());
        let _guard = prompts.begin("c1", "u1");
        let waiting = {
            let prompts = prompts.clone();
            tokio::spawn(async move {
                prompts
                    .next_message("c1", "u1", Duration::from_secs(5))
                    .await
            })
        };
        while !prompts.is_waiting("c1", "u1") {
            tokio::task::yield_now().await;
        }
        let other = InboundMessage::new("m0", "u2", "c1", "not mine");
        assert!(!prompts.offer(&other));
        let reply = InboundMessage::new("m1", "u1", "c1", "42");
        assert!(prompts.offer(&reply));
        assert_eq!(waiting.await.unwrap().unwrap().content, "42");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_removes_waiter() {
        let prompts = PromptRegistry::new();
        let got = prompts
            .next_message("c1", "u1", Duration::from_secs(30))
            .await;
        assert!(got.is_none());
        assert!(!prompts.is_waiting("c1", "u1"));
        let late = InboundMessage::new("m1", "u1", "c1", "late");
        assert!(!prompts.offer(&late));
    }
}
