//! Per-message context threaded through casters, prompts and commands.

use anyhow::{Context, Result};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use herald_core::{InboundMessage, Interaction, ModuleDirectory, Platform};

use crate::detection::ParsedCommand;
use crate::resolver::TypeResolver;

/// Typing indicators expire after ~10s on most platforms.
const TYPING_REFRESH: Duration = Duration::from_secs(9);

#[derive(Clone)]
pub struct CommandContext {
    pub message: InboundMessage,
    pub platform: Arc<dyn Platform>,
    pub modules: Arc<dyn ModuleDirectory>,
    pub resolver: Arc<TypeResolver>,
    /// Prefix and alias the command was invoked with.
    pub parsed: Option<ParsedCommand>,
    /// Set when handling a slash interaction.
    pub interaction: Option<Interaction>,
}

impl CommandContext {
    pub fn new(
        message: InboundMessage,
        platform: Arc<dyn Platform>,
        modules: Arc<dyn ModuleDirectory>,
        resolver: Arc<TypeResolver>,
    ) -> Self {
        Self {
            message,
            platform,
            modules,
            resolver,
            parsed: None,
            interaction: None,
        }
    }

    pub fn with_parsed(mut self, parsed: Option<ParsedCommand>) -> Self {
        self.parsed = parsed;
        self
    }

    pub fn with_interaction(mut self, interaction: Interaction) -> Self {
        self.interaction = Some(interaction);
        self
    }

    /// The same context around another message, e.g. a prompt reply.
    pub fn for_message(&self, message: InboundMessage) -> Self {
        Self {
            message,
            ..self.clone()
        }
    }

    pub fn author_id(&self) -> &str {
        self.message.author_id().unwrap_or_default()
    }

    pub fn channel_id(&self) -> &str {
        &self.message.channel.id
    }

    /// Send text to the message's channel.
    pub async fn reply(&self, text: &str) -> Result<()> {
        self.platform
            .send(&self.message.channel.id, text)
            .await
            .with_context(|| format!("Failed to send to channel {}", self.message.channel.id))
    }
}

// ---------------------------------------------------------------------------
// Typing indicator
// ---------------------------------------------------------------------------

/// Keeps the typing indicator alive until dropped.
pub struct TypingGuard {
    task: JoinHandle<()>,
}

impl TypingGuard {
    pub fn start(platform: Arc<dyn Platform>, channel_id: String) -> Self {
        let task = tokio::spawn(async move {
            loop {
                if let Err(e) = platform.send_typing(&channel_id).await {
                    debug!(channel = %channel_id, error = %e, "[Commands] Typing indicator failed");
                    return;
                }
                tokio::time::sleep(TYPING_REFRESH).await;
            }
        });
        Self { task }
    }
}

impl Drop for TypingGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// Bounded id set
// ---------------------------------------------------------------------------

/// Set of ids with FIFO eviction once `capacity` is reached.
#[derive(Debug)]
pub struct BoundedSet {
    capacity: usize,
    order: VecDeque<String>,
    items: HashSet<String>,
}

impl BoundedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            items: HashSet::new(),
        }
    }

    pub fn insert(&mut self, id: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        let id = id.into();
        if !self.items.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.items.remove(&oldest);
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context_with, MockPlatform};

    #[test]
    fn bounded_set_evicts_oldest() {
        let mut set = BoundedSet::new(2);
        set.insert("a");
        set.insert("b");
        set.insert("a");
        set.insert("c");
        assert!(!set.contains("a"));
        assert!(set.contains("b"));
        assert!(set.contains("c"));
        assert_eq!(set.len(), 2);
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut set = BoundedSet::new(0);
        set.insert("a");
        assert!(!set.contains("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn typing_guard_stops_on_drop() {
        let platform = MockPlatform::new();
        let guard = TypingGuard::start(platform.clone(), "c1".into());
        tokio::time::sleep(Duration::from_secs(20)).await;
        drop(guard);
        let sent = platform.typing_count();
        assert!(sent >= 2, "typing sent {sent} times");
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(platform.typing_count(), sent);
    }

    #[tokio::test]
    async fn reply_goes_to_message_channel() {
        let platform = MockPlatform::new();
        let ctx = context_with(platform.clone(), "hi");
        ctx.reply("hello").await.unwrap();
        assert_eq!(platform.sent(), vec![("c1".to_string(), "hello".to_string())]);
    }
}
