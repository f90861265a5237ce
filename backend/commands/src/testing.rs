//! Test doubles: a recording platform and a fixed module directory.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use herald_core::{
    ChannelInfo, EntityKind, InboundMessage, ModuleDirectory, ModuleKind, Permission,
    PermissionSet, Platform,
};

use crate::context::CommandContext;
use crate::prompt::PromptRegistry;
use crate::resolver::TypeResolver;

pub const CLIENT_ID: &str = "bot";

/// Platform that records what it was asked to do.
#[derive(Default)]
pub struct MockPlatform {
    sent: Mutex<Vec<(String, String)>>,
    typing: AtomicUsize,
    entities: Mutex<HashSet<(EntityKind, String)>>,
    client_permissions: Mutex<Option<PermissionSet>>,
    user_permissions: Mutex<HashMap<String, PermissionSet>>,
    fail_sends: AtomicBool,
}

impl MockPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_entity(self: Arc<Self>, kind: EntityKind, id: &str) -> Arc<Self> {
        self.entities.lock().unwrap().insert((kind, id.to_string()));
        self
    }

    pub fn with_client_permissions(self: Arc<Self>, permissions: &[Permission]) -> Arc<Self> {
        *self.client_permissions.lock().unwrap() = Some(permissions.iter().copied().collect());
        self
    }

    pub fn with_user_permissions(self: Arc<Self>, user_id: &str, permissions: &[Permission]) -> Arc<Self> {
        self.user_permissions
            .lock()
            .unwrap()
            .insert(user_id.to_string(), permissions.iter().copied().collect());
        self
    }

    pub fn failing_sends(self: Arc<Self>) -> Arc<Self> {
        self.fail_sends.store(true, Ordering::SeqCst);
        self
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }

    pub fn typing_count(&self) -> usize {
        self.typing.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn client_id(&self) -> &str {
        CLIENT_ID
    }

    async fn send(&self, channel_id: &str, content: &str) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            bail!("send rejected");
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), content.to_string()));
        Ok(())
    }

    async fn send_typing(&self, _channel_id: &str) -> Result<()> {
        self.typing.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn permissions(
        &self,
        _channel: &ChannelInfo,
        _guild_id: Option<&str>,
        user_id: &str,
    ) -> Result<PermissionSet> {
        let admin: PermissionSet = [Permission::Administrator].into_iter().collect();
        if user_id == CLIENT_ID {
            return Ok(self.client_permissions.lock().unwrap().clone().unwrap_or(admin));
        }
        Ok(self
            .user_permissions
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or(admin))
    }

    async fn resolve(
        &self,
        kind: EntityKind,
        _guild_id: Option<&str>,
        query: &str,
    ) -> Result<Option<String>> {
        let found = self
            .entities
            .lock()
            .unwrap()
            .contains(&(kind, query.to_string()));
        Ok(found.then(|| query.to_string()))
    }
}

/// Directory with command `ping` (alias `p`) and inhibitor `blacklist`.
pub struct StaticDirectory;

impl ModuleDirectory for StaticDirectory {
    fn contains(&self, kind: ModuleKind, id: &str) -> bool {
        self.ids(kind).iter().any(|known| known == id)
    }

    fn ids(&self, kind: ModuleKind) -> Vec<String> {
        match kind {
            ModuleKind::Command => vec!["ping".into()],
            ModuleKind::Inhibitor => vec!["blacklist".into()],
            _ => Vec::new(),
        }
    }

    fn resolve_alias(&self, alias: &str) -> Option<String> {
        matches!(alias, "ping" | "p").then(|| "ping".to_string())
    }

    fn category_of(&self, kind: ModuleKind, id: &str) -> Option<String> {
        self.contains(kind, id).then(|| "default".to_string())
    }
}

pub fn context_with(platform: Arc<MockPlatform>, content: &str) -> CommandContext {
    CommandContext::new(
        InboundMessage::new("m1", "u1", "c1", content),
        platform,
        Arc::new(StaticDirectory),
        Arc::new(TypeResolver::new()),
    )
}

pub fn test_context(content: &str) -> CommandContext {
    context_with(MockPlatform::new(), content)
}

/// Yield until someone is waiting on the pair's next message.
pub async fn wait_for_prompt(prompts: &PromptRegistry, channel_id: &str, user_id: &str) {
    while !prompts.is_waiting(channel_id, user_id) {
        tokio::task::yield_now().await;
    }
}
