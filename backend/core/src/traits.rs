use anyhow::Result;
use async_trait::async_trait;

use crate::message::ChannelInfo;
use crate::types::{EntityKind, ModuleKind, PermissionSet};

/// The chat platform client, as seen by the dispatcher.
///
/// Gateway handling, caching and REST live behind this trait; Herald only
/// needs to talk back to channels and ask a few questions.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Id of the bot user itself.
    fn client_id(&self) -> &str;

    /// Send a plain text message to a channel.
    async fn send(&self, channel_id: &str, content: &str) -> Result<()>;

    /// Show the typing indicator in a channel.
    async fn send_typing(&self, channel_id: &str) -> Result<()>;

    /// Permissions `user_id` holds in `channel`.
    async fn permissions(
        &self,
        channel: &ChannelInfo,
        guild_id: Option<&str>,
        user_id: &str,
    ) -> Result<PermissionSet>;

    /// Resolve an id, mention, or name to an entity id. `None` when nothing matches.
    async fn resolve(
        &self,
        _kind: EntityKind,
        _guild_id: Option<&str>,
        _query: &str,
    ) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Read-only view over the loaded modules (commands, inhibitors, listeners,
/// tasks, context-menu commands).
pub trait ModuleDirectory: Send + Sync {
    fn contains(&self, kind: ModuleKind, id: &str) -> bool;

    fn ids(&self, kind: ModuleKind) -> Vec<String>;

    /// Resolve a command alias to a command id.
    fn resolve_alias(&self, _alias: &str) -> Option<String> {
        None
    }

    fn category_of(&self, _kind: ModuleKind, _id: &str) -> Option<String> {
        None
    }
}

/// A directory with no modules at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyDirectory;

impl ModuleDirectory for EmptyDirectory {
    fn contains(&self, _kind: ModuleKind, _id: &str) -> bool {
        false
    }

    fn ids(&self, _kind: ModuleKind) -> Vec<String> {
        Vec::new()
    }
}
