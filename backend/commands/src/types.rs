/// Command option types: channel restrictions, locks, permission checks,
/// ignore lists, prefixes and responses.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use herald_core::{InboundMessage, OptionKind, PermissionSet};

use crate::value::ArgMap;

// ---------------------------------------------------------------------------
// Channel restriction
// ---------------------------------------------------------------------------

/// Where a command may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelRestriction {
    Guild,
    Dm,
}

// ---------------------------------------------------------------------------
// Lock
// ---------------------------------------------------------------------------

/// Computes a lock key from a message and its parsed arguments.
/// `None` means the invocation is not locked.
#[async_trait]
pub trait LockKey: Send + Sync {
    async fn key(&self, message: &InboundMessage, args: &ArgMap) -> Option<String>;
}

/// What a command's lock is keyed on.
#[derive(Clone)]
pub enum LockKind {
    User,
    Channel,
    Guild,
    Custom(Arc<dyn LockKey>),
}

impl LockKind {
    pub async fn key(&self, message: &InboundMessage, args: &ArgMap) -> Option<String> {
        match self {
            Self::User => message.author_id().map(str::to_string),
            Self::Channel => Some(message.channel.id.clone()),
            // DMs share one lock slot.
            Self::Guild => Some(message.guild_id.clone().unwrap_or_default()),
            Self::Custom(f) => f.key(message, args).await,
        }
    }
}

impl fmt::Debug for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("User"),
            Self::Channel => f.write_str("Channel"),
            Self::Guild => f.write_str("Guild"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// A dynamic permission check. Returns the missing permissions, if any.
#[async_trait]
pub trait PermissionPredicate: Send + Sync {
    async fn missing(&self, message: &InboundMessage) -> Option<Vec<String>>;
}

#[derive(Clone)]
pub enum PermissionCheck {
    /// Checked against the platform's resolved permissions.
    Static(PermissionSet),
    Custom(Arc<dyn PermissionPredicate>),
}

impl fmt::Debug for PermissionCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(set) => f.debug_tuple("Static").field(set).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Ignore lists
// ---------------------------------------------------------------------------

type MessagePredicate = dyn Fn(&InboundMessage) -> bool + Send + Sync;

/// Users exempt from cooldowns or permission checks.
#[derive(Clone)]
pub enum IgnoreList {
    Users(HashSet<String>),
    Predicate(Arc<MessagePredicate>),
}

impl IgnoreList {
    pub fn users<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Users(ids.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, message: &InboundMessage) -> bool {
        match self {
            Self::Users(ids) => message.author_id().is_some_and(|id| ids.contains(id)),
            Self::Predicate(f) => f(message),
        }
    }
}

impl fmt::Debug for IgnoreList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Users(ids) => f.debug_tuple("Users").field(ids).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Prefixes
// ---------------------------------------------------------------------------

type PrefixFn = dyn Fn(&InboundMessage) -> Vec<String> + Send + Sync;

#[derive(Clone)]
pub enum Prefixes {
    Static(Vec<String>),
    /// Computed per message, e.g. per-guild prefixes.
    Dynamic(Arc<PrefixFn>),
}

impl Prefixes {
    pub fn resolve(&self, message: &InboundMessage) -> Vec<String> {
        match self {
            Self::Static(list) => list.clone(),
            Self::Dynamic(f) => f(message),
        }
    }
}

impl Default for Prefixes {
    fn default() -> Self {
        Self::Static(vec!["!".to_string()])
    }
}

impl fmt::Debug for Prefixes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(list) => f.debug_tuple("Static").field(list).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Slash commands
// ---------------------------------------------------------------------------

/// One declared slash-command option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashOptionSpec {
    pub name: String,
    pub kind: OptionKind,
    pub required: bool,
    pub description: String,
}

impl SlashOptionSpec {
    pub fn new(name: impl Into<String>, kind: OptionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            description: String::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// How declared-but-unset slash options that carry no plain value appear
/// in the argument map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnsetOptionPolicy {
    /// Present as null.
    #[default]
    Null,
    /// Left out of the map.
    Absent,
}

impl std::str::FromStr for UnsetOptionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "null" => Ok(Self::Null),
            "absent" => Ok(Self::Absent),
            other => Err(format!("unknown unset option policy '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Text a command hands back. Sent to the channel by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub text: String,
    /// Only visible to the invoker where the platform supports it.
    pub ephemeral: bool,
}

impl CommandResponse {
    pub fn ok(text: impl Into<String>) -> Self {
        Self { text: text.into(), ephemeral: false }
    }

    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self { text: text.into(), ephemeral: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lock_keys() {
        let msg = InboundMessage::new("m1", "u1", "c1", "");
        let args = ArgMap::new();
        assert_eq!(LockKind::User.key(&msg, &args).await.as_deref(), Some("u1"));
        assert_eq!(LockKind::Channel.key(&msg, &args).await.as_deref(), Some("c1"));
        assert_eq!(LockKind::Guild.key(&msg, &args).await.as_deref(), Some("guild"));
        assert_eq!(LockKind::Guild.key(&msg.clone().in_dm(), &args).await.as_deref(), Some(""));
    }

    #[test]
    fn ignore_list_matches_author() {
        let list = IgnoreList::users(["u1"]);
        assert!(list.contains(&InboundMessage::new("m1", "u1", "c1", "")));
        assert!(!list.contains(&InboundMessage::new("m1", "u2", "c1", "")));
        let by_channel = IgnoreList::Predicate(Arc::new(|m: &InboundMessage| m.channel.id == "c9"));
        assert!(by_channel.contains(&InboundMessage::new("m1", "u2", "c9", "")));
    }

    #[test]
    fn unset_policy_parses() {
        assert_eq!("absent".parse::<UnsetOptionPolicy>(), Ok(UnsetOptionPolicy::Absent));
        assert!("maybe".parse::<UnsetOptionPolicy>().is_err());
    }
}
