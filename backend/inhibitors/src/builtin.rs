/// Built-in inhibitors.
///
/// Bundled inhibitors that can be enabled from configuration. Each one is a
/// concrete struct implementing `Inhibitor`.
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;

use herald_core::{CommandInfo, InboundMessage};

use crate::registry::Inhibitor;
use crate::types::InhibitorStage;

// ---------------------------------------------------------------------------
// Blacklist: drops every message from listed users
// ---------------------------------------------------------------------------

pub struct BlacklistInhibitor {
    pub users: HashSet<String>,
}

impl BlacklistInhibitor {
    pub fn new<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            users: users.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Inhibitor for BlacklistInhibitor {
    fn id(&self) -> &str {
        "blacklist"
    }

    fn reason(&self) -> &str {
        "blacklist"
    }

    fn stage(&self) -> InhibitorStage {
        InhibitorStage::All
    }

    async fn exec(&self, message: &InboundMessage, _command: Option<&CommandInfo>) -> Result<bool> {
        Ok(message
            .author_id()
            .is_some_and(|id| self.users.contains(id)))
    }
}

// ---------------------------------------------------------------------------
// Blocked words: blocks messages containing a word from the list
// ---------------------------------------------------------------------------

pub struct BlockedWordsInhibitor {
    pub blocked_words: Vec<String>,
}

impl BlockedWordsInhibitor {
    pub fn new(blocked_words: Vec<String>) -> Self {
        Self {
            blocked_words: blocked_words.into_iter().map(|w| w.to_lowercase()).collect(),
        }
    }
}

#[async_trait]
impl Inhibitor for BlockedWordsInhibitor {
    fn id(&self) -> &str {
        "blockedWords"
    }

    fn reason(&self) -> &str {
        "blockedWords"
    }

    fn stage(&self) -> InhibitorStage {
        InhibitorStage::Pre
    }

    async fn exec(&self, message: &InboundMessage, _command: Option<&CommandInfo>) -> Result<bool> {
        let lower = message.content.to_lowercase();
        Ok(self.blocked_words.iter().any(|w| lower.contains(w.as_str())))
    }
}

// ---------------------------------------------------------------------------
// Disabled commands: blocks listed command ids or whole categories
// ---------------------------------------------------------------------------

pub struct DisabledCommandsInhibitor {
    pub commands: HashSet<String>,
    pub categories: HashSet<String>,
    pub priority: i32,
}

#[async_trait]
impl Inhibitor for DisabledCommandsInhibitor {
    fn id(&self) -> &str {
        "disabledCommands"
    }

    fn reason(&self) -> &str {
        "disabled"
    }

    fn stage(&self) -> InhibitorStage {
        InhibitorStage::Post
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn exec(&self, _message: &InboundMessage, command: Option<&CommandInfo>) -> Result<bool> {
        Ok(command.is_some_and(|c| {
            self.commands.contains(&c.id) || self.categories.contains(&c.category)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blacklist_blocks_listed_author() {
        let inhibitor = BlacklistInhibitor::new(["u1"]);
        let blocked = InboundMessage::new("m1", "u1", "c1", "!ping");
        let allowed = InboundMessage::new("m2", "u2", "c1", "!ping");
        assert!(inhibitor.exec(&blocked, None).await.unwrap());
        assert!(!inhibitor.exec(&allowed, None).await.unwrap());
    }

    #[tokio::test]
    async fn blocked_words_are_case_insensitive() {
        let inhibitor = BlockedWordsInhibitor::new(vec!["Spam".into()]);
        let msg = InboundMessage::new("m1", "u1", "c1", "buy SPAM now");
        assert!(inhibitor.exec(&msg, None).await.unwrap());
    }

    #[tokio::test]
    async fn disabled_commands_match_id_or_category() {
        let inhibitor = DisabledCommandsInhibitor {
            commands: ["ban".to_string()].into_iter().collect(),
            categories: ["fun".to_string()].into_iter().collect(),
            priority: 0,
        };
        let msg = InboundMessage::new("m1", "u1", "c1", "!x");
        let info = |id: &str, category: &str| CommandInfo {
            id: id.into(),
            category: category.into(),
            aliases: vec![],
        };
        assert!(inhibitor.exec(&msg, Some(&info("ban", "mod"))).await.unwrap());
        assert!(inhibitor.exec(&msg, Some(&info("joke", "fun"))).await.unwrap());
        assert!(!inhibitor.exec(&msg, Some(&info("ping", "util"))).await.unwrap());
        assert!(!inhibitor.exec(&msg, None).await.unwrap());
    }
}
