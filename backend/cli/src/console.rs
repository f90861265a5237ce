//! Console platform: the handler talks to stdout instead of a chat service.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use herald_core::{
    Author, ChannelInfo, EntityKind, Interaction, InteractionOption, OptionKind, Permission,
    PermissionSet, Platform,
};

use crate::terminal_output::bot_line;

pub const CONSOLE_CHANNEL: &str = "console";

pub struct ConsolePlatform {
    client_id: String,
}

impl ConsolePlatform {
    pub fn new() -> Self {
        Self {
            client_id: "herald".to_string(),
        }
    }
}

#[async_trait]
impl Platform for ConsolePlatform {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn send(&self, channel_id: &str, content: &str) -> Result<()> {
        println!("{}", bot_line(channel_id, content));
        Ok(())
    }

    async fn send_typing(&self, channel_id: &str) -> Result<()> {
        debug!(channel = %channel_id, "[Console] Typing");
        Ok(())
    }

    async fn permissions(
        &self,
        _channel: &ChannelInfo,
        _guild_id: Option<&str>,
        _user_id: &str,
    ) -> Result<PermissionSet> {
        Ok([Permission::Administrator].into_iter().collect())
    }

    /// Numeric ids resolve to themselves; there is nothing else to look up.
    async fn resolve(
        &self,
        kind: EntityKind,
        _guild_id: Option<&str>,
        query: &str,
    ) -> Result<Option<String>> {
        let numeric = !query.is_empty() && query.chars().all(|c| c.is_ascii_digit());
        Ok(match kind {
            EntityKind::User | EntityKind::Member | EntityKind::Channel | EntityKind::Role => {
                numeric.then(|| query.to_string())
            }
            _ => None,
        })
    }
}

/// Turn `/name key=value ...` into an interaction. Values that parse as
/// integers, numbers or booleans get those kinds; a bare word is a
/// subcommand.
pub fn parse_slash(id: &str, user_id: &str, line: &str) -> Option<Interaction> {
    let mut words = line.strip_prefix('/')?.split_whitespace();
    let name = words.next()?.to_lowercase();
    let options = words
        .map(|word| match word.split_once('=') {
            Some((key, raw)) => {
                let (kind, value) = if let Ok(n) = raw.parse::<i64>() {
                    (OptionKind::Integer, serde_json::json!(n))
                } else if let Ok(n) = raw.parse::<f64>() {
                    (OptionKind::Number, serde_json::json!(n))
                } else if let Ok(b) = raw.parse::<bool>() {
                    (OptionKind::Boolean, serde_json::json!(b))
                } else {
                    (OptionKind::String, serde_json::json!(raw))
                };
                InteractionOption {
                    name: key.to_string(),
                    kind,
                    value,
                }
            }
            None => InteractionOption {
                name: word.to_string(),
                kind: OptionKind::SubCommand,
                value: serde_json::Value::Null,
            },
        })
        .collect();

    Some(Interaction {
        id: id.to_string(),
        command_name: name,
        options,
        author: Author::user(user_id, user_id),
        channel: ChannelInfo::guild(CONSOLE_CHANNEL),
        guild_id: Some("console".to_string()),
        created_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_slash_options_by_value_shape() {
        let interaction = parse_slash("1", "me", "/Greet name=ada times=3 loud=true add").unwrap();
        assert_eq!(interaction.command_name, "greet");
        let kinds: Vec<(&str, OptionKind)> = interaction
            .options
            .iter()
            .map(|o| (o.name.as_str(), o.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("name", OptionKind::String),
                ("times", OptionKind::Integer),
                ("loud", OptionKind::Boolean),
                ("add", OptionKind::SubCommand),
            ]
        );
        assert!(parse_slash("2", "me", "no slash").is_none());
        assert!(parse_slash("3", "me", "/").is_none());
    }

    #[tokio::test]
    async fn resolves_numeric_ids_only() {
        let platform = ConsolePlatform::new();
        assert_eq!(
            platform.resolve(EntityKind::User, None, "123").await.unwrap(),
            Some("123".into())
        );
        assert_eq!(platform.resolve(EntityKind::User, None, "bob").await.unwrap(), None);
        assert_eq!(platform.resolve(EntityKind::Emoji, None, "1").await.unwrap(), None);
    }
}
