//! Herald runtime configuration schema.
//!
//! Every field is optional so that partial files deserialize cleanly;
//! `defaults::apply_all_defaults` fills in the rest.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for Herald.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeraldConfig {
    /// Command handler behavior
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<HandlerConfig>,

    /// Defaults for argument prompts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<PromptConfig>,

    /// Built-in inhibitors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inhibitors: Option<InhibitorsConfig>,

    /// Logging configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerConfig {
    /// Global command prefixes, e.g. `["!", "?"]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefixes: Option<Vec<String>>,
    /// Accept `<@bot>` mentions as a prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_mention: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_client: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_bots: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owners: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_users: Option<Vec<String>>,
    /// Cooldown applied to commands without their own, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_cooldown_ms: Option<u64>,
    /// User ids that bypass cooldowns (owners when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_cooldown: Option<Vec<String>>,
    /// User ids that bypass user permission checks (owners when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_permissions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle_edits: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_typing: Option<bool>,
    /// Regex stripped from aliases to register extra alias forms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias_replacement: Option<String>,
    /// How many deleted message ids to remember
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_capacity: Option<usize>,
    /// "null" | "absent"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unset_slash_options: Option<String>,
}

// ---------------------------------------------------------------------------
// Prompt defaults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_word: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_word: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infinite: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakout: Option<bool>,
}

// ---------------------------------------------------------------------------
// Inhibitors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InhibitorsConfig {
    /// User ids whose messages are dropped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blacklist: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_words: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_commands: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_categories: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Directory for rolling JSON log files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    /// Redact tokens and phone numbers in event logs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redact_sensitive: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_yaml() {
        let yaml = r#"
handler:
  prefixes: ["!", "?"]
  allowMention: false
  defaultCooldownMs: 1500
  unsetSlashOptions: absent
prompt:
  retries: 3
  cancelWord: quit
"#;
        let cfg: HeraldConfig = serde_yaml::from_str(yaml).unwrap();
        let handler = cfg.handler.unwrap();
        assert_eq!(handler.prefixes.unwrap(), vec!["!", "?"]);
        assert_eq!(handler.allow_mention, Some(false));
        assert_eq!(handler.default_cooldown_ms, Some(1500));
        assert_eq!(handler.unset_slash_options.as_deref(), Some("absent"));
        let prompt = cfg.prompt.unwrap();
        assert_eq!(prompt.retries, Some(3));
        assert_eq!(prompt.cancel_word.as_deref(), Some("quit"));
    }

    #[test]
    fn empty_document_is_default() {
        let cfg: HeraldConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg, HeraldConfig::default());
    }
}
