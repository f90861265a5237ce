//! Config defaults: fills unset fields of a parsed config.

use crate::schema::{HandlerConfig, HeraldConfig, LoggingConfig, PromptConfig};

pub const DEFAULT_PREFIX: &str = "!";

/// Deleted message ids remembered by the handler.
pub const DEFAULT_DELETED_CAPACITY: usize = 1000;

pub const DEFAULT_PROMPT_RETRIES: u32 = 1;

pub const DEFAULT_PROMPT_TIME_MS: u64 = 30_000;

pub const DEFAULT_CANCEL_WORD: &str = "cancel";

pub const DEFAULT_STOP_WORD: &str = "stop";

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: HeraldConfig) -> HeraldConfig {
    let config = apply_handler_defaults(config);
    let config = apply_prompt_defaults(config);
    apply_logging_defaults(config)
}

fn apply_handler_defaults(mut config: HeraldConfig) -> HeraldConfig {
    let handler = config.handler.get_or_insert_with(HandlerConfig::default);
    handler
        .prefixes
        .get_or_insert_with(|| vec![DEFAULT_PREFIX.to_string()]);
    handler.allow_mention.get_or_insert(true);
    handler.block_client.get_or_insert(true);
    handler.block_bots.get_or_insert(true);
    handler.default_cooldown_ms.get_or_insert(0);
    handler.handle_edits.get_or_insert(false);
    handler.command_typing.get_or_insert(false);
    handler.deleted_capacity.get_or_insert(DEFAULT_DELETED_CAPACITY);
    handler
        .unset_slash_options
        .get_or_insert_with(|| "null".to_string());
    config
}

fn apply_prompt_defaults(mut config: HeraldConfig) -> HeraldConfig {
    let prompt = config.prompt.get_or_insert_with(PromptConfig::default);
    prompt.retries.get_or_insert(DEFAULT_PROMPT_RETRIES);
    prompt.time_ms.get_or_insert(DEFAULT_PROMPT_TIME_MS);
    prompt
        .cancel_word
        .get_or_insert_with(|| DEFAULT_CANCEL_WORD.to_string());
    prompt
        .stop_word
        .get_or_insert_with(|| DEFAULT_STOP_WORD.to_string());
    prompt.optional.get_or_insert(false);
    prompt.infinite.get_or_insert(false);
    prompt.breakout.get_or_insert(true);
    config
}

fn apply_logging_defaults(mut config: HeraldConfig) -> HeraldConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    logging
        .level
        .get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    logging.redact_sensitive.get_or_insert(true);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_prefix_and_prompt_defaults() {
        let cfg = apply_all_defaults(HeraldConfig::default());
        let handler = cfg.handler.unwrap();
        assert_eq!(handler.prefixes.unwrap(), vec![DEFAULT_PREFIX]);
        assert_eq!(handler.deleted_capacity, Some(DEFAULT_DELETED_CAPACITY));
        let prompt = cfg.prompt.unwrap();
        assert_eq!(prompt.retries, Some(1));
        assert_eq!(prompt.time_ms, Some(30_000));
        assert_eq!(prompt.cancel_word.as_deref(), Some("cancel"));
    }

    #[test]
    fn does_not_override_user_values() {
        let mut cfg = HeraldConfig::default();
        cfg.handler = Some(HandlerConfig {
            prefixes: Some(vec!["?".into()]),
            allow_mention: Some(false),
            ..Default::default()
        });
        let cfg = apply_all_defaults(cfg);
        let handler = cfg.handler.unwrap();
        assert_eq!(handler.prefixes.unwrap(), vec!["?"]);
        assert_eq!(handler.allow_mention, Some(false));
    }
}
