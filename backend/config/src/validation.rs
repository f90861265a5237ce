//! Config validation with path-qualified messages.

use crate::schema::HeraldConfig;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// Errors and warnings found in one validation pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

pub fn validate(config: &HeraldConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_handler(config, &mut report);
    validate_prompt(config, &mut report);
    validate_inhibitors(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_handler(config: &HeraldConfig, report: &mut ValidationReport) {
    let Some(handler) = &config.handler else { return };

    let mention = handler.allow_mention.unwrap_or(true);
    match &handler.prefixes {
        Some(prefixes) if prefixes.is_empty() && !mention => {
            report.error(
                "handler.prefixes",
                "No prefixes and mentions disabled; no command can be invoked",
            );
        }
        Some(prefixes) => {
            if prefixes.iter().any(|p| p.is_empty()) {
                report.warn(
                    "handler.prefixes",
                    "Empty prefix matches every message; it is tried last",
                );
            }
            if prefixes.iter().any(|p| p.chars().any(char::is_whitespace)) {
                report.warn("handler.prefixes", "Prefix contains whitespace");
            }
        }
        None => {}
    }

    if let Some(pattern) = &handler.alias_replacement {
        if let Err(e) = Regex::new(pattern) {
            report.error(
                "handler.aliasReplacement",
                format!("Invalid regex '{pattern}': {e}"),
            );
        }
    }

    if let Some(policy) = &handler.unset_slash_options {
        if !matches!(policy.as_str(), "null" | "absent") {
            report.error(
                "handler.unsetSlashOptions",
                format!("Unknown policy '{policy}'. Use 'null' or 'absent'"),
            );
        }
    }

    if handler.deleted_capacity == Some(0) {
        report.warn(
            "handler.deletedCapacity",
            "Capacity 0 forgets deletes immediately; edits of deleted messages will run",
        );
    }

    for (path, ids) in [
        ("handler.owners", &handler.owners),
        ("handler.superUsers", &handler.super_users),
    ] {
        if ids.iter().flatten().any(|id| id.trim().is_empty()) {
            report.error(path, "User id cannot be empty");
        }
    }
}

fn validate_prompt(config: &HeraldConfig, report: &mut ValidationReport) {
    let Some(prompt) = &config.prompt else { return };

    if prompt.time_ms == Some(0) {
        report.error("prompt.timeMs", "timeMs must be > 0");
    }
    if prompt.limit == Some(0) {
        report.error("prompt.limit", "limit must be >= 1");
    }
    if let Some(retries) = prompt.retries {
        if retries > 10 {
            report.warn(
                "prompt.retries",
                format!("{retries} retries keeps users in prompts for a long time"),
            );
        }
    }
    if let (Some(cancel), Some(stop)) = (&prompt.cancel_word, &prompt.stop_word) {
        if cancel.eq_ignore_ascii_case(stop) {
            report.error("prompt.stopWord", "stopWord must differ from cancelWord");
        }
    }
    for (path, word) in [
        ("prompt.cancelWord", &prompt.cancel_word),
        ("prompt.stopWord", &prompt.stop_word),
    ] {
        if word.as_deref().is_some_and(|w| w.trim().is_empty()) {
            report.error(path, "Word cannot be empty");
        }
    }
}

fn validate_inhibitors(config: &HeraldConfig, report: &mut ValidationReport) {
    let Some(inhibitors) = &config.inhibitors else { return };
    if let Some(words) = &inhibitors.blocked_words {
        if words.iter().any(|w| w.trim().is_empty()) {
            report.error("inhibitors.blockedWords", "Blocked word cannot be empty");
        }
    }
}

fn validate_logging(config: &HeraldConfig, report: &mut ValidationReport) {
    let Some(logging) = &config.logging else { return };
    if let Some(level) = &logging.level {
        if !matches!(
            level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            report.error(
                "logging.level",
                format!("Unknown level '{level}'. Use trace, debug, info, warn or error"),
            );
        }
    }
}
