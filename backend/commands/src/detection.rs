/// Prefix and alias detection: find which command, if any, a message invokes.
use std::cmp::Ordering;
use std::collections::HashSet;

use herald_core::InboundMessage;

use crate::registry::CommandRegistry;

/// Result of matching a message against prefixes.
///
/// `prefix` is set whenever a prefix matched, even without a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Id of the invoked command.
    pub command: Option<String>,
    pub prefix: Option<String>,
    pub alias: Option<String>,
    /// Text after the alias.
    pub content: String,
    /// Text after the prefix.
    pub after_prefix: String,
}

/// Prefix order: longer first, equal lengths lexicographically, the empty
/// prefix last.
pub fn prefix_compare(a: &str, b: &str) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.len().cmp(&a.len()).then_with(|| a.cmp(b)),
    }
}

/// Mention prefixes first, then `prefixes` sorted with `prefix_compare`.
pub fn ordered_prefixes(mentions: Vec<String>, mut prefixes: Vec<String>) -> Vec<String> {
    prefixes.sort_by(|a, b| prefix_compare(a, b));
    prefixes.dedup();
    let mut ordered = mentions;
    for prefix in prefixes {
        if !ordered.contains(&prefix) {
            ordered.push(prefix);
        }
    }
    ordered
}

fn strip_prefix_ignore_case<'a>(content: &'a str, prefix: &str) -> Option<&'a str> {
    let mut rest = content;
    for expected in prefix.chars() {
        let mut chars = rest.chars();
        let actual = chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
        rest = chars.as_str();
    }
    Some(rest)
}

/// Match `message` against one prefix.
///
/// With `restrict` set, only those command ids count as found; without it,
/// commands that carry their own prefixes are not found.
pub fn parse_with_prefix(
    registry: &CommandRegistry,
    message: &InboundMessage,
    prefix: &str,
    restrict: Option<&HashSet<String>>,
) -> ParsedCommand {
    let Some(after) = strip_prefix_ignore_case(&message.content, prefix) else {
        return ParsedCommand::default();
    };
    let body = after.trim_start();
    let alias_len = body.find(char::is_whitespace).unwrap_or(body.len());
    let alias = &body[..alias_len];
    let content = body[alias_len..].trim();

    let mut parsed = ParsedCommand {
        command: None,
        prefix: Some(prefix.to_string()),
        alias: Some(alias.to_string()),
        content: content.to_string(),
        after_prefix: after.trim().to_string(),
    };

    if let Some(command) = registry.find_command(alias) {
        let allowed = match restrict {
            Some(ids) => ids.contains(&command.id),
            None => command.options.prefix.is_none(),
        };
        if allowed {
            parsed.command = Some(command.id.clone());
        }
    }
    parsed
}

/// Try each prefix in order. The first parse that found a command wins,
/// else the first one whose prefix matched.
pub fn parse_multiple_prefixes(
    registry: &CommandRegistry,
    message: &InboundMessage,
    prefixes: &[(String, Option<HashSet<String>>)],
) -> ParsedCommand {
    let parses: Vec<ParsedCommand> = prefixes
        .iter()
        .map(|(prefix, restrict)| parse_with_prefix(registry, message, prefix, restrict.as_ref()))
        .collect();

    if let Some(found) = parses.iter().find(|p| p.command.is_some()) {
        return found.clone();
    }
    parses
        .into_iter()
        .find(|p| p.prefix.is_some())
        .unwrap_or_default()
}
