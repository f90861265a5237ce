//! Type resolver: the registry of named casters used by arguments.
//!
//! A caster turns one phrase into an `ArgValue`, or reports failure. Casters
//! never return errors; anything that goes wrong while casting is a failed
//! cast. The resolver is seeded with every `BuiltinType` and can be extended
//! or overridden by name.

use async_trait::async_trait;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::context::CommandContext;
use crate::value::ArgValue;

// ---------------------------------------------------------------------------
// Cast outcome
// ---------------------------------------------------------------------------

/// Result of casting one phrase.
#[derive(Debug, Clone, PartialEq)]
pub enum CastOutcome {
    Value(ArgValue),
    /// The phrase did not cast. The optional payload is handed to
    /// `otherwise` and prompt text builders.
    Failure(Option<ArgValue>),
}

impl CastOutcome {
    pub fn fail() -> Self {
        Self::Failure(None)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn value(self) -> Option<ArgValue> {
        match self {
            Self::Value(v) => Some(v),
            Self::Failure(_) => None,
        }
    }
}

impl From<Option<ArgValue>> for CastOutcome {
    fn from(value: Option<ArgValue>) -> Self {
        match value {
            Some(v) => Self::Value(v),
            None => Self::Failure(None),
        }
    }
}

impl From<ArgValue> for CastOutcome {
    fn from(value: ArgValue) -> Self {
        Self::Value(value)
    }
}

// ---------------------------------------------------------------------------
// Caster trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Caster: Send + Sync {
    async fn cast(&self, ctx: &CommandContext, phrase: &str) -> CastOutcome;
}

/// Adapter for synchronous closures.
pub struct FnCaster<F>(pub F);

#[async_trait]
impl<F> Caster for FnCaster<F>
where
    F: Fn(&CommandContext, &str) -> CastOutcome + Send + Sync,
{
    async fn cast(&self, ctx: &CommandContext, phrase: &str) -> CastOutcome {
        (self.0)(ctx, phrase)
    }
}

pub fn caster_fn<F>(f: F) -> Arc<dyn Caster>
where
    F: Fn(&CommandContext, &str) -> CastOutcome + Send + Sync + 'static,
{
    Arc::new(FnCaster(f))
}

// ---------------------------------------------------------------------------
// Argument type
// ---------------------------------------------------------------------------

/// How an argument's phrase is cast.
#[derive(Clone)]
pub enum ArgumentType {
    /// A caster registered in the resolver under this name.
    Named(String),
    /// Accepted spellings per entry, matched case-insensitively. The first
    /// spelling of the matching entry is the resulting value.
    Choices(Vec<Vec<String>>),
    /// Regex match; yields `{match, groups}`.
    Pattern(Regex),
    Caster(Arc<dyn Caster>),
}

impl ArgumentType {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn choices<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Choices(choices.into_iter().map(|c| vec![c.into()]).collect())
    }

    pub fn caster(caster: Arc<dyn Caster>) -> Self {
        Self::Caster(caster)
    }

    /// Short label used as a tag by `tagged_union`.
    pub fn describe(&self) -> String {
        match self {
            Self::Named(name) => name.clone(),
            Self::Choices(_) => "choices".to_string(),
            Self::Pattern(re) => re.as_str().to_string(),
            Self::Caster(_) => "custom".to_string(),
        }
    }
}

impl Default for ArgumentType {
    fn default() -> Self {
        Self::Named(BuiltinType::String.name().to_string())
    }
}

impl fmt::Debug for ArgumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Choices(c) => f.debug_tuple("Choices").field(c).finish(),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Caster(_) => f.write_str("Caster(..)"),
        }
    }
}

impl From<&str> for ArgumentType {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for ArgumentType {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<BuiltinType> for ArgumentType {
    fn from(ty: BuiltinType) -> Self {
        Self::Named(ty.name().to_string())
    }
}

impl From<Regex> for ArgumentType {
    fn from(re: Regex) -> Self {
        Self::Pattern(re)
    }
}

// ---------------------------------------------------------------------------
// Built-in types
// ---------------------------------------------------------------------------

/// The casters every resolver starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    String,
    Lowercase,
    Uppercase,
    CharCodes,
    Number,
    Integer,
    BigInt,
    Emojint,
    Url,
    Date,
    Color,
    UserMention,
    MemberMention,
    ChannelMention,
    RoleMention,
    EmojiMention,
    User,
    Member,
    Channel,
    Role,
    Emoji,
    Guild,
    Message,
    CommandAlias,
    Command,
    Inhibitor,
    Listener,
    Task,
    ContextMenuCommand,
}

impl BuiltinType {
    pub const ALL: [BuiltinType; 29] = [
        Self::String,
        Self::Lowercase,
        Self::Uppercase,
        Self::CharCodes,
        Self::Number,
        Self::Integer,
        Self::BigInt,
        Self::Emojint,
        Self::Url,
        Self::Date,
        Self::Color,
        Self::UserMention,
        Self::MemberMention,
        Self::ChannelMention,
        Self::RoleMention,
        Self::EmojiMention,
        Self::User,
        Self::Member,
        Self::Channel,
        Self::Role,
        Self::Emoji,
        Self::Guild,
        Self::Message,
        Self::CommandAlias,
        Self::Command,
        Self::Inhibitor,
        Self::Listener,
        Self::Task,
        Self::ContextMenuCommand,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Lowercase => "lowercase",
            Self::Uppercase => "uppercase",
            Self::CharCodes => "charCodes",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::BigInt => "bigint",
            Self::Emojint => "emojint",
            Self::Url => "url",
            Self::Date => "date",
            Self::Color => "color",
            Self::UserMention => "userMention",
            Self::MemberMention => "memberMention",
            Self::ChannelMention => "channelMention",
            Self::RoleMention => "roleMention",
            Self::EmojiMention => "emojiMention",
            Self::User => "user",
            Self::Member => "member",
            Self::Channel => "channel",
            Self::Role => "role",
            Self::Emoji => "emoji",
            Self::Guild => "guild",
            Self::Message => "message",
            Self::CommandAlias => "commandAlias",
            Self::Command => "command",
            Self::Inhibitor => "inhibitor",
            Self::Listener => "listener",
            Self::Task => "task",
            Self::ContextMenuCommand => "contextMenuCommand",
        }
    }
}

impl FromStr for BuiltinType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| format!("unknown built-in type '{s}'"))
    }
}

impl fmt::Display for BuiltinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Name → caster map shared by every command of a handler.
pub struct TypeResolver {
    types: RwLock<HashMap<String, Arc<dyn Caster>>>,
}

impl TypeResolver {
    /// A resolver with every built-in type registered.
    pub fn new() -> Self {
        let resolver = Self::empty();
        resolver.add_types(
            BuiltinType::ALL
                .into_iter()
                .map(|ty| (ty.name().to_string(), Arc::new(ty) as Arc<dyn Caster>)),
        );
        resolver
    }

    pub fn empty() -> Self {
        Self {
            types: RwLock::new(HashMap::new()),
        }
    }

    /// Register a caster, replacing any existing one with the same name.
    pub fn add_type(&self, name: impl Into<String>, caster: Arc<dyn Caster>) {
        let name = name.into();
        debug!(r#type = %name, "[Types] Registered caster");
        self.types
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name, caster);
    }

    pub fn add_types<I>(&self, types: I)
    where
        I: IntoIterator<Item = (String, Arc<dyn Caster>)>,
    {
        let mut map = self.types.write().unwrap_or_else(|e| e.into_inner());
        map.extend(types);
    }

    pub fn type_of(&self, name: &str) -> Option<Arc<dyn Caster>> {
        self.types
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.types
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    /// Cast `phrase` with `ty`.
    pub async fn cast(&self, ty: &ArgumentType, ctx: &CommandContext, phrase: &str) -> CastOutcome {
        match ty {
            ArgumentType::Named(name) => match self.type_of(name) {
                Some(caster) => caster.cast(ctx, phrase).await,
                None => {
                    warn!(r#type = %name, "[Types] Unknown caster name");
                    CastOutcome::fail()
                }
            },
            ArgumentType::Choices(choices) => cast_choice(choices, phrase),
            ArgumentType::Pattern(re) => cast_pattern(re, phrase),
            ArgumentType::Caster(caster) => caster.cast(ctx, phrase).await,
        }
    }
}

impl Default for TypeResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn cast_choice(choices: &[Vec<String>], phrase: &str) -> CastOutcome {
    if phrase.is_empty() {
        return CastOutcome::fail();
    }
    let lower = phrase.to_lowercase();
    choices
        .iter()
        .find(|spellings| spellings.iter().any(|s| s.to_lowercase() == lower))
        .and_then(|spellings| spellings.first())
        .map(|canonical| ArgValue::text(canonical.clone()))
        .into()
}

fn cast_pattern(re: &Regex, phrase: &str) -> CastOutcome {
    re.captures(phrase).map(|caps| capture_map(&caps)).into()
}

/// `{match, groups}` for one regex match; unmatched groups are null.
pub(crate) fn capture_map(caps: &regex::Captures<'_>) -> ArgValue {
    let groups = caps
        .iter()
        .skip(1)
        .map(|g| g.map_or(ArgValue::Null, |m| ArgValue::text(m.as_str())))
        .collect();
    let mut map = BTreeMap::new();
    map.insert("match".to_string(), ArgValue::text(&caps[0]));
    map.insert("groups".to_string(), ArgValue::List(groups));
    ArgValue::Map(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_context;

    #[test]
    fn every_builtin_is_registered() {
        let resolver = TypeResolver::new();
        for ty in BuiltinType::ALL {
            assert!(resolver.has_type(ty.name()), "{ty} missing");
            assert_eq!(ty.name().parse::<BuiltinType>(), Ok(ty));
        }
    }

    #[tokio::test]
    async fn add_type_overrides_builtin() {
        let ctx = test_context("");
        ctx.resolver.add_type(
            "string",
            caster_fn(|_, phrase| ArgValue::text(format!("<{phrase}>")).into()),
        );
        let out = ctx.resolver.cast(&"string".into(), &ctx, "x").await;
        assert_eq!(out, CastOutcome::Value(ArgValue::text("<x>")));
    }

    #[tokio::test]
    async fn unknown_name_fails_closed() {
        let ctx = test_context("");
        let out = ctx.resolver.cast(&"nope".into(), &ctx, "x").await;
        assert!(out.is_failure());
    }

    #[tokio::test]
    async fn choices_are_case_insensitive_and_canonical() {
        let ctx = test_context("");
        let ty = ArgumentType::Choices(vec![
            vec!["red".into(), "r".into()],
            vec!["blue".into()],
        ]);
        assert_eq!(
            ctx.resolver.cast(&ty, &ctx, "R").await,
            CastOutcome::Value(ArgValue::text("red"))
        );
        assert!(ctx.resolver.cast(&ty, &ctx, "green").await.is_failure());
        assert!(ctx.resolver.cast(&ty, &ctx, "").await.is_failure());
    }

    #[tokio::test]
    async fn pattern_yields_match_and_groups() {
        let ctx = test_context("");
        let ty = ArgumentType::Pattern(Regex::new(r"(\d+)-(\d+)?").unwrap());
        let out = ctx.resolver.cast(&ty, &ctx, "12-").await.value().unwrap();
        assert_eq!(out.get("match"), Some(&ArgValue::text("12-")));
        assert_eq!(
            out.get("groups"),
            Some(&ArgValue::List(vec![ArgValue::text("12"), ArgValue::Null]))
        );
    }
}
