//! Built-in casters and caster combinators.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use herald_core::{EntityKind, ModuleKind};

use crate::context::CommandContext;
use crate::resolver::{ArgumentType, BuiltinType, CastOutcome, Caster};
use crate::value::ArgValue;

static USER_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<@!?(\d{15,21})>$").unwrap());
static CHANNEL_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<#(\d{15,21})>$").unwrap());
static ROLE_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<@&(\d{15,21})>$").unwrap());
static EMOJI_MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<a?:[A-Za-z0-9_]+:(\d{15,21})>$").unwrap());
static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<?(https?://[^\s/?#<>]+[^\s<>]*)>?$").unwrap());
static COLOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#?([0-9A-Fa-f]{6})$").unwrap());

// ---------------------------------------------------------------------------
// Built-ins
// ---------------------------------------------------------------------------

#[async_trait]
impl Caster for BuiltinType {
    async fn cast(&self, ctx: &CommandContext, phrase: &str) -> CastOutcome {
        if phrase.is_empty() {
            return CastOutcome::fail();
        }
        match self {
            Self::String => ArgValue::text(phrase).into(),
            Self::Lowercase => ArgValue::text(phrase.to_lowercase()).into(),
            Self::Uppercase => ArgValue::text(phrase.to_uppercase()).into(),
            Self::CharCodes => ArgValue::List(
                phrase.chars().map(|c| ArgValue::Int(c as i64)).collect(),
            )
            .into(),
            Self::Number => parse_number(phrase).map(ArgValue::Float).into(),
            Self::Integer => parse_integer(phrase).map(ArgValue::Int).into(),
            Self::BigInt => phrase.trim().parse::<i128>().ok().map(ArgValue::BigInt).into(),
            Self::Emojint => parse_integer(&replace_keycaps(phrase))
                .map(ArgValue::Int)
                .into(),
            Self::Url => URL
                .captures(phrase)
                .map(|c| ArgValue::text(&c[1]))
                .into(),
            Self::Date => parse_date(phrase).map(ArgValue::Date).into(),
            Self::Color => COLOR
                .captures(phrase)
                .and_then(|c| i64::from_str_radix(&c[1], 16).ok())
                .map(ArgValue::Int)
                .into(),
            Self::UserMention => resolve_mention(ctx, &USER_MENTION, EntityKind::User, phrase).await,
            Self::MemberMention => {
                resolve_mention(ctx, &USER_MENTION, EntityKind::Member, phrase).await
            }
            Self::ChannelMention => {
                resolve_mention(ctx, &CHANNEL_MENTION, EntityKind::Channel, phrase).await
            }
            Self::RoleMention => resolve_mention(ctx, &ROLE_MENTION, EntityKind::Role, phrase).await,
            Self::EmojiMention => {
                resolve_mention(ctx, &EMOJI_MENTION, EntityKind::Emoji, phrase).await
            }
            Self::User => resolve_entity(ctx, EntityKind::User, phrase).await,
            Self::Member => resolve_entity(ctx, EntityKind::Member, phrase).await,
            Self::Channel => resolve_entity(ctx, EntityKind::Channel, phrase).await,
            Self::Role => resolve_entity(ctx, EntityKind::Role, phrase).await,
            Self::Emoji => resolve_entity(ctx, EntityKind::Emoji, phrase).await,
            Self::Guild => resolve_entity(ctx, EntityKind::Guild, phrase).await,
            Self::Message => resolve_entity(ctx, EntityKind::Message, phrase).await,
            Self::CommandAlias => ctx
                .modules
                .resolve_alias(&phrase.to_lowercase())
                .map(ArgValue::Text)
                .into(),
            Self::Command => module(ctx, ModuleKind::Command, phrase),
            Self::Inhibitor => module(ctx, ModuleKind::Inhibitor, phrase),
            Self::Listener => module(ctx, ModuleKind::Listener, phrase),
            Self::Task => module(ctx, ModuleKind::Task, phrase),
            Self::ContextMenuCommand => module(ctx, ModuleKind::ContextMenu, phrase),
        }
    }
}

fn parse_number(phrase: &str) -> Option<f64> {
    phrase.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Whole numbers; a fractional part is truncated.
fn parse_integer(phrase: &str) -> Option<i64> {
    let trimmed = phrase.trim();
    trimmed.parse::<i64>().ok().or_else(|| {
        parse_number(trimmed)
            .filter(|n| n.abs() < i64::MAX as f64)
            .map(|n| n.trunc() as i64)
    })
}

fn replace_keycaps(phrase: &str) -> String {
    phrase
        .replace('🔟', "10")
        .replace(['\u{FE0F}', '\u{20E3}'], "")
}

fn parse_date(phrase: &str) -> Option<DateTime<Utc>> {
    let s = phrase.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        return s
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis);
    }
    None
}

async fn resolve_mention(
    ctx: &CommandContext,
    pattern: &Regex,
    kind: EntityKind,
    phrase: &str,
) -> CastOutcome {
    let Some(caps) = pattern.captures(phrase) else {
        return CastOutcome::fail();
    };
    resolve_entity(ctx, kind, &caps[1]).await
}

async fn resolve_entity(ctx: &CommandContext, kind: EntityKind, query: &str) -> CastOutcome {
    let guild_id = ctx.message.guild_id.as_deref();
    if guild_id.is_none() && matches!(kind, EntityKind::Member | EntityKind::Role) {
        return CastOutcome::fail();
    }
    match ctx.platform.resolve(kind, guild_id, query).await {
        Ok(found) => found.map(ArgValue::Text).into(),
        Err(e) => {
            warn!(?kind, error = %e, "[Types] Entity lookup failed");
            CastOutcome::fail()
        }
    }
}

fn module(ctx: &CommandContext, kind: ModuleKind, phrase: &str) -> CastOutcome {
    ctx.modules
        .contains(kind, phrase)
        .then(|| ArgValue::text(phrase))
        .into()
}

/// Text form of a value, used when a value is fed to the next caster.
pub fn value_to_phrase(value: &ArgValue) -> String {
    match value {
        ArgValue::Null => String::new(),
        ArgValue::Text(s) => s.clone(),
        other => match other.to_json() {
            serde_json::Value::String(s) => s,
            json => json.to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Combinators
// ---------------------------------------------------------------------------

fn custom(caster: impl Caster + 'static) -> ArgumentType {
    ArgumentType::Caster(Arc::new(caster))
}

fn collect_types<I, T>(types: I) -> Vec<ArgumentType>
where
    I: IntoIterator<Item = T>,
    T: Into<ArgumentType>,
{
    types.into_iter().map(Into::into).collect()
}

fn map_of<const N: usize>(entries: [(&str, ArgValue); N]) -> ArgValue {
    ArgValue::Map(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<BTreeMap<_, _>>(),
    )
}

struct Union(Vec<ArgumentType>);

#[async_trait]
impl Caster for Union {
    async fn cast(&self, ctx: &CommandContext, phrase: &str) -> CastOutcome {
        for ty in &self.0 {
            let out = ctx.resolver.cast(ty, ctx, phrase).await;
            if !out.is_failure() {
                return out;
            }
        }
        CastOutcome::fail()
    }
}

/// First type that casts wins.
pub fn union<I, T>(types: I) -> ArgumentType
where
    I: IntoIterator<Item = T>,
    T: Into<ArgumentType>,
{
    custom(Union(collect_types(types)))
}

struct Product(Vec<ArgumentType>);

#[async_trait]
impl Caster for Product {
    async fn cast(&self, ctx: &CommandContext, phrase: &str) -> CastOutcome {
        let mut values = Vec::with_capacity(self.0.len());
        for ty in &self.0 {
            match ctx.resolver.cast(ty, ctx, phrase).await {
                CastOutcome::Value(v) => values.push(v),
                failure => return failure,
            }
        }
        ArgValue::List(values).into()
    }
}

/// Every type must cast; yields the list of results.
pub fn product<I, T>(types: I) -> ArgumentType
where
    I: IntoIterator<Item = T>,
    T: Into<ArgumentType>,
{
    custom(Product(collect_types(types)))
}

type Predicate = dyn Fn(&CommandContext, &str, &ArgValue) -> bool + Send + Sync;

struct Validate {
    ty: ArgumentType,
    predicate: Box<Predicate>,
}

#[async_trait]
impl Caster for Validate {
    async fn cast(&self, ctx: &CommandContext, phrase: &str) -> CastOutcome {
        match ctx.resolver.cast(&self.ty, ctx, phrase).await {
            CastOutcome::Value(v) if (self.predicate)(ctx, phrase, &v) => CastOutcome::Value(v),
            CastOutcome::Value(_) => CastOutcome::fail(),
            failure => failure,
        }
    }
}

/// Cast with `ty`, then keep the value only if `predicate` holds.
pub fn validate<F>(ty: impl Into<ArgumentType>, predicate: F) -> ArgumentType
where
    F: Fn(&CommandContext, &str, &ArgValue) -> bool + Send + Sync + 'static,
{
    custom(Validate {
        ty: ty.into(),
        predicate: Box::new(predicate),
    })
}

/// Numbers by value, text by character count, lists by length. The upper
/// bound is exclusive unless `inclusive`.
pub fn range(ty: impl Into<ArgumentType>, min: f64, max: f64, inclusive: bool) -> ArgumentType {
    validate(ty, move |_, _, value| {
        value
            .magnitude()
            .is_some_and(|n| n >= min && if inclusive { n <= max } else { n < max })
    })
}

struct Compose {
    types: Vec<ArgumentType>,
    keep_failure: bool,
}

#[async_trait]
impl Caster for Compose {
    async fn cast(&self, ctx: &CommandContext, phrase: &str) -> CastOutcome {
        let mut current = ArgValue::text(phrase);
        for ty in &self.types {
            let input = value_to_phrase(&current);
            match ctx.resolver.cast(ty, ctx, &input).await {
                CastOutcome::Value(v) => current = v,
                failure if self.keep_failure => return failure,
                _ => return CastOutcome::fail(),
            }
        }
        current.into()
    }
}

/// Feed each type's output to the next as its phrase.
pub fn compose<I, T>(types: I) -> ArgumentType
where
    I: IntoIterator<Item = T>,
    T: Into<ArgumentType>,
{
    custom(Compose {
        types: collect_types(types),
        keep_failure: false,
    })
}

/// Like `compose`, but a failure keeps the failing caster's payload.
pub fn compose_with_failure<I, T>(types: I) -> ArgumentType
where
    I: IntoIterator<Item = T>,
    T: Into<ArgumentType>,
{
    custom(Compose {
        types: collect_types(types),
        keep_failure: true,
    })
}

struct Wrap {
    ty: ArgumentType,
    tag: Option<String>,
    with_input: bool,
}

impl Wrap {
    fn wrap(&self, phrase: &str, value: ArgValue) -> ArgValue {
        let mut map = BTreeMap::new();
        if let Some(tag) = &self.tag {
            map.insert("tag".to_string(), ArgValue::text(tag.clone()));
        }
        if self.with_input {
            map.insert("input".to_string(), ArgValue::text(phrase));
        }
        map.insert("value".to_string(), value);
        ArgValue::Map(map)
    }
}

#[async_trait]
impl Caster for Wrap {
    async fn cast(&self, ctx: &CommandContext, phrase: &str) -> CastOutcome {
        match ctx.resolver.cast(&self.ty, ctx, phrase).await {
            CastOutcome::Value(v) => CastOutcome::Value(self.wrap(phrase, v)),
            CastOutcome::Failure(payload) => CastOutcome::Failure(Some(
                self.wrap(phrase, payload.unwrap_or(ArgValue::Null)),
            )),
        }
    }
}

/// Yields `{input, value}`; a failure carries the same shape.
pub fn with_input(ty: impl Into<ArgumentType>) -> ArgumentType {
    custom(Wrap {
        ty: ty.into(),
        tag: None,
        with_input: true,
    })
}

/// Yields `{tag, value}`; the tag defaults to the type's name.
pub fn tagged(ty: impl Into<ArgumentType>, tag: Option<&str>) -> ArgumentType {
    let ty = ty.into();
    let tag = tag.map_or_else(|| ty.describe(), str::to_string);
    custom(Wrap {
        ty,
        tag: Some(tag),
        with_input: false,
    })
}

/// Yields `{tag, input, value}`.
pub fn tagged_with_input(ty: impl Into<ArgumentType>, tag: Option<&str>) -> ArgumentType {
    let ty = ty.into();
    let tag = tag.map_or_else(|| ty.describe(), str::to_string);
    custom(Wrap {
        ty,
        tag: Some(tag),
        with_input: true,
    })
}

/// Union whose result is tagged with the type that matched.
pub fn tagged_union<I, T>(types: I) -> ArgumentType
where
    I: IntoIterator<Item = T>,
    T: Into<ArgumentType>,
{
    union(
        collect_types(types)
            .into_iter()
            .map(|ty| tagged(ty, None))
            .collect::<Vec<_>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_context, MockPlatform};
    use chrono::Datelike;

    async fn cast(ty: impl Into<ArgumentType>, phrase: &str) -> CastOutcome {
        let ctx = test_context("");
        ctx.resolver.cast(&ty.into(), &ctx, phrase).await
    }

    #[tokio::test]
    async fn builtins_fail_closed_on_empty_input() {
        for ty in BuiltinType::ALL {
            assert!(cast(ty, "").await.is_failure(), "{ty} accepted empty input");
        }
    }

    #[tokio::test]
    async fn text_casters() {
        assert_eq!(cast(BuiltinType::Lowercase, "HeLLo").await.value(), Some("hello".into()));
        assert_eq!(cast(BuiltinType::Uppercase, "abc").await.value(), Some("ABC".into()));
        assert_eq!(
            cast(BuiltinType::CharCodes, "AB").await.value(),
            Some(ArgValue::List(vec![ArgValue::Int(65), ArgValue::Int(66)]))
        );
    }

    #[tokio::test]
    async fn numeric_casters() {
        assert_eq!(cast(BuiltinType::Number, "2.5").await.value(), Some(ArgValue::Float(2.5)));
        assert!(cast(BuiltinType::Number, "NaN").await.is_failure());
        assert_eq!(cast(BuiltinType::Integer, "42").await.value(), Some(ArgValue::Int(42)));
        assert_eq!(cast(BuiltinType::Integer, "3.9").await.value(), Some(ArgValue::Int(3)));
        assert!(cast(BuiltinType::Integer, "abc").await.is_failure());
        assert_eq!(
            cast(BuiltinType::BigInt, "170141183460469231731687303715884105727").await.value(),
            Some(ArgValue::BigInt(i128::MAX))
        );
        assert_eq!(cast(BuiltinType::Emojint, "1️⃣2️⃣").await.value(), Some(ArgValue::Int(12)));
        assert_eq!(cast(BuiltinType::Emojint, "🔟").await.value(), Some(ArgValue::Int(10)));
        assert_eq!(cast(BuiltinType::Color, "#ff0000").await.value(), Some(ArgValue::Int(0xff0000)));
        assert!(cast(BuiltinType::Color, "ff00").await.is_failure());
    }

    #[tokio::test]
    async fn url_and_date() {
        assert_eq!(
            cast(BuiltinType::Url, "<https://example.com/a?b=1>").await.value(),
            Some("https://example.com/a?b=1".into())
        );
        assert!(cast(BuiltinType::Url, "example.com").await.is_failure());

        let date = cast(BuiltinType::Date, "2024-02-29").await.value().unwrap();
        match date {
            ArgValue::Date(d) => assert_eq!((d.year(), d.month(), d.day()), (2024, 2, 29)),
            other => panic!("expected date, got {other:?}"),
        }
        assert!(cast(BuiltinType::Date, "yesterday-ish").await.is_failure());
    }

    #[tokio::test]
    async fn mentions_resolve_through_platform() {
        let platform = MockPlatform::new().with_entity(EntityKind::User, "123456789012345678");
        let ctx = crate::testing::context_with(platform, "");
        let ok = ctx
            .resolver
            .cast(&BuiltinType::UserMention.into(), &ctx, "<@!123456789012345678>")
            .await;
        assert_eq!(ok.value(), Some("123456789012345678".into()));
        let unknown = ctx
            .resolver
            .cast(&BuiltinType::UserMention.into(), &ctx, "<@999999999999999999>")
            .await;
        assert!(unknown.is_failure());
        let malformed = ctx
            .resolver
            .cast(&BuiltinType::UserMention.into(), &ctx, "@someone")
            .await;
        assert!(malformed.is_failure());
    }

    #[tokio::test]
    async fn member_needs_a_guild() {
        let platform = MockPlatform::new().with_entity(EntityKind::Member, "u1");
        let ctx = crate::testing::context_with(platform, "");
        assert!(!ctx.resolver.cast(&BuiltinType::Member.into(), &ctx, "u1").await.is_failure());
        let dm = ctx.for_message(ctx.message.clone().in_dm());
        assert!(dm.resolver.cast(&BuiltinType::Member.into(), &dm, "u1").await.is_failure());
    }

    #[tokio::test]
    async fn module_casters_use_directory() {
        let ctx = test_context("");
        assert_eq!(
            ctx.resolver.cast(&BuiltinType::CommandAlias.into(), &ctx, "P").await.value(),
            Some("ping".into())
        );
        assert_eq!(
            ctx.resolver.cast(&BuiltinType::Command.into(), &ctx, "ping").await.value(),
            Some("ping".into())
        );
        assert!(ctx.resolver.cast(&BuiltinType::Task.into(), &ctx, "ping").await.is_failure());
    }

    #[tokio::test]
    async fn union_takes_first_success() {
        let ty = union([BuiltinType::Integer, BuiltinType::String]);
        assert_eq!(cast(ty.clone(), "5").await.value(), Some(ArgValue::Int(5)));
        assert_eq!(cast(ty, "five").await.value(), Some("five".into()));
    }

    #[tokio::test]
    async fn product_needs_all() {
        let ty = product([BuiltinType::Integer, BuiltinType::String]);
        assert_eq!(
            cast(ty.clone(), "5").await.value(),
            Some(ArgValue::List(vec![ArgValue::Int(5), "5".into()]))
        );
        assert!(cast(ty, "x").await.is_failure());
    }

    #[tokio::test]
    async fn range_bounds() {
        let exclusive = range(BuiltinType::Integer, 1.0, 10.0, false);
        assert!(!cast(exclusive.clone(), "1").await.is_failure());
        assert!(cast(exclusive, "10").await.is_failure());
        let inclusive = range(BuiltinType::Integer, 1.0, 10.0, true);
        assert!(!cast(inclusive, "10").await.is_failure());
        let text = range(BuiltinType::String, 0.0, 3.0, false);
        assert!(cast(text, "long").await.is_failure());
    }

    #[tokio::test]
    async fn compose_chains_output() {
        let ty = compose([BuiltinType::Lowercase, BuiltinType::CommandAlias]);
        assert_eq!(cast(ty, "PING").await.value(), Some("ping".into()));
    }

    #[tokio::test]
    async fn compose_with_failure_keeps_payload() {
        let failing = ArgumentType::Caster(crate::resolver::caster_fn(|_, phrase| {
            CastOutcome::Failure(Some(ArgValue::text(format!("bad {phrase}"))))
        }));
        let plain = compose([BuiltinType::Lowercase.into(), failing.clone()]);
        assert_eq!(cast(plain, "X").await, CastOutcome::Failure(None));
        let kept = compose_with_failure([BuiltinType::Lowercase.into(), failing]);
        assert_eq!(cast(kept, "X").await, CastOutcome::Failure(Some("bad x".into())));
    }

    #[tokio::test]
    async fn tagged_variants() {
        let out = cast(tagged(BuiltinType::Integer, None), "7").await.value().unwrap();
        assert_eq!(out.get("tag"), Some(&"integer".into()));
        assert_eq!(out.get("value"), Some(&ArgValue::Int(7)));

        let out = cast(with_input(BuiltinType::Integer), "7").await.value().unwrap();
        assert_eq!(out.get("input"), Some(&"7".into()));

        let failed = cast(tagged_with_input(BuiltinType::Integer, Some("n")), "x").await;
        match failed {
            CastOutcome::Failure(Some(map)) => {
                assert_eq!(map.get("tag"), Some(&"n".into()));
                assert_eq!(map.get("input"), Some(&"x".into()));
                assert_eq!(map.get("value"), Some(&ArgValue::Null));
            }
            other => panic!("unexpected {other:?}"),
        }

        let out = cast(tagged_union([BuiltinType::Integer, BuiltinType::String]), "hi")
            .await
            .value()
            .unwrap();
        assert_eq!(out.get("tag"), Some(&"string".into()));
    }

    #[tokio::test]
    async fn validate_applies_predicate() {
        let even = validate(BuiltinType::Integer, |_, _, v| v.as_i64().is_some_and(|n| n % 2 == 0));
        assert!(!cast(even.clone(), "4").await.is_failure());
        assert!(cast(even, "3").await.is_failure());
    }
}
