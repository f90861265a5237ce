//! Argument specifications and their resolution: casting a phrase, falling
//! back to `otherwise` or a default, and prompting the user for input.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use herald_config::PromptConfig;
use herald_core::{CancelReason, InboundMessage};

use crate::context::CommandContext;
use crate::flag::Flag;
use crate::prompt::PromptRegistry;
use crate::resolver::{ArgumentType, CastOutcome};
use crate::value::ArgValue;

// ---------------------------------------------------------------------------
// Match strategy
// ---------------------------------------------------------------------------

/// Where an argument takes its input from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgumentMatch {
    /// The phrase at the cursor.
    #[default]
    Phrase,
    /// Presence of a flag word.
    Flag,
    /// Value of an option flag.
    Option,
    /// Remaining phrases joined by their raw text.
    Rest,
    /// Each remaining phrase cast separately.
    Separate,
    /// All phrases from the start.
    Text,
    /// All tokens, flags included, from the start.
    Content,
    /// All tokens from the cursor.
    RestContent,
    /// Cast the empty string.
    None,
}

/// Unordered phrase matching: the first unused phrase that casts is taken.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Unordered {
    #[default]
    Off,
    All,
    /// Only phrases from this index on.
    From(usize),
    Indices(Vec<usize>),
}

impl Unordered {
    pub fn is_on(&self) -> bool {
        !matches!(self, Self::Off)
    }

    pub(crate) fn indices(&self, phrase_count: usize) -> Vec<usize> {
        match self {
            Self::Off => Vec::new(),
            Self::All => (0..phrase_count).collect(),
            Self::From(start) => (*start..phrase_count).collect(),
            Self::Indices(list) => list.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt text and options
// ---------------------------------------------------------------------------

/// Data available when building prompt and `otherwise` text.
#[derive(Debug, Clone)]
pub struct PromptData {
    /// Attempt number, starting at 1.
    pub retries: u32,
    pub infinite: bool,
    pub message: InboundMessage,
    pub phrase: String,
    pub failure: Option<ArgValue>,
}

type TextFn = dyn Fn(&PromptData) -> String + Send + Sync;

#[derive(Clone)]
pub enum PromptText {
    Static(String),
    Dynamic(Arc<TextFn>),
}

impl PromptText {
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&PromptData) -> String + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(f))
    }

    pub fn render(&self, data: &PromptData) -> String {
        match self {
            Self::Static(text) => text.clone(),
            Self::Dynamic(f) => f(data),
        }
    }
}

impl fmt::Debug for PromptText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(text) => f.debug_tuple("Static").field(text).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<&str> for PromptText {
    fn from(text: &str) -> Self {
        Self::Static(text.to_string())
    }
}

impl From<String> for PromptText {
    fn from(text: String) -> Self {
        Self::Static(text)
    }
}

/// Prompt settings. Unset fields fall through to the command's and then the
/// handler's defaults.
#[derive(Debug, Clone, Default)]
pub struct PromptOptions {
    pub start: Option<PromptText>,
    pub retry: Option<PromptText>,
    pub timeout: Option<PromptText>,
    pub ended: Option<PromptText>,
    pub cancel: Option<PromptText>,
    pub retries: Option<u32>,
    pub time: Option<Duration>,
    pub cancel_word: Option<String>,
    pub stop_word: Option<String>,
    /// An empty input skips the prompt and uses the default.
    pub optional: Option<bool>,
    /// Collect values until the stop word or `limit`.
    pub infinite: Option<bool>,
    pub limit: Option<usize>,
    /// A reply that is itself a command re-runs the pipeline with it.
    pub breakout: Option<bool>,
}

impl PromptOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(mut self, text: impl Into<PromptText>) -> Self {
        self.start = Some(text.into());
        self
    }

    pub fn retry(mut self, text: impl Into<PromptText>) -> Self {
        self.retry = Some(text.into());
        self
    }

    pub fn timeout(mut self, text: impl Into<PromptText>) -> Self {
        self.timeout = Some(text.into());
        self
    }

    pub fn ended(mut self, text: impl Into<PromptText>) -> Self {
        self.ended = Some(text.into());
        self
    }

    pub fn cancel(mut self, text: impl Into<PromptText>) -> Self {
        self.cancel = Some(text.into());
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn time(mut self, time: Duration) -> Self {
        self.time = Some(time);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = Some(true);
        self
    }

    pub fn infinite(mut self, limit: Option<usize>) -> Self {
        self.infinite = Some(true);
        self.limit = limit;
        self
    }

    pub fn breakout(mut self, breakout: bool) -> Self {
        self.breakout = Some(breakout);
        self
    }

    /// `self` with unset fields taken from `base`.
    pub fn merged_over(&self, base: &PromptOptions) -> PromptOptions {
        PromptOptions {
            start: self.start.clone().or_else(|| base.start.clone()),
            retry: self.retry.clone().or_else(|| base.retry.clone()),
            timeout: self.timeout.clone().or_else(|| base.timeout.clone()),
            ended: self.ended.clone().or_else(|| base.ended.clone()),
            cancel: self.cancel.clone().or_else(|| base.cancel.clone()),
            retries: self.retries.or(base.retries),
            time: self.time.or(base.time),
            cancel_word: self.cancel_word.clone().or_else(|| base.cancel_word.clone()),
            stop_word: self.stop_word.clone().or_else(|| base.stop_word.clone()),
            optional: self.optional.or(base.optional),
            infinite: self.infinite.or(base.infinite),
            limit: self.limit.or(base.limit),
            breakout: self.breakout.or(base.breakout),
        }
    }

    fn resolve(&self) -> ResolvedPrompt {
        ResolvedPrompt {
            start: self.start.clone(),
            retry: self.retry.clone(),
            timeout: self.timeout.clone(),
            ended: self.ended.clone(),
            cancel: self.cancel.clone(),
            retries: self.retries.unwrap_or(1),
            time: self.time.unwrap_or(Duration::from_secs(30)),
            cancel_word: self.cancel_word.clone().unwrap_or_else(|| "cancel".into()),
            stop_word: self.stop_word.clone().unwrap_or_else(|| "stop".into()),
            optional: self.optional.unwrap_or(false),
            infinite: self.infinite.unwrap_or(false),
            limit: self.limit.unwrap_or(usize::MAX).max(1),
            breakout: self.breakout.unwrap_or(true),
        }
    }
}

impl From<&PromptConfig> for PromptOptions {
    fn from(cfg: &PromptConfig) -> Self {
        let text = |t: &Option<String>| t.clone().map(PromptText::Static);
        Self {
            start: text(&cfg.start),
            retry: text(&cfg.retry),
            timeout: text(&cfg.timeout),
            ended: text(&cfg.ended),
            cancel: text(&cfg.cancel),
            retries: cfg.retries,
            time: cfg.time_ms.map(Duration::from_millis),
            cancel_word: cfg.cancel_word.clone(),
            stop_word: cfg.stop_word.clone(),
            optional: cfg.optional,
            infinite: cfg.infinite,
            limit: cfg.limit,
            breakout: cfg.breakout,
        }
    }
}

struct ResolvedPrompt {
    start: Option<PromptText>,
    retry: Option<PromptText>,
    timeout: Option<PromptText>,
    ended: Option<PromptText>,
    cancel: Option<PromptText>,
    retries: u32,
    time: Duration,
    cancel_word: String,
    stop_word: String,
    optional: bool,
    infinite: bool,
    limit: usize,
    breakout: bool,
}

/// Prompt and `otherwise` defaults shared by a handler or a command.
#[derive(Debug, Clone, Default)]
pub struct ArgumentDefaults {
    pub prompt: PromptOptions,
    pub otherwise: Option<PromptText>,
}

impl ArgumentDefaults {
    pub fn merged_over(&self, base: &ArgumentDefaults) -> ArgumentDefaults {
        ArgumentDefaults {
            prompt: self.prompt.merged_over(&base.prompt),
            otherwise: self.otherwise.clone().or_else(|| base.otherwise.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Argument spec
// ---------------------------------------------------------------------------

type SupplierFn = dyn Fn(&CommandContext, &str) -> ArgValue + Send + Sync;

#[derive(Clone)]
pub enum DefaultValue {
    Value(ArgValue),
    /// Computed from the context and the (failed) phrase.
    Supplier(Arc<SupplierFn>),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Supplier(_) => f.write_str("Supplier(..)"),
        }
    }
}

/// One parameter of a command.
#[derive(Debug, Clone, Default)]
pub struct ArgumentSpec {
    pub id: String,
    pub kind: ArgumentType,
    pub match_kind: ArgumentMatch,
    /// Flag or option words for `Flag`/`Option` matching.
    pub flags: Vec<String>,
    /// Count flags or collect every option value.
    pub multiple_flags: bool,
    /// Fixed phrase index instead of the cursor.
    pub index: Option<usize>,
    pub unordered: Unordered,
    /// Maximum phrases/tokens consumed by rest-like matches.
    pub limit: Option<usize>,
    pub default: Option<DefaultValue>,
    pub prompt: Option<PromptOptions>,
    pub otherwise: Option<PromptText>,
    pub description: String,
}

impl ArgumentSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn of_type(mut self, kind: impl Into<ArgumentType>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn matching(mut self, match_kind: ArgumentMatch) -> Self {
        self.match_kind = match_kind;
        self
    }

    /// A boolean flag argument.
    pub fn flag<I, S>(id: impl Into<String>, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(id).matching(ArgumentMatch::Flag).flags(words)
    }

    /// An option flag argument.
    pub fn option<I, S>(id: impl Into<String>, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(id).matching(ArgumentMatch::Option).flags(words)
    }

    pub fn flags<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags = words.into_iter().map(Into::into).collect();
        self
    }

    pub fn multiple_flags(mut self) -> Self {
        self.multiple_flags = true;
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn unordered(mut self, unordered: Unordered) -> Self {
        self.unordered = unordered;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn default_value(mut self, value: impl Into<ArgValue>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    pub fn default_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&CommandContext, &str) -> ArgValue + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Supplier(Arc::new(f)));
        self
    }

    pub fn prompt(mut self, prompt: PromptOptions) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn otherwise(mut self, text: impl Into<PromptText>) -> Self {
        self.otherwise = Some(text.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub(crate) fn default_for(&self, ctx: &CommandContext, phrase: &str) -> ArgValue {
        match &self.default {
            None => ArgValue::Null,
            Some(DefaultValue::Value(v)) => v.clone(),
            Some(DefaultValue::Supplier(f)) => f(ctx, phrase),
        }
    }

    /// Resolve one input phrase: cast it, or fall back to `otherwise`, a
    /// prompt, or the default.
    pub async fn process(
        &self,
        ctx: &CommandContext,
        env: &ParseEnv<'_>,
        phrase: &str,
    ) -> Result<ArgValue, Flag> {
        let base = &env.defaults.prompt;
        let prompt = match &self.prompt {
            Some(own) => own.merged_over(base),
            None => base.clone(),
        }
        .resolve();
        let otherwise = self.otherwise.as_ref().or(env.defaults.otherwise.as_ref());

        if phrase.is_empty() && prompt.optional {
            if let Some(text) = otherwise {
                return Err(self.run_otherwise(ctx, text, phrase, None).await);
            }
            return Ok(self.default_for(ctx, phrase));
        }

        match ctx.resolver.cast(&self.kind, ctx, phrase).await {
            CastOutcome::Value(value) => Ok(value),
            CastOutcome::Failure(failure) => {
                if let Some(text) = otherwise {
                    return Err(self.run_otherwise(ctx, text, phrase, failure).await);
                }
                if self.prompt.is_some() {
                    return self.collect(ctx, env, &prompt, phrase, failure).await;
                }
                Ok(self.default_for(ctx, phrase))
            }
        }
    }

    async fn run_otherwise(
        &self,
        ctx: &CommandContext,
        text: &PromptText,
        phrase: &str,
        failure: Option<ArgValue>,
    ) -> Flag {
        let data = PromptData {
            retries: 1,
            infinite: false,
            message: ctx.message.clone(),
            phrase: phrase.to_string(),
            failure,
        };
        send_text(ctx, Some(text), &data).await;
        Flag::Cancel(CancelReason::Otherwise)
    }

    /// Prompt the author until a reply casts, the retries run out, or the
    /// prompt is cancelled. `command_input` is the phrase that failed, if any.
    async fn collect(
        &self,
        ctx: &CommandContext,
        env: &ParseEnv<'_>,
        prompt: &ResolvedPrompt,
        command_input: &str,
        failure: Option<ArgValue>,
    ) -> Result<ArgValue, Flag> {
        let infinite = prompt.infinite
            || (self.match_kind == ArgumentMatch::Separate && command_input.is_empty());
        let channel_id = ctx.channel_id().to_string();
        let author_id = ctx.author_id().to_string();
        let _guard = env.prompts.begin(&channel_id, &author_id);

        let mut values: Vec<ArgValue> = Vec::new();
        let mut attempt: u32 = if command_input.is_empty() { 1 } else { 2 };
        let mut last_message = ctx.message.clone();
        let mut last_phrase = command_input.to_string();
        let mut last_failure = failure;

        loop {
            let data = PromptData {
                retries: attempt,
                infinite,
                message: last_message.clone(),
                phrase: last_phrase.clone(),
                failure: last_failure.clone(),
            };

            if attempt != 1 || !infinite || values.is_empty() {
                let text = if attempt == 1 { &prompt.start } else { &prompt.retry };
                send_text(ctx, text.as_ref(), &data).await;
            }

            let Some(reply) = env
                .prompts
                .next_message(&channel_id, &author_id, prompt.time)
                .await
            else {
                send_text(ctx, prompt.timeout.as_ref(), &data).await;
                return Err(Flag::Cancel(CancelReason::Timeout));
            };

            if prompt.breakout && env.breakout.is_some_and(|is_command| is_command(&reply)) {
                debug!(argument = %self.id, "[Arguments] Prompt reply is a command; breaking out");
                return Err(Flag::retry(reply));
            }

            let content = reply.content.trim().to_string();
            if content.to_lowercase() == prompt.cancel_word.to_lowercase() {
                send_text(ctx, prompt.cancel.as_ref(), &data).await;
                return Err(Flag::Cancel(CancelReason::CancelWord));
            }

            if infinite && content.to_lowercase() == prompt.stop_word.to_lowercase() {
                if values.is_empty() {
                    attempt += 1;
                    last_message = reply;
                    last_phrase = content;
                    last_failure = None;
                    continue;
                }
                return Ok(ArgValue::List(values));
            }

            let reply_ctx = ctx.for_message(reply.clone());
            match ctx.resolver.cast(&self.kind, &reply_ctx, &content).await {
                CastOutcome::Failure(failure) => {
                    if attempt <= prompt.retries {
                        attempt += 1;
                        last_message = reply;
                        last_phrase = content;
                        last_failure = failure;
                        continue;
                    }
                    let data = PromptData {
                        retries: attempt,
                        infinite,
                        message: reply,
                        phrase: content,
                        failure,
                    };
                    send_text(ctx, prompt.ended.as_ref(), &data).await;
                    return Err(Flag::Cancel(CancelReason::RetriesExhausted));
                }
                CastOutcome::Value(value) => {
                    if !infinite {
                        return Ok(value);
                    }
                    values.push(value);
                    if values.len() >= prompt.limit {
                        return Ok(ArgValue::List(values));
                    }
                    attempt = 1;
                    last_phrase = content;
                    last_failure = None;
                }
            }
        }
    }
}

async fn send_text(ctx: &CommandContext, text: Option<&PromptText>, data: &PromptData) {
    let Some(text) = text else { return };
    let rendered = text.render(data);
    if rendered.is_empty() {
        return;
    }
    if let Err(e) = ctx.reply(&rendered).await {
        warn!(error = %e, "[Arguments] Failed to send prompt text");
    }
}

// ---------------------------------------------------------------------------
// Parse environment
// ---------------------------------------------------------------------------

type CommandCheck<'a> = dyn Fn(&InboundMessage) -> bool + Send + Sync + 'a;

/// Handler state an argument needs while resolving.
pub struct ParseEnv<'a> {
    pub prompts: &'a PromptRegistry,
    /// Handler defaults with the command's defaults applied on top.
    pub defaults: ArgumentDefaults,
    /// Whether a message would invoke a command; enables prompt breakout.
    pub breakout: Option<&'a CommandCheck<'a>>,
}

impl<'a> ParseEnv<'a> {
    pub fn new(prompts: &'a PromptRegistry) -> Self {
        Self {
            prompts,
            defaults: ArgumentDefaults::default(),
            breakout: None,
        }
    }

    pub fn with_defaults(mut self, defaults: ArgumentDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_breakout(mut self, check: &'a CommandCheck<'a>) -> Self {
        self.breakout = Some(check);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::BuiltinType;
    use crate::testing::{context_with, wait_for_prompt, MockPlatform};

    fn integer(id: &str) -> ArgumentSpec {
        ArgumentSpec::new(id).of_type(BuiltinType::Integer)
    }

    #[tokio::test]
    async fn valid_phrase_casts() {
        let platform = MockPlatform::new();
        let ctx = context_with(platform, "");
        let prompts = PromptRegistry::new();
        let env = ParseEnv::new(&prompts);
        assert_eq!(integer("n").process(&ctx, &env, "7").await, Ok(ArgValue::Int(7)));
    }

    #[tokio::test]
    async fn failed_cast_uses_default_or_null() {
        let ctx = context_with(MockPlatform::new(), "");
        let prompts = PromptRegistry::new();
        let env = ParseEnv::new(&prompts);
        assert_eq!(integer("n").process(&ctx, &env, "x").await, Ok(ArgValue::Null));
        let with_default = integer("n").default_value(5);
        assert_eq!(with_default.process(&ctx, &env, "x").await, Ok(ArgValue::Int(5)));
        let supplied = integer("n").default_with(|_, phrase| ArgValue::text(format!("got {phrase}")));
        assert_eq!(supplied.process(&ctx, &env, "x").await, Ok("got x".into()));
    }

    #[tokio::test]
    async fn otherwise_sends_text_and_cancels() {
        let platform = MockPlatform::new();
        let ctx = context_with(platform.clone(), "");
        let prompts = PromptRegistry::new();
        let env = ParseEnv::new(&prompts);
        let spec = integer("n").otherwise(PromptText::dynamic(|d| format!("'{}' is no number", d.phrase)));
        assert_eq!(
            spec.process(&ctx, &env, "abc").await,
            Err(Flag::Cancel(CancelReason::Otherwise))
        );
        assert_eq!(platform.sent_texts(), vec!["'abc' is no number"]);
    }

    #[tokio::test]
    async fn optional_prompt_with_empty_input_uses_default() {
        let platform = MockPlatform::new();
        let ctx = context_with(platform.clone(), "");
        let prompts = PromptRegistry::new();
        let env = ParseEnv::new(&prompts);
        let spec = integer("n")
            .default_value(1)
            .prompt(PromptOptions::new().start("number?").optional());
        assert_eq!(spec.process(&ctx, &env, "").await, Ok(ArgValue::Int(1)));
        assert!(platform.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn prompt_accepts_reply() {
        let platform = MockPlatform::new();
        let ctx = context_with(platform.clone(), "");
        let prompts = PromptRegistry::new();
        let env = ParseEnv::new(&prompts);
        let spec = integer("n").prompt(PromptOptions::new().start("number?"));

        let run = spec.process(&ctx, &env, "");
        let reply = async {
            wait_for_prompt(&prompts, "c1", "u1").await;
            assert!(prompts.has_prompt("c1", "u1"));
            prompts.offer(&InboundMessage::new("m2", "u1", "c1", "12"));
        };
        let (result, ()) = tokio::join!(run, reply);
        assert_eq!(result, Ok(ArgValue::Int(12)));
        assert_eq!(platform.sent_texts(), vec!["number?"]);
        assert!(!prompts.has_prompt("c1", "u1"));
    }

    #[tokio::test(start_paused = true)]
    async fn two_retries_then_ended() {
        let platform = MockPlatform::new();
        let ctx = context_with(platform.clone(), "");
        let prompts = PromptRegistry::new();
        let env = ParseEnv::new(&prompts);
        let spec = integer("n").prompt(
            PromptOptions::new()
                .start("start")
                .retry(PromptText::dynamic(|d| format!("retry {}", d.retries)))
                .ended("ended")
                .retries(2),
        );

        let run = spec.process(&ctx, &env, "");
        let replies = async {
            for i in 0..3 {
                wait_for_prompt(&prompts, "c1", "u1").await;
                prompts.offer(&InboundMessage::new(format!("r{i}"), "u1", "c1", "nope"));
            }
        };
        let (result, ()) = tokio::join!(run, replies);
        assert_eq!(result, Err(Flag::Cancel(CancelReason::RetriesExhausted)));
        assert_eq!(
            platform.sent_texts(),
            vec!["start", "retry 2", "retry 3", "ended"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_command_input_counts_as_first_attempt() {
        let platform = MockPlatform::new();
        let ctx = context_with(platform.clone(), "");
        let prompts = PromptRegistry::new();
        let env = ParseEnv::new(&prompts);
        let spec = integer("n").prompt(
            PromptOptions::new().start("start").retry("retry").ended("ended").retries(1),
        );

        let run = spec.process(&ctx, &env, "bad");
        let replies = async {
            wait_for_prompt(&prompts, "c1", "u1").await;
            prompts.offer(&InboundMessage::new("r1", "u1", "c1", "still bad"));
        };
        let (result, ()) = tokio::join!(run, replies);
        assert_eq!(result, Err(Flag::Cancel(CancelReason::RetriesExhausted)));
        assert_eq!(platform.sent_texts(), vec!["retry", "ended"]);
    }

    #[tokio::test(start_paused = true)]
    async fn no_reply_times_out() {
        let platform = MockPlatform::new();
        let ctx = context_with(platform.clone(), "");
        let prompts = PromptRegistry::new();
        let env = ParseEnv::new(&prompts);
        let spec = integer("n").prompt(
            PromptOptions::new()
                .start("start")
                .timeout("too slow")
                .time(Duration::from_secs(5)),
        );
        let result = spec.process(&ctx, &env, "").await;
        assert_eq!(result, Err(Flag::Cancel(CancelReason::Timeout)));
        assert_eq!(platform.sent_texts(), vec!["start", "too slow"]);
        assert!(!prompts.has_prompt("c1", "u1"));
    }

    #[tokio::test]
    async fn cancel_word_is_case_insensitive() {
        let platform = MockPlatform::new();
        let ctx = context_with(platform.clone(), "");
        let prompts = PromptRegistry::new();
        let env = ParseEnv::new(&prompts);
        let spec = integer("n").prompt(PromptOptions::new().cancel("cancelled"));

        let run = spec.process(&ctx, &env, "");
        let reply = async {
            wait_for_prompt(&prompts, "c1", "u1").await;
            prompts.offer(&InboundMessage::new("r1", "u1", "c1", "CANCEL"));
        };
        let (result, ()) = tokio::join!(run, reply);
        assert_eq!(result, Err(Flag::Cancel(CancelReason::CancelWord)));
        assert_eq!(platform.sent_texts(), vec!["cancelled"]);
    }

    #[tokio::test]
    async fn infinite_collects_until_stop_word() {
        let ctx = context_with(MockPlatform::new(), "");
        let prompts = PromptRegistry::new();
        let env = ParseEnv::new(&prompts);
        let spec = integer("n").prompt(PromptOptions::new().infinite(None));

        let run = spec.process(&ctx, &env, "");
        let replies = async {
            for content in ["stop", "1", "2", "Stop"] {
                wait_for_prompt(&prompts, "c1", "u1").await;
                prompts.offer(&InboundMessage::new("r", "u1", "c1", content));
            }
        };
        let (result, ()) = tokio::join!(run, replies);
        assert_eq!(
            result,
            Ok(ArgValue::List(vec![ArgValue::Int(1), ArgValue::Int(2)]))
        );
    }

    #[tokio::test]
    async fn infinite_stops_at_limit() {
        let ctx = context_with(MockPlatform::new(), "");
        let prompts = PromptRegistry::new();
        let env = ParseEnv::new(&prompts);
        let spec = integer("n").prompt(PromptOptions::new().infinite(Some(2)));

        let run = spec.process(&ctx, &env, "");
        let replies = async {
            for content in ["4", "5"] {
                wait_for_prompt(&prompts, "c1", "u1").await;
                prompts.offer(&InboundMessage::new("r", "u1", "c1", content));
            }
        };
        let (result, ()) = tokio::join!(run, replies);
        assert_eq!(
            result,
            Ok(ArgValue::List(vec![ArgValue::Int(4), ArgValue::Int(5)]))
        );
    }

    #[tokio::test]
    async fn breakout_retries_with_command_reply() {
        let ctx = context_with(MockPlatform::new(), "");
        let prompts = PromptRegistry::new();
        let is_command = |m: &InboundMessage| m.content.starts_with('!');
        let env = ParseEnv::new(&prompts).with_breakout(&is_command);
        let spec = integer("n").prompt(PromptOptions::new());

        let run = spec.process(&ctx, &env, "");
        let reply = async {
            wait_for_prompt(&prompts, "c1", "u1").await;
            prompts.offer(&InboundMessage::new("r1", "u1", "c1", "!ping"));
        };
        let (result, ()) = tokio::join!(run, reply);
        match result {
            Err(Flag::Retry(message)) => assert_eq!(message.content, "!ping"),
            other => panic!("expected retry, got {other:?}"),
        }
    }

    #[test]
    fn defaults_merge_argument_over_command_over_handler() {
        let handler = ArgumentDefaults {
            prompt: PromptOptions::new().retries(3).time(Duration::from_secs(10)),
            otherwise: None,
        };
        let command = ArgumentDefaults {
            prompt: PromptOptions::new().retries(2),
            otherwise: Some("nope".into()),
        };
        let merged = command.merged_over(&handler);
        assert_eq!(merged.prompt.retries, Some(2));
        assert_eq!(merged.prompt.time, Some(Duration::from_secs(10)));
        assert!(merged.otherwise.is_some());

        let arg = PromptOptions::new().retries(0).merged_over(&merged.prompt).resolve();
        assert_eq!(arg.retries, 0);
        assert_eq!(arg.cancel_word, "cancel");
    }
}
