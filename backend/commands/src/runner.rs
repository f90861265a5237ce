//! Argument runner: walks a sequence of argument specs over parsed content,
//! one spec per step.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::argument::{ArgumentMatch, ArgumentSpec, ParseEnv};
use crate::command::is_reserved_id;
use crate::content::ParsedContent;
use crate::context::CommandContext;
use crate::flag::Flag;
use crate::value::{ArgMap, ArgValue};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Cursor and results of one argument run.
#[derive(Debug, Clone, Default)]
pub struct RunnerState {
    /// Next phrase to consume.
    pub phrase_index: usize,
    /// Token in `ParsedContent::all` following the last consumed phrase.
    pub index: usize,
    /// Phrases taken by unordered arguments.
    pub used_indices: HashSet<usize>,
    pub resolved: ArgMap,
    pub last: Option<ArgValue>,
}

impl RunnerState {
    fn advance(&mut self, parsed: &ParsedContent, phrases: usize) {
        self.phrase_index += phrases;
        self.index = if self.phrase_index == 0 {
            0
        } else {
            parsed
                .phrases
                .get(self.phrase_index - 1)
                .map_or(parsed.all.len(), |p| p.token_index + 1)
        };
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// What a generator wants next.
#[derive(Debug, Clone)]
pub enum GeneratorStep {
    /// Resolve this argument.
    Argument(ArgumentSpec),
    /// Stop with a flag.
    Flag(Flag),
    /// Stop. `Some` replaces the collected arguments.
    Done(Option<ArgMap>),
}

/// Produces argument specs one at a time, seeing every value resolved so far.
#[async_trait]
pub trait ArgumentGenerator: Send {
    async fn next_step(
        &mut self,
        ctx: &CommandContext,
        parsed: &ParsedContent,
        state: &RunnerState,
    ) -> GeneratorStep;
}

/// Yields a fixed list of specs in declaration order.
pub struct StaticGenerator {
    specs: Arc<Vec<ArgumentSpec>>,
    next: usize,
}

impl StaticGenerator {
    pub fn new(specs: Arc<Vec<ArgumentSpec>>) -> Self {
        Self { specs, next: 0 }
    }
}

#[async_trait]
impl ArgumentGenerator for StaticGenerator {
    async fn next_step(
        &mut self,
        _ctx: &CommandContext,
        _parsed: &ParsedContent,
        _state: &RunnerState,
    ) -> GeneratorStep {
        match self.specs.get(self.next) {
            Some(spec) => {
                self.next += 1;
                GeneratorStep::Argument(spec.clone())
            }
            None => GeneratorStep::Done(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Args(ArgMap),
    Flag(Flag),
    /// A generator produced an argument id that is reserved or already used.
    InvalidId { id: String, reserved: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunStep {
    Resolved { id: String, value: ArgValue },
    Finished(RunOutcome),
}

/// A run in progress. Call `step` until it returns `Finished`.
pub struct ArgumentRun<'a> {
    ctx: &'a CommandContext,
    parsed: &'a ParsedContent,
    env: &'a ParseEnv<'a>,
    generator: Box<dyn ArgumentGenerator + 'a>,
    state: RunnerState,
    finished: Option<RunOutcome>,
}

impl<'a> ArgumentRun<'a> {
    pub fn new(
        ctx: &'a CommandContext,
        parsed: &'a ParsedContent,
        env: &'a ParseEnv<'a>,
        generator: Box<dyn ArgumentGenerator + 'a>,
    ) -> Self {
        Self {
            ctx,
            parsed,
            env,
            generator,
            state: RunnerState::default(),
            finished: None,
        }
    }

    pub fn state(&self) -> &RunnerState {
        &self.state
    }

    /// Resolve one argument, or finish. Once finished, keeps returning the
    /// same outcome.
    pub async fn step(&mut self) -> RunStep {
        if let Some(outcome) = &self.finished {
            return RunStep::Finished(outcome.clone());
        }

        let next = self
            .generator
            .next_step(self.ctx, self.parsed, &self.state)
            .await;
        let outcome = match next {
            GeneratorStep::Argument(spec) if is_reserved_id(&spec.id) => RunOutcome::InvalidId {
                id: spec.id,
                reserved: true,
            },
            GeneratorStep::Argument(spec) if self.state.resolved.contains(&spec.id) => {
                RunOutcome::InvalidId {
                    id: spec.id,
                    reserved: false,
                }
            }
            GeneratorStep::Argument(spec) => match self.resolve(&spec).await {
                Ok(value) => {
                    debug!(argument = %spec.id, "[Arguments] Resolved");
                    self.state.resolved.insert(spec.id.clone(), value.clone());
                    self.state.last = Some(value.clone());
                    return RunStep::Resolved { id: spec.id, value };
                }
                Err(flag) => RunOutcome::Flag(self.fill_rest(flag)),
            },
            GeneratorStep::Flag(flag) => RunOutcome::Flag(self.fill_rest(flag)),
            GeneratorStep::Done(Some(args)) => RunOutcome::Args(args),
            GeneratorStep::Done(None) => RunOutcome::Args(self.state.resolved.clone()),
        };
        self.finished = Some(outcome.clone());
        RunStep::Finished(outcome)
    }

    /// Step until finished.
    pub async fn finish(mut self) -> RunOutcome {
        loop {
            if let RunStep::Finished(outcome) = self.step().await {
                return outcome;
            }
        }
    }

    fn fill_rest(&self, flag: Flag) -> Flag {
        match flag {
            Flag::Continue {
                command,
                ignore,
                rest: None,
            } => {
                let rest: String = self.parsed.all[self.state.index.min(self.parsed.all.len())..]
                    .iter()
                    .map(|t| t.raw.as_str())
                    .collect();
                Flag::Continue {
                    command,
                    ignore,
                    rest: Some(rest.trim().to_string()),
                }
            }
            other => other,
        }
    }

    async fn resolve(&mut self, spec: &ArgumentSpec) -> Result<ArgValue, Flag> {
        match spec.match_kind {
            ArgumentMatch::Phrase => self.run_phrase(spec).await,
            ArgumentMatch::Flag => Ok(self.run_flag(spec)),
            ArgumentMatch::Option => self.run_option(spec).await,
            ArgumentMatch::Rest => self.run_rest(spec).await,
            ArgumentMatch::Separate => self.run_separate(spec).await,
            ArgumentMatch::Text => self.run_text(spec).await,
            ArgumentMatch::Content => self.run_content(spec).await,
            ArgumentMatch::RestContent => self.run_rest_content(spec).await,
            ArgumentMatch::None => spec.process(self.ctx, self.env, "").await,
        }
    }

    fn phrase_value(&self, index: usize) -> &str {
        self.parsed
            .phrases
            .get(index)
            .map_or("", |p| p.value.as_str())
    }

    fn phrase_range(&self, start: usize, limit: Option<usize>) -> std::ops::Range<usize> {
        let len = self.parsed.phrases.len();
        let start = start.min(len);
        let end = limit.map_or(len, |l| start.saturating_add(l).min(len));
        start..end
    }

    async fn run_phrase(&mut self, spec: &ArgumentSpec) -> Result<ArgValue, Flag> {
        if spec.unordered.is_on() {
            for i in spec.unordered.indices(self.parsed.phrases.len()) {
                if self.state.used_indices.contains(&i) {
                    continue;
                }
                let phrase = self.phrase_value(i);
                // Unordered probing never prompts.
                let cast = self.ctx.resolver.cast(&spec.kind, self.ctx, phrase).await;
                if let Some(value) = cast.value() {
                    self.state.used_indices.insert(i);
                    return Ok(value);
                }
            }
            return spec.process(self.ctx, self.env, "").await;
        }

        let index = spec.index.unwrap_or(self.state.phrase_index);
        let value = spec.process(self.ctx, self.env, self.phrase_value(index)).await;
        if spec.index.is_none() {
            self.state.advance(self.parsed, 1);
        }
        value
    }

    async fn run_rest(&mut self, spec: &ArgumentSpec) -> Result<ArgValue, Flag> {
        let range = self.phrase_range(spec.index.unwrap_or(self.state.phrase_index), spec.limit);
        let consumed = range.len();
        let rest: String = self.parsed.phrases[range]
            .iter()
            .map(|p| p.raw.as_str())
            .collect();
        let value = spec.process(self.ctx, self.env, rest.trim()).await;
        if spec.index.is_none() {
            self.state.advance(self.parsed, consumed.max(1));
        }
        value
    }

    async fn run_separate(&mut self, spec: &ArgumentSpec) -> Result<ArgValue, Flag> {
        let range = self.phrase_range(spec.index.unwrap_or(self.state.phrase_index), spec.limit);
        if range.is_empty() {
            let value = spec.process(self.ctx, self.env, "").await;
            if spec.index.is_none() {
                self.state.advance(self.parsed, 1);
            }
            return value;
        }

        let consumed = range.len();
        let mut values = Vec::with_capacity(consumed);
        for phrase in &self.parsed.phrases[range] {
            values.push(spec.process(self.ctx, self.env, &phrase.value).await?);
        }
        if spec.index.is_none() {
            self.state.advance(self.parsed, consumed);
        }
        Ok(ArgValue::List(values))
    }

    fn run_flag(&self, spec: &ArgumentSpec) -> ArgValue {
        let matches = |key: &str| spec.flags.iter().any(|w| w == key);
        if spec.multiple_flags {
            let count = self.parsed.flags.iter().filter(|f| matches(&f.key)).count();
            return ArgValue::Int(count as i64);
        }
        let found = self.parsed.flags.iter().any(|f| matches(&f.key));
        ArgValue::Bool(if spec.default.is_some() { !found } else { found })
    }

    async fn run_option(&mut self, spec: &ArgumentSpec) -> Result<ArgValue, Flag> {
        let mut found = self
            .parsed
            .option_flags
            .iter()
            .filter(|o| spec.flags.iter().any(|w| *w == o.key));

        if spec.multiple_flags {
            let limit = spec.limit.unwrap_or(usize::MAX);
            let mut values = Vec::new();
            for option in found.take(limit) {
                let input = option.value.as_deref().unwrap_or("");
                values.push(spec.process(self.ctx, self.env, input).await?);
            }
            return Ok(ArgValue::List(values));
        }

        let input = found.next().and_then(|o| o.value.as_deref()).unwrap_or("");
        spec.process(self.ctx, self.env, input).await
    }

    async fn run_text(&mut self, spec: &ArgumentSpec) -> Result<ArgValue, Flag> {
        let range = self.phrase_range(spec.index.unwrap_or(0), spec.limit);
        let text: String = self.parsed.phrases[range]
            .iter()
            .map(|p| p.raw.as_str())
            .collect();
        spec.process(self.ctx, self.env, text.trim()).await
    }

    fn token_text(&self, start: usize, limit: Option<usize>) -> (String, std::ops::Range<usize>) {
        let len = self.parsed.all.len();
        let start = start.min(len);
        let end = limit.map_or(len, |l| start.saturating_add(l).min(len));
        let text = self.parsed.all[start..end]
            .iter()
            .map(|t| t.raw.as_str())
            .collect();
        (text, start..end)
    }

    async fn run_content(&mut self, spec: &ArgumentSpec) -> Result<ArgValue, Flag> {
        let (text, _) = self.token_text(spec.index.unwrap_or(0), spec.limit);
        spec.process(self.ctx, self.env, text.trim()).await
    }

    async fn run_rest_content(&mut self, spec: &ArgumentSpec) -> Result<ArgValue, Flag> {
        let (text, range) = self.token_text(spec.index.unwrap_or(self.state.index), spec.limit);
        let value = spec.process(self.ctx, self.env, text.trim()).await;
        if spec.index.is_none() {
            let consumed = self
                .parsed
                .phrases
                .iter()
                .skip(self.state.phrase_index)
                .filter(|p| range.contains(&p.token_index))
                .count();
            self.state.advance(self.parsed, consumed.max(1));
        }
        value
    }
}

/// Runs argument generators to completion.
pub struct ArgumentRunner;

impl ArgumentRunner {
    pub async fn run<'a>(
        ctx: &'a CommandContext,
        parsed: &'a ParsedContent,
        env: &'a ParseEnv<'a>,
        generator: Box<dyn ArgumentGenerator + 'a>,
    ) -> RunOutcome {
        ArgumentRun::new(ctx, parsed, env, generator).finish().await
    }

    /// Run a static list of specs.
    pub async fn run_static(
        ctx: &CommandContext,
        parsed: &ParsedContent,
        env: &ParseEnv<'_>,
        specs: Arc<Vec<ArgumentSpec>>,
    ) -> RunOutcome {
        ArgumentRun::new(ctx, parsed, env, Box::new(StaticGenerator::new(specs)))
            .finish()
            .await
    }
}
