//! `herald-commands`: command parsing and dispatch.
//!
//! Provides:
//! - Content tokenizing into phrases, flags and option flags
//! - Typed arguments with casters, defaults and interactive prompts
//! - The argument runner with cancel, retry and continue flags
//! - The command handler pipeline: inhibitors, prefixes, permissions,
//!   cooldowns, locks and events
//! - Slash-command handling

pub mod argument;
pub mod casters;
pub mod command;
pub mod content;
pub mod context;
pub mod cooldown;
pub mod detection;
pub mod dispatch;
pub mod flag;
pub mod handlers;
pub mod lock;
pub mod prompt;
pub mod registry;
pub mod resolver;
pub mod runner;
pub mod slash;
pub mod types;
pub mod value;

#[cfg(test)]
mod testing;

pub use argument::{
    ArgumentDefaults, ArgumentMatch, ArgumentSpec, DefaultValue, ParseEnv, PromptData,
    PromptOptions, PromptText, Unordered,
};
pub use command::{Command, CommandExec, CommandOptions};
pub use content::{ContentParser, ParsedContent};
pub use context::{CommandContext, TypingGuard};
pub use detection::ParsedCommand;
pub use dispatch::{CommandHandler, HandlerOptions, Outcome};
pub use flag::Flag;
pub use handlers::{register_builtins, HelpCommand, PingCommand};
pub use prompt::PromptRegistry;
pub use registry::CommandRegistry;
pub use resolver::{caster_fn, ArgumentType, BuiltinType, CastOutcome, Caster, TypeResolver};
pub use runner::{ArgumentGenerator, ArgumentRunner, GeneratorStep, RunOutcome, RunnerState};
pub use slash::slash_args;
pub use types::{
    ChannelRestriction, CommandResponse, IgnoreList, LockKind, PermissionCheck, Prefixes,
    SlashOptionSpec, UnsetOptionPolicy,
};
pub use value::{ArgMap, ArgValue};
