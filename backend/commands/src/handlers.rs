/// Built-in commands: `help` and `ping`.
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use herald_core::{HeraldError, OptionKind};

use crate::argument::ArgumentSpec;
use crate::command::{Command, CommandExec, CommandOptions};
use crate::context::CommandContext;
use crate::dispatch::CommandHandler;
use crate::registry::CommandRegistry;
use crate::resolver::BuiltinType;
use crate::types::{CommandResponse, SlashOptionSpec};
use crate::value::ArgMap;

// ---------------------------------------------------------------------------
// help
// ---------------------------------------------------------------------------

/// Lists commands by category, or details one command.
pub struct HelpCommand {
    pub registry: Arc<CommandRegistry>,
}

impl HelpCommand {
    pub fn command(registry: Arc<CommandRegistry>) -> Result<Command, HeraldError> {
        let options = CommandOptions::new()
            .aliases(["help", "commands"])
            .category("util")
            .description("Show the available commands")
            .arg(
                ArgumentSpec::new("command")
                    .of_type(BuiltinType::CommandAlias)
                    .describe("Command to describe"),
            )
            .slash(vec![SlashOptionSpec::new("command", OptionKind::String)]);
        Command::new("help", options, Self { registry })
    }

    fn overview(&self) -> String {
        let mut lines = vec!["*Available commands:*".to_string()];
        for (category, commands) in self.registry.categories() {
            let names: Vec<String> = commands
                .iter()
                .filter_map(|c| c.aliases().first().map(|a| format!("`{}`", a)))
                .collect();
            if !names.is_empty() {
                lines.push(format!("{}: {}", category, names.join(", ")));
            }
        }
        lines.join("\n")
    }

    fn details(&self, id: &str) -> Option<String> {
        let command = self.registry.get(id)?;
        let mut lines = vec![format!("*{}* ({})", command.id, command.options.category)];
        if !command.options.description.is_empty() {
            lines.push(command.options.description.clone());
        }
        if !command.aliases().is_empty() {
            lines.push(format!("Aliases: {}", command.aliases().join(", ")));
        }
        if let Some(cooldown) = command.options.cooldown {
            lines.push(format!(
                "Cooldown: {} use(s) per {}ms",
                command.options.ratelimit,
                cooldown.as_millis()
            ));
        }
        Some(lines.join("\n"))
    }
}

#[async_trait]
impl CommandExec for HelpCommand {
    async fn exec(&self, _ctx: &CommandContext, args: &ArgMap) -> Result<Option<CommandResponse>> {
        let text = match args.str("command") {
            Some(id) => self
                .details(id)
                .unwrap_or_else(|| format!("No command `{}`", id)),
            None => self.overview(),
        };
        Ok(Some(CommandResponse::ok(text)))
    }

    async fn exec_slash(&self, ctx: &CommandContext, args: &ArgMap) -> Result<Option<CommandResponse>> {
        let id = args
            .str("command")
            .and_then(|alias| ctx.modules.resolve_alias(alias));
        let text = match id {
            Some(id) => self.details(&id).unwrap_or_else(|| self.overview()),
            None => self.overview(),
        };
        Ok(Some(CommandResponse::ephemeral(text)))
    }
}

// ---------------------------------------------------------------------------
// ping
// ---------------------------------------------------------------------------

pub struct PingCommand;

impl PingCommand {
    pub fn command() -> Result<Command, HeraldError> {
        let options = CommandOptions::new()
            .aliases(["ping"])
            .category("util")
            .description("Check that the bot responds")
            .slash(Vec::new());
        Command::new("ping", options, Self)
    }
}

#[async_trait]
impl CommandExec for PingCommand {
    async fn exec(&self, ctx: &CommandContext, _args: &ArgMap) -> Result<Option<CommandResponse>> {
        let latency = (Utc::now() - ctx.message.created_at).num_milliseconds().max(0);
        Ok(Some(CommandResponse::ok(format!("Pong! {}ms", latency))))
    }
}

/// Register `help` and `ping` on `handler`.
pub fn register_builtins(handler: &CommandHandler) -> Result<(), HeraldError> {
    handler.register(HelpCommand::command(handler.registry().clone())?)?;
    handler.register(PingCommand::command()?)?;
    info!("[Handler] Registered built-in commands");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{HandlerOptions, Outcome};
    use crate::testing::MockPlatform;
    use herald_core::InboundMessage;
    use std::time::Duration;

    fn handler() -> (CommandHandler, Arc<MockPlatform>) {
        let platform = MockPlatform::new();
        let handler = CommandHandler::new(platform.clone(), HandlerOptions::default());
        register_builtins(&handler).unwrap();
        (handler, platform)
    }

    fn msg(content: &str) -> InboundMessage {
        InboundMessage::new("m1", "u1", "c1", content)
    }

    #[tokio::test]
    async fn ping_replies_with_latency() {
        let (handler, platform) = handler();
        let out = handler.handle(msg("!ping")).await.unwrap();
        assert!(matches!(out, Outcome::Executed { .. }));
        let sent = platform.sent_texts();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("Pong! "), "got {}", sent[0]);
    }

    #[tokio::test]
    async fn help_lists_categories() {
        let (handler, platform) = handler();
        let mut options = CommandOptions::new().aliases(["ban", "b"]).category("mod");
        options.cooldown = Some(Duration::from_secs(5));
        handler
            .register(Command::new("ban", options, PingCommand).unwrap())
            .unwrap();

        handler.handle(msg("!help")).await.unwrap();
        handler.handle(msg("!commands B")).await.unwrap();
        let sent = platform.sent_texts();
        let (overview, details) = (&sent[0], &sent[1]);
        assert!(overview.contains("mod: `ban`"), "got {overview}");
        assert!(overview.contains("util: `help`, `ping`"), "got {overview}");

        assert!(details.starts_with("*ban* (mod)"));
        assert!(details.contains("Aliases: ban, b"));
        assert!(details.contains("Cooldown: 1 use(s) per 5000ms"));
    }
}
