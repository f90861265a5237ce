//! Sample commands for the console REPL.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use herald_commands::{
    ArgMap, ArgumentMatch, ArgumentSpec, BuiltinType, Command, CommandContext, CommandExec,
    CommandHandler, CommandOptions, CommandResponse, LockKind, PromptOptions, SlashOptionSpec,
};
use herald_core::{HeraldError, OptionKind};

struct Echo;

#[async_trait]
impl CommandExec for Echo {
    async fn exec(&self, _ctx: &CommandContext, args: &ArgMap) -> Result<Option<CommandResponse>> {
        let text = args.str("text").unwrap_or_default();
        let times = args.int("times").unwrap_or(1).clamp(1, 5) as usize;
        let text = if args.flag("loud") { text.to_uppercase() } else { text.to_string() };
        Ok(Some(CommandResponse::ok(vec![text; times].join(" "))))
    }
}

struct Add;

#[async_trait]
impl CommandExec for Add {
    async fn exec(&self, _ctx: &CommandContext, args: &ArgMap) -> Result<Option<CommandResponse>> {
        let a = args.int("a").unwrap_or_default();
        let b = args.int("b").unwrap_or_default();
        Ok(Some(CommandResponse::ok(format!("{} + {} = {}", a, b, a + b))))
    }
}

struct Slow;

#[async_trait]
impl CommandExec for Slow {
    async fn exec(&self, _ctx: &CommandContext, _args: &ArgMap) -> Result<Option<CommandResponse>> {
        tokio::time::sleep(Duration::from_secs(3)).await;
        Ok(Some(CommandResponse::ok("done")))
    }
}

fn number(id: &str, ordinal: &str) -> ArgumentSpec {
    ArgumentSpec::new(id).of_type(BuiltinType::Integer).prompt(
        PromptOptions::new()
            .start(format!("What is the {} number?", ordinal))
            .retry("That is not a number. Try again.")
            .ended("Too many tries.")
            .timeout("Out of time."),
    )
}

pub fn register(handler: &CommandHandler) -> Result<(), HeraldError> {
    let echo = CommandOptions::new()
        .aliases(["echo", "say"])
        .category("demo")
        .description("Repeat text; `--loud`, `--times=N`")
        .arg(ArgumentSpec::flag("loud", ["--loud"]))
        .arg(
            ArgumentSpec::option("times", ["--times="])
                .of_type(BuiltinType::Integer)
                .default_value(1i64),
        )
        .arg(ArgumentSpec::new("text").matching(ArgumentMatch::Rest))
        .cooldown(Duration::from_secs(5), 3);
    handler.register(Command::new("echo", echo, Echo)?)?;

    let add = CommandOptions::new()
        .aliases(["add"])
        .category("demo")
        .description("Add two numbers, asking for missing ones")
        .arg(number("a", "first"))
        .arg(number("b", "second"))
        .slash(vec![
            SlashOptionSpec::new("a", OptionKind::Integer).required(),
            SlashOptionSpec::new("b", OptionKind::Integer).required(),
        ]);
    handler.register(Command::new("add", add, Add)?)?;

    let mut slow = CommandOptions::new()
        .aliases(["slow"])
        .category("demo")
        .description("Takes a while; one run per user at a time")
        .lock(LockKind::User);
    slow.typing = true;
    handler.register(Command::new("slow", slow, Slow)?)?;
    Ok(())
}
