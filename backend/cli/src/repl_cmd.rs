//! `herald repl`: drive the handler from stdin.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use herald_commands::{register_builtins, CommandHandler, HandlerOptions, Outcome};
use herald_config::HeraldConfig;
use herald_core::InboundMessage;
use herald_logging::EventLogger;

use crate::console::{parse_slash, ConsolePlatform, CONSOLE_CHANNEL};
use crate::demo;
use crate::terminal_output::{note_error, note_info, note_warn};

pub async fn run(config: HeraldConfig, config_path: &Path, user: &str) -> Result<()> {
    let options = HandlerOptions::from_config(&config)
        .with_context(|| format!("Invalid handler options in {}", config_path.display()))?;
    let handler = Arc::new(CommandHandler::new(Arc::new(ConsolePlatform::new()), options));
    register_builtins(&handler)?;
    demo::register(&handler)?;
    if let Some(inhibitors) = &config.inhibitors {
        handler.register_config_inhibitors(inhibitors).await?;
    }

    let redact = config
        .logging
        .as_ref()
        .and_then(|l| l.redact_sensitive)
        .unwrap_or(true);
    let events = EventLogger::spawn(handler.bus(), redact);

    info!(user = %user, commands = handler.registry().len(), "[Repl] Started");
    note_info(&format!(
        "Talking as `{}`. Try `!help`, `!add`, `/add a=1 b=2`. `:quit` exits.",
        user
    ));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut next_id: u64 = 0;
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == ":quit" {
            break;
        }
        next_id += 1;
        let id = next_id.to_string();

        // Each line runs in its own task so that a prompting command can
        // receive the following lines.
        let handler = handler.clone();
        if let Some(interaction) = parse_slash(&id, user, line) {
            tokio::spawn(async move { report(handler.handle_slash(interaction).await) });
        } else {
            let message = InboundMessage::new(id, user, CONSOLE_CHANNEL, line);
            tokio::spawn(async move { report(handler.handle(message).await) });
        }
    }

    handler.shutdown().await;
    events.abort();
    Ok(())
}

fn report(outcome: Result<Outcome>) {
    match outcome {
        Ok(Outcome::Invalid) => note_warn("No command matched."),
        Ok(Outcome::NotFound) => note_warn("No slash command by that name."),
        Ok(Outcome::Blocked {
            reason,
            command: Some(command),
        }) => note_warn(&format!("`{}` blocked: {}", command, reason)),
        Ok(Outcome::Cooldown { command, remaining }) => note_warn(&format!(
            "`{}` is on cooldown for {:.1}s",
            command,
            remaining.as_secs_f64()
        )),
        Ok(Outcome::Locked { command, .. }) => note_warn(&format!("`{}` is already running", command)),
        Ok(Outcome::MissingPermissions { command, missing, .. }) => {
            note_warn(&format!("`{}` needs {}", command, missing.join(", ")))
        }
        Ok(Outcome::Cancelled { command, reason }) => {
            note_info(&format!("`{}` cancelled ({:?})", command, reason))
        }
        Ok(Outcome::Errored { error, .. }) => note_error(&error),
        Ok(_) => {}
        Err(e) => note_error(&format!("{:#}", e)),
    }
}
