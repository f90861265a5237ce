/// Slash-command handling: interaction options become an argument map and
/// run through the same checks as message commands.
use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, instrument};

use herald_core::{EventKind, Interaction, InteractionOption, OptionKind};

use crate::dispatch::{CommandHandler, Outcome};
use crate::types::{SlashOptionSpec, UnsetOptionPolicy};
use crate::value::{ArgMap, ArgValue};

impl CommandHandler {
    /// Run a slash interaction. Only commands declared with `slash` are found.
    #[instrument(skip_all, fields(interaction_id = %interaction.id, command = %interaction.command_name))]
    pub async fn handle_slash(&self, interaction: Interaction) -> Result<Outcome> {
        let Some(command) = self
            .registry()
            .find_command(&interaction.command_name)
            .filter(|c| c.options.slash)
        else {
            debug!("[Slash] No slash command by that name");
            self.emit(EventKind::SlashNotFound {
                interaction_id: interaction.id.clone(),
                name: interaction.command_name.clone(),
            });
            return Ok(Outcome::NotFound);
        };

        let message = interaction.as_message();
        if let Some(reason) = self.run_all_inhibitors(&message, false).await {
            self.emit(EventKind::SlashBlocked {
                interaction_id: interaction.id.clone(),
                command: command.id.clone(),
                reason: reason.clone(),
            });
            return Ok(Outcome::Blocked {
                command: Some(command.id.clone()),
                reason,
            });
        }
        if let Some(block) = self.post_checks(&message, &command).await? {
            return Ok(self.report_block(&message, &command.id, block, true));
        }

        let args = slash_args(
            &command.options.slash_options,
            &interaction.options,
            self.options().unset_slash_options,
        );
        let args_json = args.to_json();
        info!(command = %command.id, "[Slash] Running command");
        self.emit(EventKind::SlashStarted {
            interaction_id: interaction.id.clone(),
            command: command.id.clone(),
            args: args_json,
        });

        let interaction_id = interaction.id.clone();
        let ctx = self.context(message.clone()).with_interaction(interaction);
        let response = match command.exec().exec_slash(&ctx, &args).await {
            Ok(response) => response,
            Err(e) => return self.report_error(&message, Some(&command.id), e),
        };
        if let Some(response) = &response {
            if let Err(e) = ctx.reply(&response.text).await {
                return self.report_error(&message, Some(&command.id), e);
            }
        }

        self.emit(EventKind::SlashFinished {
            interaction_id,
            command: command.id.clone(),
            response: response.as_ref().map(|r| r.text.clone()),
        });
        Ok(Outcome::Executed {
            command: command.id.clone(),
            response,
        })
    }
}

/// Build the argument map for a slash invocation.
///
/// Given options are keyed by name; subcommands land under `subcommand`
/// and `subcommandGroup`. Declared options that were not given are null,
/// except that non-value kinds follow `policy`.
pub fn slash_args(
    declared: &[SlashOptionSpec],
    given: &[InteractionOption],
    policy: UnsetOptionPolicy,
) -> ArgMap {
    let mut args = ArgMap::new();
    for option in given {
        match option.kind {
            OptionKind::SubCommand => args.insert("subcommand", ArgValue::text(&option.name)),
            OptionKind::SubCommandGroup => {
                args.insert("subcommandGroup", ArgValue::text(&option.name))
            }
            kind => args.insert(option.name.clone(), option_value(kind, &option.value)),
        }
    }

    for spec in declared {
        if given.iter().any(|o| o.name == spec.name) {
            continue;
        }
        if spec.kind.carries_value() {
            args.insert(spec.name.clone(), ArgValue::Null);
        } else if policy == UnsetOptionPolicy::Null {
            let key = match spec.kind {
                OptionKind::SubCommandGroup => "subcommandGroup",
                _ => "subcommand",
            };
            if !args.contains(key) {
                args.insert(key, ArgValue::Null);
            }
        }
    }
    args
}

fn option_value(kind: OptionKind, value: &Value) -> ArgValue {
    match (kind, value) {
        (_, Value::Null) => ArgValue::Null,
        (OptionKind::Integer, v) => v
            .as_i64()
            .map(ArgValue::Int)
            .unwrap_or_else(|| ArgValue::text(v.to_string())),
        (OptionKind::Number, v) => v
            .as_f64()
            .map(ArgValue::Float)
            .unwrap_or_else(|| ArgValue::text(v.to_string())),
        (OptionKind::Boolean, Value::Bool(b)) => ArgValue::Bool(*b),
        (_, Value::String(s)) => ArgValue::text(s),
        (_, v) => ArgValue::text(v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, CommandExec, CommandOptions};
    use crate::context::CommandContext;
    use crate::dispatch::HandlerOptions;
    use crate::testing::MockPlatform;
    use crate::types::CommandResponse;
    use async_trait::async_trait;
    use chrono::Utc;
    use herald_core::{Author, BlockReason, ChannelInfo};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Echo {
        seen: Mutex<Option<(ArgMap, bool)>>,
    }

    #[async_trait]
    impl CommandExec for Echo {
        async fn exec(&self, _ctx: &CommandContext, _args: &ArgMap) -> Result<Option<CommandResponse>> {
            Ok(Some(CommandResponse::ok("message path")))
        }

        async fn exec_slash(&self, ctx: &CommandContext, args: &ArgMap) -> Result<Option<CommandResponse>> {
            *self.seen.lock().unwrap() = Some((args.clone(), ctx.interaction.is_some()));
            Ok(Some(CommandResponse::ephemeral(format!("hi {}", args.str("name").unwrap_or("?")))))
        }
    }

    fn interaction(name: &str, options: Vec<InteractionOption>) -> Interaction {
        Interaction {
            id: "i1".into(),
            command_name: name.into(),
            options,
            author: Author::user("u1", "user"),
            channel: ChannelInfo::guild("c1"),
            guild_id: Some("guild".into()),
            created_at: Utc::now(),
        }
    }

    fn option(name: &str, kind: OptionKind, value: Value) -> InteractionOption {
        InteractionOption {
            name: name.into(),
            kind,
            value,
        }
    }

    #[test]
    fn values_follow_option_kind() {
        let given = vec![
            option("count", OptionKind::Integer, json!(3)),
            option("ratio", OptionKind::Number, json!(0.5)),
            option("loud", OptionKind::Boolean, json!(true)),
            option("who", OptionKind::User, json!("123")),
            option("add", OptionKind::SubCommand, Value::Null),
        ];
        let args = slash_args(&[], &given, UnsetOptionPolicy::Null);
        assert_eq!(args.int("count"), Some(3));
        assert_eq!(args.get("ratio"), Some(&ArgValue::Float(0.5)));
        assert!(args.flag("loud"));
        assert_eq!(args.str("who"), Some("123"));
        assert_eq!(args.str("subcommand"), Some("add"));
    }

    #[test]
    fn unset_options_follow_policy() {
        let declared = vec![
            SlashOptionSpec::new("name", OptionKind::String),
            SlashOptionSpec::new("add", OptionKind::SubCommand),
        ];
        let null = slash_args(&declared, &[], UnsetOptionPolicy::Null);
        assert_eq!(null.get("name"), Some(&ArgValue::Null));
        assert_eq!(null.get("subcommand"), Some(&ArgValue::Null));

        let absent = slash_args(&declared, &[], UnsetOptionPolicy::Absent);
        assert_eq!(absent.get("name"), Some(&ArgValue::Null));
        assert!(!absent.contains("subcommand"));
    }

    #[tokio::test]
    async fn slash_command_runs_with_options() {
        let platform = MockPlatform::new();
        let handler = CommandHandler::new(platform.clone(), HandlerOptions::default());
        let echo = Arc::new(Echo::default());
        let options = CommandOptions::new()
            .aliases(["greet"])
            .slash(vec![SlashOptionSpec::new("name", OptionKind::String).required()]);
        handler
            .register(Command::with_exec("greet", options, echo.clone()).unwrap())
            .unwrap();
        let mut rx = handler.bus().subscribe();

        let out = handler
            .handle_slash(interaction("greet", vec![option("name", OptionKind::String, json!("ada"))]))
            .await
            .unwrap();
        assert!(matches!(
            out,
            Outcome::Executed { ref response, .. } if response.as_ref().is_some_and(|r| r.ephemeral)
        ));
        assert_eq!(platform.sent_texts(), vec!["hi ada"]);
        let (args, had_interaction) = echo.seen.lock().unwrap().clone().unwrap();
        assert_eq!(args.str("name"), Some("ada"));
        assert!(had_interaction);

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.kind.name());
        }
        assert_eq!(names, vec!["slashStarted", "slashFinished"]);
    }

    #[tokio::test]
    async fn unknown_or_non_slash_commands_are_not_found() {
        let handler = CommandHandler::new(MockPlatform::new(), HandlerOptions::default());
        handler
            .register(
                Command::with_exec("plain", CommandOptions::new().aliases(["plain"]), Arc::new(Echo::default()))
                    .unwrap(),
            )
            .unwrap();
        let mut rx = handler.bus().subscribe();

        assert_eq!(handler.handle_slash(interaction("plain", Vec::new())).await.unwrap(), Outcome::NotFound);
        assert_eq!(handler.handle_slash(interaction("nope", Vec::new())).await.unwrap(), Outcome::NotFound);
        let event = rx.try_recv().unwrap();
        assert_eq!(
            event.kind,
            EventKind::SlashNotFound {
                interaction_id: "i1".into(),
                name: "plain".into()
            }
        );
    }

    #[tokio::test]
    async fn slash_post_checks_report_slash_blocks() {
        let handler = CommandHandler::new(MockPlatform::new(), HandlerOptions::default());
        let options = CommandOptions::new().aliases(["secret"]).owner_only().slash(Vec::new());
        handler
            .register(Command::with_exec("secret", options, Arc::new(Echo::default())).unwrap())
            .unwrap();
        let mut rx = handler.bus().subscribe();

        let out = handler.handle_slash(interaction("secret", Vec::new())).await.unwrap();
        assert_eq!(
            out,
            Outcome::Blocked {
                command: Some("secret".into()),
                reason: BlockReason::Owner
            }
        );
        assert_eq!(rx.try_recv().unwrap().kind.name(), "slashBlocked");
    }
}
