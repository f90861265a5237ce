/// Command definitions: options, the executable trait, and the validated
/// `Command` the registry stores.
use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use herald_core::{CommandInfo, HeraldError, InboundMessage};

use crate::argument::{ArgumentDefaults, ArgumentMatch, ArgumentSpec};
use crate::content::ContentParser;
use crate::context::CommandContext;
use crate::resolver::{ArgumentType, TypeResolver};
use crate::runner::{ArgumentGenerator, StaticGenerator};
use crate::types::{
    ChannelRestriction, CommandResponse, IgnoreList, LockKind, PermissionCheck, Prefixes,
    SlashOptionSpec,
};
use crate::value::ArgMap;

const RESERVED_IDS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Argument ids no command may use.
pub(crate) fn is_reserved_id(id: &str) -> bool {
    id.is_empty() || RESERVED_IDS.contains(&id)
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CommandOptions {
    /// Words that invoke the command. Matched case-insensitively.
    pub aliases: Vec<String>,
    pub args: Vec<ArgumentSpec>,
    /// Prompt and `otherwise` defaults for this command's arguments.
    pub argument_defaults: ArgumentDefaults,
    pub quoted: bool,
    pub separator: Option<String>,
    /// Extra flag words for commands whose arguments come from a generator.
    pub flags: Vec<String>,
    pub option_flags: Vec<String>,
    pub category: String,
    pub description: String,
    pub channel: Option<ChannelRestriction>,
    pub owner_only: bool,
    pub super_user_only: bool,
    pub only_nsfw: bool,
    /// Re-run on message edits.
    pub editable: bool,
    pub typing: bool,
    /// Overrides the handler's default cooldown.
    pub cooldown: Option<Duration>,
    /// Uses allowed per cooldown window.
    pub ratelimit: u32,
    pub ignore_cooldown: Option<IgnoreList>,
    pub ignore_permissions: Option<IgnoreList>,
    pub client_permissions: Option<PermissionCheck>,
    pub user_permissions: Option<PermissionCheck>,
    pub lock: Option<LockKind>,
    /// Prefixes that replace the handler's for this command.
    pub prefix: Option<Prefixes>,
    pub slash: bool,
    pub slash_only: bool,
    pub slash_options: Vec<SlashOptionSpec>,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            aliases: Vec::new(),
            args: Vec::new(),
            argument_defaults: ArgumentDefaults::default(),
            quoted: true,
            separator: None,
            flags: Vec::new(),
            option_flags: Vec::new(),
            category: "default".to_string(),
            description: String::new(),
            channel: None,
            owner_only: false,
            super_user_only: false,
            only_nsfw: false,
            editable: true,
            typing: false,
            cooldown: None,
            ratelimit: 1,
            ignore_cooldown: None,
            ignore_permissions: None,
            client_permissions: None,
            user_permissions: None,
            lock: None,
            prefix: None,
            slash: false,
            slash_only: false,
            slash_options: Vec::new(),
        }
    }
}

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn arg(mut self, spec: ArgumentSpec) -> Self {
        self.args.push(spec);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn cooldown(mut self, cooldown: Duration, ratelimit: u32) -> Self {
        self.cooldown = Some(cooldown);
        self.ratelimit = ratelimit;
        self
    }

    pub fn lock(mut self, lock: LockKind) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn prefix(mut self, prefix: Prefixes) -> Self {
        self.prefix = Some(prefix);
        self
    }

    pub fn owner_only(mut self) -> Self {
        self.owner_only = true;
        self
    }

    pub fn channel(mut self, channel: ChannelRestriction) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn slash(mut self, options: Vec<SlashOptionSpec>) -> Self {
        self.slash = true;
        self.slash_options = options;
        self
    }
}

// ---------------------------------------------------------------------------
// Exec trait
// ---------------------------------------------------------------------------

/// The behavior of a command. Only `exec` is required.
#[async_trait]
pub trait CommandExec: Send + Sync {
    async fn exec(&self, ctx: &CommandContext, args: &ArgMap) -> Result<Option<CommandResponse>>;

    /// Runs after the post checks and before argument parsing.
    async fn before(&self, _ctx: &CommandContext) -> Result<()> {
        Ok(())
    }

    /// Run for any message, prefix or not, when this returns `true`.
    async fn condition(&self, _message: &InboundMessage) -> bool {
        false
    }

    /// Run for unprefixed messages matching this pattern.
    fn regex(&self, _message: &InboundMessage) -> Option<Regex> {
        None
    }

    /// A generator replacing the static argument list.
    fn arguments(&self) -> Option<Box<dyn ArgumentGenerator>> {
        None
    }

    async fn exec_slash(&self, ctx: &CommandContext, args: &ArgMap) -> Result<Option<CommandResponse>> {
        self.exec(ctx, args).await
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

pub struct Command {
    pub id: String,
    pub options: CommandOptions,
    args: Arc<Vec<ArgumentSpec>>,
    parser: ContentParser,
    exec: Arc<dyn CommandExec>,
}

impl Command {
    /// Validate options and build the content parser.
    pub fn new(
        id: impl Into<String>,
        options: CommandOptions,
        exec: impl CommandExec + 'static,
    ) -> Result<Self, HeraldError> {
        Self::with_exec(id, options, Arc::new(exec))
    }

    pub fn with_exec(
        id: impl Into<String>,
        mut options: CommandOptions,
        exec: Arc<dyn CommandExec>,
    ) -> Result<Self, HeraldError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(HeraldError::invalid_option("id", "command id must not be empty"));
        }
        if options.ratelimit == 0 {
            return Err(HeraldError::invalid_option(
                "ratelimit",
                format!("command '{}' must allow at least one use per window", id),
            ));
        }
        if options.slash_only && !options.slash {
            return Err(HeraldError::invalid_option(
                "slashOnly",
                format!("command '{}' is slash-only but not a slash command", id),
            ));
        }

        let mut seen = HashSet::new();
        let mut flag_words = options.flags.clone();
        let mut option_words = options.option_flags.clone();
        for spec in &options.args {
            if is_reserved_id(&spec.id) {
                return Err(HeraldError::ReservedArgumentId {
                    command: id.clone(),
                    id: spec.id.clone(),
                });
            }
            if !seen.insert(spec.id.as_str()) {
                return Err(HeraldError::DuplicateArgumentId {
                    command: id.clone(),
                    id: spec.id.clone(),
                });
            }
            match spec.match_kind {
                ArgumentMatch::Flag | ArgumentMatch::Option if spec.flags.is_empty() => {
                    return Err(HeraldError::invalid_option(
                        "flag",
                        format!("argument '{}' of command '{}' needs flag words", spec.id, id),
                    ));
                }
                ArgumentMatch::Flag => flag_words.extend(spec.flags.iter().cloned()),
                ArgumentMatch::Option => option_words.extend(spec.flags.iter().cloned()),
                _ => {}
            }
        }

        let parser = ContentParser::new()
            .with_flag_words(flag_words)
            .with_option_flag_words(option_words)
            .quoted(options.quoted)
            .with_separator(options.separator.clone());
        let args = Arc::new(std::mem::take(&mut options.args));

        Ok(Self {
            id,
            options,
            args,
            parser,
            exec,
        })
    }

    /// Check that every named argument type exists in `resolver`.
    pub fn validate_types(&self, resolver: &TypeResolver) -> Result<(), HeraldError> {
        for spec in self.args.iter() {
            if let ArgumentType::Named(name) = &spec.kind {
                if !resolver.has_type(name) {
                    return Err(HeraldError::UnknownType {
                        command: self.id.clone(),
                        argument: spec.id.clone(),
                        type_name: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn aliases(&self) -> &[String] {
        &self.options.aliases
    }

    pub fn args(&self) -> &[ArgumentSpec] {
        &self.args
    }

    pub fn parser(&self) -> &ContentParser {
        &self.parser
    }

    pub fn exec(&self) -> &Arc<dyn CommandExec> {
        &self.exec
    }

    /// The exec's own generator, or one over the static argument list.
    pub fn generator(&self) -> Box<dyn ArgumentGenerator> {
        self.exec
            .arguments()
            .unwrap_or_else(|| Box::new(StaticGenerator::new(self.args.clone())))
    }

    pub fn info(&self) -> CommandInfo {
        CommandInfo {
            id: self.id.clone(),
            category: self.options.category.clone(),
            aliases: self.options.aliases.clone(),
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("aliases", &self.options.aliases)
            .field("category", &self.options.category)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::BuiltinType;

    struct Noop;

    #[async_trait]
    impl CommandExec for Noop {
        async fn exec(&self, _ctx: &CommandContext, _args: &ArgMap) -> Result<Option<CommandResponse>> {
            Ok(None)
        }
    }

    #[test]
    fn reserved_and_duplicate_ids_are_rejected() {
        for bad in ["", "__proto__", "constructor", "prototype"] {
            let opts = CommandOptions::new().arg(ArgumentSpec::new(bad));
            assert!(matches!(
                Command::new("c", opts, Noop),
                Err(HeraldError::ReservedArgumentId { .. })
            ));
        }
        let opts = CommandOptions::new()
            .arg(ArgumentSpec::new("x"))
            .arg(ArgumentSpec::new("x"));
        assert!(matches!(
            Command::new("c", opts, Noop),
            Err(HeraldError::DuplicateArgumentId { .. })
        ));
    }

    #[test]
    fn zero_ratelimit_is_invalid() {
        let opts = CommandOptions::new().cooldown(Duration::from_secs(1), 0);
        assert!(matches!(
            Command::new("c", opts, Noop),
            Err(HeraldError::InvalidOption { .. })
        ));
    }

    #[test]
    fn flag_words_feed_the_parser() {
        let opts = CommandOptions::new()
            .arg(ArgumentSpec::new("text"))
            .arg(ArgumentSpec::flag("loud", ["--loud"]))
            .arg(ArgumentSpec::option("times", ["--times"]));
        let cmd = Command::new("say", opts, Noop).unwrap();
        let parsed = cmd.parser().parse("hi --loud --times 3");
        assert_eq!(parsed.phrase_values(), vec!["hi"]);
        assert!(parsed.has_flag("--loud"));
        assert_eq!(parsed.option("--times"), Some("3"));
        assert_eq!(cmd.args().len(), 3);
    }

    #[test]
    fn unknown_named_type_fails_validation() {
        let opts = CommandOptions::new()
            .arg(ArgumentSpec::new("n").of_type(BuiltinType::Integer))
            .arg(ArgumentSpec::new("m").of_type("nope"));
        let cmd = Command::new("c", opts, Noop).unwrap();
        let err = cmd.validate_types(&TypeResolver::new()).unwrap_err();
        assert!(matches!(err, HeraldError::UnknownType { type_name, .. } if type_name == "nope"));
    }
}
