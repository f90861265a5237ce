/// Command dispatch: the message pipeline from inhibitors through prefix
/// detection, post checks, argument parsing and execution.
use anyhow::{Context, Result};
use futures::future::{join_all, BoxFuture, FutureExt};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, info_span, instrument, warn, Instrument};

use herald_config::{HeraldConfig, InhibitorsConfig};
use herald_core::{
    BlockReason, CancelReason, EmptyDirectory, EventBus, EventKind, HeraldError, InboundMessage,
    ModuleDirectory, PermissionScope, Platform,
};
use herald_inhibitors::{
    BlacklistInhibitor, BlockedWordsInhibitor, DisabledCommandsInhibitor, Inhibitor,
    InhibitorRegistry, InhibitorStage,
};

use crate::argument::{ArgumentDefaults, ParseEnv, PromptOptions};
use crate::command::Command;
use crate::context::{BoundedSet, CommandContext, TypingGuard};
use crate::cooldown::{CooldownCheck, CooldownManager};
use crate::detection::{
    ordered_prefixes, parse_multiple_prefixes, prefix_compare, ParsedCommand,
};
use crate::flag::Flag;
use crate::lock::{CommandLocker, LockGuard};
use crate::prompt::PromptRegistry;
use crate::registry::{CommandRegistry, HandlerModules};
use crate::resolver::{capture_map, TypeResolver};
use crate::runner::{ArgumentRunner, RunOutcome};
use crate::types::{CommandResponse, IgnoreList, PermissionCheck, Prefixes, UnsetOptionPolicy};
use crate::value::{ArgMap, ArgValue};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HandlerOptions {
    pub prefixes: Prefixes,
    /// Accept `<@client>` and `<@!client>` as prefixes.
    pub allow_mention: bool,
    pub block_client: bool,
    pub block_bots: bool,
    pub owners: HashSet<String>,
    pub super_users: HashSet<String>,
    /// Cooldown for commands without their own.
    pub default_cooldown: Duration,
    /// Who skips cooldowns. Owners when unset.
    pub ignore_cooldown: Option<IgnoreList>,
    /// Who skips user permission checks. Owners when unset.
    pub ignore_permissions: Option<IgnoreList>,
    pub handle_edits: bool,
    pub command_typing: bool,
    pub alias_replacement: Option<Regex>,
    pub deleted_capacity: usize,
    pub unset_slash_options: UnsetOptionPolicy,
    pub argument_defaults: ArgumentDefaults,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            prefixes: Prefixes::default(),
            allow_mention: true,
            block_client: true,
            block_bots: true,
            owners: HashSet::new(),
            super_users: HashSet::new(),
            default_cooldown: Duration::ZERO,
            ignore_cooldown: None,
            ignore_permissions: None,
            handle_edits: false,
            command_typing: false,
            alias_replacement: None,
            deleted_capacity: 1000,
            unset_slash_options: UnsetOptionPolicy::Null,
            argument_defaults: ArgumentDefaults::default(),
        }
    }
}

impl HandlerOptions {
    /// Map a prepared config onto handler options.
    pub fn from_config(config: &HeraldConfig) -> Result<Self, HeraldError> {
        let handler = config.handler.clone().unwrap_or_default();
        let defaults = Self::default();

        let alias_replacement = handler
            .alias_replacement
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| HeraldError::invalid_option("handler.aliasReplacement", e.to_string()))?;
        let unset_slash_options = handler
            .unset_slash_options
            .as_deref()
            .map(str::parse::<UnsetOptionPolicy>)
            .transpose()
            .map_err(|e| HeraldError::invalid_option("handler.unsetSlashOptions", e))?
            .unwrap_or_default();

        Ok(Self {
            prefixes: handler
                .prefixes
                .map(Prefixes::Static)
                .unwrap_or(defaults.prefixes),
            allow_mention: handler.allow_mention.unwrap_or(defaults.allow_mention),
            block_client: handler.block_client.unwrap_or(defaults.block_client),
            block_bots: handler.block_bots.unwrap_or(defaults.block_bots),
            owners: handler.owners.unwrap_or_default().into_iter().collect(),
            super_users: handler.super_users.unwrap_or_default().into_iter().collect(),
            default_cooldown: handler
                .default_cooldown_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.default_cooldown),
            ignore_cooldown: handler.ignore_cooldown.map(IgnoreList::users),
            ignore_permissions: handler.ignore_permissions.map(IgnoreList::users),
            handle_edits: handler.handle_edits.unwrap_or(defaults.handle_edits),
            command_typing: handler.command_typing.unwrap_or(defaults.command_typing),
            alias_replacement,
            deleted_capacity: handler.deleted_capacity.unwrap_or(defaults.deleted_capacity),
            unset_slash_options,
            argument_defaults: ArgumentDefaults {
                prompt: config.prompt.as_ref().map(PromptOptions::from).unwrap_or_default(),
                otherwise: None,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// How handling a message or interaction ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Executed {
        command: String,
        response: Option<CommandResponse>,
    },
    Blocked {
        command: Option<String>,
        reason: BlockReason,
    },
    Cancelled {
        command: String,
        reason: CancelReason,
    },
    Locked {
        command: String,
        key: String,
    },
    Cooldown {
        command: String,
        remaining: Duration,
    },
    MissingPermissions {
        command: String,
        scope: PermissionScope,
        missing: Vec<String>,
    },
    /// Regex or conditional commands ran, one outcome each.
    Triggered(Vec<Outcome>),
    /// Nothing matched.
    Invalid,
    /// Slash interaction for an unknown command.
    NotFound,
    /// Skipped without any event, e.g. an edit that is not handled.
    Ignored,
    /// The command failed and the error was published.
    Errored {
        command: Option<String>,
        error: String,
    },
}

/// Why the post checks stopped a command.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PostBlock {
    Blocked(BlockReason),
    MissingPermissions {
        scope: PermissionScope,
        missing: Vec<String>,
    },
    Cooldown(Duration),
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

pub struct CommandHandler {
    options: HandlerOptions,
    platform: Arc<dyn Platform>,
    registry: Arc<CommandRegistry>,
    inhibitors: InhibitorRegistry,
    resolver: Arc<TypeResolver>,
    modules: Arc<dyn ModuleDirectory>,
    bus: EventBus,
    prompts: PromptRegistry,
    cooldowns: CooldownManager,
    locks: Arc<CommandLocker>,
    deleted: Mutex<BoundedSet>,
}

impl CommandHandler {
    pub fn new(platform: Arc<dyn Platform>, options: HandlerOptions) -> Self {
        let registry = Arc::new(
            CommandRegistry::new().with_alias_replacement(options.alias_replacement.clone()),
        );
        let inhibitors = InhibitorRegistry::new();
        let modules = Arc::new(HandlerModules::new(
            registry.clone(),
            inhibitors.clone(),
            Arc::new(EmptyDirectory),
        ));
        info!(
            prefixes = ?options.prefixes,
            allow_mention = options.allow_mention,
            "[Handler] Initialized"
        );
        Self {
            deleted: Mutex::new(BoundedSet::new(options.deleted_capacity)),
            options,
            platform,
            registry,
            inhibitors,
            resolver: Arc::new(TypeResolver::new()),
            modules,
            bus: EventBus::new(),
            prompts: PromptRegistry::new(),
            cooldowns: CooldownManager::new(),
            locks: CommandLocker::new(),
        }
    }

    /// Listeners, tasks and context menus known outside the handler.
    pub fn with_directory(mut self, external: Arc<dyn ModuleDirectory>) -> Self {
        self.modules = Arc::new(HandlerModules::new(
            self.registry.clone(),
            self.inhibitors.clone(),
            external,
        ));
        self
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<TypeResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn options(&self) -> &HandlerOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub fn inhibitors(&self) -> &InhibitorRegistry {
        &self.inhibitors
    }

    pub fn resolver(&self) -> &Arc<TypeResolver> {
        &self.resolver
    }

    pub fn modules(&self) -> &Arc<dyn ModuleDirectory> {
        &self.modules
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn prompts(&self) -> &PromptRegistry {
        &self.prompts
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    // -- registration -------------------------------------------------------

    /// Register a command after checking its argument types.
    pub fn register(&self, command: Command) -> Result<Arc<Command>, HeraldError> {
        command.validate_types(&self.resolver)?;
        self.registry.register(command)
    }

    pub fn deregister(&self, id: &str) -> Result<Arc<Command>, HeraldError> {
        self.registry.deregister(id)
    }

    pub async fn register_inhibitor(&self, inhibitor: Arc<dyn Inhibitor>) -> Result<(), HeraldError> {
        self.inhibitors.register(inhibitor).await
    }

    /// Register the built-in inhibitors that `config` enables.
    pub async fn register_config_inhibitors(&self, config: &InhibitorsConfig) -> Result<(), HeraldError> {
        if let Some(users) = config.blacklist.as_ref().filter(|u| !u.is_empty()) {
            self.register_inhibitor(Arc::new(BlacklistInhibitor::new(users.iter().cloned())))
                .await?;
        }
        if let Some(words) = config.blocked_words.as_ref().filter(|w| !w.is_empty()) {
            self.register_inhibitor(Arc::new(BlockedWordsInhibitor::new(words.clone())))
                .await?;
        }
        let commands: HashSet<String> = config.disabled_commands.iter().flatten().cloned().collect();
        let categories: HashSet<String> =
            config.disabled_categories.iter().flatten().cloned().collect();
        if !commands.is_empty() || !categories.is_empty() {
            self.register_inhibitor(Arc::new(DisabledCommandsInhibitor {
                commands,
                categories,
                priority: 0,
            }))
            .await?;
        }
        Ok(())
    }

    // -- entry points -------------------------------------------------------

    /// Run a message through the whole pipeline.
    pub fn handle(&self, message: InboundMessage) -> BoxFuture<'_, Result<Outcome>> {
        let span = info_span!("handle", message_id = %message.id);
        async move {
            let in_prompt = self.prompts.offer(&message);
            if let Some(reason) = self.run_all_inhibitors(&message, in_prompt).await {
                debug!(reason = %reason, "[Handler] Message blocked");
                self.emit(EventKind::MessageBlocked {
                    message_id: message.id.clone(),
                    reason: reason.clone(),
                });
                return Ok(Outcome::Blocked {
                    command: None,
                    reason,
                });
            }

            if let Some(reason) = self.inhibitors.test(InhibitorStage::Pre, &message, None).await {
                let reason = BlockReason::Inhibitor(reason);
                debug!(reason = %reason, "[Handler] Message blocked before parsing");
                self.emit(EventKind::MessageBlocked {
                    message_id: message.id.clone(),
                    reason: reason.clone(),
                });
                return Ok(Outcome::Blocked {
                    command: None,
                    reason,
                });
            }

            let parsed = self.parse_command(&message);
            if let Some(command) = parsed.command.as_deref().and_then(|id| self.registry.get(id)) {
                if command.options.slash_only {
                    self.emit(EventKind::CommandBlocked {
                        message_id: message.id.clone(),
                        command: command.id.clone(),
                        reason: BlockReason::SlashOnly,
                    });
                    return Ok(Outcome::Blocked {
                        command: Some(command.id.clone()),
                        reason: BlockReason::SlashOnly,
                    });
                }
                let content = parsed.content.clone();
                return self
                    .direct(message, content, command, false, Some(parsed))
                    .await;
            }

            let outcomes = self.handle_regex_and_conditional(&message).await?;
            if outcomes.is_empty() {
                debug!("[Handler] No command matched");
                self.emit(EventKind::MessageInvalid {
                    message_id: message.id.clone(),
                    prefix: parsed.prefix,
                    alias: parsed.alias.filter(|a| !a.is_empty()),
                });
                return Ok(Outcome::Invalid);
            }
            Ok(Outcome::Triggered(outcomes))
        }
        .instrument(span)
        .boxed()
    }

    /// Run `command` with `content`, skipping prefix detection. With
    /// `ignore` the post checks, cooldown and lock are skipped.
    pub fn handle_direct_command(
        &self,
        message: InboundMessage,
        content: String,
        command: Arc<Command>,
        ignore: bool,
    ) -> BoxFuture<'_, Result<Outcome>> {
        self.direct(message, content, command, ignore, None)
    }

    /// Re-run an edited message when edit handling is on.
    pub async fn handle_edit(&self, mut message: InboundMessage) -> Result<Outcome> {
        if !self.options.handle_edits || self.was_deleted(&message.id) {
            return Ok(Outcome::Ignored);
        }
        message.edited = true;
        self.handle(message).await
    }

    /// Remember a deleted message id.
    pub fn handle_delete(&self, message_id: &str) {
        self.deleted().insert(message_id);
    }

    pub fn was_deleted(&self, message_id: &str) -> bool {
        self.deleted().contains(message_id)
    }

    /// Resolve prefix and alias. Global prefixes first; per-command prefixes
    /// only when those found no command.
    pub fn parse_command(&self, message: &InboundMessage) -> ParsedCommand {
        let mentions = if self.options.allow_mention {
            let id = self.platform.client_id();
            vec![format!("<@{}>", id), format!("<@!{}>", id)]
        } else {
            Vec::new()
        };
        let global: Vec<(String, Option<HashSet<String>>)> =
            ordered_prefixes(mentions, self.options.prefixes.resolve(message))
                .into_iter()
                .map(|p| (p, None))
                .collect();
        let parsed = parse_multiple_prefixes(&self.registry, message, &global);
        if parsed.command.is_some() {
            return parsed;
        }

        let mut overrides = self.registry.prefix_overrides(message);
        if overrides.is_empty() {
            return parsed;
        }
        overrides.sort_by(|a, b| prefix_compare(&a.0, &b.0));
        let own: Vec<(String, Option<HashSet<String>>)> =
            overrides.into_iter().map(|(p, ids)| (p, Some(ids))).collect();
        let by_command = parse_multiple_prefixes(&self.registry, message, &own);
        if by_command.command.is_some() || parsed.prefix.is_none() {
            by_command
        } else {
            parsed
        }
    }

    /// Count a use of `command`. `Some(remaining)` when over the rate limit.
    pub async fn run_cooldowns(&self, message: &InboundMessage, command: &Command) -> Option<Duration> {
        let author = message.author_id()?;
        let ignored = match command
            .options
            .ignore_cooldown
            .as_ref()
            .or(self.options.ignore_cooldown.as_ref())
        {
            Some(list) => list.contains(message),
            None => self.is_owner(author),
        };
        if ignored {
            return None;
        }
        let window = command.options.cooldown.unwrap_or(self.options.default_cooldown);
        match self
            .cooldowns
            .hit(author, &command.id, window, command.options.ratelimit)
            .await
        {
            CooldownCheck::Allowed => None,
            CooldownCheck::Limited { remaining } => Some(remaining),
        }
    }

    /// Drop expired cooldown windows.
    pub async fn sweep_cooldowns(&self) -> usize {
        self.cooldowns.sweep().await
    }

    /// Forget deleted ids, open prompts and cooldowns.
    pub async fn shutdown(&self) {
        self.deleted().clear();
        self.prompts.clear();
        self.cooldowns.clear().await;
        info!("[Handler] Shut down");
    }

    // -- pipeline -----------------------------------------------------------

    fn direct(
        &self,
        message: InboundMessage,
        content: String,
        command: Arc<Command>,
        ignore: bool,
        parsed: Option<ParsedCommand>,
    ) -> BoxFuture<'_, Result<Outcome>> {
        async move {
            if message.edited && !command.options.editable {
                return Ok(Outcome::Ignored);
            }
            if !ignore {
                if let Some(block) = self.post_checks(&message, &command).await? {
                    return Ok(self.report_block(&message, &command.id, block, false));
                }
            }

            let ctx = self.context(message.clone()).with_parsed(parsed);
            if let Err(e) = command.exec().before(&ctx).await {
                return self.report_error(&message, Some(&command.id), e);
            }

            let parsed_content = command.parser().parse(&content);
            let is_command = |m: &InboundMessage| self.parse_command(m).command.is_some();
            let env = ParseEnv::new(&self.prompts)
                .with_defaults(
                    command
                        .options
                        .argument_defaults
                        .merged_over(&self.options.argument_defaults),
                )
                .with_breakout(&is_command);

            let args = match ArgumentRunner::run(&ctx, &parsed_content, &env, command.generator()).await {
                RunOutcome::Args(args) => args,
                RunOutcome::Flag(Flag::Cancel(reason)) => {
                    debug!(command = %command.id, ?reason, "[Handler] Command cancelled");
                    self.emit(EventKind::CommandCancelled {
                        message_id: message.id.clone(),
                        command: command.id.clone(),
                        reason,
                    });
                    return Ok(Outcome::Cancelled {
                        command: command.id.clone(),
                        reason,
                    });
                }
                RunOutcome::Flag(Flag::Retry(next)) => {
                    debug!(command = %command.id, next = %next.id, "[Handler] Breaking out of prompt");
                    self.emit(EventKind::CommandBreakout {
                        message_id: message.id.clone(),
                        command: command.id.clone(),
                        breakout_message_id: next.id.clone(),
                    });
                    return self.handle(*next).await;
                }
                RunOutcome::InvalidId { id, reserved } => {
                    let command_id = command.id.clone();
                    let error = if reserved {
                        HeraldError::ReservedArgumentId { command: command_id, id }
                    } else {
                        HeraldError::DuplicateArgumentId { command: command_id, id }
                    };
                    return self.report_error(&message, Some(&command.id), error.into());
                }
                RunOutcome::Flag(Flag::Continue {
                    command: next_id,
                    ignore: next_ignore,
                    rest,
                }) => {
                    let Some(next) = self.registry.get(&next_id) else {
                        return self.report_error(
                            &message,
                            Some(&command.id),
                            HeraldError::UnknownCommand(next_id).into(),
                        );
                    };
                    debug!(from = %command.id, to = %next.id, "[Handler] Continuing");
                    return self
                        .direct(message, rest.unwrap_or_default(), next, next_ignore, None)
                        .await;
                }
            };

            let _lock = if ignore {
                None
            } else {
                match self.acquire_lock(&message, &command, &args).await {
                    Ok(guard) => guard,
                    Err(outcome) => return Ok(outcome),
                }
            };
            self.run_command(&ctx, &command, args).await
        }
        .boxed()
    }

    async fn handle_regex_and_conditional(&self, message: &InboundMessage) -> Result<Vec<Outcome>> {
        let commands: Vec<Arc<Command>> = self
            .registry
            .all()
            .into_iter()
            .filter(|c| !message.edited || c.options.editable)
            .collect();

        let mut triggered: Vec<(Arc<Command>, ArgMap)> = Vec::new();
        for command in &commands {
            let Some(pattern) = command.exec().regex(message) else {
                continue;
            };
            let matches: Vec<ArgValue> = pattern
                .captures_iter(&message.content)
                .map(|caps| capture_map(&caps))
                .collect();
            let Some(first) = matches.first() else {
                continue;
            };
            let mut args = ArgMap::new();
            args.insert("match", first.get("match").cloned().unwrap_or(ArgValue::Null));
            args.insert("groups", first.get("groups").cloned().unwrap_or(ArgValue::Null));
            args.insert("matches", ArgValue::List(matches));
            triggered.push((command.clone(), args));
        }

        let conditions = join_all(commands.iter().map(|c| c.exec().condition(message))).await;
        for (command, matched) in commands.iter().zip(conditions) {
            if matched {
                triggered.push((command.clone(), ArgMap::new()));
            }
        }

        join_all(
            triggered
                .into_iter()
                .map(|(command, args)| self.run_triggered(message.clone(), command, args)),
        )
        .await
        .into_iter()
        .collect()
    }

    async fn run_triggered(
        &self,
        message: InboundMessage,
        command: Arc<Command>,
        args: ArgMap,
    ) -> Result<Outcome> {
        if let Some(block) = self.post_checks(&message, &command).await? {
            return Ok(self.report_block(&message, &command.id, block, false));
        }
        let ctx = self.context(message);
        if let Err(e) = command.exec().before(&ctx).await {
            return self.report_error(&ctx.message, Some(&command.id), e);
        }
        self.run_command(&ctx, &command, args).await
    }

    async fn run_command(&self, ctx: &CommandContext, command: &Command, args: ArgMap) -> Result<Outcome> {
        info!(command = %command.id, message_id = %ctx.message.id, "[Handler] Running command");
        let args_json = args.to_json();
        self.emit(EventKind::CommandStarted {
            message_id: ctx.message.id.clone(),
            command: command.id.clone(),
            args: args_json.clone(),
        });

        let result = {
            let _typing = self.typing_for(command, ctx);
            command.exec().exec(ctx, &args).await
        };
        let response = match result {
            Ok(response) => response,
            Err(e) => return self.report_error(&ctx.message, Some(&command.id), e),
        };
        if let Some(response) = &response {
            if let Err(e) = ctx.reply(&response.text).await {
                return self.report_error(&ctx.message, Some(&command.id), e);
            }
        }

        self.emit(EventKind::CommandFinished {
            message_id: ctx.message.id.clone(),
            command: command.id.clone(),
            args: args_json,
            response: response.as_ref().map(|r| r.text.clone()),
        });
        Ok(Outcome::Executed {
            command: command.id.clone(),
            response,
        })
    }

    async fn acquire_lock(
        &self,
        message: &InboundMessage,
        command: &Command,
        args: &ArgMap,
    ) -> Result<Option<LockGuard>, Outcome> {
        let Some(kind) = &command.options.lock else {
            return Ok(None);
        };
        let Some(key) = kind.key(message, args).await else {
            return Ok(None);
        };
        match self.locks.try_acquire(&command.id, &key) {
            Some(guard) => Ok(Some(guard)),
            None => {
                debug!(command = %command.id, key = %key, "[Handler] Command locked");
                self.emit(EventKind::CommandLocked {
                    message_id: message.id.clone(),
                    command: command.id.clone(),
                    key: key.clone(),
                });
                Err(Outcome::Locked {
                    command: command.id.clone(),
                    key,
                })
            }
        }
    }

    // -- checks -------------------------------------------------------------

    /// Custom all-stage inhibitors, then the built-in checks.
    pub(crate) async fn run_all_inhibitors(
        &self,
        message: &InboundMessage,
        in_prompt: bool,
    ) -> Option<BlockReason> {
        if let Some(reason) = self.inhibitors.test(InhibitorStage::All, message, None).await {
            return Some(BlockReason::Inhibitor(reason));
        }
        let Some(author) = &message.author else {
            return Some(BlockReason::AuthorNotFound);
        };
        if self.options.block_client && author.id == self.platform.client_id() {
            return Some(BlockReason::Client);
        }
        if self.options.block_bots && author.bot {
            return Some(BlockReason::Bot);
        }
        in_prompt.then_some(BlockReason::InPrompt)
    }

    /// Owner, channel, NSFW, permission, inhibitor and cooldown checks.
    #[instrument(skip_all, fields(command = %command.id))]
    pub(crate) async fn post_checks(
        &self,
        message: &InboundMessage,
        command: &Command,
    ) -> Result<Option<PostBlock>> {
        let author = message.author_id().unwrap_or_default();
        let is_owner = self.is_owner(author);
        let opts = &command.options;

        if opts.owner_only && !is_owner {
            return Ok(Some(PostBlock::Blocked(BlockReason::Owner)));
        }
        if opts.super_user_only && !(is_owner || self.options.super_users.contains(author)) {
            return Ok(Some(PostBlock::Blocked(BlockReason::SuperUser)));
        }
        match opts.channel {
            Some(crate::types::ChannelRestriction::Guild) if message.guild_id.is_none() => {
                return Ok(Some(PostBlock::Blocked(BlockReason::Guild)));
            }
            Some(crate::types::ChannelRestriction::Dm) if message.guild_id.is_some() => {
                return Ok(Some(PostBlock::Blocked(BlockReason::Dm)));
            }
            _ => {}
        }
        if opts.only_nsfw && !message.channel.nsfw {
            return Ok(Some(PostBlock::Blocked(BlockReason::NotNsfw)));
        }

        if let Some(block) = self.run_permission_checks(message, command).await? {
            return Ok(Some(block));
        }

        let info = command.info();
        if let Some(reason) = self
            .inhibitors
            .test(InhibitorStage::Post, message, Some(&info))
            .await
        {
            return Ok(Some(PostBlock::Blocked(BlockReason::Inhibitor(reason))));
        }

        Ok(self
            .run_cooldowns(message, command)
            .await
            .map(PostBlock::Cooldown))
    }

    async fn run_permission_checks(
        &self,
        message: &InboundMessage,
        command: &Command,
    ) -> Result<Option<PostBlock>> {
        if let Some(check) = &command.options.client_permissions {
            let client = self.platform.client_id().to_string();
            if let Some(missing) = self.missing_permissions(check, message, &client).await? {
                return Ok(Some(PostBlock::MissingPermissions {
                    scope: PermissionScope::Client,
                    missing,
                }));
            }
        }

        if let Some(check) = &command.options.user_permissions {
            let author = message.author_id().unwrap_or_default();
            let ignored = match command
                .options
                .ignore_permissions
                .as_ref()
                .or(self.options.ignore_permissions.as_ref())
            {
                Some(list) => list.contains(message),
                None => self.is_owner(author),
            };
            if !ignored {
                if let Some(missing) = self.missing_permissions(check, message, author).await? {
                    return Ok(Some(PostBlock::MissingPermissions {
                        scope: PermissionScope::User,
                        missing,
                    }));
                }
            }
        }
        Ok(None)
    }

    async fn missing_permissions(
        &self,
        check: &PermissionCheck,
        message: &InboundMessage,
        user_id: &str,
    ) -> Result<Option<Vec<String>>> {
        match check {
            PermissionCheck::Custom(predicate) => Ok(predicate.missing(message).await),
            PermissionCheck::Static(required) => {
                // Channel permissions only exist in guilds.
                if message.guild_id.is_none() || message.channel.is_dm() {
                    return Ok(None);
                }
                let have = self
                    .platform
                    .permissions(&message.channel, message.guild_id.as_deref(), user_id)
                    .await
                    .with_context(|| format!("Failed to resolve permissions of {}", user_id))?;
                let missing: Vec<String> = have.missing(required).iter().map(ToString::to_string).collect();
                Ok((!missing.is_empty()).then_some(missing))
            }
        }
    }

    // -- helpers ------------------------------------------------------------

    pub(crate) fn context(&self, message: InboundMessage) -> CommandContext {
        CommandContext::new(
            message,
            self.platform.clone(),
            self.modules.clone(),
            self.resolver.clone(),
        )
    }

    fn typing_for(&self, command: &Command, ctx: &CommandContext) -> Option<TypingGuard> {
        (command.options.typing || self.options.command_typing)
            .then(|| TypingGuard::start(self.platform.clone(), ctx.channel_id().to_string()))
    }

    pub(crate) fn is_owner(&self, user_id: &str) -> bool {
        self.options.owners.contains(user_id)
    }

    pub(crate) fn emit(&self, kind: EventKind) {
        self.bus.publish(kind);
    }

    /// Publish a post-check block and turn it into an outcome.
    pub(crate) fn report_block(
        &self,
        message: &InboundMessage,
        command: &str,
        block: PostBlock,
        slash: bool,
    ) -> Outcome {
        debug!(command = %command, block = ?block, "[Handler] Post checks stopped command");
        match block {
            PostBlock::Blocked(reason) => {
                if slash {
                    self.emit(EventKind::SlashBlocked {
                        interaction_id: message.id.clone(),
                        command: command.to_string(),
                        reason: reason.clone(),
                    });
                } else {
                    self.emit(EventKind::CommandBlocked {
                        message_id: message.id.clone(),
                        command: command.to_string(),
                        reason: reason.clone(),
                    });
                }
                Outcome::Blocked {
                    command: Some(command.to_string()),
                    reason,
                }
            }
            PostBlock::MissingPermissions { scope, missing } => {
                self.emit(EventKind::MissingPermissions {
                    message_id: message.id.clone(),
                    command: command.to_string(),
                    scope,
                    missing: missing.clone(),
                });
                Outcome::MissingPermissions {
                    command: command.to_string(),
                    scope,
                    missing,
                }
            }
            PostBlock::Cooldown(remaining) => {
                self.emit(EventKind::Cooldown {
                    message_id: message.id.clone(),
                    command: command.to_string(),
                    user_id: message.author_id().unwrap_or_default().to_string(),
                    remaining_ms: remaining.as_millis() as u64,
                });
                Outcome::Cooldown {
                    command: command.to_string(),
                    remaining,
                }
            }
        }
    }

    /// Publish a command error, or return it when nobody listens.
    pub(crate) fn report_error(
        &self,
        message: &InboundMessage,
        command: Option<&str>,
        error: anyhow::Error,
    ) -> Result<Outcome> {
        if !self.bus.has_listeners() {
            return Err(error);
        }
        let text = format!("{:#}", error);
        warn!(command = ?command, error = %text, "[Handler] Command failed");
        self.emit(EventKind::Error {
            message_id: message.id.clone(),
            command: command.map(str::to_string),
            error: text.clone(),
        });
        Ok(Outcome::Errored {
            command: command.map(str::to_string),
            error: text,
        })
    }

    fn deleted(&self) -> MutexGuard<'_, BoundedSet> {
        self.deleted.lock().unwrap_or_else(|e| e.into_inner())
    }
}
