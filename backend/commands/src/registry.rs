/// Command registry: commands by id, the alias table and per-command
/// prefix overrides.
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

use herald_core::{HeraldError, InboundMessage, ModuleDirectory, ModuleKind};
use herald_inhibitors::InhibitorRegistry;

use crate::command::Command;

#[derive(Default)]
struct RegistryInner {
    /// Registration order.
    commands: Vec<Arc<Command>>,
    /// Lowercased alias → command id.
    aliases: HashMap<String, String>,
}

#[derive(Default)]
pub struct CommandRegistry {
    inner: RwLock<RegistryInner>,
    alias_replacement: Option<Regex>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also register each alias with every match of `pattern` removed, when
    /// that stripped alias is free.
    pub fn with_alias_replacement(mut self, pattern: Option<Regex>) -> Self {
        self.alias_replacement = pattern;
        self
    }

    pub fn register(&self, command: Command) -> Result<Arc<Command>, HeraldError> {
        let mut inner = self.write();
        if inner.commands.iter().any(|c| c.id == command.id) {
            return Err(HeraldError::DuplicateCommand(command.id));
        }

        let aliases: Vec<String> = command.aliases().iter().map(|a| a.to_lowercase()).collect();
        let mut own = HashSet::new();
        for alias in &aliases {
            if let Some(existing) = inner.aliases.get(alias) {
                return Err(HeraldError::AliasConflict {
                    alias: alias.clone(),
                    command: command.id.clone(),
                    existing: existing.clone(),
                });
            }
            if !own.insert(alias.as_str()) {
                return Err(HeraldError::AliasConflict {
                    alias: alias.clone(),
                    command: command.id.clone(),
                    existing: command.id.clone(),
                });
            }
        }

        for alias in &aliases {
            inner.aliases.insert(alias.clone(), command.id.clone());
        }
        if let Some(pattern) = &self.alias_replacement {
            for alias in &aliases {
                let stripped = pattern.replace_all(alias, "").into_owned();
                if stripped.is_empty() || stripped == *alias || inner.aliases.contains_key(&stripped) {
                    continue;
                }
                debug!(alias = %alias, stripped = %stripped, "[Registry] Registered stripped alias");
                inner.aliases.insert(stripped, command.id.clone());
            }
        }

        info!(
            id = %command.id,
            aliases = ?command.aliases(),
            category = %command.options.category,
            "[Registry] Registered command"
        );
        let command = Arc::new(command);
        inner.commands.push(command.clone());
        Ok(command)
    }

    pub fn deregister(&self, id: &str) -> Result<Arc<Command>, HeraldError> {
        let mut inner = self.write();
        let pos = inner
            .commands
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| HeraldError::UnknownCommand(id.to_string()))?;
        let command = inner.commands.remove(pos);
        inner.aliases.retain(|_, owner| owner != id);
        info!(id = %id, "[Registry] Deregistered command");
        Ok(command)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Command>> {
        self.read().commands.iter().find(|c| c.id == id).cloned()
    }

    /// Find a command by alias, case-insensitively.
    pub fn find_command(&self, alias: &str) -> Option<Arc<Command>> {
        let inner = self.read();
        let id = inner.aliases.get(&alias.to_lowercase())?;
        inner.commands.iter().find(|c| &c.id == id).cloned()
    }

    pub fn resolve_alias(&self, alias: &str) -> Option<String> {
        self.read().aliases.get(&alias.to_lowercase()).cloned()
    }

    /// Every command in registration order.
    pub fn all(&self) -> Vec<Arc<Command>> {
        self.read().commands.clone()
    }

    pub fn len(&self) -> usize {
        self.read().commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().commands.is_empty()
    }

    /// Commands grouped by category; categories sorted, commands in
    /// registration order.
    pub fn categories(&self) -> BTreeMap<String, Vec<Arc<Command>>> {
        let mut map: BTreeMap<String, Vec<Arc<Command>>> = BTreeMap::new();
        for command in self.read().commands.iter() {
            map.entry(command.options.category.clone())
                .or_default()
                .push(command.clone());
        }
        map
    }

    /// Per-command prefixes for `message`: prefix → ids of the commands
    /// using it.
    pub fn prefix_overrides(&self, message: &InboundMessage) -> Vec<(String, HashSet<String>)> {
        let mut map: HashMap<String, HashSet<String>> = HashMap::new();
        for command in self.read().commands.iter() {
            let Some(prefixes) = &command.options.prefix else {
                continue;
            };
            for prefix in prefixes.resolve(message) {
                map.entry(prefix).or_default().insert(command.id.clone());
            }
        }
        map.into_iter().collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Module directory
// ---------------------------------------------------------------------------

/// The handler's view of loaded modules: its own commands and inhibitors,
/// plus an outside directory for listeners, tasks and context menus.
pub struct HandlerModules {
    commands: Arc<CommandRegistry>,
    inhibitors: InhibitorRegistry,
    external: Arc<dyn ModuleDirectory>,
}

impl HandlerModules {
    pub fn new(
        commands: Arc<CommandRegistry>,
        inhibitors: InhibitorRegistry,
        external: Arc<dyn ModuleDirectory>,
    ) -> Self {
        Self {
            commands,
            inhibitors,
            external,
        }
    }
}

impl ModuleDirectory for HandlerModules {
    fn contains(&self, kind: ModuleKind, id: &str) -> bool {
        match kind {
            ModuleKind::Command => self.commands.get(id).is_some(),
            ModuleKind::Inhibitor => self.ids(kind).iter().any(|known| known == id),
            _ => self.external.contains(kind, id),
        }
    }

    fn ids(&self, kind: ModuleKind) -> Vec<String> {
        match kind {
            ModuleKind::Command => self.commands.all().iter().map(|c| c.id.clone()).collect(),
            ModuleKind::Inhibitor => self.inhibitors.try_ids().unwrap_or_default(),
            _ => self.external.ids(kind),
        }
    }

    fn resolve_alias(&self, alias: &str) -> Option<String> {
        self.commands.resolve_alias(alias)
    }

    fn category_of(&self, kind: ModuleKind, id: &str) -> Option<String> {
        match kind {
            ModuleKind::Command => self.commands.get(id).map(|c| c.options.category.clone()),
            _ => self.external.category_of(kind, id),
        }
    }
}
