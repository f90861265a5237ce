use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// A platform capability that a member may or may not hold in a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    Administrator,
    ViewChannel,
    SendMessages,
    ManageMessages,
    EmbedLinks,
    AttachFiles,
    ReadMessageHistory,
    MentionEveryone,
    AddReactions,
    UseExternalEmojis,
    KickMembers,
    BanMembers,
    ManageChannels,
    ManageGuild,
    ManageRoles,
    ManageNicknames,
    ModerateMembers,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| format!("{:?}", self));
        write!(f, "{}", s)
    }
}

/// A set of permissions resolved for one member in one channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, permission: Permission) {
        self.0.insert(permission);
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&Permission::Administrator) || self.0.contains(&permission)
    }

    /// Permissions from `required` that this set does not grant, in order.
    pub fn missing(&self, required: &PermissionSet) -> Vec<Permission> {
        required
            .0
            .iter()
            .copied()
            .filter(|p| !self.contains(*p))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Modules
// ---------------------------------------------------------------------------

/// Kinds of loadable modules known to the module directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    Command,
    Inhibitor,
    Listener,
    Task,
    ContextMenu,
}

/// Lightweight description of a command handed to inhibitors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInfo {
    pub id: String,
    pub category: String,
    pub aliases: Vec<String>,
}

/// Platform entities that casters can resolve through the platform client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Member,
    Channel,
    Role,
    Emoji,
    Guild,
    Message,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn administrator_grants_everything() {
        let have: PermissionSet = [Permission::Administrator].into_iter().collect();
        let need: PermissionSet = [Permission::BanMembers, Permission::ManageRoles]
            .into_iter()
            .collect();
        assert!(have.missing(&need).is_empty());
    }

    #[test]
    fn missing_lists_only_absent_permissions() {
        let have: PermissionSet = [Permission::SendMessages].into_iter().collect();
        let need: PermissionSet = [Permission::SendMessages, Permission::EmbedLinks]
            .into_iter()
            .collect();
        assert_eq!(have.missing(&need), vec![Permission::EmbedLinks]);
    }

    #[test]
    fn permission_display_uses_wire_name() {
        assert_eq!(Permission::ManageMessages.to_string(), "MANAGE_MESSAGES");
    }
}
