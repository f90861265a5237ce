use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One event emitted by the command handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// Why a message or command was blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "reason")]
pub enum BlockReason {
    /// The message has no resolvable author.
    AuthorNotFound,
    /// The message was sent by the bot itself.
    Client,
    /// The message was sent by another bot.
    Bot,
    /// The author is answering an argument prompt.
    InPrompt,
    Owner,
    SuperUser,
    Guild,
    Dm,
    NotNsfw,
    SlashOnly,
    /// Reason supplied by a custom inhibitor.
    Inhibitor(String),
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthorNotFound => write!(f, "authorNotFound"),
            Self::Client => write!(f, "client"),
            Self::Bot => write!(f, "bot"),
            Self::InPrompt => write!(f, "inPrompt"),
            Self::Owner => write!(f, "owner"),
            Self::SuperUser => write!(f, "superUser"),
            Self::Guild => write!(f, "guild"),
            Self::Dm => write!(f, "dm"),
            Self::NotNsfw => write!(f, "notNsfw"),
            Self::SlashOnly => write!(f, "slashOnly"),
            Self::Inhibitor(reason) => write!(f, "{}", reason),
        }
    }
}

/// Why an argument parse was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The argument's `otherwise` fallback fired.
    Otherwise,
    /// No reply arrived within the prompt's time budget.
    Timeout,
    /// Every retry was used up without a valid reply.
    RetriesExhausted,
    /// The user typed the cancel word.
    CancelWord,
    /// A custom generator or caster cancelled.
    User,
}

/// Whose permissions were missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionScope {
    Client,
    User,
}

/// Categories of events the handler can emit, with their payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    MessageBlocked {
        message_id: String,
        reason: BlockReason,
    },
    /// No command ran. `prefix` and `alias` hold the guess when a prefix matched.
    MessageInvalid {
        message_id: String,
        prefix: Option<String>,
        alias: Option<String>,
    },
    CommandBlocked {
        message_id: String,
        command: String,
        reason: BlockReason,
    },
    CommandStarted {
        message_id: String,
        command: String,
        args: serde_json::Value,
    },
    CommandFinished {
        message_id: String,
        command: String,
        args: serde_json::Value,
        response: Option<String>,
    },
    CommandCancelled {
        message_id: String,
        command: String,
        reason: CancelReason,
    },
    /// A prompt reply turned out to be a new command; it is re-handled.
    CommandBreakout {
        message_id: String,
        command: String,
        breakout_message_id: String,
    },
    CommandLocked {
        message_id: String,
        command: String,
        key: String,
    },
    Cooldown {
        message_id: String,
        command: String,
        user_id: String,
        remaining_ms: u64,
    },
    MissingPermissions {
        message_id: String,
        command: String,
        scope: PermissionScope,
        missing: Vec<String>,
    },
    SlashBlocked {
        interaction_id: String,
        command: String,
        reason: BlockReason,
    },
    SlashNotFound {
        interaction_id: String,
        name: String,
    },
    SlashStarted {
        interaction_id: String,
        command: String,
        args: serde_json::Value,
    },
    SlashFinished {
        interaction_id: String,
        command: String,
        response: Option<String>,
    },
    Error {
        message_id: String,
        command: Option<String>,
        error: String,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageBlocked { .. } => "messageBlocked",
            Self::MessageInvalid { .. } => "messageInvalid",
            Self::CommandBlocked { .. } => "commandBlocked",
            Self::CommandStarted { .. } => "commandStarted",
            Self::CommandFinished { .. } => "commandFinished",
            Self::CommandCancelled { .. } => "commandCancelled",
            Self::CommandBreakout { .. } => "commandBreakout",
            Self::CommandLocked { .. } => "commandLocked",
            Self::Cooldown { .. } => "cooldown",
            Self::MissingPermissions { .. } => "missingPermissions",
            Self::SlashBlocked { .. } => "slashBlocked",
            Self::SlashNotFound { .. } => "slashNotFound",
            Self::SlashStarted { .. } => "slashStarted",
            Self::SlashFinished { .. } => "slashFinished",
            Self::Error { .. } => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
