use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The author of an inbound message or interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub username: String,
    pub bot: bool,
}

impl Author {
    pub fn user(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            bot: false,
        }
    }

    pub fn bot(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            bot: true,
            ..Self::user(id, username)
        }
    }
}

/// What kind of channel a message arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Guild,
    Thread,
    Dm,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub kind: ChannelKind,
    pub nsfw: bool,
}

impl ChannelInfo {
    pub fn guild(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ChannelKind::Guild,
            nsfw: false,
        }
    }

    pub fn dm(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ChannelKind::Dm,
            nsfw: false,
        }
    }

    pub fn is_dm(&self) -> bool {
        self.kind == ChannelKind::Dm
    }
}

/// A chat message as handed over by the platform client.
///
/// `author` is optional because some platforms deliver system or webhook
/// messages without a resolvable author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub content: String,
    pub author: Option<Author>,
    pub channel: ChannelInfo,
    pub guild_id: Option<String>,
    /// Set when this delivery is an edit of an earlier message.
    pub edited: bool,
    pub created_at: DateTime<Utc>,
}

impl InboundMessage {
    /// Build a guild message from a regular user.
    pub fn new(
        id: impl Into<String>,
        author_id: impl Into<String>,
        channel_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let author_id = author_id.into();
        Self {
            id: id.into(),
            content: content.into(),
            author: Some(Author::user(author_id.clone(), author_id)),
            channel: ChannelInfo::guild(channel_id),
            guild_id: Some("guild".to_string()),
            edited: false,
            created_at: Utc::now(),
        }
    }

    pub fn in_dm(mut self) -> Self {
        self.channel.kind = ChannelKind::Dm;
        self.guild_id = None;
        self
    }

    pub fn author_id(&self) -> Option<&str> {
        self.author.as_ref().map(|a| a.id.as_str())
    }
}

/// Kind of a slash-command option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    SubCommand,
    SubCommandGroup,
    String,
    Integer,
    Boolean,
    User,
    Channel,
    Role,
    Mentionable,
    Number,
    Attachment,
}

impl OptionKind {
    /// Option kinds that carry a plain value. An unset option of one of these
    /// kinds always resolves to null.
    pub fn carries_value(self) -> bool {
        !matches!(self, Self::SubCommand | Self::SubCommandGroup)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionOption {
    pub name: String,
    pub kind: OptionKind,
    pub value: serde_json::Value,
}

/// A slash-command interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: String,
    pub command_name: String,
    pub options: Vec<InteractionOption>,
    pub author: Author,
    pub channel: ChannelInfo,
    pub guild_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Interaction {
    /// View of the interaction as a message, so that inhibitors and
    /// permission checks can share one input type.
    pub fn as_message(&self) -> InboundMessage {
        InboundMessage {
            id: self.id.clone(),
            content: format!("/{}", self.command_name),
            author: Some(self.author.clone()),
            channel: self.channel.clone(),
            guild_id: self.guild_id.clone(),
            edited: false,
            created_at: self.created_at,
        }
    }
}
