use thiserror::Error;

/// Top-level error type for Herald.
///
/// Everything except `Other` is a configuration error raised at setup or
/// registration time. Per-message input problems never surface here.
#[derive(Debug, Error)]
pub enum HeraldError {
    #[error("command '{0}' is already registered")]
    DuplicateCommand(String),

    #[error("alias '{alias}' of command '{command}' is already taken by '{existing}'")]
    AliasConflict {
        alias: String,
        command: String,
        existing: String,
    },

    #[error("command '{0}' was not found")]
    UnknownCommand(String),

    #[error("inhibitor '{0}' is already registered")]
    DuplicateInhibitor(String),

    #[error("argument id '{id}' in command '{command}' is reserved or empty")]
    ReservedArgumentId { command: String, id: String },

    #[error("argument id '{id}' is used twice in command '{command}'")]
    DuplicateArgumentId { command: String, id: String },

    #[error("argument '{argument}' of command '{command}' uses unknown type '{type_name}'")]
    UnknownType {
        command: String,
        argument: String,
        type_name: String,
    },

    #[error("invalid option '{option}': {message}")]
    InvalidOption { option: String, message: String },

    #[error("platform error ({scope}): {message}")]
    Platform { scope: String, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HeraldError {
    pub fn invalid_option(option: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_conflict_message_names_both_commands() {
        let err = HeraldError::AliasConflict {
            alias: "p".into(),
            command: "pong".into(),
            existing: "ping".into(),
        };
        assert_eq!(
            err.to_string(),
            "alias 'p' of command 'pong' is already taken by 'ping'"
        );
    }
}
