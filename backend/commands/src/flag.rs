//! Control-flow flags returned from argument resolution.

use herald_core::{CancelReason, InboundMessage};

/// A sentinel that short-circuits an argument run.
///
/// Flags never reach the command body: the dispatcher consumes them.
#[derive(Debug, Clone, PartialEq)]
pub enum Flag {
    /// Abort the parse and report the cancellation.
    Cancel(CancelReason),
    /// Handle a replacement message from the top of the pipeline.
    Retry(Box<InboundMessage>),
    /// Run another command directly with leftover text.
    Continue {
        command: String,
        /// Skip post inhibitors, cooldowns and locks for the continued command.
        ignore: bool,
        /// Leftover content. Filled with the unparsed remainder when `None`.
        rest: Option<String>,
    },
}

impl Flag {
    pub fn cancel() -> Self {
        Self::Cancel(CancelReason::User)
    }

    pub fn retry(message: InboundMessage) -> Self {
        Self::Retry(Box::new(message))
    }

    /// Continue into `command`, skipping its checks.
    pub fn continue_to(command: impl Into<String>) -> Self {
        Self::Continue {
            command: command.into(),
            ignore: true,
            rest: None,
        }
    }

    /// Continue into `command` with explicit leftover text.
    pub fn continue_with(command: impl Into<String>, rest: impl Into<String>) -> Self {
        Self::Continue {
            command: command.into(),
            ignore: true,
            rest: Some(rest.into()),
        }
    }

    /// Re-run the continued command's post inhibitors, cooldown and lock.
    pub fn checked(self) -> Self {
        match self {
            Self::Continue { command, rest, .. } => Self::Continue {
                command,
                ignore: false,
                rest,
            },
            other => other,
        }
    }

    pub fn is_cancel(&self) -> bool {
        matches!(self, Self::Cancel(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continue_defaults_to_ignoring_checks() {
        match Flag::continue_with("b", "x") {
            Flag::Continue { command, ignore, rest } => {
                assert_eq!(command, "b");
                assert!(ignore);
                assert_eq!(rest.as_deref(), Some("x"));
            }
            other => panic!("unexpected flag {other:?}"),
        }
        assert!(matches!(
            Flag::continue_to("b").checked(),
            Flag::Continue { ignore: false, .. }
        ));
    }
}
