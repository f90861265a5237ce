/// Inhibitor stages.
///
/// Inhibitors fire at fixed points of the command pipeline.
use serde::{Deserialize, Serialize};

/// The pipeline stage at which an inhibitor runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InhibitorStage {
    /// Every inbound message, before anything else.
    All,
    /// Messages that passed the `All` stage, before prefix parsing.
    Pre,
    /// After a command was resolved, before its arguments are parsed.
    Post,
}
