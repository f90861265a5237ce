pub mod builtin;
pub mod registry;
pub mod types;

pub use builtin::{BlacklistInhibitor, BlockedWordsInhibitor, DisabledCommandsInhibitor};
pub use registry::{Inhibitor, InhibitorRegistry};
pub use types::InhibitorStage;
