//! `herald-core` holds the types shared by every Herald crate: the inbound message
//! model, the platform and module-directory traits, handler events and the
//! event bus.

pub mod bus;
pub mod error;
pub mod event;
pub mod message;
pub mod traits;
pub mod types;

pub use bus::EventBus;
pub use error::HeraldError;
pub use event::{BlockReason, CancelReason, Event, EventKind, PermissionScope};
pub use message::{
    Author, ChannelInfo, ChannelKind, InboundMessage, Interaction, InteractionOption, OptionKind,
};
pub use traits::{EmptyDirectory, ModuleDirectory, Platform};
pub use types::{CommandInfo, EntityKind, ModuleKind, Permission, PermissionSet};
