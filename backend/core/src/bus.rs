use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::event::{Event, EventKind};

/// Default channel buffer size for handler events.
const DEFAULT_BUFFER_SIZE: usize = 256;

/// Publish/subscribe bus carrying handler events to listeners.
///
/// Built on a Tokio broadcast channel, so every subscriber sees every event.
/// Slow subscribers lag instead of blocking the handler.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer);
        info!(buffer_size = buffer, "EventBus initialized");
        Self { sender }
    }

    /// Publish an event. Returns `false` when nobody is listening.
    pub fn publish(&self, kind: EventKind) -> bool {
        debug!(event = %kind, "Publishing handler event");
        self.sender.send(Event::new(kind)).is_ok()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn has_listeners(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
