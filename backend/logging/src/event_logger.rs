//! Handler Event Logger
//!
//! Writes every handler event (blocks, runs, cooldowns, errors) to the
//! tracing system as a structured record.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use herald_core::{Event, EventBus, EventKind};

use crate::redact::redact_sensitive_data;

#[derive(Debug, Clone, Serialize)]
pub struct EventLogEntry {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub name: &'static str,
    pub record: Value,
}

pub struct EventLogger;

impl EventLogger {
    /// Build the record for `event`, redacting every string in it when asked.
    pub fn entry(event: &Event, redact: bool) -> EventLogEntry {
        let mut record = serde_json::to_value(&event.kind).unwrap_or(Value::Null);
        if redact {
            redact_value(&mut record);
        }
        EventLogEntry {
            event_id: event.id.to_string(),
            timestamp: event.timestamp,
            name: event.kind.name(),
            record,
        }
    }

    pub fn log_event(event: &Event, redact: bool) {
        let entry = Self::entry(event, redact);
        let record = entry.record.to_string();
        match &event.kind {
            EventKind::Error { .. } => {
                warn!(target: "herald_events", event = entry.name, record = %record, "Handler error")
            }
            EventKind::CommandStarted { .. }
            | EventKind::CommandFinished { .. }
            | EventKind::SlashStarted { .. }
            | EventKind::SlashFinished { .. } => {
                info!(target: "herald_events", event = entry.name, record = %record, "Handler event")
            }
            _ => debug!(target: "herald_events", event = entry.name, record = %record, "Handler event"),
        }
    }

    /// Log everything published on `bus` until it closes.
    ///
    /// A subscribed logger counts as an error listener, so command errors
    /// are logged instead of returned.
    pub fn spawn(bus: &EventBus, redact: bool) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => Self::log_event(&event, redact),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "[EventLogger] Fell behind; events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

fn redact_value(value: &mut Value) {
    match value {
        Value::String(s) => *s = redact_sensitive_data(s),
        Value::Array(items) => items.iter_mut().for_each(redact_value),
        Value::Object(map) => map.values_mut().for_each(redact_value),
        _ => {}
    }
}
