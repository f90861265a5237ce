//! Structured logging for Herald.
//!
//! Console and rolling JSON file output, handler event records, and
//! redaction of secrets before anything is logged.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{EventLogEntry, EventLogger};
pub use logger::init_logger;
pub use redact::redact_sensitive_data;
