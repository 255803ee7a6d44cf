//! Observability for typelens
//!
//! Structured JSON log lines keyed by a typed `Event`. Logging never
//! changes resolution results and never fails the caller.

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log an event with fields at its default severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
