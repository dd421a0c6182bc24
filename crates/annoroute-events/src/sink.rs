//! Pluggable consumers for emitted events.

use annoroute_models::Event;
use tracing::info;

/// An external consumer of domain events.
///
/// Delivery is best effort; implementations must not block for long.
pub trait EventSink: Send + Sync {
    /// Receives one event.
    fn deliver(&self, event: &Event);
}

/// Writes every event to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn deliver(&self, event: &Event) {
        info!(
            event_type = %event.event_type,
            task_id = ?event.task_id.as_ref().map(|id| id.as_str()),
            annotator_id = ?event.annotator_id.as_ref().map(|id| id.as_str()),
            "{}",
            event.title
        );
    }
}
