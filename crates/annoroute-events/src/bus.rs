//! EventBus - audit log plus pub/sub fan-out.
//!
//! - `RwLock<VecDeque>` holds a bounded audit log, oldest first
//! - `mpsc` channels deliver clones to in-process subscribers
//! - [`EventSink`]s forward events to external consumers

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, RwLock};

use annoroute_models::{Event, EventId};
use tracing::{trace, warn};

use crate::error::{EventError, Result};
use crate::filter::EventFilter;
use crate::sink::EventSink;

/// Default number of events retained in the audit log.
pub const DEFAULT_LOG_CAPACITY: usize = 10_000;

/// Thread-safe event bus.
///
/// # Example
///
/// ```
/// use annoroute_events::EventBus;
/// use annoroute_models::{Event, EventType};
/// use std::sync::Arc;
/// use std::thread;
///
/// let bus = Arc::new(EventBus::new());
/// let rx = bus.subscribe();
///
/// let b = bus.clone();
/// thread::spawn(move || {
///     b.emit(Event::new(EventType::TaskSubmitted, "Hello"));
/// })
/// .join()
/// .unwrap();
///
/// assert_eq!(rx.recv().unwrap().title, "Hello");
/// ```
pub struct EventBus {
    log: RwLock<VecDeque<Event>>,
    capacity: usize,
    subscribers: RwLock<Vec<Sender<Event>>>,
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Creates a bus with the default audit log capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    /// Creates a bus retaining at most `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            log: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
            subscribers: RwLock::new(Vec::new()),
            sinks: RwLock::new(Vec::new()),
        }
    }

    /// Subscribes to event notifications.
    ///
    /// The receiver gets clones of every event emitted after this call and
    /// is dropped from the subscriber list once it disconnects.
    pub fn subscribe(&self) -> Receiver<Event> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut subs) = self.subscribers.write() {
            subs.push(tx);
        }
        rx
    }

    /// Registers an external sink.
    pub fn add_sink(&self, sink: Arc<dyn EventSink>) {
        if let Ok(mut sinks) = self.sinks.write() {
            sinks.push(sink);
        }
    }

    /// Records an event and notifies subscribers and sinks.
    ///
    /// Never fails; delivery problems are logged and skipped.
    pub fn emit(&self, event: Event) -> EventId {
        let event_id = event.id.clone();
        trace!(event_id = %event_id, event_type = %event.event_type, "Emitting event");

        match self.log.write() {
            Ok(mut log) => {
                if log.len() >= self.capacity {
                    log.pop_front();
                }
                log.push_back(event.clone());
            }
            Err(_) => warn!(event_id = %event_id, "Audit log lock poisoned, event not recorded"),
        }

        if let Ok(sinks) = self.sinks.read() {
            for sink in sinks.iter() {
                sink.deliver(&event);
            }
        }

        self.broadcast(event);
        event_id
    }

    fn broadcast(&self, event: Event) {
        if let Ok(mut subs) = self.subscribers.write() {
            subs.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    /// Lists logged events, newest first.
    pub fn list(&self, filter: Option<EventFilter>) -> Result<Vec<Event>> {
        let log = self
            .log
            .read()
            .map_err(|e| EventError::LockPoisoned(e.to_string()))?;

        Ok(log
            .iter()
            .rev()
            .filter(|e| filter.as_ref().map(|f| f.matches(e)).unwrap_or(true))
            .cloned()
            .collect())
    }

    /// Returns the number of logged events.
    pub fn len(&self) -> usize {
        self.log.read().map(|l| l.len()).unwrap_or(0)
    }

    /// Returns true if nothing has been logged.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annoroute_models::{AnnotatorId, EventType, TaskId};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn make_event(title: &str) -> Event {
        Event::new(EventType::TaskSubmitted, title)
    }

    struct CountingSink(AtomicUsize);

    impl EventSink for CountingSink {
        fn deliver(&self, _event: &Event) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_emit_records_in_log() {
        let bus = EventBus::new();
        let event = make_event("Test");
        let expected = event.id.clone();

        let id = bus.emit(event);

        assert_eq!(id, expected);
        assert_eq!(bus.len(), 1);
        assert_eq!(bus.list(None).unwrap()[0].title, "Test");
    }

    #[test]
    fn test_multiple_subscribers() {
        let bus = EventBus::new();
        let rx1 = bus.subscribe();
        let rx2 = bus.subscribe();

        bus.emit(make_event("Broadcast"));

        assert_eq!(rx1.recv_timeout(Duration::from_secs(1)).unwrap().title, "Broadcast");
        assert_eq!(rx2.recv_timeout(Duration::from_secs(1)).unwrap().title, "Broadcast");
    }

    #[test]
    fn test_disconnected_subscriber_removed() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        drop(rx);

        bus.emit(make_event("Test"));

        assert_eq!(bus.subscribers.read().unwrap().len(), 0);
    }

    #[test]
    fn test_sinks_receive_events() {
        let bus = EventBus::new();
        let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
        bus.add_sink(sink.clone());

        bus.emit(make_event("a"));
        bus.emit(make_event("b"));

        assert_eq!(sink.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_list_newest_first_with_filter() {
        let bus = EventBus::new();
        bus.emit(make_event("First"));
        bus.emit(Event::task_assigned(
            &TaskId::from("t1"),
            &AnnotatorId::from("a1"),
            0.7,
            0.3,
        ));
        bus.emit(make_event("Third"));

        let all = bus.list(None).unwrap();
        assert_eq!(all[0].title, "Third");
        assert_eq!(all[2].title, "First");

        let filter = EventFilter::new().with_event_type(EventType::TaskAssigned);
        let assigned = bus.list(Some(filter)).unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].task_id, Some(TaskId::from("t1")));
    }

    #[test]
    fn test_log_capacity_drops_oldest() {
        let bus = EventBus::with_capacity(2);
        bus.emit(make_event("1"));
        bus.emit(make_event("2"));
        bus.emit(make_event("3"));

        let titles: Vec<String> = bus.list(None).unwrap().into_iter().map(|e| e.title).collect();
        assert_eq!(titles, vec!["3", "2"]);
    }

    #[test]
    fn test_thread_safe_emit() {
        let bus = Arc::new(EventBus::new());
        let handles: Vec<_> = (0..10)
            .map(|i| {
                let b = bus.clone();
                thread::spawn(move || {
                    b.emit(make_event(&format!("Event {}", i)));
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(bus.len(), 10);
    }
}
