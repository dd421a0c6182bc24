//! Audit log and pub/sub notifications for domain events.
//!
//! The core emits `TaskAssigned`, `TaskCompleted`, `TaskExpired`, and
//! `AnnotatorAvailabilityChanged` (among others) through an [`EventBus`].
//! Emission is fire-and-forget: subscribers and sinks never block or fail
//! the operation that produced the event.
//!
//! # Example
//!
//! ```
//! use annoroute_events::{EventBus, EventFilter};
//! use annoroute_models::{Event, EventType};
//!
//! let bus = EventBus::new();
//! let receiver = bus.subscribe();
//!
//! bus.emit(Event::new(EventType::TaskSubmitted, "Task submitted"));
//! assert_eq!(receiver.recv().unwrap().event_type, EventType::TaskSubmitted);
//!
//! let filter = EventFilter::new().with_event_type(EventType::TaskSubmitted);
//! assert_eq!(bus.list(Some(filter)).unwrap().len(), 1);
//! ```

pub mod bus;
pub mod error;
pub mod filter;
pub mod sink;

pub use bus::{EventBus, DEFAULT_LOG_CAPACITY};
pub use error::{EventError, Result};
pub use filter::EventFilter;
pub use sink::{EventSink, LogSink};
