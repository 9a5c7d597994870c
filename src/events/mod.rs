//! Event stream produced by the core (spec.md §6): phase transitions,
//! parallel-status summaries, and coordination events, delivered through an
//! injected `EventSink` — the core owns no singleton broadcaster.

pub mod bus;
pub mod types;

pub use bus::{EventBus, EventBusError, EventBusExt, EventBusResult, EventFilter, EventSink, FilteredReceiver, NullEventSink, SharedEventBus};
pub use types::{CoordinationEventType, CoreEvent, EventId};
