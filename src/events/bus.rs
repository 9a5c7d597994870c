//! Broadcast-channel event bus; no process-wide singleton (spec.md §9
//! "Global state" redesign note — the core owns no singletons, callers
//! inject the sink they want).

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use super::types::CoreEvent;

const CHANNEL_CAPACITY: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("channel closed")]
    ChannelClosed,
}

pub type EventBusResult<T> = Result<T, EventBusError>;

/// Injected event-sink interface. A no-op default (`NullEventSink`) means
/// callers who don't care about the event stream pay nothing for it.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: CoreEvent);
}

pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn publish(&self, _event: CoreEvent) {}
}

pub type SharedEventBus = Arc<EventBus>;

/// Broadcast-backed `EventSink` implementation, for callers who do want a
/// live subscribable event stream.
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: CoreEvent) {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(count) => debug!(event_type, receivers = count, "event published"),
            Err(_) => debug!(event_type, "event published (no receivers)"),
        }
    }
}

/// Selective subscription filter.
#[derive(Debug, Default, Clone)]
pub struct EventFilter {
    pub cycle_id: Option<String>,
    pub event_types: Option<Vec<&'static str>>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cycle(mut self, cycle_id: impl Into<String>) -> Self {
        self.cycle_id = Some(cycle_id.into());
        self
    }

    pub fn types(mut self, types: Vec<&'static str>) -> Self {
        self.event_types = Some(types);
        self
    }

    pub fn matches(&self, event: &CoreEvent) -> bool {
        if let Some(ref cid) = self.cycle_id {
            if event.cycle_id().map(|c| c.as_str()) != Some(cid.as_str()) {
                return false;
            }
        }
        if let Some(ref types) = self.event_types {
            if !types.contains(&event.event_type()) {
                return false;
            }
        }
        true
    }
}

pub struct FilteredReceiver {
    receiver: broadcast::Receiver<CoreEvent>,
    filter: EventFilter,
}

impl FilteredReceiver {
    pub fn new(receiver: broadcast::Receiver<CoreEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    pub async fn recv(&mut self) -> Result<CoreEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }
}

pub trait EventBusExt {
    fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver;
}

impl EventBusExt for EventBus {
    fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        FilteredReceiver::new(self.subscribe(), filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CycleId, Phase};
    use chrono::Utc;

    fn sample_event(cycle_id: CycleId) -> CoreEvent {
        CoreEvent::PhaseTransition {
            story_id: "s1".into(),
            cycle_id,
            old_phase: Phase::Design,
            new_phase: Phase::TestRed,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn publish_subscribe_roundtrip() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let cid = CycleId::new();
        bus.publish(sample_event(cid.clone()));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type(), "phase_transition");
        assert_eq!(received.cycle_id(), Some(&cid));
    }

    #[tokio::test]
    async fn filtered_receiver_only_yields_matching_cycle() {
        let bus = EventBus::new();
        let target = CycleId::new();
        let other = CycleId::new();
        let mut filtered = bus.subscribe_filtered(EventFilter::new().cycle(target.to_string()));

        bus.publish(sample_event(other));
        bus.publish(sample_event(target.clone()));

        let event = filtered.recv().await.unwrap();
        assert_eq!(event.cycle_id(), Some(&target));
    }

    #[tokio::test]
    async fn null_sink_is_a_no_op() {
        let sink = NullEventSink;
        sink.publish(sample_event(CycleId::new()));
    }
}
