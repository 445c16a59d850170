// Bounded event buffer - FIFO eviction, arrival order preserved
use crate::domain::event::LiveEvent;
use crate::domain::preferences::{MAX_FEED_ITEMS, MIN_FEED_ITEMS};

/// Append `event` to `events`, evicting from the front so the result holds at
/// most `capacity` events. An event whose id is already present is ignored.
pub fn append(events: &[LiveEvent], event: LiveEvent, capacity: usize) -> Vec<LiveEvent> {
    if events.iter().any(|e| e.id == event.id) {
        tracing::debug!("Ignoring duplicate event id {}", event.id);
        return events.to_vec();
    }

    let keep = capacity.saturating_sub(1).min(events.len());
    let mut next = Vec::with_capacity(keep + 1);
    next.extend_from_slice(&events[events.len() - keep..]);
    if capacity > 0 {
        next.push(event);
    }
    next
}

#[derive(Debug, Clone)]
pub struct EventBuffer {
    events: Vec<LiveEvent>,
    capacity: usize,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Vec::new(),
            capacity: clamp_capacity(capacity),
        }
    }

    pub fn append(&mut self, event: LiveEvent) {
        self.events = append(&self.events, event, self.capacity);
    }

    /// New capacity takes effect on the next append
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = clamp_capacity(capacity);
    }

    pub fn clear(&mut self) {
        self.events = Vec::new();
    }

    pub fn events(&self) -> &[LiveEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn clamp_capacity(capacity: usize) -> usize {
    capacity.clamp(MIN_FEED_ITEMS, MAX_FEED_ITEMS)
}
