// Live feed session - Feed connection -> integrity gate -> bounded buffer
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::application::event_buffer::EventBuffer;
use crate::application::feed_connection::{FeedConnectionStatus, FeedConnector, FeedHandle};
use crate::domain::event::{EventKind, LiveEvent};
use crate::domain::integrity::{IntegrityGate, ValidationOutcome};

const BROADCAST_CAPACITY: usize = 256;
/// Sample stream key for events that do not name their source
const DEFAULT_SOURCE: &str = "upstream";

/// What to do with an event whose sensor sample fails the integrity check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityPolicy {
    #[default]
    Drop,
    Flag,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveFeedSnapshot {
    #[serde(flatten)]
    pub status: FeedConnectionStatus,
    pub events: Vec<LiveEvent>,
    pub capacity: usize,
    pub rejected: u64,
}

struct FeedState {
    status: FeedConnectionStatus,
    buffer: EventBuffer,
    /// One gate per sample source; interleaved sources must not share history
    gates: HashMap<String, IntegrityGate>,
    rejected: u64,
    policy: IntegrityPolicy,
}

impl FeedState {
    fn new(capacity: usize, policy: IntegrityPolicy) -> Self {
        Self {
            status: FeedConnectionStatus::Disconnected,
            buffer: EventBuffer::new(capacity),
            gates: HashMap::new(),
            rejected: 0,
            policy,
        }
    }

    fn ingest(&mut self, event: LiveEvent) -> Option<LiveEvent> {
        let outcome = match event.sensor_sample() {
            None => ValidationOutcome::Valid,
            Some(Ok(sample)) => {
                let source = event
                    .payload
                    .get("source")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_SOURCE);
                self.gates.entry(source.to_string()).or_default().check(&sample)
            }
            Some(Err(e)) => ValidationOutcome::Invalid {
                reason: format!("malformed sensor sample: {e}"),
            },
        };

        let event = match (outcome, self.policy) {
            (ValidationOutcome::Valid, _) => event,
            (ValidationOutcome::Invalid { reason }, IntegrityPolicy::Drop) => {
                self.rejected += 1;
                tracing::warn!("Dropping event {}: {}", event.id, reason);
                return None;
            }
            (ValidationOutcome::Invalid { reason }, IntegrityPolicy::Flag) => {
                self.rejected += 1;
                tracing::warn!("Flagging event {}: {}", event.id, reason);
                flag_event(event, reason)
            }
        };

        self.buffer.append(event.clone());
        Some(event)
    }
}

fn flag_event(event: LiveEvent, reason: String) -> LiveEvent {
    let mut payload = event.payload;
    payload.insert("integrityViolation".to_string(), Value::from(reason));
    LiveEvent::new(event.id, EventKind::Alert, event.timestamp, payload)
}

/// Owns the single active subscription feeding one buffer
pub struct LiveFeedSession {
    connector: FeedConnector,
    state: Arc<Mutex<FeedState>>,
    handle: Mutex<Option<FeedHandle>>,
    broadcaster: broadcast::Sender<LiveEvent>,
}

impl LiveFeedSession {
    pub fn new(connector: FeedConnector, capacity: usize, policy: IntegrityPolicy) -> Self {
        let (broadcaster, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            connector,
            state: Arc::new(Mutex::new(FeedState::new(capacity, policy))),
            handle: Mutex::new(None),
            broadcaster,
        }
    }

    fn state(&self) -> MutexGuard<'_, FeedState> {
        lock(&self.state)
    }

    /// (Re)subscribe. Any previous subscription is cancelled first.
    pub fn start(&self) {
        let mut slot = self.handle.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(previous) = slot.take() {
            previous.disconnect();
        }
        // a new subscription starts new sample streams
        self.state().gates.clear();

        let state = self.state.clone();
        let broadcaster = self.broadcaster.clone();
        let on_event = move |event: LiveEvent| {
            let accepted = lock(&state).ingest(event);
            if let Some(event) = accepted {
                // no subscribers is fine
                let _ = broadcaster.send(event);
            }
        };

        let state = self.state.clone();
        let on_status = move |status: FeedConnectionStatus| {
            tracing::debug!("Feed status -> {:?}", status);
            lock(&state).status = status;
        };

        *slot = Some(self.connector.connect(on_event, on_status));
    }

    pub fn stop(&self) {
        let handle = self.handle.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(handle) = handle {
            handle.disconnect();
        }
    }

    pub fn set_capacity(&self, capacity: usize) {
        self.state().buffer.set_capacity(capacity);
    }

    /// Empty the buffer; connection status is untouched
    pub fn clear(&self) {
        self.state().buffer.clear();
    }

    pub fn status(&self) -> FeedConnectionStatus {
        self.state().status.clone()
    }

    pub fn snapshot(&self) -> LiveFeedSnapshot {
        let state = self.state();
        LiveFeedSnapshot {
            status: state.status.clone(),
            events: state.buffer.events().to_vec(),
            capacity: state.buffer.capacity(),
            rejected: state.rejected,
        }
    }

    /// Accepted events as they enter the buffer
    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.broadcaster.subscribe()
    }
}

impl Drop for LiveFeedSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(state: &Mutex<FeedState>) -> MutexGuard<'_, FeedState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
