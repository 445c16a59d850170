// Feed connection state machine - Live upstream with local generator fallback
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::Poll;
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::application::upstream::{
    TransportError, UpstreamMessage, UpstreamStream, UpstreamTransport, LIVE_EVENT,
};
use crate::domain::event::{synthesize_event, LiveEvent};
use crate::domain::physics::SampleGenerator;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(3000);
pub const DEFAULT_GENERATOR_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FeedConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error { message: String },
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// `None` means no live source; the local generator feeds the buffer
    pub upstream_url: Option<String>,
    pub connect_timeout: Duration,
    pub generator_interval: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            upstream_url: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            generator_interval: DEFAULT_GENERATOR_INTERVAL,
        }
    }
}

type EventCallback = Box<dyn FnMut(LiveEvent) + Send>;
type StatusCallback = Box<dyn FnMut(FeedConnectionStatus) + Send>;

struct Callbacks {
    on_event: EventCallback,
    on_status: StatusCallback,
}

/// Callbacks behind a lock. Once closed, nothing reaches the consumer.
#[derive(Clone)]
struct FeedSink {
    inner: Arc<Mutex<Option<Callbacks>>>,
}

impl FeedSink {
    fn new(on_event: EventCallback, on_status: StatusCallback) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(Callbacks { on_event, on_status }))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Callbacks>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn event(&self, event: LiveEvent) {
        if let Some(callbacks) = self.lock().as_mut() {
            (callbacks.on_event)(event);
        }
    }

    fn status(&self, status: FeedConnectionStatus) {
        if let Some(callbacks) = self.lock().as_mut() {
            (callbacks.on_status)(status);
        }
    }

    fn close(&self) -> Option<Callbacks> {
        self.lock().take()
    }
}

/// Upstream stream shared with the handle so `disconnect` can drop it in place
#[derive(Clone, Default)]
struct UpstreamSlot {
    inner: Arc<Mutex<SlotState>>,
}

#[derive(Default)]
struct SlotState {
    closed: bool,
    stream: Option<UpstreamStream>,
}

impl UpstreamSlot {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Park an opened stream; returns false if the subscription is already closed
    fn install(&self, stream: UpstreamStream) -> bool {
        let mut slot = self.lock();
        if slot.closed {
            return false;
        }
        slot.stream = Some(stream);
        true
    }

    async fn next(&self) -> Option<Result<UpstreamMessage, TransportError>> {
        futures::future::poll_fn(|cx| match self.lock().stream.as_mut() {
            Some(stream) => stream.poll_next_unpin(cx),
            None => Poll::Ready(None),
        })
        .await
    }

    fn close(&self) {
        let stream = {
            let mut slot = self.lock();
            slot.closed = true;
            slot.stream.take()
        };
        drop(stream);
    }
}

/// Opens feed subscriptions
#[derive(Clone)]
pub struct FeedConnector {
    settings: FeedSettings,
    transport: Arc<dyn UpstreamTransport>,
}

impl FeedConnector {
    pub fn new(settings: FeedSettings, transport: Arc<dyn UpstreamTransport>) -> Self {
        Self {
            settings,
            transport,
        }
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    /// Start a subscription. Must be called inside a tokio runtime.
    ///
    /// Callbacks run while the subscription lock is held; they must not call
    /// [`FeedHandle::disconnect`] on their own handle.
    pub fn connect<E, S>(&self, on_event: E, on_status: S) -> FeedHandle
    where
        E: FnMut(LiveEvent) + Send + 'static,
        S: FnMut(FeedConnectionStatus) + Send + 'static,
    {
        let sink = FeedSink::new(Box::new(on_event), Box::new(on_status));
        let upstream = UpstreamSlot::default();
        let interval = self.settings.generator_interval;

        let url = self
            .settings
            .upstream_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);

        let task = match url {
            None => {
                tracing::info!("No upstream configured, feeding from local generator");
                sink.status(FeedConnectionStatus::Connected);
                tokio::spawn(run_generator(sink.clone(), interval))
            }
            Some(url) => {
                sink.status(FeedConnectionStatus::Connecting);
                let transport = self.transport.clone();
                let timeout = self.settings.connect_timeout;
                tokio::spawn(run_upstream(
                    sink.clone(),
                    upstream.clone(),
                    transport,
                    url,
                    timeout,
                    interval,
                ))
            }
        };

        FeedHandle {
            sink,
            upstream,
            task: Mutex::new(Some(task)),
        }
    }
}

/// Cancellation token for one subscription
pub struct FeedHandle {
    sink: FeedSink,
    upstream: UpstreamSlot,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FeedHandle {
    /// Stop the generator, drop the upstream stream and report
    /// `Disconnected`. No callback fires after this returns. Safe to repeat.
    pub fn disconnect(&self) {
        let callbacks = self.sink.close();
        self.upstream.close();

        let task = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
        }

        if let Some(mut callbacks) = callbacks {
            (callbacks.on_status)(FeedConnectionStatus::Disconnected);
            tracing::info!("Live feed disconnected");
        }
    }

    pub fn is_active(&self) -> bool {
        self.sink.lock().is_some()
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn run_upstream(
    sink: FeedSink,
    upstream: UpstreamSlot,
    transport: Arc<dyn UpstreamTransport>,
    url: String,
    timeout: Duration,
    interval: Duration,
) {
    match tokio::time::timeout(timeout, transport.open(&url)).await {
        Ok(Ok(stream)) => {
            if !upstream.install(stream) {
                return;
            }
            tracing::info!("Connected to upstream feed {}", url);
            sink.status(FeedConnectionStatus::Connected);
            tokio::join!(
                run_generator(sink.clone(), interval),
                pump_upstream(sink.clone(), upstream)
            );
        }
        Ok(Err(TransportError::InvalidUrl { url, reason })) => {
            tracing::error!("Upstream url {} rejected: {}", url, reason);
            sink.status(FeedConnectionStatus::Error {
                message: format!("invalid upstream url: {reason}"),
            });
            run_generator(sink, interval).await;
        }
        Ok(Err(e)) => {
            // Degrade silently: the generator keeps the dashboard alive
            tracing::warn!("Upstream connect failed, using local generator: {}", e);
            sink.status(FeedConnectionStatus::Connected);
            run_generator(sink, interval).await;
        }
        Err(_) => {
            tracing::warn!(
                "Upstream connect timed out after {}ms, using local generator",
                timeout.as_millis()
            );
            sink.status(FeedConnectionStatus::Connected);
            run_generator(sink, interval).await;
        }
    }
}

async fn pump_upstream(sink: FeedSink, upstream: UpstreamSlot) {
    while let Some(message) = upstream.next().await {
        match message {
            Ok(message) if message.event == LIVE_EVENT => match LiveEvent::parse(&message.data) {
                Ok(event) => sink.event(event),
                Err(e) => {
                    tracing::warn!("Invalid live_event from upstream, substituting: {}", e);
                    sink.event(synthesize_event(now_ms(), None));
                }
            },
            Ok(message) => {
                tracing::debug!("Ignoring upstream message {}", message.event);
            }
            Err(e) => {
                tracing::warn!("Upstream stream error: {}", e);
                break;
            }
        }
    }
    tracing::info!("Upstream feed closed");
    sink.status(FeedConnectionStatus::Disconnected);
}

async fn run_generator(sink: FeedSink, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut samples = SampleGenerator::new();
    let mut last_ts = i64::MIN;

    loop {
        ticker.tick().await;

        let ts = now_ms().max(last_ts.saturating_add(1));
        last_ts = ts;

        let sample = samples.next_sample(ts);
        let event = synthesize_event(ts, Some(&sample));
        match LiveEvent::parse(&event.to_value()) {
            Ok(checked) => sink.event(checked),
            Err(e) => {
                tracing::error!("Generated event failed schema check, forwarding raw: {}", e);
                sink.event(event);
            }
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
