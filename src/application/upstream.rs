// Upstream transport port - Named messages from an optional live source
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Message name carrying a live event
pub const LIVE_EVENT: &str = "live_event";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamMessage {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl UpstreamMessage {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid upstream url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to connect to upstream: {0}")]
    Connect(String),

    #[error("upstream stream failed: {0}")]
    Stream(String),
}

pub type UpstreamStream = BoxStream<'static, Result<UpstreamMessage, TransportError>>;

#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    /// Open a connection. Dropping the returned stream closes it.
    async fn open(&self, url: &str) -> Result<UpstreamStream, TransportError>;
}
