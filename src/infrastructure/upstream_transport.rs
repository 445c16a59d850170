// HTTP upstream transport - Newline-delimited JSON messages over a streaming GET
use crate::application::upstream::{TransportError, UpstreamMessage, UpstreamStream, UpstreamTransport};
use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use futures::StreamExt;

#[derive(Debug, Clone, Default)]
pub struct HttpUpstreamTransport {
    client: reqwest::Client,
}

impl HttpUpstreamTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl UpstreamTransport for HttpUpstreamTransport {
    async fn open(&self, url: &str) -> Result<UpstreamStream, TransportError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let response = self
            .client
            .get(parsed)
            .header("Accept", "application/x-ndjson")
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Connect(format!(
                "upstream answered {}",
                response.status()
            )));
        }

        let mut body = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut pending = BytesMut::new();
            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(bytes) => {
                        pending.extend_from_slice(&bytes);
                        while let Some(message) = next_line(&mut pending) {
                            yield message;
                        }
                    }
                    Err(e) => {
                        yield Err(TransportError::Stream(e.to_string()));
                        return;
                    }
                }
            }
        };

        Ok(stream.boxed())
    }
}

/// Split one complete line off `pending` and decode it. Blank lines are skipped;
/// a line that is not a message is surfaced as a `live_event` with its raw
/// payload so the schema check downstream replaces it.
fn next_line(pending: &mut BytesMut) -> Option<Result<UpstreamMessage, TransportError>> {
    loop {
        let newline = pending.iter().position(|b| *b == b'\n')?;
        let line = pending.split_to(newline);
        pending.advance(1);

        let text = String::from_utf8_lossy(&line);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        return Some(Ok(decode_message(text)));
    }
}

fn decode_message(text: &str) -> UpstreamMessage {
    match serde_json::from_str::<UpstreamMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!("Undecodable upstream line: {}", e);
            UpstreamMessage::new(
                crate::application::upstream::LIVE_EVENT,
                serde_json::Value::String(text.to_string()),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_line_splits_messages() {
        let mut pending = BytesMut::from(
            &b"{\"event\":\"live_event\",\"data\":{\"id\":\"a\"}}\n\n{\"event\":\"ping\"}\n{\"event\":"[..],
        );

        let first = next_line(&mut pending).unwrap().unwrap();
        assert_eq!(first.event, "live_event");
        assert_eq!(first.data["id"], "a");

        let second = next_line(&mut pending).unwrap().unwrap();
        assert_eq!(second.event, "ping");
        assert!(second.data.is_null());

        // partial line stays buffered
        assert!(next_line(&mut pending).is_none());
        assert_eq!(&pending[..], b"{\"event\":");
    }

    #[test]
    fn test_garbage_line_becomes_unparseable_live_event() {
        let mut pending = BytesMut::from(&b"not json\n"[..]);
        let message = next_line(&mut pending).unwrap().unwrap();
        assert_eq!(message.event, "live_event");
        assert!(crate::domain::event::LiveEvent::parse(&message.data).is_err());
    }

    #[tokio::test]
    async fn test_invalid_url_rejected_before_connecting() {
        let transport = HttpUpstreamTransport::new();
        let result = transport.open("not a url").await;
        assert!(matches!(result, Err(TransportError::InvalidUrl { .. })));
    }
}
