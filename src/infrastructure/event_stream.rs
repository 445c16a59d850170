// Chunked live-event streaming
//
// Each chunk is a 4-byte big-endian length followed by one JSON-encoded
// LiveEvent, brotli-compressed per chunk when the client accepts it.
use async_compression::tokio::bufread::BrotliEncoder;
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use tokio::io::AsyncReadExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::domain::event::LiveEvent;

pub async fn chunked_event_stream<S>(stream: S, compress: bool) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = LiveEvent> + Send + 'static,
{
    let byte_stream = stream.then(move |event| async move { encode_chunk(&event, compress).await });

    // no Content-Encoding: chunks are compressed individually, not the body
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-live-events")
        .header(header::TRANSFER_ENCODING, "chunked")
        .body(Body::from_stream(byte_stream))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn encode_chunk(event: &LiveEvent, compress: bool) -> Result<Bytes, std::io::Error> {
    let json = serde_json::to_vec(event).map_err(std::io::Error::other)?;

    let payload = if compress {
        brotli_compress(json).await?
    } else {
        json
    };

    let mut chunk = BytesMut::with_capacity(4 + payload.len());
    chunk.put_u32(payload.len() as u32);
    chunk.put_slice(&payload);
    Ok(chunk.freeze())
}

pub async fn brotli_compress(bytes: Vec<u8>) -> Result<Vec<u8>, std::io::Error> {
    let mut encoder = BrotliEncoder::new(std::io::Cursor::new(bytes));
    let mut compressed = Vec::new();
    encoder.read_to_end(&mut compressed).await?;
    Ok(compressed)
}

/// Accepted events from `rx` as a chunked response. A slow client that falls
/// behind skips the missed events rather than ending the stream.
pub async fn stream_from_broadcast(rx: broadcast::Receiver<LiveEvent>, compress: bool) -> impl IntoResponse {
    let mut events = BroadcastStream::new(rx);
    let stream = async_stream::stream! {
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => yield event,
                Err(BroadcastStreamRecvError::Lagged(missed)) => {
                    tracing::warn!("Event stream client lagged, skipped {} events", missed);
                }
            }
        }
    };

    match chunked_event_stream(stream, compress).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}
