//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! This module turns the raw byte stream of a streaming `chat/completions`
//! response into a stream of [`ChatCompletionChunk`]s. Events are separated by
//! a blank line; each carries a `data:` payload that is either a JSON chunk or
//! the literal `[DONE]` terminator.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::observability::{STREAM_BYTES, STREAM_ERRORS, STREAM_EVENTS};
use crate::types::ChatCompletionChunk;
use crate::{Error, Result};

/// The payload that ends a stream.
const DONE_MARKER: &str = "[DONE]";

/// A decoded event.
#[derive(Debug, Clone, PartialEq)]
enum SseEvent {
    Chunk(ChatCompletionChunk),
    Done,
}

/// Process a stream of bytes into a stream of completion chunks.
///
/// The returned stream ends at the `[DONE]` marker or when the byte stream is
/// exhausted, whichever comes first. Comment lines (`: keep-alive`) and events
/// without data are skipped.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<ChatCompletionChunk>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    // Convert transport errors to our error type
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    // Raw bytes are buffered; text is decoded one complete event at a time so
    // a character split across network chunks survives.
    let buffer: Vec<u8> = Vec::new();

    stream::unfold(
        (stream, buffer),
        move |(mut stream, mut buffer)| async move {
            loop {
                // First drain complete events already buffered
                while let Some(event) = extract_event(&mut buffer) {
                    match event {
                        Some(Ok(SseEvent::Chunk(chunk))) => {
                            STREAM_EVENTS.click();
                            return Some((Ok(chunk), (stream, buffer)));
                        }
                        Some(Ok(SseEvent::Done)) => return None,
                        Some(Err(e)) => {
                            STREAM_ERRORS.click();
                            return Some((Err(e), (stream, buffer)));
                        }
                        None => continue,
                    }
                }

                // Read more data
                match stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        // JSON payloads escape control characters, so every raw
                        // CR is a line-ending byte.
                        buffer.extend(bytes.iter().copied().filter(|&b| b != b'\r'));
                    }
                    Some(Err(e)) => {
                        STREAM_ERRORS.click();
                        return Some((Err(e), (stream, buffer)));
                    }
                    None => {
                        // End of stream; a final event may lack its blank line
                        let tail = std::mem::take(&mut buffer);
                        return match decode_event(&tail) {
                            Some(Ok(SseEvent::Chunk(chunk))) => {
                                STREAM_EVENTS.click();
                                Some((Ok(chunk), (stream, buffer)))
                            }
                            Some(Err(e)) => {
                                STREAM_ERRORS.click();
                                Some((Err(e), (stream, buffer)))
                            }
                            Some(Ok(SseEvent::Done)) | None => None,
                        };
                    }
                }
            }
        },
    )
}

/// Remove one complete event from the front of `buffer`.
///
/// Returns `None` when no complete event is buffered yet. Otherwise returns the
/// decoded event, or `None` inside for events to skip.
fn extract_event(buffer: &mut Vec<u8>) -> Option<Option<Result<SseEvent>>> {
    let end = buffer.windows(2).position(|pair| pair == b"\n\n")?;
    let event: Vec<u8> = buffer.drain(..end + 2).take(end).collect();
    Some(decode_event(&event))
}

/// Decode the bytes of one whole event.
fn decode_event(event: &[u8]) -> Option<Result<SseEvent>> {
    match std::str::from_utf8(event) {
        Ok(text) => parse_event(text),
        Err(e) => Some(Err(Error::encoding(
            format!("Invalid UTF-8 in stream: {e}"),
            Some(Box::new(e)),
        ))),
    }
}

/// Parse the lines of one event.
fn parse_event(event_text: &str) -> Option<Result<SseEvent>> {
    let mut data = Vec::new();
    for line in event_text.lines() {
        if let Some(payload) = line.strip_prefix("data:") {
            data.push(payload.trim());
        }
        // `event:`, `id:`, `retry:` and `:` comment lines carry nothing we use
    }
    if data.is_empty() {
        return None;
    }
    let payload = data.join("\n");
    if payload == DONE_MARKER {
        return Some(Ok(SseEvent::Done));
    }
    match serde_json::from_str::<ChatCompletionChunk>(&payload) {
        Ok(chunk) => Some(Ok(SseEvent::Chunk(chunk))),
        Err(e) => Some(Err(Error::serialization(
            format!("Failed to parse event JSON: {e}"),
            Some(Box::new(e)),
        ))),
    }
}
