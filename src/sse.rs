//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! Converts the raw byte stream of an HTTP response into parsed
//! [`StreamEvent`]s.  Events are separated by a blank line; each carries an
//! `event:` line and a `data:` line whose JSON is tagged by `type`.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::error::{Error, Result};
use crate::observability::{STREAM_BYTES, STREAM_ERRORS, STREAM_EVENTS};
use crate::types::StreamEvent;

/// Process a stream of bytes into a stream of server-sent events.
///
/// Byte chunks may split an event (or a multi-byte character) anywhere; the
/// buffer holds the unparsed tail until the rest arrives.  A mid-stream
/// `error` event is surfaced as an `Err` item.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<StreamEvent>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    stream::unfold(
        (stream, Vec::<u8>::new()),
        move |(mut stream, mut buffer)| async move {
            loop {
                if let Some((event, remaining)) = extract_event(&buffer) {
                    buffer = remaining;
                    let event = event.and_then(promote_error);
                    match &event {
                        Ok(_) => STREAM_EVENTS.click(),
                        Err(_) => STREAM_ERRORS.click(),
                    }
                    return Some((event, (stream, buffer)));
                }

                match stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        buffer.extend_from_slice(&bytes);
                    }
                    Some(Err(e)) => {
                        STREAM_ERRORS.click();
                        return Some((Err(e), (stream, buffer)));
                    }
                    None => {
                        // A final event without the trailing blank line.
                        if !buffer.iter().all(u8::is_ascii_whitespace) {
                            buffer.extend_from_slice(b"\n\n");
                            if let Some((event, _)) = extract_event(&buffer) {
                                return Some((event.and_then(promote_error), (stream, Vec::new())));
                            }
                        }
                        return None;
                    }
                }
            }
        },
    )
}

fn promote_error(event: StreamEvent) -> Result<StreamEvent> {
    match event {
        StreamEvent::Error { error } => Err(Error::api(
            500,
            Some(error.error_type),
            error.message,
            None,
        )),
        event => Ok(event),
    }
}

/// Extract a complete SSE event from the front of the buffer.
///
/// Returns `None` until a full event (terminated by a blank line) is buffered.
fn extract_event(buffer: &[u8]) -> Option<(Result<StreamEvent>, Vec<u8>)> {
    let (end, separator) = find_separator(buffer)?;
    let rest = buffer[end + separator..].to_vec();
    let event_text = match std::str::from_utf8(&buffer[..end]) {
        Ok(text) => text,
        Err(e) => return Some((Err(e.into()), rest)),
    };

    let mut event_type = None;
    let mut data = String::new();
    for line in event_text.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            event_type = Some(value.trim());
        } else if let Some(value) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(value.trim());
        }
    }

    if data.is_empty() {
        // Comments and keep-alive blocks carry no payload.
        if event_type.is_none() || event_type == Some("ping") {
            return Some((Ok(StreamEvent::Ping), rest));
        }
        return Some((
            Err(Error::serialization(
                format!("Malformed SSE event: missing 'data:' in '{event_text}'"),
                None,
            )),
            rest,
        ));
    }

    match serde_json::from_str::<StreamEvent>(&data) {
        Ok(event) => Some((Ok(event), rest)),
        Err(e) => Some((
            Err(Error::serialization(
                format!(
                    "Failed to parse {} event: {e}",
                    event_type.unwrap_or("unnamed")
                ),
                Some(Box::new(e)),
            )),
            rest,
        )),
    }
}

fn find_separator(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}
