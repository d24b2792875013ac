//! Provider stream decoding.
//!
//! Turns the raw bytes of an OpenAI-compatible `text/event-stream` response into
//! [`StreamChunk`]s: text deltas become text chunks, `data: [DONE]` becomes the
//! final marker, and everything else (role-only deltas, finish reasons, usage
//! records) is skipped.

use crate::api::models::StreamChunk;
use crate::core::error::UpstreamError;
use serde_json::Value;

// ============================================================================
// SSE Parser
// ============================================================================

/// SSE event parsed from stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: Option<String>,
}

/// Largest event the parser will hold while waiting for its blank line.
pub const MAX_EVENT_BYTES: usize = 1024 * 1024;

/// Incremental SSE parser.
///
/// Bytes are buffered until a blank line closes an event, so network chunks
/// that split a line, or a multi-byte UTF-8 sequence, are handled.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    // Prefix of `buffer` already searched for a separator.
    scanned: usize,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and return every event completed by them.
    pub fn parse(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        // A separator may straddle the previous read, so back up by its length.
        let mut from = self.scanned.saturating_sub(3);
        while let Some((end, sep_len)) = find_event_boundary(&self.buffer, from) {
            let block: Vec<u8> = self.buffer.drain(..end + sep_len).take(end).collect();
            if let Some(event) = parse_event_block(&String::from_utf8_lossy(&block)) {
                events.push(event);
            }
            from = 0;
        }
        self.scanned = self.buffer.len();
        events
    }

    /// Flush whatever is left once the byte stream has ended.
    ///
    /// Providers occasionally omit the trailing blank line on the last event.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        parse_event_block(&String::from_utf8_lossy(&rest))
    }

    /// Bytes buffered but not yet part of a complete event.
    pub fn remaining(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the pending event has grown past [`MAX_EVENT_BYTES`].
    pub fn is_overflowing(&self) -> bool {
        self.buffer.len() > MAX_EVENT_BYTES
    }
}

/// Position and length of the first blank-line separator (`\n\n` or `\r\n\r\n`)
/// at or after `from`.
fn find_event_boundary(buffer: &[u8], from: usize) -> Option<(usize, usize)> {
    let tail = buffer.get(from..)?;
    let lf = tail.windows(2).position(|w| w == b"\n\n").map(|p| (from + p, 2));
    let crlf = tail
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|p| (from + p, 4));

    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn parse_event_block(block: &str) -> Option<SseEvent> {
    let mut event = SseEvent::default();

    for line in block.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => event.event = Some(value.to_string()),
            "data" => match event.data {
                Some(ref mut data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => event.data = Some(value.to_string()),
            },
            _ => {}
        }
    }

    if event.data.is_some() || event.event.is_some() {
        Some(event)
    } else {
        None
    }
}

// ============================================================================
// OpenAI chunk decoding
// ============================================================================

/// Terminator sent by OpenAI-compatible providers.
pub const DONE_MARKER: &str = "[DONE]";

/// Decode the `data` payload of one provider event.
///
/// Returns `Ok(None)` for events that carry no text.
pub fn decode_openai_event(data: &str) -> Result<Option<StreamChunk>, UpstreamError> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }
    if data == DONE_MARKER {
        return Ok(Some(StreamChunk::finished()));
    }

    let value: Value = serde_json::from_str(data)
        .map_err(|e| UpstreamError::Framing(format!("invalid JSON in stream event: {}", e)))?;

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(UpstreamError::Framing(format!(
            "provider reported error mid-stream: {}",
            message
        )));
    }

    let content = value
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty());

    Ok(content.map(StreamChunk::text))
}
