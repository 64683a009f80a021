//! SSE streaming handler for OpenAI-compatible APIs

use anyhow::{Context, Result};
use futures::StreamExt;

use super::types::CompletionResponse;

/// Events extracted from the server-sent event stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Text delta from the first choice
    TextDelta(String),
    /// Stream finished (`data: [DONE]`)
    Done,
    /// Error payload sent inside the stream
    Error(String),
}

/// Incremental parser; bytes go in, complete events come out.
///
/// Bytes are buffered until an event is complete, so a multibyte character
/// split across network chunks is decoded whole.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every event it completes
    pub fn push(&mut self, chunk: impl AsRef<[u8]>) -> Vec<StreamEvent> {
        // `\r` never occurs inside a UTF-8 multibyte sequence or a JSON payload
        self.buffer
            .extend(chunk.as_ref().iter().copied().filter(|&b| b != b'\r'));

        let mut events = Vec::new();
        while let Some(event_end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let raw: Vec<u8> = self.buffer.drain(..event_end + 2).collect();
            let event_str = String::from_utf8_lossy(&raw[..event_end]);
            events.extend(Self::parse_event(&event_str));
        }
        events
    }

    /// Parse one SSE event block
    fn parse_event(event_str: &str) -> Option<StreamEvent> {
        let data = event_str
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(str::trim_start)
            .collect::<Vec<_>>()
            .join("\n");

        if data.is_empty() {
            return None;
        }
        if data == "[DONE]" {
            return Some(StreamEvent::Done);
        }

        let value: serde_json::Value = match serde_json::from_str(&data) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Skipping unparseable stream event: {}", e);
                return None;
            },
        };

        if let Some(error) = value.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Some(StreamEvent::Error(message));
        }

        let chunk: CompletionResponse = serde_json::from_value(value).ok()?;
        let text = chunk.text();
        if text.is_empty() {
            None
        } else {
            Some(StreamEvent::TextDelta(text))
        }
    }
}

/// Drain a streaming response, relaying each delta to `on_chunk`.
/// Returns the concatenated text.
pub async fn collect_stream(
    response: reqwest::Response,
    on_chunk: &mut (dyn for<'c> FnMut(&'c str) + Send),
) -> Result<String> {
    let mut stream = response.bytes_stream();
    let mut parser = SseParser::new();
    let mut text = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Failed to read stream chunk")?;
        for event in parser.push(&chunk) {
            match event {
                StreamEvent::TextDelta(delta) => {
                    on_chunk(&delta);
                    text.push_str(&delta);
                },
                StreamEvent::Done => return Ok(text),
                StreamEvent::Error(message) => anyhow::bail!("Stream error: {}", message),
            }
        }
    }

    Ok(text)
}
