//! Server-Sent Events framing.
//!
//! Turns the raw body of an `text/event-stream` response into one string
//! per dispatched event, following EventSource rules:
//! - lines end in `\n` or `\r\n`
//! - `data:` lines accumulate, joined by `\n`
//! - a blank line dispatches the accumulated data
//! - `:` comments and `id`/`retry` fields are skipped
//! - events with an explicit name other than `message` are not delivered
//! - an incomplete event at end of stream is discarded

use std::collections::VecDeque;
use std::fmt::Display;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tracing::debug;

use scout_core::errors::ChannelError;

/// Incremental SSE decoder. Feed it chunks as they arrive.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    data: String,
    event: String,
    has_data: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one chunk and return every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut dispatched = Vec::new();

        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line_bytes = self.buffer.split_to(newline_pos + 1);
            line_bytes.truncate(line_bytes.len() - 1);
            if line_bytes.last() == Some(&b'\r') {
                line_bytes.truncate(line_bytes.len() - 1);
            }
            let line = String::from_utf8_lossy(&line_bytes);
            if let Some(payload) = self.process_line(&line) {
                dispatched.push(payload);
            }
        }

        dispatched
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "event" => self.event = value.to_string(),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        let event = std::mem::take(&mut self.event);
        let data = std::mem::take(&mut self.data);
        let has_data = std::mem::replace(&mut self.has_data, false);

        if !has_data {
            return None;
        }
        if !event.is_empty() && event != "message" {
            debug!(event = %event, "skipping named SSE event");
            return None;
        }
        Some(data)
    }
}

struct PayloadState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

/// Adapt a body byte stream into a stream of raw payloads.
///
/// A transport error yields [`ChannelError::Interrupted`]; end of body
/// yields [`ChannelError::Closed`]. Either one is the final item.
pub fn payload_stream<S, E>(bytes: S) -> impl Stream<Item = Result<String, ChannelError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: Display + Send + 'static,
{
    let state = PayloadState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(payload) = state.pending.pop_front() {
                return Some((Ok(payload), state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let payloads = state.decoder.push(&chunk);
                    state.pending.extend(payloads);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(ChannelError::Interrupted(e.to_string())), state));
                }
                None => {
                    state.finished = true;
                    return Some((Err(ChannelError::Closed), state));
                }
            }
        }
    })
}
