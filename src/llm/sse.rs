//! Upstream SSE decoding.
//!
//! Network chunks do not respect line boundaries, so bytes are buffered
//! until a newline arrives. Each complete `data:` line is parsed as JSON
//! and reduced to the first candidate's first text part. `[DONE]` markers
//! and lines that are not valid JSON are skipped.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::debug;

use super::types::LlmError;

/// Reassembles lines from arbitrarily split byte chunks.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
}

impl SseLineDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completed, without the
    /// terminator. A trailing partial line stays buffered.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(decode_line(&raw[..pos]));
        }
        lines
    }

    /// Flush the unterminated tail, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buffer);
        Some(decode_line(&raw))
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Payload of a `data:` line.
#[must_use]
pub fn data_payload(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("data:")?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// `candidates[0].content.parts[0].text` of one upstream event.
#[must_use]
pub fn extract_fragment(payload: &str) -> Option<String> {
    let payload = payload.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    let value: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "sse: skipping non-json data line");
            return None;
        }
    };
    value
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn fragment_of_line(line: &str) -> Option<String> {
    data_payload(line).and_then(extract_fragment)
}

struct FragmentState<S> {
    body: Pin<Box<S>>,
    decoder: SseLineDecoder,
    pending: VecDeque<String>,
    done: bool,
}

/// Turn an upstream byte stream into text fragments, in order.
///
/// A transport error is yielded once and ends the stream.
pub fn fragments<S, B, E>(body: S) -> impl Stream<Item = Result<String, LlmError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    let state = FragmentState { body: Box::pin(body), decoder: SseLineDecoder::new(), pending: VecDeque::new(), done: false };
    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.done {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let lines = state.decoder.push(chunk.as_ref());
                    state.pending.extend(lines.iter().filter_map(|l| fragment_of_line(l)));
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(LlmError::Stream(e.to_string())), state));
                }
                None => {
                    state.done = true;
                    if let Some(line) = state.decoder.finish() {
                        state.pending.extend(fragment_of_line(&line));
                    }
                }
            }
        }
    })
}
