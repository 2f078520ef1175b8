use serde_json::Value;

use super::{DecodeEvent, DecoderState, FrameDecoder, Protocol};
use crate::error::ChatError;

/// Newline-delimited JSON decoder for the native (Ollama) chat API.
///
/// ```text
/// {"model":"llama3.2","message":{"role":"assistant","content":"Hola"},"done":false}
/// {"model":"llama3.2","message":{"role":"assistant","content":""},"done":true}
/// ```
///
/// Producers may flush in the middle of a record, so a line that does not
/// parse is put back in front of the buffer and retried on the next chunk.
/// A line that never becomes valid JSON therefore blocks every later line.
#[derive(Debug)]
pub struct NdjsonDecoder {
    state: DecoderState,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::new(Protocol::Ndjson),
        }
    }
}

impl Default for NdjsonDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder for NdjsonDecoder {
    fn protocol(&self) -> Protocol {
        self.state.protocol
    }

    fn feed(&mut self, chunk: &[u8]) -> Vec<DecodeEvent> {
        let mut events = Vec::new();
        if self.state.terminated {
            return events;
        }
        self.state.push_bytes(chunk);

        while let Some(idx) = self.state.pending.find('\n') {
            let raw: String = self.state.pending.drain(..=idx).collect();
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            let record: Value = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(e) => {
                    tracing::debug!(
                        error = %ChatError::TruncatedFrame,
                        cause = %e,
                        line,
                        "waiting for more bytes"
                    );
                    self.state.pending.insert(0, '\n');
                    self.state.pending.insert_str(0, line);
                    break;
                }
            };

            if let Some(text) = record["message"]["content"].as_str()
                && !text.is_empty()
            {
                events.push(DecodeEvent::Delta(text.to_string()));
            }
            if record["done"].as_bool() == Some(true) {
                events.push(DecodeEvent::Terminated);
                self.state.terminated = true;
                break;
            }
        }
        events
    }

    fn is_terminated(&self) -> bool {
        self.state.terminated
    }

    fn pending(&self) -> &str {
        &self.state.pending
    }
}
