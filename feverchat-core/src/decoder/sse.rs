use serde_json::Value;

use super::{DecodeEvent, DecoderState, FrameDecoder, Protocol, SkipReason};
use crate::error::ChatError;

const BLOCK_DELIMITER: &str = "\n\n";
const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Event-stream decoder for OpenAI-compatible chat completions.
///
/// Each `data: ` payload is a `chat.completion.chunk`; text lives at
/// `choices[0].delta.content` and a non-null `choices[0].finish_reason`
/// ends the answer, as does the `[DONE]` sentinel.
#[derive(Debug)]
pub struct SseDecoder {
    state: DecoderState,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::new(Protocol::Sse),
        }
    }

    /// Process one complete block. Returns true once the stream terminated.
    fn decode_block(block: &str, events: &mut Vec<DecodeEvent>) -> bool {
        for line in block.split('\n') {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.strip_prefix(DATA_PREFIX) == Some(DONE_SENTINEL) {
                events.push(DecodeEvent::Terminated);
                return true;
            }
            let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
                continue;
            };
            let payload = rest.trim();
            if payload.is_empty() {
                continue;
            }
            if payload == DONE_SENTINEL {
                events.push(DecodeEvent::Terminated);
                return true;
            }

            let record: Value = match serde_json::from_str(payload) {
                Ok(v) => v,
                Err(e) => {
                    let error = ChatError::Parse(e.to_string());
                    tracing::debug!(%error, payload, "skipping SSE frame");
                    events.push(DecodeEvent::Skipped(SkipReason::Malformed {
                        payload: payload.to_string(),
                        error: error.to_string(),
                    }));
                    continue;
                }
            };

            let choice = &record["choices"][0];
            if let Some(text) = choice["delta"]["content"].as_str()
                && !text.is_empty()
            {
                events.push(DecodeEvent::Delta(text.to_string()));
            }
            if !choice["finish_reason"].is_null() {
                events.push(DecodeEvent::Terminated);
                return true;
            }
        }
        false
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder for SseDecoder {
    fn protocol(&self) -> Protocol {
        self.state.protocol
    }

    fn feed(&mut self, chunk: &[u8]) -> Vec<DecodeEvent> {
        let mut events = Vec::new();
        if self.state.terminated {
            return events;
        }
        self.state.push_bytes(chunk);

        while let Some(idx) = self.state.pending.find(BLOCK_DELIMITER) {
            let raw: String = self
                .state
                .pending
                .drain(..idx + BLOCK_DELIMITER.len())
                .collect();
            let block = raw[..idx].trim();
            if block.is_empty() {
                continue;
            }
            if Self::decode_block(block, &mut events) {
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
