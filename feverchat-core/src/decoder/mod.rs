//! Incremental decoding of streamed chat responses.
//!
//! A [`FrameDecoder`] is fed successive chunks of one HTTP response body and
//! returns the [`DecodeEvent`]s completed by each chunk. Chunks may split a
//! frame, a JSON record or a UTF-8 sequence anywhere; the decoder keeps the
//! unfinished remainder until the next call.
//!
//! Two framings exist and they disagree on what a parse failure means:
//! - [`SseDecoder`]: blank-line separated `data: ` blocks. A block is complete
//!   once its delimiter arrived, so a record that fails to parse is malformed
//!   and gets skipped.
//! - [`NdjsonDecoder`]: one JSON record per line. A line that fails to parse
//!   is assumed to be cut short and is put back until more bytes arrive.

mod ndjson;
mod sse;

pub use ndjson::NdjsonDecoder;
pub use sse::SseDecoder;

use serde::{Deserialize, Serialize};

/// Wire framing of a streamed response body.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Sse,
    Ndjson,
}

impl Protocol {
    /// Build a fresh decoder for one response stream.
    pub fn decoder(self) -> Box<dyn FrameDecoder> {
        match self {
            Protocol::Sse => Box::new(SseDecoder::new()),
            Protocol::Ndjson => Box::new(NdjsonDecoder::new()),
        }
    }
}

/// What a decoded frame produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    /// Incremental assistant text.
    Delta(String),
    /// The server signalled the end of the answer.
    Terminated,
    /// A frame was dropped without aborting the stream.
    Skipped(SkipReason),
}

impl DecodeEvent {
    pub fn as_delta(&self) -> Option<&str> {
        match self {
            Self::Delta(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The payload after the data prefix is not valid JSON.
    Malformed { payload: String, error: String },
}

pub trait FrameDecoder: Send {
    fn protocol(&self) -> Protocol;

    /// Consume the next chunk of the body and return the events it completes.
    fn feed(&mut self, chunk: &[u8]) -> Vec<DecodeEvent>;

    fn feed_str(&mut self, chunk: &str) -> Vec<DecodeEvent> {
        self.feed(chunk.as_bytes())
    }

    fn is_terminated(&self) -> bool;

    /// Text received but not yet consumed by a complete frame.
    fn pending(&self) -> &str;
}

/// Buffering shared by both framings.
#[derive(Debug)]
pub(crate) struct DecoderState {
    pub(crate) protocol: Protocol,
    pub(crate) pending: String,
    utf8_tail: Vec<u8>,
    pub(crate) terminated: bool,
}

impl DecoderState {
    pub(crate) fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            pending: String::new(),
            utf8_tail: Vec::new(),
            terminated: false,
        }
    }

    /// Decode `chunk` as UTF-8 onto the pending text. Bytes of a code point
    /// cut by the chunk boundary wait for the next call; invalid sequences
    /// become U+FFFD.
    pub(crate) fn push_bytes(&mut self, chunk: &[u8]) {
        let owned;
        let mut bytes: &[u8] = if self.utf8_tail.is_empty() {
            chunk
        } else {
            let mut joined = std::mem::take(&mut self.utf8_tail);
            joined.extend_from_slice(chunk);
            owned = joined;
            &owned
        };

        loop {
            match std::str::from_utf8(bytes) {
                Ok(s) => {
                    self.pending.push_str(s);
                    return;
                }
                Err(e) => {
                    let (valid, rest) = bytes.split_at(e.valid_up_to());
                    self.pending
                        .push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        None => {
                            self.utf8_tail.extend_from_slice(rest);
                            return;
                        }
                        Some(len) => {
                            self.pending.push(char::REPLACEMENT_CHARACTER);
                            bytes = &rest[len..];
                        }
                    }
                }
            }
        }
    }
}
