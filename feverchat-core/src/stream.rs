//! Pull-based delta stream over a response body.
//!
//! Contract:
//! - Each poll pulls at most one body chunk and feeds it to the decoder.
//! - Deltas are yielded in arrival order, as soon as the chunk completing
//!   them was decoded.
//! - Pulling stops once the decoder reports termination or the body ends.
//! - A body read error is yielded once; the stream ends after it.
//!
//! Dropping the stream drops the body, which aborts the transfer.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::stream::Stream;

use crate::decoder::{DecodeEvent, FrameDecoder, Protocol};
use crate::error::CoreResult;
use crate::http_client::ByteStream;

pub struct DeltaStream {
    body: Option<ByteStream>,
    decoder: Box<dyn FrameDecoder>,
    ready: VecDeque<String>,
    skipped: usize,
}

impl DeltaStream {
    pub fn new(body: ByteStream, decoder: Box<dyn FrameDecoder>) -> Self {
        Self {
            body: Some(body),
            decoder,
            ready: VecDeque::new(),
            skipped: 0,
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.decoder.protocol()
    }

    /// True once the server signalled the end of the answer.
    pub fn is_terminated(&self) -> bool {
        self.decoder.is_terminated()
    }

    /// Number of frames dropped as malformed so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Drain the stream into the complete answer text.
    pub async fn collect_text(mut self) -> CoreResult<String> {
        use futures_util::StreamExt;
        let mut text = String::new();
        while let Some(delta) = self.next().await {
            text.push_str(&delta?);
        }
        Ok(text)
    }

    fn absorb(&mut self, events: Vec<DecodeEvent>) {
        for event in events {
            match event {
                DecodeEvent::Delta(text) => self.ready.push_back(text),
                DecodeEvent::Terminated => self.body = None,
                DecodeEvent::Skipped(reason) => {
                    self.skipped += 1;
                    tracing::debug!(?reason, "frame skipped");
                }
            }
        }
    }
}

impl Stream for DeltaStream {
    type Item = CoreResult<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(delta) = this.ready.pop_front() {
                return Poll::Ready(Some(Ok(delta)));
            }

            let Some(body) = this.body.as_mut() else {
                return Poll::Ready(None);
            };

            match body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    let events = this.decoder.feed(&chunk);
                    this.absorb(events);
                }
                Poll::Ready(Some(Err(e))) => {
                    this.body = None;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.body = None;
                    let rest = this.decoder.pending();
                    if !rest.trim().is_empty() {
                        tracing::debug!(pending = rest, "body ended inside an unterminated frame");
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
