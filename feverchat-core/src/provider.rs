use async_trait::async_trait;

use crate::decoder::Protocol;
use crate::error::CoreResult;
use crate::model::ChatMessage;
use crate::stream::DeltaStream;

/// Answer used when a complete response carries no text.
pub const NO_CONTENT: &str = "Sin contenido";

/// A local inference server speaking one of the supported request shapes.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Framing used by `chat_stream` responses.
    fn protocol(&self) -> Protocol;

    /// Request a complete answer in one response.
    async fn chat(&self, messages: &[ChatMessage]) -> CoreResult<String>;

    /// Request a streamed answer; deltas are pulled lazily from the body.
    async fn chat_stream(&self, messages: &[ChatMessage]) -> CoreResult<DeltaStream>;

    /// Number of models the server reports.
    async fn health(&self) -> CoreResult<usize>;
}

/// Final answer text, or the placeholder when it is missing or empty.
pub(crate) fn answer_or_placeholder(text: Option<&str>) -> String {
    match text {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => NO_CONTENT.to_string(),
    }
}

/// Length of a model list field, 0 when it is absent or not an array.
pub(crate) fn model_count(body: &serde_json::Value, field: &str) -> usize {
    body[field].as_array().map(Vec::len).unwrap_or(0)
}

/// Canned provider that replays body chunks through the real decoders.
#[cfg(test)]
pub(crate) struct ScriptedProvider {
    pub protocol: Protocol,
    pub chunks: Vec<CoreResult<&'static str>>,
    /// Keep the body open after the scripted chunks instead of ending it.
    pub hang: bool,
    pub answer: CoreResult<String>,
    pub models: usize,
}

#[cfg(test)]
impl ScriptedProvider {
    pub fn streaming(protocol: Protocol, chunks: Vec<CoreResult<&'static str>>) -> Self {
        Self {
            protocol,
            chunks,
            hang: false,
            answer: Ok(NO_CONTENT.to_string()),
            models: 0,
        }
    }
}

#[cfg(test)]
use crate::error::ChatError;

#[cfg(test)]
fn clone_result<T: Clone>(r: &CoreResult<T>) -> CoreResult<T> {
    match r {
        Ok(v) => Ok(v.clone()),
        Err(e) => Err(match e {
            ChatError::Network(m) => ChatError::Network(m.clone()),
            ChatError::Http { status, body } => ChatError::Http {
                status: *status,
                body: body.clone(),
            },
            other => ChatError::Response(other.to_string()),
        }),
    }
}

#[cfg(test)]
#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn protocol(&self) -> Protocol {
        self.protocol
    }

    async fn chat(&self, _messages: &[ChatMessage]) -> CoreResult<String> {
        clone_result(&self.answer)
    }

    async fn chat_stream(&self, _messages: &[ChatMessage]) -> CoreResult<DeltaStream> {
        use futures_util::StreamExt;
        let chunks: Vec<_> = self
            .chunks
            .iter()
            .map(|c| clone_result(c).map(|s| bytes::Bytes::from_static(s.as_bytes())))
            .collect();
        let scripted = futures_util::stream::iter(chunks);
        let body: crate::http_client::ByteStream = if self.hang {
            Box::pin(scripted.chain(futures_util::stream::pending()))
        } else {
            Box::pin(scripted)
        };
        Ok(DeltaStream::new(body, self.protocol.decoder()))
    }

    async fn health(&self) -> CoreResult<usize> {
        Ok(self.models)
    }
}
