use async_trait::async_trait;
use serde::Serialize;

use crate::config::{Config, SamplingCfg};
use crate::decoder::Protocol;
use crate::error::CoreResult;
use crate::http_client::HttpClient;
use crate::model::ChatMessage;
use crate::normalizer::normalize_sampling;
use crate::provider::{ChatProvider, answer_or_placeholder, model_count};
use crate::stream::DeltaStream;

/// Native Ollama chat API. Streams newline-delimited JSON.
#[derive(Debug, Clone)]
pub struct Ollama {
    http: HttpClient,
    base: String,
    model: String,
    sampling: SamplingCfg,
    name: String,
}

impl Ollama {
    pub fn new(http: HttpClient, base: String, model: String, sampling: SamplingCfg) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            model,
            sampling: normalize_sampling(sampling),
            name: "ollama".into(),
        }
    }

    pub fn from_config(http: HttpClient, cfg: &Config) -> Self {
        Self::new(
            http,
            cfg.base_url().to_string(),
            cfg.model.clone(),
            cfg.sampling,
        )
    }

    fn payload<'a>(&'a self, messages: &'a [ChatMessage], stream: bool) -> OllamaChatReq<'a> {
        OllamaChatReq {
            model: &self.model,
            stream,
            messages,
            options: OllamaOptions {
                temperature: self.sampling.temperature,
                top_p: self.sampling.top_p,
                repeat_penalty: self.sampling.repeat_penalty,
            },
        }
    }
}

#[derive(Serialize)]
struct OllamaChatReq<'a> {
    model: &'a str,
    stream: bool,
    messages: &'a [ChatMessage],
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    top_p: f32,
    repeat_penalty: f32,
}

#[async_trait]
impl ChatProvider for Ollama {
    fn name(&self) -> &str {
        &self.name
    }

    fn protocol(&self) -> Protocol {
        Protocol::Ndjson
    }

    async fn chat(&self, messages: &[ChatMessage]) -> CoreResult<String> {
        let url = format!("{}/api/chat", self.base);
        tracing::debug!(%url, messages = messages.len(), "chat");
        let body = self.http.post_json(&url, &self.payload(messages, false)).await?;
        Ok(answer_or_placeholder(body["message"]["content"].as_str()))
    }

    async fn chat_stream(&self, messages: &[ChatMessage]) -> CoreResult<DeltaStream> {
        let url = format!("{}/api/chat", self.base);
        tracing::debug!(%url, messages = messages.len(), "streamed chat");
        let body = self
            .http
            .post_stream(&url, &self.payload(messages, true), "application/x-ndjson")
            .await?;
        Ok(DeltaStream::new(body, Protocol::Ndjson.decoder()))
    }

    async fn health(&self) -> CoreResult<usize> {
        let url = format!("{}/api/tags", self.base);
        let body = self.http.get_json(&url).await?;
        Ok(model_count(&body, "models"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;
    use crate::model::Role;
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;
    use serde_json::json;

    fn provider(base: &str) -> Ollama {
        Ollama::new(
            HttpClient::new_default().unwrap(),
            format!("{base}/"),
            "llama3.2".into(),
            SamplingCfg::default(),
        )
    }

    fn history() -> Vec<ChatMessage> {
        vec![
            ChatMessage::new(Role::System, "Solo fiebre."),
            ChatMessage::new(Role::User, "¿Cuándo consultar?"),
        ]
    }

    #[tokio::test]
    async fn chat_sends_options_and_reads_message() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(POST).path("/api/chat").json_body(json!({
                "model": "llama3.2",
                "stream": false,
                "messages": [
                    {"role": "system", "content": "Solo fiebre."},
                    {"role": "user", "content": "¿Cuándo consultar?"}
                ],
                "options": {"temperature": 0.1, "top_p": 0.8, "repeat_penalty": 1.2}
            }));
            then.status(200).json_body(json!({
                "model": "llama3.2",
                "message": {"role": "assistant", "content": "Si supera 39°C, consulta."},
                "done": true
            }));
        });
        let text = provider(&server.base_url()).chat(&history()).await.unwrap();
        assert_eq!(text, "Si supera 39°C, consulta.");
        m.assert();
    }

    #[tokio::test]
    async fn chat_stream_decodes_ndjson() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(POST).path("/api/chat").body_contains("\"stream\":true");
            then.status(200).header("content-type", "application/x-ndjson").body(
                "{\"message\":{\"role\":\"assistant\",\"content\":\"Fie\"},\"done\":false}\n\
{\"message\":{\"role\":\"assistant\",\"content\":\"bre\"},\"done\":false}\n\
{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
            );
        });
        let stream = provider(&server.base_url())
            .chat_stream(&history())
            .await
            .unwrap();
        assert_eq!(stream.collect_text().await.unwrap(), "Fiebre");
    }

    #[tokio::test]
    async fn chat_missing_message_falls_back_to_placeholder() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(POST).path("/api/chat");
            then.status(200).json_body(json!({"done": true}));
        });
        let text = provider(&server.base_url()).chat(&history()).await.unwrap();
        assert_eq!(text, crate::provider::NO_CONTENT);
    }

    #[tokio::test]
    async fn health_counts_models() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(GET).path("/api/tags");
            then.status(200)
                .json_body(json!({"models": [{"name": "llama3.2", "model": "llama3.2"}]}));
        });
        assert_eq!(provider(&server.base_url()).health().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn health_non_ok_is_http_error() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(GET).path("/api/tags");
            then.status(503);
        });
        let err = provider(&server.base_url()).health().await.unwrap_err();
        assert!(matches!(err, ChatError::Http { status: 503, .. }));
    }
}
