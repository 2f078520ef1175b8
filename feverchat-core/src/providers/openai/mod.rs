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

/// OpenAI-compatible chat completions server (LM Studio by default).
#[derive(Debug, Clone)]
pub struct OpenAiCompat {
    http: HttpClient,
    base: String,
    model: String,
    sampling: SamplingCfg,
    name: String, // usually "openai"
}

impl OpenAiCompat {
    pub fn new(http: HttpClient, base: String, model: String, sampling: SamplingCfg) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            model,
            sampling: normalize_sampling(sampling),
            name: "openai".into(),
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

    #[cfg(test)]
    pub fn new_for_tests(server_base: &str) -> Self {
        OpenAiCompat::new(
            HttpClient::new_default().unwrap(),
            server_base.to_string(),
            "google/gemma-3-1b".into(),
            SamplingCfg::default(),
        )
    }

    fn payload<'a>(&'a self, messages: &'a [ChatMessage], stream: bool) -> OAChatReq<'a> {
        OAChatReq {
            model: &self.model,
            stream,
            messages,
            temperature: self.sampling.temperature,
            top_p: self.sampling.top_p,
            frequency_penalty: self.sampling.frequency_penalty,
            presence_penalty: self.sampling.presence_penalty,
        }
    }
}

// ---- Wire structs (minimal) ----
#[derive(Serialize)]
struct OAChatReq<'a> {
    model: &'a str,
    stream: bool,
    messages: &'a [ChatMessage],
    temperature: f32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[async_trait]
impl ChatProvider for OpenAiCompat {
    fn name(&self) -> &str {
        &self.name
    }

    fn protocol(&self) -> Protocol {
        Protocol::Sse
    }

    async fn chat(&self, messages: &[ChatMessage]) -> CoreResult<String> {
        let url = format!("{}/v1/chat/completions", self.base);
        tracing::debug!(%url, messages = messages.len(), "chat completion");
        let body = self.http.post_json(&url, &self.payload(messages, false)).await?;
        Ok(answer_or_placeholder(
            body["choices"][0]["message"]["content"].as_str(),
        ))
    }

    async fn chat_stream(&self, messages: &[ChatMessage]) -> CoreResult<DeltaStream> {
        let url = format!("{}/v1/chat/completions", self.base);
        tracing::debug!(%url, messages = messages.len(), "streamed chat completion");
        let body = self
            .http
            .post_stream(&url, &self.payload(messages, true), "text/event-stream")
            .await?;
        Ok(DeltaStream::new(body, Protocol::Sse.decoder()))
    }

    async fn health(&self) -> CoreResult<usize> {
        let url = format!("{}/v1/models", self.base);
        let body = self.http.get_json(&url).await?;
        Ok(model_count(&body, "data"))
    }
}
