use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::config::HttpCfg;
use crate::error::{ChatError, CoreResult};

/// Raw response body, chunk by chunk as the network delivers it.
pub type ByteStream =
    std::pin::Pin<Box<dyn futures_util::stream::Stream<Item = CoreResult<Bytes>> + Send>>;

/// Longest slice of an error body kept for diagnostics.
const MAX_ERROR_BODY: usize = 300;

/// Thin wrapper around reqwest::Client with defaults and helpers.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    user_agent: String,
}

impl HttpClient {
    pub fn new(cfg: &HttpCfg) -> CoreResult<Self> {
        let mut builder =
            Client::builder().connect_timeout(Duration::from_millis(cfg.connect_timeout_ms));
        if let Some(ms) = cfg.request_timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        if let Some(n) = cfg.pool_max_idle_per_host {
            builder = builder.pool_max_idle_per_host(n);
        }
        let inner = builder
            .build()
            .map_err(|e| ChatError::Other(anyhow::anyhow!("http client build failed: {e}")))?;
        Ok(Self {
            inner,
            user_agent: concat!("feverchat/", env!("CARGO_PKG_VERSION")).to_string(),
        })
    }

    pub fn new_default() -> CoreResult<Self> {
        Self::new(&HttpCfg::default())
    }

    /// POST JSON and parse the complete response body as one JSON document.
    pub async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> CoreResult<Value> {
        let resp = self
            .inner
            .post(url)
            .json(body)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(network_error)?;
        let resp = check_status(resp).await?;
        read_json(resp).await
    }

    /// POST JSON and hand back the body as a byte stream without buffering it.
    pub async fn post_stream<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        accept: &str,
    ) -> CoreResult<ByteStream> {
        let resp = self
            .inner
            .post(url)
            .json(body)
            .header("User-Agent", &self.user_agent)
            .header("Accept", accept)
            .send()
            .await
            .map_err(network_error)?;
        let resp = check_status(resp).await?;

        let bytes = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ChatError::Network(format!("stream read error: {e}"))));
        Ok(Box::pin(bytes))
    }

    pub async fn get_json(&self, url: &str) -> CoreResult<Value> {
        let resp = self
            .inner
            .get(url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(network_error)?;
        let resp = check_status(resp).await?;
        read_json(resp).await
    }
}

fn network_error(e: reqwest::Error) -> ChatError {
    ChatError::Network(e.to_string())
}

async fn check_status(resp: reqwest::Response) -> CoreResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(map_http_error(status, &body))
}

async fn read_json(resp: reqwest::Response) -> CoreResult<Value> {
    let text = resp.text().await.map_err(network_error)?;
    serde_json::from_str(&text).map_err(|e| ChatError::Response(format!("json decode error: {e}")))
}

fn map_http_error(status: StatusCode, body: &str) -> ChatError {
    ChatError::Http {
        status: status.as_u16(),
        body: truncate(body.trim(), MAX_ERROR_BODY),
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => {
            let mut t = s[..cut].to_string();
            t.push_str("...");
            t
        }
        None => s.to_string(),
    }
}
