use std::sync::Arc;

use crate::config::{Backend, Config};
use crate::error::CoreResult;
use crate::http_client::HttpClient;
use crate::provider::ChatProvider;
use crate::providers::ollama::Ollama;
use crate::providers::openai::OpenAiCompat;

/// Build the provider for the configured backend.
pub fn build_provider(cfg: &Config) -> CoreResult<Arc<dyn ChatProvider>> {
    let http = HttpClient::new(&cfg.http)?;
    let provider: Arc<dyn ChatProvider> = match cfg.backend {
        Backend::OpenAi => Arc::new(OpenAiCompat::from_config(http, cfg)),
        Backend::Ollama => Arc::new(Ollama::from_config(http, cfg)),
    };
    tracing::debug!(
        backend = provider.name(),
        base_url = cfg.base_url(),
        model = %cfg.model,
        "provider ready"
    );
    Ok(provider)
}
