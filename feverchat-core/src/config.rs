use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::decoder::Protocol;
use crate::prompt::DEFAULT_SYSTEM_PROMPT;

/// Request shape of the local inference server.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// OpenAI-compatible `/v1/chat/completions` (LM Studio and friends).
    #[default]
    #[serde(alias = "lmstudio")]
    OpenAi,
    /// Native Ollama `/api/chat`.
    Ollama,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::OpenAi => "openai",
            Backend::Ollama => "ollama",
        }
    }

    /// Human-facing server name for status messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Backend::OpenAi => "LM Studio",
            Backend::Ollama => "Ollama",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Backend::OpenAi => "http://localhost:1234",
            Backend::Ollama => "http://localhost:11434",
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            Backend::OpenAi => Protocol::Sse,
            Backend::Ollama => Protocol::Ndjson,
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = crate::error::ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "lmstudio" => Ok(Backend::OpenAi),
            "ollama" => Ok(Backend::Ollama),
            other => Err(crate::error::ChatError::Validation(format!(
                "unknown backend '{other}' (expected 'openai' or 'ollama')"
            ))),
        }
    }
}

/// Sampling parameters. Variant A sends the first four, variant B sends
/// temperature, top_p and repeat_penalty under `options`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct SamplingCfg {
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub repeat_penalty: f32,
}

impl Default for SamplingCfg {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.8,
            frequency_penalty: 0.5,
            presence_penalty: 0.3,
            repeat_penalty: 1.2,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HttpCfg {
    /// TCP connect timeout in milliseconds (default 5000ms)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Total request timeout in milliseconds. None = no limit, so long
    /// streamed answers are never cut off.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    /// Optional per-host idle connection pool cap (None = reqwest default)
    #[serde(default)]
    pub pool_max_idle_per_host: Option<usize>,
}

impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: None,
            pool_max_idle_per_host: None,
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_model() -> String {
    "google/gemma-3-1b".to_string()
}
fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}
fn default_stream() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub backend: Backend,
    /// Server root; the backend's local default when absent.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Whether new sessions start in streaming mode.
    #[serde(default = "default_stream")]
    pub stream: bool,
    #[serde(default)]
    pub sampling: SamplingCfg,
    #[serde(default)]
    pub http: HttpCfg,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            base_url: None,
            model: default_model(),
            system_prompt: default_system_prompt(),
            stream: default_stream(),
            sampling: SamplingCfg::default(),
            http: HttpCfg::default(),
        }
    }
}

impl Config {
    /// Effective server root without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.backend.default_base_url())
            .trim_end_matches('/')
    }

    /// Load a Config from a file path (JSON or TOML by extension). If the
    /// extension is missing or unrecognized, try JSON first, then TOML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> crate::error::CoreResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(crate::error::ChatError::from)?;
        let s =
            std::str::from_utf8(&bytes).map_err(|e| crate::error::ChatError::Other(e.into()))?;
        let cfg: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str::<Self>(s)
                .map_err(|e| crate::error::ChatError::Other(e.into()))?,
            Some("toml") => toml::from_str::<Self>(s)
                .map_err(|e| crate::error::ChatError::Other(e.into()))?,
            _ => serde_json::from_str::<Self>(s)
                .map_err(|e| crate::error::ChatError::Other(e.into()))
                .or_else(|_| {
                    toml::from_str::<Self>(s)
                        .map_err(|e| crate::error::ChatError::Other(e.into()))
                })?,
        };
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_local_lm_studio() {
        let cfg = Config::default();
        assert_eq!(cfg.backend, Backend::OpenAi);
        assert_eq!(cfg.base_url(), "http://localhost:1234");
        assert_eq!(cfg.model, "google/gemma-3-1b");
        assert!(cfg.stream);
        assert!(cfg.system_prompt.contains("fiebre"));
        assert_eq!(cfg.sampling.temperature, 0.1);
        assert_eq!(cfg.http.connect_timeout_ms, 5_000);
        assert_eq!(cfg.http.request_timeout_ms, None);
    }

    #[test]
    fn load_from_json() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("chat.json");
        let json = r#"{
          "backend": "ollama",
          "model": "llama3.2",
          "stream": false,
          "sampling": {"temperature": 0.2}
        }"#;
        fs::write(&file, json).unwrap();
        let cfg = Config::from_path(&file).unwrap();
        assert_eq!(cfg.backend, Backend::Ollama);
        assert_eq!(cfg.base_url(), "http://localhost:11434");
        assert_eq!(cfg.model, "llama3.2");
        assert!(!cfg.stream);
        assert_eq!(cfg.sampling.temperature, 0.2);
        assert_eq!(cfg.sampling.repeat_penalty, 1.2);
        assert_eq!(cfg.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn load_from_toml() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("chat.toml");
        let toml = r#"
backend = "lmstudio"
base_url = "http://gpu-box:1234/"
system_prompt = "Solo fiebre."

[http]
connect_timeout_ms = 1500
request_timeout_ms = 90000
"#;
        fs::write(&file, toml).unwrap();
        let cfg = Config::from_path(&file).unwrap();
        assert_eq!(cfg.backend, Backend::OpenAi);
        assert_eq!(cfg.base_url(), "http://gpu-box:1234");
        assert_eq!(cfg.system_prompt, "Solo fiebre.");
        assert_eq!(cfg.http.connect_timeout_ms, 1_500);
        assert_eq!(cfg.http.request_timeout_ms, Some(90_000));
        assert_eq!(cfg.http.pool_max_idle_per_host, None);
    }

    #[test]
    fn missing_file_returns_io_error() {
        let missing = std::path::PathBuf::from("/definitely/not/here/feverchat-missing.json");
        let err = Config::from_path(&missing).unwrap_err();
        match err {
            crate::error::ChatError::Io(_) => {}
            other => panic!("expected Io error, got: {:?}", other),
        }
    }

    #[test]
    fn bad_utf8_returns_other_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("bad.bin");
        fs::write(&file, [0xff, 0xfe, 0xfd, 0x00, 0x80]).unwrap();
        let err = Config::from_path(&file).unwrap_err();
        assert!(matches!(err, crate::error::ChatError::Other(_)));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("bad.json");
        fs::write(&file, r#"{"backend":"kobold"}"#).unwrap();
        let err = Config::from_path(&file).unwrap_err();
        assert!(matches!(err, crate::error::ChatError::Other(_)));
        assert!("kobold".parse::<Backend>().is_err());
        assert_eq!("LMStudio".parse::<Backend>().unwrap(), Backend::OpenAi);
    }

    #[test]
    fn unknown_extension_falls_back_to_json_then_toml() {
        let dir = tempdir().unwrap();
        let json_path = dir.path().join("chat.conf");
        fs::write(&json_path, r#"{"model":"phi-3-mini-4k-instruct"}"#).unwrap();
        let cfg = Config::from_path(&json_path).unwrap();
        assert_eq!(cfg.model, "phi-3-mini-4k-instruct");

        let toml_path = dir.path().join("chat2.conf");
        fs::write(&toml_path, "backend = \"ollama\"\nstream = false\n").unwrap();
        let cfg = Config::from_path(&toml_path).unwrap();
        assert_eq!(cfg.backend, Backend::Ollama);
        assert!(!cfg.stream);
    }
}
