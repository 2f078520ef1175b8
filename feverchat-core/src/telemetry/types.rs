use serde::{Deserialize, Serialize};

/// How an exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The server delivered an answer (streamed or complete).
    Complete,
    /// The server failed before any text arrived.
    Failed,
    /// Some text arrived, then the stream broke.
    Partial,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Complete => "complete",
            Outcome::Failed => "failed",
            Outcome::Partial => "partial",
        }
    }
}

/// Structured record of one question/answer exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExchangeLog {
    pub backend: Option<String>,
    pub model: Option<String>,
    pub turn_id: Option<String>,
    pub stream: bool,
    pub latency_ms: Option<u64>,
    pub deltas: usize,
    pub skipped_frames: usize,
    pub outcome: Option<Outcome>,
    pub error_message: Option<String>,
}

impl ExchangeLog {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn backend(mut self, v: &str) -> Self {
        self.backend = Some(v.to_string());
        self
    }
    pub fn model(mut self, v: &str) -> Self {
        self.model = Some(v.to_string());
        self
    }
    pub fn turn_id(mut self, v: impl ToString) -> Self {
        self.turn_id = Some(v.to_string());
        self
    }
    pub fn stream(mut self, v: bool) -> Self {
        self.stream = v;
        self
    }
    pub fn latency_ms(mut self, v: u64) -> Self {
        self.latency_ms = Some(v);
        self
    }
    pub fn deltas(mut self, v: usize) -> Self {
        self.deltas = v;
        self
    }
    pub fn skipped_frames(mut self, v: usize) -> Self {
        self.skipped_frames = v;
        self
    }
    pub fn outcome(mut self, v: Outcome) -> Self {
        self.outcome = Some(v);
        self
    }
    pub fn error_message_opt(mut self, v: Option<&str>) -> Self {
        self.error_message = v.map(|s| s.to_string());
        self
    }
}
