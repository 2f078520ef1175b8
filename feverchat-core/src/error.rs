use thiserror::Error;

/// Core error type for feverchat.
/// Internally, modules can use `anyhow::Result<T>` for convenience,
/// but public boundaries should expose `CoreResult<T>` with this error.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("validation failed: {0}")]
    Validation(String),

    /// Non-2xx status from the inference server.
    #[error("Error HTTP {status}{}", fmt_body(.body))]
    Http { status: u16, body: String },

    /// The request could not be sent or the body could not be read.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed record on the event-stream path. Skipped, never surfaced.
    #[error("malformed frame: {0}")]
    Parse(String),

    /// Incomplete record on the newline-delimited path. Retried, never surfaced.
    #[error("truncated frame")]
    TruncatedFrame,

    /// A complete (non-streaming) body that could not be interpreted.
    #[error("invalid response: {0}")]
    Response(String),

    /// Programmer error: conversation mutated through a stale or wrong-role turn.
    #[error("conversation invariant violated: {0}")]
    Invariant(String),

    #[error("a request is already in flight")]
    Busy,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChatError {
    /// True for failures of the HTTP exchange itself (status or network).
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::Network(_))
    }

    /// Errors that get shown to the user as the assistant's answer.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Http { .. } | Self::Network(_) | Self::Response(_) | Self::Other(_)
        )
    }
}

fn fmt_body(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}

pub type CoreResult<T> = std::result::Result<T, ChatError>;
