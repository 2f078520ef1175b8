//! One chat window: a conversation, a backend and the request lifecycle
//! around them.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use tracing::Instrument;

use crate::config::{Backend, Config};
use crate::conversation::{Conversation, TurnHandle};
use crate::error::{ChatError, CoreResult};
use crate::model::ChatMessage;
use crate::normalizer::normalize_question;
use crate::provider::ChatProvider;
use crate::telemetry::{self, ExchangeLog, Outcome};

/// Prefix of the assistant text shown when a request fails.
pub const APOLOGY: &str = "No pude responder: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ready,
    Querying(Backend),
    Testing,
    Connected(usize),
    ConnectionFailed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ready => f.write_str("Listo"),
            Status::Querying(b) => write!(f, "Consultando {}...", b.display_name()),
            Status::Testing => f.write_str("Probando conexión..."),
            Status::Connected(n) => write!(f, "Conexión OK: {n} modelo(s) detectados"),
            Status::ConnectionFailed => f.write_str("Fallo de conexión"),
        }
    }
}

/// Result of one `send`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub turn: TurnHandle,
    /// Full assistant text after the exchange.
    pub text: String,
    pub outcome: Outcome,
    pub deltas: usize,
    /// Apology text added to the turn when the request failed.
    pub notice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthReport {
    Connected { models: usize },
    Failed { error: String },
}

/// Clears the loading flag and status even when the `send` future is dropped.
struct LoadingGuard<'a> {
    loading: &'a mut bool,
    status: &'a mut Status,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        *self.loading = false;
        *self.status = Status::Ready;
    }
}

struct Exchange {
    deltas: usize,
    skipped: usize,
    error: Option<ChatError>,
}

pub struct ChatSession {
    config: Config,
    provider: Arc<dyn ChatProvider>,
    conversation: Conversation,
    streaming: bool,
    loading: bool,
    status: Status,
    last_error: Option<String>,
}

impl ChatSession {
    pub fn new(config: Config, provider: Arc<dyn ChatProvider>) -> Self {
        let streaming = config.stream;
        Self {
            config,
            provider,
            conversation: Conversation::new(),
            streaming,
            loading: false,
            status: Status::Ready,
            last_error: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Error text when there is one, otherwise the status.
    pub fn status_line(&self) -> String {
        match &self.last_error {
            Some(e) => e.clone(),
            None => self.status.to_string(),
        }
    }

    pub fn can_send(&self, input: &str) -> bool {
        !self.loading && normalize_question(input).is_some()
    }

    pub fn toggle_stream(&mut self) -> bool {
        self.streaming = !self.streaming;
        self.streaming
    }

    pub fn clear(&mut self) {
        self.conversation.reset();
        self.last_error = None;
        self.status = Status::Ready;
    }

    /// Ask a question and fill the new assistant turn with the answer.
    ///
    /// Server failures become assistant text prefixed with [`APOLOGY`] and are
    /// reported through `Reply::outcome`; only local errors are returned.
    pub async fn send(
        &mut self,
        input: &str,
        mut on_delta: impl FnMut(&str),
    ) -> CoreResult<Reply> {
        if self.loading {
            return Err(ChatError::Busy);
        }
        let question = normalize_question(input)
            .ok_or_else(|| ChatError::Validation("la pregunta está vacía".into()))?;

        let messages = self
            .conversation
            .request_messages(&self.config.system_prompt, &question);
        let (_, assistant) = self.conversation.append_exchange(question);

        self.loading = true;
        self.status = Status::Querying(self.config.backend);
        self.last_error = None;
        let _guard = LoadingGuard {
            loading: &mut self.loading,
            status: &mut self.status,
        };

        let span = tracing::info_span!(
            "exchange",
            llm.backend = self.provider.name(),
            llm.model = %self.config.model,
            turn.id = %assistant.id(),
            stream = self.streaming,
            latency.ms = tracing::field::Empty,
            deltas = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let started = Instant::now();
        let exchange = if self.streaming {
            stream_answer(
                self.provider.as_ref(),
                &mut self.conversation,
                assistant,
                &messages,
                &mut on_delta,
            )
            .instrument(span.clone())
            .await?
        } else {
            complete_answer(
                self.provider.as_ref(),
                &mut self.conversation,
                assistant,
                &messages,
                &mut on_delta,
            )
            .instrument(span.clone())
            .await?
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        let (outcome, notice) = match &exchange.error {
            None => (Outcome::Complete, None),
            Some(err) => {
                let message = err.to_string();
                tracing::warn!(
                    parent: &span,
                    error = %message,
                    transport = err.is_transport(),
                    deltas = exchange.deltas,
                    "exchange failed"
                );
                self.last_error = Some(message.clone());
                let apology = format!("{APOLOGY}{message}");
                if exchange.deltas == 0 {
                    self.conversation.set_text(assistant, apology.clone())?;
                    (Outcome::Failed, Some(apology))
                } else {
                    // The web client overwrote the partial answer here; it is kept instead.
                    let tail = format!("\n\n{apology}");
                    self.conversation.append_delta(assistant, &tail)?;
                    (Outcome::Partial, Some(tail))
                }
            }
        };

        span.record("latency.ms", latency_ms);
        span.record("deltas", exchange.deltas as u64);
        span.record("outcome", outcome.as_str());

        telemetry::emit_exchange(
            ExchangeLog::new()
                .backend(self.provider.name())
                .model(&self.config.model)
                .turn_id(assistant.id())
                .stream(self.streaming)
                .latency_ms(latency_ms)
                .deltas(exchange.deltas)
                .skipped_frames(exchange.skipped)
                .outcome(outcome)
                .error_message_opt(self.last_error.as_deref()),
        );

        let text = self
            .conversation
            .get(assistant)
            .map(|t| t.text.clone())
            .unwrap_or_default();
        Ok(Reply {
            turn: assistant,
            text,
            outcome,
            deltas: exchange.deltas,
            notice,
        })
    }

    /// Ask the server for its model list. Never fails; the result is also
    /// reflected in the status line.
    pub async fn test_connection(&mut self) -> HealthReport {
        self.status = Status::Testing;
        self.last_error = None;
        match self.provider.health().await {
            Ok(models) => {
                tracing::info!(backend = self.provider.name(), models, "connection ok");
                self.status = Status::Connected(models);
                HealthReport::Connected { models }
            }
            Err(err) => {
                let error = err.to_string();
                tracing::warn!(backend = self.provider.name(), %error, "connection failed");
                self.status = Status::ConnectionFailed;
                self.last_error = Some(error.clone());
                HealthReport::Failed { error }
            }
        }
    }
}

/// Server-side failures end the exchange; anything else is a local fault.
fn server_failure(err: ChatError) -> CoreResult<Option<ChatError>> {
    if err.is_user_facing() {
        Ok(Some(err))
    } else {
        Err(err)
    }
}

async fn stream_answer(
    provider: &dyn ChatProvider,
    conversation: &mut Conversation,
    turn: TurnHandle,
    messages: &[ChatMessage],
    on_delta: &mut impl FnMut(&str),
) -> CoreResult<Exchange> {
    let mut stream = match provider.chat_stream(messages).await {
        Ok(s) => s,
        Err(err) => {
            return Ok(Exchange {
                deltas: 0,
                skipped: 0,
                error: server_failure(err)?,
            });
        }
    };

    let mut deltas = 0;
    let mut error = None;
    while let Some(item) = stream.next().await {
        match item {
            Ok(delta) => {
                conversation.append_delta(turn, &delta)?;
                on_delta(&delta);
                deltas += 1;
            }
            Err(err) => {
                error = server_failure(err)?;
                break;
            }
        }
    }
    tracing::debug!(deltas, terminated = stream.is_terminated(), "stream finished");
    Ok(Exchange {
        deltas,
        skipped: stream.skipped(),
        error,
    })
}

async fn complete_answer(
    provider: &dyn ChatProvider,
    conversation: &mut Conversation,
    turn: TurnHandle,
    messages: &[ChatMessage],
    on_delta: &mut impl FnMut(&str),
) -> CoreResult<Exchange> {
    match provider.chat(messages).await {
        Ok(text) => {
            conversation.set_text(turn, text.clone())?;
            on_delta(&text);
            Ok(Exchange {
                deltas: 1,
                skipped: 0,
                error: None,
            })
        }
        Err(err) => Ok(Exchange {
            deltas: 0,
            skipped: 0,
            error: server_failure(err)?,
        }),
    }
}
