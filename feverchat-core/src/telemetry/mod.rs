//! Exchange telemetry.
//! Nothing is emitted unless a sink is installed via `set_telemetry_sink`.

pub mod types;
#[cfg(test)]
pub mod test_span;

pub use types::*;

use std::sync::Arc;

use once_cell::sync::OnceCell;

/// Implement this to receive one record per completed exchange.
///
/// Implementations must be thread-safe and should not panic; `record_exchange`
/// runs inline at the end of `ChatSession::send`.
pub trait TelemetrySink: Send + Sync + 'static {
    fn record_exchange(&self, log: ExchangeLog);
}

static TELEMETRY_SINK: OnceCell<Arc<dyn TelemetrySink>> = OnceCell::new();

// Tests share the process-wide sink; only threads that opt in emit.
#[cfg(test)]
thread_local! {
    static TEST_CAPTURE: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

/// Install the process-wide sink. Returns `false` if one is already installed.
pub fn set_telemetry_sink(sink: Arc<dyn TelemetrySink>) -> bool {
    TELEMETRY_SINK.set(sink).is_ok()
}

#[inline]
pub(crate) fn emit_exchange(log: ExchangeLog) {
    #[cfg(test)]
    {
        if !TEST_CAPTURE.with(|c| c.get()) {
            return;
        }
    }
    if let Some(sink) = TELEMETRY_SINK.get() {
        sink.record_exchange(log);
    }
}

/// Test-only: enable or disable emission for the current thread.
#[cfg(test)]
pub fn test_set_capture_enabled(enabled: bool) {
    TEST_CAPTURE.with(|c| c.set(enabled));
}

/// Sink that keeps every record, for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemorySink {
    pub logs: std::sync::Mutex<Vec<ExchangeLog>>,
}

#[cfg(test)]
impl TelemetrySink for MemorySink {
    fn record_exchange(&self, log: ExchangeLog) {
        self.logs.lock().unwrap().push(log);
    }
}

/// Install a shared `MemorySink` once per process and return it.
#[cfg(test)]
pub fn test_memory_sink() -> Arc<MemorySink> {
    static SINK: once_cell::sync::Lazy<Arc<MemorySink>> = once_cell::sync::Lazy::new(|| {
        let sink = Arc::new(MemorySink::default());
        set_telemetry_sink(sink.clone());
        sink
    });
    SINK.clone()
}
