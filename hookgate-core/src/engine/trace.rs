//! Correlation data for one dispatch
//!
//! A daemon serves many sessions at once, so every dispatch carries its own
//! trace ID (UUID v7, sortable by start time) alongside the agent's session
//! ID. Log lines from the dispatcher all record both.

use std::time::Instant;
use uuid::Uuid;

use super::event::Event;

/// Generate a unique, time-ordered trace ID
///
/// # Example
/// ```
/// use hookgate_core::engine::trace::generate_trace_id;
///
/// let trace_id = generate_trace_id();
/// tracing::info!(trace_id = %trace_id, "Dispatch started");
/// ```
pub fn generate_trace_id() -> String {
    Uuid::now_v7().to_string()
}

#[derive(Debug, Clone)]
pub struct DispatchTrace {
    pub trace_id: String,
    pub session_id: String,
    started: Instant,
}

impl DispatchTrace {
    pub fn start(event: &Event) -> Self {
        Self {
            trace_id: generate_trace_id(),
            session_id: event
                .session()
                .session_id
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
