//! Claude Code adapter - translates hook JSON into events and decisions
//! back into the hook response protocol.

pub mod events;
pub mod response;
pub mod transcript;
pub mod types;

pub use events::AdapterEnv;
pub use response::{ClaudeCodeResponseBuilder, HookOutput, EXIT_ALLOW, EXIT_DENY, EXIT_FATAL};

use crate::engine::decision::Decision;
use crate::engine::event::{Event, EventError};
use types::HookEventName;

/// The ClaudeHarness - a pure translator
pub struct ClaudeHarness;

impl ClaudeHarness {
    /// Parse the raw hook event from stdin
    ///
    /// Prompt and subagent events also get the transcript digest attached,
    /// read without blocking the runtime.
    pub async fn parse_event(
        kind: HookEventName,
        input: &str,
        env: &AdapterEnv,
    ) -> Result<Event, EventError> {
        let value: serde_json::Value =
            serde_json::from_str(input).map_err(|e| EventError::InvalidJson(e.to_string()))?;
        let event = events::event_from_value(kind, value, env)?;
        Ok(transcript::attach_digest(event).await)
    }

    /// Format the response for this harness
    pub fn format_response(
        kind: HookEventName,
        decision: &Decision,
    ) -> Result<HookOutput, serde_json::Error> {
        ClaudeCodeResponseBuilder::build_output(kind, decision)
    }
}
