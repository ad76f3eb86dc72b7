//! The handler contract every policy check implements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use thiserror::Error;

use super::decision::Decision;
use super::event::Event;

/// Priority bands. Lower numbers run earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerCategory {
    /// Architecture and system-boundary checks (0-9)
    Structural,
    /// Destructive or irreversible operations (10-24)
    Safety,
    /// Project workflow conventions (25-49)
    Workflow,
    /// Tool usage policy (50-100)
    ToolUsage,
}

impl HandlerCategory {
    /// Inclusive priority range a handler in this category must use
    pub fn priority_band(&self) -> RangeInclusive<u8> {
        match self {
            HandlerCategory::Structural => 0..=9,
            HandlerCategory::Safety => 10..=24,
            HandlerCategory::Workflow => 25..=49,
            HandlerCategory::ToolUsage => 50..=100,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerCategory::Structural => "structural",
            HandlerCategory::Safety => "safety",
            HandlerCategory::Workflow => "workflow",
            HandlerCategory::ToolUsage => "tool_usage",
        }
    }
}

impl fmt::Display for HandlerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the dispatcher resolves a handler that errors, panics, or times out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Block the action with an internal-error reason
    #[default]
    FailClosed,
    /// Let the action through without guidance
    Advisory,
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureMode::FailClosed => f.write_str("fail_closed"),
            FailureMode::Advisory => f.write_str("advisory"),
        }
    }
}

/// Failure inside [`Handler::handle`]
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("command `{command}` failed: {detail}")]
    Command { command: String, detail: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

/// One independent policy check
///
/// `matches` must be cheap and side-effect free: it may only inspect the
/// event's own fields. `handle` runs only for the handler that won the
/// dispatch and may do bounded I/O.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Unique, stable identifier used in logs and responses
    fn name(&self) -> &str;

    fn priority(&self) -> u8;

    fn category(&self) -> HandlerCategory;

    fn failure_mode(&self) -> FailureMode {
        FailureMode::FailClosed
    }

    fn matches(&self, event: &Event) -> bool;

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError>;
}
