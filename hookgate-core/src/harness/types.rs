//! Hook event kind definitions
//!
//! Claude Code fires a fixed set of hook events. Each kind gets its own
//! front controller, so the kind is the first routing key for every event.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hook events emitted by Claude Code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HookEventName {
    /// Before a tool executes
    PreToolUse,
    /// After a tool executed successfully
    PostToolUse,
    /// Permission dialog for a tool call
    PermissionRequest,
    /// User submitted a prompt
    UserPromptSubmit,
    /// Claude Code notification
    Notification,
    /// Main agent stopping
    Stop,
    /// Subagent (Task tool) stopping
    SubagentStop,
    /// Before context compaction
    PreCompact,
    /// Session started or resumed
    SessionStart,
    /// Session ended
    SessionEnd,
}

impl HookEventName {
    /// Every event kind, in the order hooks are installed
    pub const ALL: [HookEventName; 10] = [
        HookEventName::PreToolUse,
        HookEventName::PostToolUse,
        HookEventName::PermissionRequest,
        HookEventName::UserPromptSubmit,
        HookEventName::Notification,
        HookEventName::Stop,
        HookEventName::SubagentStop,
        HookEventName::PreCompact,
        HookEventName::SessionStart,
        HookEventName::SessionEnd,
    ];

    /// Wire name as it appears in `hook_event_name`
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEventName::PreToolUse => "PreToolUse",
            HookEventName::PostToolUse => "PostToolUse",
            HookEventName::PermissionRequest => "PermissionRequest",
            HookEventName::UserPromptSubmit => "UserPromptSubmit",
            HookEventName::Notification => "Notification",
            HookEventName::Stop => "Stop",
            HookEventName::SubagentStop => "SubagentStop",
            HookEventName::PreCompact => "PreCompact",
            HookEventName::SessionStart => "SessionStart",
            HookEventName::SessionEnd => "SessionEnd",
        }
    }

    /// Whether the payload of this event carries a `tool_name`
    pub fn is_tool_event(&self) -> bool {
        matches!(
            self,
            HookEventName::PreToolUse
                | HookEventName::PostToolUse
                | HookEventName::PermissionRequest
        )
    }
}

impl fmt::Display for HookEventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for HookEventName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.replace(['-', '_'], "").to_lowercase();
        HookEventName::ALL
            .into_iter()
            .find(|kind| kind.as_str().to_lowercase() == wanted)
            .ok_or_else(|| {
                format!(
                    "Unknown hook event: '{s}'. Valid options: {}",
                    HookEventName::ALL.map(|k| k.as_str()).join(", ")
                )
            })
    }
}
