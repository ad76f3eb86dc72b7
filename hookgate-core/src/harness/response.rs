//! Decision → Claude Code hook response.
//!
//! The process exit code is derived here and nowhere else: the engine only
//! deals in [`Decision`] values.

use serde::{Deserialize, Serialize};

use super::types::HookEventName;
use crate::engine::decision::{Decision, Verdict};
use crate::engine::guidance::GuidanceNotice;

/// Allow or ask: the agent proceeds (or prompts the user)
pub const EXIT_ALLOW: i32 = 0;
/// Fatal bootstrap or configuration error
pub const EXIT_FATAL: i32 = 1;
/// Deny: Claude Code blocks the action and shows stderr to the agent
pub const EXIT_DENY: i32 = 2;

/// The main response structure for Claude Code hooks
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct HookResponse {
    #[serde(skip_serializing_if = "Option::is_none", rename = "hookSpecificOutput")]
    pub hook_specific_output: Option<HookSpecificOutput>,

    /// "block" for feedback-loop events (PostToolUse, Stop, SubagentStop, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl HookResponse {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Hook-specific output block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    pub hook_event_name: HookEventName,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_decision: Option<PermissionDecision>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_decision_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,

    /// Raw guidance text, exactly as the handler produced it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
}

impl HookSpecificOutput {
    fn new(kind: HookEventName) -> Self {
        Self {
            hook_event_name: kind,
            permission_decision: None,
            permission_decision_reason: None,
            additional_context: None,
            guidance: None,
        }
    }
}

/// Permission decision for tool-permission events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PermissionDecision {
    Allow,
    Deny,
    Ask,
}

/// One-line JSON diagnostic written to stderr on deny or guidance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnostic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
    pub internal_error: bool,
}

/// Everything the outer process needs to answer one hook invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HookOutput {
    pub exit_code: i32,
    pub stdout: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl HookOutput {
    /// Fail-open answer used when input can't be processed
    pub fn fail_open() -> Self {
        Self {
            exit_code: EXIT_ALLOW,
            stdout: "{}".to_string(),
            stderr: None,
        }
    }
}

/// Builds Claude Code responses from engine decisions
pub struct ClaudeCodeResponseBuilder;

impl ClaudeCodeResponseBuilder {
    /// Build the stdout response for an event kind
    pub fn build_response(kind: HookEventName, decision: &Decision) -> HookResponse {
        if decision.is_silent_allow() {
            return HookResponse::empty();
        }

        let mut response = HookResponse::empty();
        let mut output = HookSpecificOutput::new(kind);

        match (decision.verdict(), kind.is_tool_event()) {
            (Verdict::Allow, _) => {}
            (Verdict::Deny, true) => {
                output.permission_decision = Some(PermissionDecision::Deny);
                output.permission_decision_reason = decision.reason().map(String::from);
            }
            (Verdict::Ask, true) => {
                output.permission_decision = Some(PermissionDecision::Ask);
                output.permission_decision_reason = decision.reason().map(String::from);
            }
            // Feedback-loop events block through decision/reason
            (Verdict::Deny, false) => {
                response.decision = Some("block".to_string());
                response.reason = decision.reason().map(String::from);
            }
            // No confirmation dialog outside tool events; surface the question as context
            (Verdict::Ask, false) => {
                output.additional_context = decision.reason().map(String::from);
            }
        }

        let notice = GuidanceNotice::from_decision(decision);
        let context_parts: Vec<String> = output
            .additional_context
            .take()
            .into_iter()
            .chain(decision.context().map(String::from))
            .chain(notice.as_ref().map(GuidanceNotice::render))
            .collect();
        if !context_parts.is_empty() {
            output.additional_context = Some(context_parts.join("\n\n"));
        }
        output.guidance = decision.guidance().map(String::from);

        let has_output = output.permission_decision.is_some()
            || output.additional_context.is_some()
            || output.guidance.is_some();
        if has_output {
            response.hook_specific_output = Some(output);
        }
        response
    }

    /// Stderr diagnostic, present on deny or when guidance is attached
    pub fn build_diagnostic(decision: &Decision) -> Option<Diagnostic> {
        if decision.verdict() != Verdict::Deny && decision.guidance().is_none() {
            return None;
        }
        Some(Diagnostic {
            handler: decision.source().handler_name().map(String::from),
            verdict: decision.verdict(),
            reason: decision.reason().map(String::from),
            guidance: decision.guidance().map(String::from),
            internal_error: decision.is_internal_error(),
        })
    }

    /// Exit code for a verdict
    pub fn exit_code(decision: &Decision) -> i32 {
        match decision.verdict() {
            Verdict::Deny => EXIT_DENY,
            Verdict::Allow | Verdict::Ask => EXIT_ALLOW,
        }
    }

    /// Full process answer: exit code, stdout JSON, stderr diagnostic
    pub fn build_output(
        kind: HookEventName,
        decision: &Decision,
    ) -> Result<HookOutput, serde_json::Error> {
        let stdout = serde_json::to_string(&Self::build_response(kind, decision))?;
        let stderr = Self::build_diagnostic(decision)
            .map(|d| serde_json::to_string(&d))
            .transpose()?;

        Ok(HookOutput {
            exit_code: Self::exit_code(decision),
            stdout,
            stderr,
        })
    }
}
