//! Decision types - the [`Verdict`] a dispatch resolves to and the
//! [`Decision`] object that carries it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of outcomes for one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Proceed with the action
    Allow,
    /// Block the action
    Deny,
    /// Defer to the user for confirmation
    Ask,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Allow => "allow",
            Verdict::Deny => "deny",
            Verdict::Ask => "ask",
        }
    }

    /// Check if this verdict stops the action outright
    pub fn is_blocking(&self) -> bool {
        matches!(self, Verdict::Deny)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a decision came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "handler", rename_all = "snake_case")]
pub enum DecisionSource {
    /// No handler matched
    Default,
    /// Returned by the named handler
    Handler(String),
    /// Synthesized after the named handler failed or timed out
    HandlerFailure(String),
}

impl DecisionSource {
    pub fn handler_name(&self) -> Option<&str> {
        match self {
            DecisionSource::Default => None,
            DecisionSource::Handler(name) | DecisionSource::HandlerFailure(name) => Some(name),
        }
    }
}

/// The outcome of a dispatch
///
/// Fields are private so the invariants hold for every value: a deny always
/// carries a reason, and guidance only ever rides on an allow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    guidance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
    source: DecisionSource,
}

/// Prefix that marks a deny caused by a broken handler rather than by policy
pub const INTERNAL_ERROR_PREFIX: &str = "internal error in handler";

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

impl Decision {
    /// Plain allow with nothing attached
    pub fn allow() -> Self {
        Self {
            verdict: Verdict::Allow,
            reason: None,
            guidance: None,
            context: None,
            source: DecisionSource::Default,
        }
    }

    /// Allow carrying advisory guidance the agent should acknowledge
    pub fn allow_with_guidance(guidance: impl Into<String>) -> Self {
        Self {
            guidance: non_empty(guidance.into()),
            ..Self::allow()
        }
    }

    /// Allow that injects extra context for the agent
    pub fn allow_with_context(context: impl Into<String>) -> Self {
        Self::allow().with_context(context)
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Deny,
            reason: Some(reason.into()),
            ..Self::allow()
        }
    }

    pub fn ask(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Ask,
            reason: Some(reason.into()),
            ..Self::allow()
        }
    }

    /// Deny raised because a handler could not evaluate its policy
    pub fn internal_error(handler: &str, detail: impl fmt::Display) -> Self {
        Self::deny(format!(
            "{INTERNAL_ERROR_PREFIX} '{handler}': {detail}. \
             The action was blocked because the policy could not be evaluated, \
             not because it violated the policy."
        ))
        .with_source(DecisionSource::HandlerFailure(handler.to_string()))
    }

    /// Attach additional context (any verdict)
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = non_empty(context.into());
        self
    }

    pub(crate) fn with_source(mut self, source: DecisionSource) -> Self {
        self.source = source;
        self
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn guidance(&self) -> Option<&str> {
        self.guidance.as_deref()
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn source(&self) -> &DecisionSource {
        &self.source
    }

    /// Allow with no reason, guidance, or context
    pub fn is_silent_allow(&self) -> bool {
        self.verdict == Verdict::Allow
            && self.reason.is_none()
            && self.guidance.is_none()
            && self.context.is_none()
    }

    /// Deny caused by handler failure rather than by policy
    pub fn is_internal_error(&self) -> bool {
        self.verdict == Verdict::Deny && matches!(self.source, DecisionSource::HandlerFailure(_))
    }
}
