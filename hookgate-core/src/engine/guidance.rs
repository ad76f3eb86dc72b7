//! Guidance acknowledgment protocol.
//!
//! Guidance is soft feedback attached to an allow. The agent is expected to
//! acknowledge it in three parts before acting:
//!
//! 1. name the handler that produced it,
//! 2. restate the guidance,
//! 3. say what it will do as a result.
//!
//! Nothing here can force the agent to comply. What the engine does
//! guarantee is that guidance reaches the agent unmodified, exactly once per
//! dispatch, together with the acknowledgment request rendered by
//! [`GuidanceNotice::render`].

use serde::Serialize;

use super::decision::Decision;

/// Guidance produced by one handler for one dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuidanceNotice<'a> {
    pub handler: &'a str,
    pub guidance: &'a str,
}

impl<'a> GuidanceNotice<'a> {
    /// Extract the notice from a decision, if it carries guidance
    pub fn from_decision(decision: &'a Decision) -> Option<Self> {
        let guidance = decision.guidance()?;
        Some(Self {
            handler: decision.source().handler_name().unwrap_or("hookgate"),
            guidance,
        })
    }

    /// Guidance text wrapped in the acknowledgment request
    pub fn render(&self) -> String {
        format!(
            "GUIDANCE from handler '{handler}':\n\
             \n\
             {guidance}\n\
             \n\
             Before continuing, acknowledge this guidance:\n\
             1. Name the handler that produced it ({handler}).\n\
             2. Restate the guidance in your own words.\n\
             3. State what you will do as a result.",
            handler = self.handler,
            guidance = self.guidance,
        )
    }
}
