use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::engine::{Decision, Event, Handler, HandlerCategory, HandlerError};
use crate::handlers::{file_path, static_regex};

const UNIT: &str = r"(?:hours?|minutes?|days?|weeks?)";

static ESTIMATES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        format!(r"(?:Total\s+)?Estimated\s+(?:Effort|Time)\**:\s*[^\n]*{UNIT}"),
        format!(r"(?:Time\s+)?Estimated\s+(?:time)?:\s*[^\n]*{UNIT}"),
        r"(?:Target\s+)?Completion\**:\s*\d{4}-\d{2}-\d{2}".to_string(),
        r"\b\d+\s*(?:hour|hr|minute|min|day|week|month)s?\b".to_string(),
        r"\b(?:ETA|timeline|deadline|due date):\s*\d".to_string(),
    ]
    .iter()
    .map(|pattern| static_regex(&format!("(?i){pattern}")))
    .collect()
});

/// Plans describe what to do, never when; time estimates are blocked in plan docs
pub struct PlanTimeEstimatesHandler;

impl PlanTimeEstimatesHandler {
    fn new_text(event: &Event) -> Option<&str> {
        match event.tool_name() {
            "Write" => event.str_param("content"),
            "Edit" => event.str_param("new_string"),
            _ => None,
        }
    }
}

#[async_trait]
impl Handler for PlanTimeEstimatesHandler {
    fn name(&self) -> &str {
        "block-plan-time-estimates"
    }

    fn priority(&self) -> u8 {
        40
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::Workflow
    }

    fn matches(&self, event: &Event) -> bool {
        let in_plan_doc = file_path(event)
            .is_some_and(|path| path.contains("/Plan/") && path.ends_with(".md"));
        in_plan_doc
            && event.is_tool(&["Write", "Edit"])
            && Self::new_text(event)
                .is_some_and(|text| ESTIMATES.iter().any(|pattern| pattern.is_match(text)))
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let path = file_path(event).unwrap_or_default();

        Ok(Decision::deny(format!(
            "🚫 BLOCKED: Time estimates not allowed in plan documents\n\n\
             File: {path}\n\n\
             Plans focus on WHAT needs to be done, not WHEN. Estimates create \
             false expectations.\n\n\
             ✅ CORRECT APPROACH:\n  \
               - Break the work into concrete tasks\n  \
               - Describe the implementation steps\n  \
               - Leave scheduling to the user"
        )))
    }
}
