use async_trait::async_trait;

use crate::engine::{Decision, Event, FailureMode, Handler, HandlerCategory, HandlerError};
use crate::handlers::{file_path, normalize_path};

/// Reminds the agent of the plan conventions when it writes a plan document
pub struct PlanWorkflowHandler;

#[async_trait]
impl Handler for PlanWorkflowHandler {
    fn name(&self) -> &str {
        "plan-workflow-guidance"
    }

    fn priority(&self) -> u8 {
        45
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::Workflow
    }

    fn failure_mode(&self) -> FailureMode {
        FailureMode::Advisory
    }

    fn matches(&self, event: &Event) -> bool {
        if event.tool_name() != "Write" {
            return false;
        }
        file_path(event).map(normalize_path).is_some_and(|path| {
            path.contains("CLAUDE/Plan/") && path.to_lowercase().ends_with("/plan.md")
        })
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let path = file_path(event).unwrap_or_default();

        Ok(Decision::allow_with_guidance(format!(
            "Creating plan file: {path}\n\n\
             📋 Plan Workflow Reminders:\n  \
               • Use task status icons: ⬜ (not started), 🔄 (in progress), ✅ (completed)\n  \
               • Include a Success Criteria section\n  \
               • Break tasks into manageable phases\n  \
               • Update task status as you work\n\n\
             See CLAUDE/PlanWorkflow.md for the full guidelines."
        )))
    }
}
