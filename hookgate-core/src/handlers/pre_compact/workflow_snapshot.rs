use async_trait::async_trait;
use chrono::{Local, SecondsFormat, Utc};
use tracing::info;

use crate::engine::{Decision, Event, FailureMode, Handler, HandlerCategory, HandlerError};
use crate::handlers::workflow_state;

/// Saves the active workflow before compaction so it can be restored
///
/// Never blocks the compaction. Projects without a declared workflow are
/// left untouched.
pub struct WorkflowSnapshotHandler;

#[async_trait]
impl Handler for WorkflowSnapshotHandler {
    fn name(&self) -> &str {
        "workflow-state-precompact"
    }

    fn priority(&self) -> u8 {
        30
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::Workflow
    }

    fn failure_mode(&self) -> FailureMode {
        FailureMode::Advisory
    }

    fn matches(&self, _event: &Event) -> bool {
        // Whether a workflow is active is only known from disk
        true
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let project = event.session().resolve(".");
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let Some(state) = workflow_state::detect(&project, created_at).await? else {
            return Ok(Decision::allow());
        };

        let started = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let workflow = state.workflow.clone();
        let path = workflow_state::save(&project, state, &started).await?;
        info!(workflow = %workflow, path = %path.display(), "Workflow state saved before compaction");
        Ok(Decision::allow())
    }
}
