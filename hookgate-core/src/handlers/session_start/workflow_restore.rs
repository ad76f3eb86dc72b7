use async_trait::async_trait;
use tracing::{debug, info};

use crate::engine::{Decision, Event, FailureMode, Handler, HandlerCategory, HandlerError};
use crate::handlers::workflow_state::{self, WorkflowState};

/// Hands the saved workflow back to the agent after a compaction
///
/// The state file is left in place so a later compaction updates it.
pub struct WorkflowRestoreHandler;

#[async_trait]
impl Handler for WorkflowRestoreHandler {
    fn name(&self) -> &str {
        "workflow-state-restoration"
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

    fn matches(&self, event: &Event) -> bool {
        event.str_param("source") == Some("compact")
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let project = event.session().resolve(".");
        let Some(path) = workflow_state::latest_state_file(&project).await? else {
            return Ok(Decision::allow());
        };

        let raw = tokio::fs::read_to_string(&path).await?;
        let state: WorkflowState = match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Unreadable workflow state");
                return Ok(Decision::allow());
            }
        };

        info!(workflow = %state.workflow, path = %path.display(), "Restoring workflow state");
        Ok(Decision::allow_with_context(state.restoration_message()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::event::SessionContext;
    use crate::handlers::workflow_state::STATE_DIR;
    use crate::harness::types::HookEventName;
    use tempfile::TempDir;

    fn session_start(source: &str, root: &std::path::Path) -> Event {
        Event::new(HookEventName::SessionStart, "SessionStart")
            .unwrap()
            .with_param("source", source)
            .with_session(SessionContext {
                project_dir: Some(root.to_path_buf()),
                ..Default::default()
            })
    }

    fn save_state(root: &std::path::Path, json: &str) {
        let dir = root.join(STATE_DIR).join("docs");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("state-docs-20250101_000000.json"), json).unwrap();
    }

    #[test]
    fn test_only_compaction_resumes_match() {
        let root = std::path::Path::new("/tmp/project");
        assert!(WorkflowRestoreHandler.matches(&session_start("compact", root)));
        assert!(!WorkflowRestoreHandler.matches(&session_start("startup", root)));
        assert!(!WorkflowRestoreHandler.matches(&session_start("resume", root)));
    }

    #[tokio::test]
    async fn test_saved_state_is_restored() {
        let project = TempDir::new().unwrap();
        save_state(
            project.path(),
            r#"{"workflow": "Docs", "phase": {"current": 3, "total": 4, "name": "Review", "status": "in_progress"},
               "required_reading": ["@CLAUDE/Docs.md"], "context": {"plan_number": 7}}"#,
        );

        let decision = WorkflowRestoreHandler
            .handle(&session_start("compact", project.path()))
            .await
            .unwrap();
        let context = decision.context().unwrap();
        assert!(context.contains("Workflow: Docs"));
        assert!(context.contains("Phase: 3/4 - Review (in_progress)"));
        assert!(context.contains("@CLAUDE/Docs.md"));
        assert!(context.contains("\"plan_number\": 7"));
        // Kept for the next compaction
        assert!(project.path().join(STATE_DIR).join("docs").read_dir().unwrap().next().is_some());
    }

    #[tokio::test]
    async fn test_missing_or_corrupt_state_is_silent() {
        let project = TempDir::new().unwrap();
        let decision = WorkflowRestoreHandler
            .handle(&session_start("compact", project.path()))
            .await
            .unwrap();
        assert!(decision.is_silent_allow());

        save_state(project.path(), "{not json");
        let decision = WorkflowRestoreHandler
            .handle(&session_start("compact", project.path()))
            .await
            .unwrap();
        assert!(decision.is_silent_allow());
    }
}
