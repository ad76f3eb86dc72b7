use async_trait::async_trait;

use crate::engine::{Decision, Event, Handler, HandlerCategory, HandlerError};
use crate::handlers::{file_path, normalize_path};

/// Entry scripts that may live directly under `.claude/hooks/`, one per hook event
const ALLOWED_ENTRY_POINTS: [&str; 11] = [
    "/.claude/hooks/pre-tool-use",
    "/.claude/hooks/post-tool-use",
    "/.claude/hooks/user-prompt-submit",
    "/.claude/hooks/subagent-stop",
    "/.claude/hooks/permission-request",
    "/.claude/hooks/stop",
    "/.claude/hooks/notification",
    "/.claude/hooks/pre-compact",
    "/.claude/hooks/session-start",
    "/.claude/hooks/session-end",
    "/.claude/hooks/__init__.py",
];

/// Blocks standalone hook scripts; new interception logic must be a registered handler
pub struct ControllerPatternHandler;

#[async_trait]
impl Handler for ControllerPatternHandler {
    fn name(&self) -> &str {
        "enforce-controller-pattern"
    }

    fn priority(&self) -> u8 {
        5
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::Structural
    }

    fn matches(&self, event: &Event) -> bool {
        if event.tool_name() != "Write" {
            return false;
        }
        let Some(path) = file_path(event).map(normalize_path) else {
            return false;
        };

        path.contains("/.claude/hooks/")
            && !path.contains("/controller/")
            && !path.contains(".bak.")
            && !ALLOWED_ENTRY_POINTS
                .iter()
                .any(|entry| path.ends_with(entry))
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let path = file_path(event).unwrap_or_default();
        let extension = path
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.contains('/'))
            .unwrap_or("unknown");

        let entry_points: String = ALLOWED_ENTRY_POINTS
            .iter()
            .filter(|entry| !entry.contains("__init__"))
            .map(|entry| format!("  - {entry}\n"))
            .collect();

        Ok(Decision::deny(format!(
            "🚫 BLOCKED: Standalone hook files are NOT allowed\n\n\
             Attempted to create: {path}\n\
             File type: .{extension}\n\n\
             All hooks go through the front controller, whatever the file type \
             (.py, .sh, .bash, executables).\n\n\
             ✅ CORRECT APPROACH:\n\
             1. Implement a handler in controller/handlers/\n\
             2. Register it with the dispatcher for its event\n\
             3. Write tests in controller/tests/\n\n\
             Only these entry point scripts are allowed, one per hook event:\n\
             {entry_points}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Verdict;
    use crate::handlers::test_support::*;

    #[test]
    fn test_matches_standalone_hook() {
        let handler = ControllerPatternHandler;
        assert!(handler.matches(&write("/workspace/.claude/hooks/my-check.sh", "")));
        assert!(handler.matches(&write("/workspace/.claude/hooks/validators/x.py", "")));
    }

    #[test]
    fn test_allows_controller_backups_and_entry_points() {
        let handler = ControllerPatternHandler;
        assert!(!handler.matches(&write(
            "/workspace/.claude/hooks/controller/handlers/pre_tool_use/new.py",
            ""
        )));
        assert!(!handler.matches(&write("/workspace/.claude/hooks/old.bak.py", "")));
        assert!(!handler.matches(&write("/workspace/.claude/hooks/pre-tool-use", "")));
        assert!(!handler.matches(&write("/workspace/.claude/hooks/__init__.py", "")));
        assert!(!handler.matches(&write("/workspace/src/hooks/thing.sh", "")));
        assert!(!handler.matches(&edit("/workspace/.claude/hooks/my-check.sh", "a", "b")));
    }

    #[tokio::test]
    async fn test_denies_with_file_type() {
        let decision = ControllerPatternHandler
            .handle(&write("/workspace/.claude/hooks/my-check.sh", ""))
            .await
            .unwrap();

        assert_eq!(decision.verdict(), Verdict::Deny);
        let reason = decision.reason().unwrap();
        assert!(reason.contains("File type: .sh"));
        assert!(reason.contains("/.claude/hooks/session-end"));
        assert!(!reason.contains("__init__"));
    }
}
