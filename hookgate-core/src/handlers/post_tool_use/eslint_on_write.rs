use async_trait::async_trait;

use crate::engine::{Decision, Event, FailureMode, Handler, HandlerCategory, HandlerError};
use crate::handlers::file_path;

use super::run_lint_command;

const CHECKED_EXTENSIONS: [&str; 2] = [".ts", ".tsx"];
const SKIPPED_DIRS: [&str; 5] = ["node_modules", "dist", ".build", "coverage", "test-results"];
const RULE: &str = "================================================================================";

/// Lints TypeScript files as soon as they are written, so errors surface
/// while the change is still in context
pub struct EslintOnWriteHandler {
    command: String,
}

impl EslintOnWriteHandler {
    /// `command` is the wrapper invocation; the file path and
    /// `--max-warnings 0` are appended
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl Handler for EslintOnWriteHandler {
    fn name(&self) -> &str {
        "validate-eslint-on-write"
    }

    fn priority(&self) -> u8 {
        12
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::Safety
    }

    fn failure_mode(&self) -> FailureMode {
        FailureMode::Advisory
    }

    fn matches(&self, event: &Event) -> bool {
        if !event.is_tool(&["Write", "Edit"]) || event.session().remote {
            return false;
        }
        let Some(path) = file_path(event) else {
            return false;
        };

        CHECKED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
            && !SKIPPED_DIRS.iter().any(|dir| path.contains(dir))
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let path = file_path(event)
            .ok_or_else(|| HandlerError::InvalidInput("missing file_path".to_string()))?;
        if !tokio::fs::try_exists(event.session().resolve(path)).await? {
            // The tool itself failed; nothing was written
            return Ok(Decision::allow());
        }

        let run = run_lint_command(
            &self.command,
            &[path, "--max-warnings", "0"],
            event.session().project_root(),
        )
        .await?;

        if run.success {
            return Ok(Decision::allow());
        }

        Ok(Decision::deny(format!(
            "ESLint validation FAILED for {path}\n\n\
             {RULE}\n{output}\n{RULE}\n\n\
             🚫 FILE WAS WRITTEN BUT HAS ESLINT ERRORS!\n   \
                You MUST fix these errors before continuing.\n\n   \
                Run: npx eslint {path} --fix",
            output = run.output,
        )))
    }
}
