use async_trait::async_trait;

use crate::engine::{Decision, Event, FailureMode, Handler, HandlerCategory, HandlerError};
use crate::handlers::{file_path, normalize_path};

use super::{project_relative, run_lint_command};

/// Lints playbooks right after they are edited
///
/// A project without the lint script is not an error; the check is skipped
/// and the agent is told so.
pub struct AnsibleLintHandler {
    command: String,
}

impl AnsibleLintHandler {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// The configured script, when it is a path inside the project that does not exist
    fn missing_script(&self, event: &Event) -> Option<String> {
        let program = shell_words::split(&self.command).ok()?.into_iter().next()?;
        if !program.contains('/') {
            return None;
        }
        let resolved = event.session().resolve(&program);
        (!resolved.exists()).then_some(program)
    }
}

#[async_trait]
impl Handler for AnsibleLintHandler {
    fn name(&self) -> &str {
        "ansible-lint"
    }

    fn priority(&self) -> u8 {
        15
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
        file_path(event).map(normalize_path).is_some_and(|path| {
            path.contains("playbooks/") && (path.ends_with(".yml") || path.ends_with(".yaml"))
        })
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let path = file_path(event)
            .ok_or_else(|| HandlerError::InvalidInput("missing file_path".to_string()))?;
        let relative = project_relative(event, &normalize_path(path));

        if let Some(script) = self.missing_script(event) {
            return Ok(Decision::allow_with_context(format!(
                "ansible-lint skipped for {relative}: {script} not found"
            )));
        }

        let run = run_lint_command(&self.command, &[&relative], event.session().project_root())
            .await?;

        if run.success {
            return Ok(Decision::allow_with_context(format!(
                "✅ No ansible-lint issues in {relative}"
            )));
        }

        Ok(Decision::deny(format!(
            "🚫 ansible-lint found issues in {relative}\n\n\
             {output}\n\n\
             The playbook was written but does not pass lint. Fix the \
             violations above, then re-run:\n  \
               {command} {relative}",
            output = run.output,
            command = self.command,
        )))
    }
}
