use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::engine::{Decision, Event, Handler, HandlerCategory, HandlerError};
use crate::handlers::{file_path, normalize_path};

const HANDLER_DIRS: [&str; 4] = [
    "/handlers/pre_tool_use/",
    "/handlers/post_tool_use/",
    "/handlers/user_prompt_submit/",
    "/handlers/subagent_stop/",
];

/// Test-first for hook handlers: a handler file may only be created once its
/// test file exists
pub struct TddHandler;

impl TddHandler {
    /// `<controller>/tests/test_<file>`, where `<controller>` is the nearest
    /// `controller` ancestor or three levels up when there is none
    fn test_file_for(handler_path: &Path) -> Option<PathBuf> {
        let file_name = handler_path.file_name()?.to_string_lossy();
        let controller_dir = handler_path
            .ancestors()
            .find(|dir| dir.file_name().is_some_and(|name| name == "controller"))
            .or_else(|| handler_path.ancestors().nth(3))?;

        Some(controller_dir.join("tests").join(format!("test_{file_name}")))
    }
}

#[async_trait]
impl Handler for TddHandler {
    fn name(&self) -> &str {
        "enforce-tdd"
    }

    fn priority(&self) -> u8 {
        15
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::Safety
    }

    fn matches(&self, event: &Event) -> bool {
        if event.tool_name() != "Write" {
            return false;
        }
        let Some(path) = file_path(event).map(normalize_path) else {
            return false;
        };

        path.ends_with(".py")
            && !path.ends_with("__init__.py")
            && HANDLER_DIRS.iter().any(|dir| path.contains(dir))
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let raw = file_path(event)
            .ok_or_else(|| HandlerError::InvalidInput("missing file_path".to_string()))?;
        let handler_path = event.session().resolve(normalize_path(raw));
        let test_path = Self::test_file_for(&handler_path).ok_or_else(|| {
            HandlerError::InvalidInput(format!("cannot derive a test path for {raw}"))
        })?;

        if tokio::fs::try_exists(&test_path).await? {
            return Ok(Decision::allow());
        }

        let handler_name = handler_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let test_name = test_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Decision::deny(format!(
            "🚫 TDD REQUIRED: Cannot create handler without test file\n\n\
             Handler file: {handler_name}\n\
             Missing test: {test_name}\n\n\
             Write the test first, then implement the handler.\n\n\
             REQUIRED ACTION:\n\
             1. Create the test file first:\n   {test}\n\n\
             2. Cover matches() with varied inputs, handle() decisions and \
             reasons, and the edge cases\n\n\
             3. Run the tests (they should fail - red)\n\n\
             4. THEN create the handler file:\n   {handler}\n\n\
             5. Run the tests again (they should pass - green)",
            test = test_path.display(),
            handler = handler_path.display(),
        )))
    }
}
