use async_trait::async_trait;

use crate::engine::{Decision, Event, Handler, HandlerCategory, HandlerError};
use crate::handlers::truncate;

const WORKSPACE_ROOT: &str = "/workspace/";
const SNIPPET_CHARS: usize = 200;

/// Blocks container-specific `/workspace/` paths hard-coded into file content
///
/// Only content is checked. Absolute `file_path` parameters are fine.
pub struct AbsolutePathsHandler;

impl AbsolutePathsHandler {
    fn checked_text(event: &Event) -> Vec<&str> {
        match event.tool_name() {
            "Write" => event.str_param("content").into_iter().collect(),
            "Edit" => ["new_string", "old_string"]
                .iter()
                .filter_map(|key| event.str_param(key))
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl Handler for AbsolutePathsHandler {
    fn name(&self) -> &str {
        "prevent-absolute-workspace-paths"
    }

    fn priority(&self) -> u8 {
        12
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::Safety
    }

    fn matches(&self, event: &Event) -> bool {
        Self::checked_text(event)
            .iter()
            .any(|text| text.contains(WORKSPACE_ROOT))
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let source = match event.tool_name() {
            "Write" => event.str_param("content"),
            _ => event.str_param("new_string"),
        };
        let snippet = truncate(source.unwrap_or_default(), SNIPPET_CHARS);

        Ok(Decision::deny(format!(
            "BLOCKED: File content contains /workspace/ absolute path\n\n\
             Content snippet:\n{snippet}\n\n\
             Don't hardcode /workspace/ paths in code. Use paths relative to \
             the repository root instead: /workspace/ only exists inside \
             specific containers.\n\n\
             Note: tool parameters like file_path CAN be absolute. Only paths \
             INSIDE the content being written are blocked."
        )))
    }
}
