use async_trait::async_trait;

use crate::engine::{Decision, Event, Handler, HandlerCategory, HandlerError};
use crate::handlers::{file_path, normalize_path};

/// Reminds the agent to run the sitemap validator after editing a sitemap page
pub struct SitemapHandler;

#[async_trait]
impl Handler for SitemapHandler {
    fn name(&self) -> &str {
        "validate-sitemap"
    }

    fn priority(&self) -> u8 {
        30
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::Workflow
    }

    fn matches(&self, event: &Event) -> bool {
        if !event.is_tool(&["Write", "Edit"]) {
            return false;
        }
        file_path(event).map(normalize_path).is_some_and(|path| {
            path.contains("CLAUDE/Sitemap")
                && path.ends_with(".md")
                && !path.ends_with("CLAUDE/Sitemap/CLAUDE.md")
        })
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let path = file_path(event).unwrap_or_default();

        Ok(Decision::allow_with_context(format!(
            "⚠️ REMINDER: Sitemap file modified: {path}\n\n\
             After completing your edits, validate the sitemap with the \
             sitemap-validator agent:\n  \
               Task tool:\n    \
                 subagent_type: sitemap-validator\n    \
                 prompt: Validate sitemap file: {path}\n    \
                 model: haiku\n\n\
             The validator checks for content, hallucinated components, \
             implementation details, and notation errors."
        )))
    }
}
