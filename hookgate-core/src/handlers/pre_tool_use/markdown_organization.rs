use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::engine::{Decision, Event, Handler, HandlerCategory, HandlerError};
use crate::handlers::{file_path, normalize_path, static_regex};

static PLAN_DOC: Lazy<Regex> = Lazy::new(|| static_regex(r"(?i)^CLAUDE/Plan/\d{3}-[^/]+/.+\.md$"));
static PAGE_NOTE: Lazy<Regex> =
    Lazy::new(|| static_regex(r"(?i)^src/pages/.*-(research|rules)\.md$"));
static ALLOWED_TREES: Lazy<Regex> = Lazy::new(|| {
    static_regex(r"(?i)^(CLAUDE/research/|CLAUDE/Sitemap/|docs/|untracked/|eslint-rules/.*\.md$)")
});

/// Keeps markdown in the documented places instead of scattered across the tree
pub struct MarkdownOrganizationHandler;

impl MarkdownOrganizationHandler {
    /// Path relative to the project, with `/workspace/` container prefixes removed
    fn project_relative(event: &Event, path: &str) -> String {
        let path = normalize_path(path);
        if let Some(root) = event.session().project_root() {
            if let Ok(rest) = Path::new(&path).strip_prefix(root) {
                return normalize_path(&rest.to_string_lossy());
            }
        }
        let trimmed = path.trim_start_matches('/');
        trimmed
            .strip_prefix("workspace/")
            .unwrap_or(trimmed)
            .to_string()
    }

    fn is_instruction_file(relative: &str) -> bool {
        let file_name = relative.rsplit('/').next().unwrap_or(relative).to_lowercase();
        matches!(file_name.as_str(), "claude.md" | "readme.md")
            || (file_name == "skill.md" && relative.contains(".claude/skills/"))
            || relative.contains(".claude/agents/")
    }

    fn is_allowed(relative: &str) -> bool {
        let lower = relative.to_lowercase();
        let claude_top_level = lower
            .strip_prefix("claude/")
            .is_some_and(|rest| !rest.contains('/'));

        Self::is_instruction_file(relative)
            || PAGE_NOTE.is_match(relative)
            || PLAN_DOC.is_match(relative)
            || claude_top_level
            || ALLOWED_TREES.is_match(relative)
    }
}

#[async_trait]
impl Handler for MarkdownOrganizationHandler {
    fn name(&self) -> &str {
        "enforce-markdown-organization"
    }

    fn priority(&self) -> u8 {
        35
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::Workflow
    }

    fn matches(&self, event: &Event) -> bool {
        if !event.is_tool(&["Write", "Edit"]) {
            return false;
        }
        match file_path(event) {
            Some(path) if path.ends_with(".md") => {
                !Self::is_allowed(&Self::project_relative(event, path))
            }
            _ => false,
        }
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let path = file_path(event).unwrap_or_default();

        Ok(Decision::deny(format!(
            "MARKDOWN FILE IN WRONG LOCATION\n\n\
             Attempted to write: {path}\n\n\
             Markdown files can only be written to:\n\n\
             1. ./CLAUDE/Plan/NNN-plan-name/ - docs for the current plan\n\
             2. ./CLAUDE/ (top level only) - generic LLM docs\n\
             3. ./CLAUDE/research/ - structured research data\n\
             4. ./docs/ - human-facing documentation\n\
             5. ./eslint-rules/ - ESLint rule documentation\n\
             6. ./untracked/ - ad-hoc temporary docs\n\n\
             CLAUDE.md and README.md are allowed anywhere.\n\n\
             CHOOSE THE RIGHT LOCATION:\n\
             - For the current plan? -> CLAUDE/Plan/NNN-*/\n\
             - Temporary? -> untracked/\n\
             - For humans? -> docs/"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Verdict;
    use crate::handlers::test_support::*;

    #[test]
    fn test_allowed_locations() {
        let handler = MarkdownOrganizationHandler;
        for path in [
            "CLAUDE/Plan/012-auth/plan.md",
            "CLAUDE/Plan/012-auth/notes/design.md",
            "CLAUDE/PlanWorkflow.md",
            "CLAUDE/research/topic.md",
            "CLAUDE/Sitemap/home.md",
            "docs/guide.md",
            "untracked/scratch.md",
            "eslint-rules/no-foo.md",
            "src/components/README.md",
            "deep/nested/CLAUDE.md",
            ".claude/skills/deploy/SKILL.md",
            ".claude/agents/reviewer.md",
            "src/pages/about/about-research.md",
            "/workspace/docs/guide.md",
        ] {
            assert!(!handler.matches(&write(path, "# x")), "should allow: {path}");
        }
    }

    #[test]
    fn test_blocked_locations() {
        let handler = MarkdownOrganizationHandler;
        for path in [
            "notes.md",
            "src/notes.md",
            "CLAUDE/Plan/notes.md",
            "CLAUDE/misc/notes.md",
            "src/pages/about/notes.md",
        ] {
            assert!(handler.matches(&write(path, "# x")), "should block: {path}");
        }
        assert!(!handler.matches(&write("src/main.rs", "")));
    }

    #[test]
    fn test_absolute_paths_inside_project() {
        let handler = MarkdownOrganizationHandler;
        let root = Path::new("/home/user/project");
        assert!(!handler.matches(&in_project(write("/home/user/project/docs/a.md", ""), root)));
        assert!(handler.matches(&in_project(write("/home/user/project/notes.md", ""), root)));
    }

    #[tokio::test]
    async fn test_denies_with_path() {
        let decision = MarkdownOrganizationHandler
            .handle(&write("src/notes.md", ""))
            .await
            .unwrap();
        assert_eq!(decision.verdict(), Verdict::Deny);
        assert!(decision.reason().unwrap().contains("Attempted to write: src/notes.md"));
    }
}
