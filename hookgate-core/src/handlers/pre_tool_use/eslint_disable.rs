use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::engine::{Decision, Event, Handler, HandlerCategory, HandlerError};
use crate::handlers::{file_path, static_regex};

const CHECKED_EXTENSIONS: [&str; 4] = [".ts", ".tsx", ".js", ".jsx"];
const SKIPPED_DIRS: [&str; 4] = ["node_modules", "dist", ".build", "coverage"];
const MAX_LISTED: usize = 5;

static SUPPRESSION: Lazy<Regex> = Lazy::new(|| {
    static_regex(r"(?i)eslint-disable|@ts-ignore|@ts-nocheck|@ts-expect-error")
});

/// Blocks lint and type-check suppression comments in JS/TS sources
pub struct EslintDisableHandler;

impl EslintDisableHandler {
    fn new_text(event: &Event) -> Option<&str> {
        match event.tool_name() {
            "Write" => event.str_param("content"),
            "Edit" => event.str_param("new_string"),
            _ => None,
        }
    }

    fn is_checked_source(path: &str) -> bool {
        let lower = path.to_lowercase();
        CHECKED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
            && !SKIPPED_DIRS.iter().any(|dir| path.contains(dir))
    }
}

#[async_trait]
impl Handler for EslintDisableHandler {
    fn name(&self) -> &str {
        "enforce-no-eslint-disable"
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
        file_path(event).is_some_and(Self::is_checked_source)
            && Self::new_text(event).is_some_and(|text| SUPPRESSION.is_match(text))
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let path = file_path(event).unwrap_or_default();
        let hits: Vec<&str> = Self::new_text(event)
            .map(|text| SUPPRESSION.find_iter(text).map(|m| m.as_str()).collect())
            .unwrap_or_default();

        let listed: String = hits
            .iter()
            .take(MAX_LISTED)
            .map(|hit| format!("  - {hit}\n"))
            .collect();

        Ok(Decision::deny(format!(
            "🚫 BLOCKED: ESLint suppression comments are not allowed\n\n\
             File: {path}\n\n\
             Found {count} suppression comment(s):\n{listed}\n\
             Suppressions hide real problems.\n\n\
             ✅ CORRECT APPROACH:\n  \
               1. Fix the underlying issue\n  \
               2. Refactor the code to satisfy the rule\n  \
               3. If the rule is genuinely wrong, change it project-wide in the ESLint config",
            count = hits.len(),
        )))
    }
}
