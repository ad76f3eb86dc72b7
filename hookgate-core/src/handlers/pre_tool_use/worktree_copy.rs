use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::engine::{Decision, Event, Handler, HandlerCategory, HandlerError};
use crate::handlers::{bash_command, static_regex};

const WORKTREE_MARKER: &str = "untracked/worktrees";

static COPY_TOOL: Lazy<Regex> = Lazy::new(|| static_regex(r"(?i)\b(cp|mv|rsync)\b"));

static INTO_MAIN_REPO: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        static_regex(r"(?i)untracked/worktrees/[^/\s]+/\S+\s+.*\b(src/|tests/|config/)"),
        static_regex(r"(?i)rsync.*untracked/worktrees.*\b(src|tests|config)\b"),
    ]
});

static WORKTREE_NAME: Lazy<Regex> =
    Lazy::new(|| static_regex(r"untracked/worktrees/([^/\s]+)"));

/// Stops files being copied out of a git worktree into the main checkout,
/// which bypasses the branch and its history
pub struct WorktreeCopyHandler;

impl WorktreeCopyHandler {
    /// Both ends inside the same worktree
    fn within_one_worktree(command: &str) -> bool {
        let mut names = WORKTREE_NAME
            .captures_iter(command)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()));
        match (names.next(), names.next()) {
            (Some(first), Some(second)) => first == second,
            _ => false,
        }
    }
}

#[async_trait]
impl Handler for WorktreeCopyHandler {
    fn name(&self) -> &str {
        "prevent-worktree-file-copying"
    }

    fn priority(&self) -> u8 {
        15
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::Safety
    }

    fn matches(&self, event: &Event) -> bool {
        let Some(command) = bash_command(event) else {
            return false;
        };
        if !command.contains(WORKTREE_MARKER) || !COPY_TOOL.is_match(command) {
            return false;
        }

        INTO_MAIN_REPO.iter().any(|pattern| pattern.is_match(command))
            && !Self::within_one_worktree(command)
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let command = bash_command(event).unwrap_or_default();

        Ok(Decision::deny(format!(
            "❌ BLOCKED: Attempting to copy files from a worktree into the main repo\n\n\
             Command: {command}\n\n\
             Copying defeats worktree isolation, loses the branch history, and \
             overwrites untracked work in the target directory.\n\n\
             ✅ CORRECT WORKFLOW:\n  \
               1. cd untracked/worktrees/your-branch\n  \
               2. git add . && git commit -m 'feat: changes'\n  \
               3. cd back to the main repo\n  \
               4. git merge your-branch"
        )))
    }
}
