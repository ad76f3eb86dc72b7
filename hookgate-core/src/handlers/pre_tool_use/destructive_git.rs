use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::engine::{Decision, Event, Handler, HandlerCategory, HandlerError};
use crate::handlers::{bash_command, static_regex};

/// Each destructive pattern with the reason reported when it fires, in
/// precedence order
static DESTRUCTIVE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            static_regex(r"(?i)\bgit\s+reset\s+.*--hard\b"),
            "git reset --hard destroys all uncommitted changes permanently",
        ),
        (
            static_regex(r"(?i)\bgit\s+clean\s+.*-[a-z]*f"),
            "git clean -f permanently deletes untracked files",
        ),
        (
            static_regex(r"(?i)\bgit\s+stash\s+drop\b"),
            "git stash drop permanently destroys stashed changes",
        ),
        (
            static_regex(r"(?i)\bgit\s+stash\s+clear\b"),
            "git stash clear permanently destroys all stashed changes",
        ),
        (
            static_regex(r"(?i)\bgit\s+checkout\s+.*--\s+\S"),
            "git checkout [REF] -- file discards all local changes to that file permanently",
        ),
        (
            static_regex(r"(?i)\bgit\s+checkout\s+\.\s*(?:$|;|&&|\|)"),
            "git checkout . discards all unstaged changes in the working tree permanently",
        ),
        (
            static_regex(r"(?i)\bgit\s+restore\s+.*--worktree\b"),
            "git restore --worktree discards local changes permanently",
        ),
    ]
});

/// Blocks git commands that irrecoverably destroy uncommitted work
pub struct DestructiveGitHandler;

impl DestructiveGitHandler {
    fn destructive_reason(command: &str) -> Option<&'static str> {
        if !command.to_lowercase().contains("git") {
            return None;
        }
        DESTRUCTIVE_PATTERNS
            .iter()
            .find(|(pattern, _)| pattern.is_match(command))
            .map(|(_, reason)| *reason)
    }
}

#[async_trait]
impl Handler for DestructiveGitHandler {
    fn name(&self) -> &str {
        "prevent-destructive-git"
    }

    fn priority(&self) -> u8 {
        10
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::Safety
    }

    fn matches(&self, event: &Event) -> bool {
        bash_command(event).is_some_and(|cmd| Self::destructive_reason(cmd).is_some())
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let command = bash_command(event).unwrap_or_default();
        let reason = Self::destructive_reason(command)
            .unwrap_or("This git command destroys uncommitted changes permanently");

        Ok(Decision::deny(format!(
            "BLOCKED: Destructive git command detected\n\n\
             Reason: {reason}\n\n\
             Command: {command}\n\n\
             This command PERMANENTLY DESTROYS uncommitted changes with NO recovery possible.\n\n\
             If this operation is truly necessary, ask the human user to run it manually.\n\n\
             SAFE alternatives:\n  \
               - git stash        (save changes, can recover later)\n  \
               - git diff         (review changes first)\n  \
               - git status       (see what would be affected)\n  \
               - git commit       (save changes permanently first)"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Verdict;
    use crate::handlers::test_support::*;

    #[test]
    fn test_matches_destructive_commands() {
        let handler = DestructiveGitHandler;
        for command in [
            "git reset --hard HEAD~1",
            "git reset HEAD --hard",
            "git clean -fd",
            "git clean -xdf",
            "git checkout .",
            "git checkout . && git status",
            "git checkout -- src/main.rs",
            "git checkout HEAD -- src/main.rs",
            "git checkout @{upstream} -- file.txt",
            "git restore --worktree src/lib.rs",
            "git stash drop",
            "git stash clear",
            "GIT RESET --HARD",
        ] {
            assert!(handler.matches(&bash(command)), "should block: {command}");
        }
    }

    #[test]
    fn test_safe_git_commands_pass() {
        let handler = DestructiveGitHandler;
        for command in [
            "git status",
            "git diff",
            "git reset --soft HEAD~1",
            "git checkout main",
            "git checkout -b feature/x",
            "git clean -n",
            "git stash list",
            "git restore --staged src/lib.rs",
            "echo reset --hard",
        ] {
            assert!(!handler.matches(&bash(command)), "should allow: {command}");
        }
        assert!(!handler.matches(&write("notes.md", "git reset --hard")));
    }

    #[tokio::test]
    async fn test_reason_is_specific() {
        let decision = DestructiveGitHandler
            .handle(&bash("git stash clear"))
            .await
            .unwrap();
        assert_eq!(decision.verdict(), Verdict::Deny);
        let reason = decision.reason().unwrap();
        assert!(reason.contains("git stash clear permanently destroys all stashed changes"));
        assert!(reason.contains("Command: git stash clear"));
    }
}
