use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::engine::{Decision, Event, Handler, HandlerCategory, HandlerError};
use crate::handlers::{bash_command, static_regex};

/// `git stash`, `git stash push`, `git stash save`; list/show/apply/pop pass
static STASH_CREATE: Lazy<Regex> = Lazy::new(|| {
    static_regex(r"(?i)\bgit\s+stash(?:\s+(?:push|save)\b|\s*(?:$|;|&&|\|\||#))")
});

/// Discourages stashing: stashes are easily lost, and worse across worktrees.
/// The configured escape phrase anywhere in the command lets it through.
pub struct GitStashHandler {
    escape_phrase: String,
}

impl GitStashHandler {
    pub fn new(escape_phrase: impl Into<String>) -> Self {
        Self {
            escape_phrase: escape_phrase.into(),
        }
    }
}

#[async_trait]
impl Handler for GitStashHandler {
    fn name(&self) -> &str {
        "discourage-git-stash"
    }

    fn priority(&self) -> u8 {
        20
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::Safety
    }

    fn matches(&self, event: &Event) -> bool {
        bash_command(event).is_some_and(|cmd| STASH_CREATE.is_match(cmd))
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let command = bash_command(event).unwrap_or_default();
        if !self.escape_phrase.is_empty() && command.contains(&self.escape_phrase) {
            return Ok(Decision::allow());
        }

        Ok(Decision::deny(format!(
            "BLOCKED: git stash is dangerous\n\n\
             Reason: stashes get lost, forgotten, or accidentally dropped, \
             especially in worktree-based workflows.\n\n\
             SAFE alternatives:\n  \
               - git commit -m 'WIP: description'  (proper version control)\n  \
               - git checkout -b experiment/name   (new branch for experiments)\n  \
               - git worktree add ../worktree-name (parallel work)\n  \
               - git add -p                        (stage specific changes)\n\n\
             ESCAPE HATCH (if truly necessary):\n  \
               git stash  # {}",
            self.escape_phrase
        )))
    }
}
