use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::engine::{Decision, Event, Handler, HandlerCategory, HandlerError};
use crate::handlers::{bash_command, file_content, file_path, static_regex};

static SED_WORD: Lazy<Regex> = Lazy::new(|| static_regex(r"(?i)\bsed\b"));

/// Blocks `sed`, both run directly and embedded in shell scripts being written
///
/// Markdown is exempt so documentation can still talk about it.
pub struct SedBlockerHandler;

impl SedBlockerHandler {
    fn is_shell_script(path: &str) -> bool {
        path.ends_with(".sh") || path.ends_with(".bash")
    }
}

#[async_trait]
impl Handler for SedBlockerHandler {
    fn name(&self) -> &str {
        "block-sed-command"
    }

    fn priority(&self) -> u8 {
        10
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::Safety
    }

    fn matches(&self, event: &Event) -> bool {
        match event.tool_name() {
            "Bash" => bash_command(event).is_some_and(|cmd| SED_WORD.is_match(cmd)),
            "Write" => {
                let Some(path) = file_path(event) else {
                    return false;
                };
                !path.ends_with(".md")
                    && Self::is_shell_script(path)
                    && file_content(event).is_some_and(|body| SED_WORD.is_match(body))
            }
            _ => false,
        }
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let (kind, blocked) = match bash_command(event) {
            Some(command) => ("command", command),
            None => ("script", file_path(event).unwrap_or_default()),
        };

        Ok(Decision::deny(format!(
            "🚫 BLOCKED: sed command detected\n\n\
             sed is forbidden here: one bad expression run across many files \
             corrupts them in place, irreversibly.\n\n\
             BLOCKED {kind}: {blocked}\n\n\
             ✅ INSTEAD:\n  \
               1. List the files to update\n  \
               2. Dispatch one agent per file\n  \
               3. Use the Edit tool (atomic, reviewable, git-trackable)\n\n\
             EXAMPLE:\n  \
               Bad:  find . -name \"*.ts\" -exec sed -i 's/foo/bar/g' {{}} \\;\n  \
               Good: one Edit per file"
        )))
    }
}
