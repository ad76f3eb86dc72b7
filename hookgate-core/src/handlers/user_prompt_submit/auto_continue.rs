use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::engine::{Decision, Event, FailureMode, Handler, HandlerCategory, HandlerError};
use crate::handlers::static_regex;

const MINIMAL_RESPONSES: [&str; 13] = [
    "yes", "y", "yep", "yeah", "ok", "okay", "continue", "proceed", "go ahead", "sure", "go",
    "do it", "yes please",
];

/// Phrases the agent uses when it stops to ask for permission
static CONFIRMATION_QUESTIONS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"would you like me to (?:continue|proceed|start|begin|launch|execute|run|move (?:on|forward))",
        r"(?:should|shall|may|can) I (?:continue|proceed|start|begin|launch|execute|run)",
        r"do you want me to (?:continue|proceed|start|begin)",
        r"ready (?:for me )?to (?:continue|proceed|start|implement|execute|run)",
        r"(?:would you (?:like|prefer)|do you want) to review",
        r"shall we (?:continue|proceed|move on)",
        r"or (?:would you (?:like|prefer)|should I)",
        r"(?:would you like|do you want) (?:me )?to",
        r"continue with (?:batch|phase|step)",
        r"(?:would you like|shall I proceed).+(?:batch|phase|step)",
    ]
    .into_iter()
    .map(|pattern| static_regex(&format!("(?i){pattern}")))
    .collect()
});

/// Words that make a trailing question a confirmation request
const CONFIRMATION_WORDS: [&str; 14] = [
    "would you", "should i", "shall i", "do you want", "may i", "can i", "ready", "prefer",
    "like me to", "want me to", "continue", "proceed", "start", "begin",
];

/// Only the tail of a message is checked for a trailing question
const TAIL_CHARS: usize = 300;

/// Turns a bare "yes" after a confirmation question into an instruction to
/// carry on without asking again
pub struct AutoContinueHandler;

impl AutoContinueHandler {
    fn is_minimal_response(prompt: &str) -> bool {
        let prompt = prompt.trim().to_lowercase();
        MINIMAL_RESPONSES.contains(&prompt.as_str())
    }

    fn asks_for_confirmation(text: &str) -> bool {
        if CONFIRMATION_QUESTIONS.iter().any(|pattern| pattern.is_match(text)) {
            return true;
        }

        let tail_start = text
            .char_indices()
            .rev()
            .nth(TAIL_CHARS.saturating_sub(1))
            .map_or(0, |(idx, _)| idx);
        let tail = text[tail_start..].to_lowercase();
        tail.contains('?') && CONFIRMATION_WORDS.iter().any(|word| tail.contains(word))
    }
}

#[async_trait]
impl Handler for AutoContinueHandler {
    fn name(&self) -> &str {
        "auto-continue"
    }

    fn priority(&self) -> u8 {
        25
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::Workflow
    }

    fn failure_mode(&self) -> FailureMode {
        FailureMode::Advisory
    }

    fn matches(&self, event: &Event) -> bool {
        let Some(prompt) = event.str_param("prompt") else {
            return false;
        };
        Self::is_minimal_response(prompt)
            && event
                .session()
                .transcript
                .last_assistant_text
                .as_deref()
                .is_some_and(Self::asks_for_confirmation)
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let prompt = event.str_param("prompt").unwrap_or_default().trim();

        Ok(Decision::allow_with_context(format!(
            "User replied \"{prompt}\" to your confirmation question.\n\n\
             [AUTO-CONTINUE MODE: YES, continue with ALL remaining work. \
             Do NOT ask for confirmation again. Proceed through all \
             batches/phases/steps automatically. Only stop on an error or \
             when critical information is missing.]"
        )))
    }
}
