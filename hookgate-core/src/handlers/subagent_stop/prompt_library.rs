use async_trait::async_trait;

use crate::engine::{Decision, Event, FailureMode, Handler, HandlerCategory, HandlerError};

/// Reminds the agent to keep prompts that worked
///
/// Matches every sub-agent stop, so it is the fallback of its registry.
pub struct PromptLibraryHandler;

#[async_trait]
impl Handler for PromptLibraryHandler {
    fn name(&self) -> &str {
        "remind-prompt-library"
    }

    fn priority(&self) -> u8 {
        45
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::Workflow
    }

    fn failure_mode(&self) -> FailureMode {
        FailureMode::Advisory
    }

    fn matches(&self, _event: &Event) -> bool {
        true
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let agent = event
            .str_param("agent_type")
            .or_else(|| event.str_param("subagent_type"))
            .or(event.session().transcript.last_task_agent.as_deref())
            .unwrap_or("unknown");

        Ok(Decision::allow_with_context(format!(
            "💡 Sub-agent '{agent}' completed.\n\n\
             If this prompt worked well, consider capturing it:\n  \
               npm run llm:prompts -- add --from-json <prompt-file>\n\n\
             Benefits:\n  \
               • Reuse successful prompts later\n  \
               • Track what works (metrics)\n  \
               • Build institutional knowledge\n\n\
             📖 See: CLAUDE/PromptLibrary/README.md"
        )))
    }
}
