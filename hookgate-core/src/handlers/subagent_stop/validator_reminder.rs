use async_trait::async_trait;

use crate::engine::{Decision, Event, FailureMode, Handler, HandlerCategory, HandlerError};

/// The check that closes the loop after a builder agent
struct Validation {
    builder: &'static str,
    validator: &'static str,
    description: &'static str,
    target: &'static str,
    prompt: &'static str,
    model: &'static str,
}

const VALIDATIONS: [Validation; 7] = [
    Validation {
        builder: "sitemap-modifier",
        validator: "sitemap-validator",
        description: "sitemap modifications",
        target: "CLAUDE/Sitemap/ files",
        prompt: "Validate all sitemap files in CLAUDE/Sitemap/",
        model: "haiku",
    },
    Validation {
        builder: "page-implementer",
        validator: "page-technical-reviewer",
        description: "page implementation",
        target: "Implemented page (ESLint, TSC, component usage)",
        prompt: "Review the page implementation at [page-path]",
        model: "sonnet",
    },
    Validation {
        builder: "page-content-updater",
        validator: "page-humanizer",
        description: "page content updates",
        target: "Page prose and content (removes LLM tells)",
        prompt: "Humanize content on the page at [page-path]",
        model: "sonnet",
    },
    Validation {
        builder: "eslint-fixer",
        validator: "eslint-assessor",
        description: "ESLint fixes",
        target: "Fixed files (re-run ESLint, check quality)",
        prompt: "Verify ESLint fixes and assess quality",
        model: "haiku",
    },
    Validation {
        builder: "typescript-refactor",
        validator: "qa-runner",
        description: "TypeScript refactoring",
        target: "Refactored code (ESLint, TypeScript, tests)",
        prompt: "Run QA checks on refactored code (ESLint + TypeScript)",
        model: "haiku",
    },
    Validation {
        builder: "typescript-react-component-builder",
        validator: "qa-runner",
        description: "React component creation",
        target: "New component (ESLint, TypeScript, tests)",
        prompt: "Run QA checks on new component (ESLint + TypeScript)",
        model: "haiku",
    },
    Validation {
        builder: "typescript-specialist",
        validator: "qa-runner",
        description: "TypeScript feature implementation",
        target: "New TypeScript code (ESLint, TypeScript, tests)",
        prompt: "Run QA checks on new TypeScript code (ESLint + TypeScript + tests)",
        model: "haiku",
    },
];

/// After a builder sub-agent finishes, point the agent at its validator
pub struct ValidatorReminderHandler;

impl ValidatorReminderHandler {
    fn validation_for(event: &Event) -> Option<&'static Validation> {
        let agent = event.session().transcript.last_task_agent.as_deref()?;
        VALIDATIONS.iter().find(|v| v.builder == agent)
    }
}

#[async_trait]
impl Handler for ValidatorReminderHandler {
    fn name(&self) -> &str {
        "remind-validator"
    }

    fn priority(&self) -> u8 {
        30
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::Workflow
    }

    fn failure_mode(&self) -> FailureMode {
        FailureMode::Advisory
    }

    fn matches(&self, event: &Event) -> bool {
        Self::validation_for(event).is_some()
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let Some(v) = Self::validation_for(event) else {
            return Ok(Decision::allow());
        };

        Ok(Decision::allow_with_context(format!(
            "✅ {builder} agent completed\n\n\
             ⚠️ RECOMMENDED NEXT STEP: Validate the {description}\n\n\
             Run {validator} agent:\n  \
               Task tool:\n    \
                 subagent_type: {validator}\n    \
                 prompt: {prompt}\n    \
                 model: {model}\n\n\
             This completes the build→check workflow loop.\n\n\
             Target: {target}\n\n\
             If using an orchestration skill, validation runs automatically.\n\
             If called {builder} directly, you should validate manually.",
            builder = v.builder,
            description = v.description,
            validator = v.validator,
            prompt = v.prompt,
            model = v.model,
            target = v.target,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{SessionContext, TranscriptDigest, Verdict};
    use crate::harness::types::HookEventName;

    fn stop_after(agent: Option<&str>) -> Event {
        Event::new(HookEventName::SubagentStop, "SubagentStop")
            .unwrap()
            .with_session(SessionContext {
                transcript: TranscriptDigest {
                    last_assistant_text: None,
                    last_task_agent: agent.map(str::to_string),
                },
                ..Default::default()
            })
    }

    #[test]
    fn test_matches_only_builders() {
        let handler = ValidatorReminderHandler;
        assert!(handler.matches(&stop_after(Some("sitemap-modifier"))));
        assert!(handler.matches(&stop_after(Some("typescript-specialist"))));
        assert!(!handler.matches(&stop_after(Some("sitemap-validator"))));
        assert!(!handler.matches(&stop_after(Some("general-purpose"))));
        assert!(!handler.matches(&stop_after(None)));
    }

    #[tokio::test]
    async fn test_names_matching_validator() {
        let decision = ValidatorReminderHandler
            .handle(&stop_after(Some("eslint-fixer")))
            .await
            .unwrap();
        assert_eq!(decision.verdict(), Verdict::Allow);
        let context = decision.context().unwrap();
        assert!(context.contains("eslint-fixer agent completed"));
        assert!(context.contains("subagent_type: eslint-assessor"));
        assert!(context.contains("Validate the ESLint fixes"));
    }

    #[test]
    fn test_builders_are_unique() {
        for (i, v) in VALIDATIONS.iter().enumerate() {
            assert!(VALIDATIONS[i + 1..].iter().all(|other| other.builder != v.builder));
        }
    }
}
