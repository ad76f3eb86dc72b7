//! Test helper functions for integration tests
//!
//! Shared across the test files in this directory via the tests/common/
//! pattern. Not every test file uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use hookgate_core::engine::{
    Decision, Event, FailureMode, Handler, HandlerCategory, HandlerError, SessionContext,
};
use hookgate_core::harness::types::HookEventName;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// What a [`Scripted`] handler does once it wins the dispatch
#[derive(Clone)]
pub enum Behaviour {
    Decide(Decision),
    Fail,
    Panic,
    Sleep(Duration, Decision),
}

/// Configurable handler for dispatcher property tests
pub struct Scripted {
    pub name: &'static str,
    pub priority: u8,
    pub category: HandlerCategory,
    pub failure_mode: FailureMode,
    /// Tool names this handler claims; empty claims every event
    pub tools: &'static [&'static str],
    pub panic_in_matches: bool,
    pub behaviour: Behaviour,
    /// Number of times `handle` ran
    pub calls: Arc<AtomicUsize>,
}

impl Scripted {
    pub fn new(name: &'static str, priority: u8, behaviour: Behaviour) -> Self {
        let category = [
            HandlerCategory::Structural,
            HandlerCategory::Safety,
            HandlerCategory::Workflow,
            HandlerCategory::ToolUsage,
        ]
        .into_iter()
        .find(|c| c.priority_band().contains(&priority))
        .unwrap_or(HandlerCategory::ToolUsage);

        Self {
            name,
            priority,
            category,
            failure_mode: FailureMode::FailClosed,
            tools: &[],
            panic_in_matches: false,
            behaviour,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn for_tools(mut self, tools: &'static [&'static str]) -> Self {
        self.tools = tools;
        self
    }

    pub fn advisory(mut self) -> Self {
        self.failure_mode = FailureMode::Advisory;
        self
    }

    pub fn panicking_predicate(mut self) -> Self {
        self.panic_in_matches = true;
        self
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Handler for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn category(&self) -> HandlerCategory {
        self.category
    }

    fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    fn matches(&self, event: &Event) -> bool {
        if self.panic_in_matches {
            panic!("predicate of {} exploded", self.name);
        }
        self.tools.is_empty() || event.is_tool(self.tools)
    }

    async fn handle(&self, _event: &Event) -> Result<Decision, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            Behaviour::Decide(decision) => Ok(decision.clone()),
            Behaviour::Fail => Err(HandlerError::Other("scripted failure".to_string())),
            Behaviour::Panic => panic!("handler {} exploded", self.name),
            Behaviour::Sleep(duration, decision) => {
                tokio::time::sleep(*duration).await;
                Ok(decision.clone())
            }
        }
    }
}

pub fn tool_event(tool: &str) -> Event {
    Event::new(HookEventName::PreToolUse, tool).unwrap()
}

/// Claude Code PreToolUse payload
pub fn pre_tool_use(tool: &str, input: serde_json::Value) -> String {
    serde_json::json!({
        "session_id": "test-session",
        "hook_event_name": "PreToolUse",
        "tool_name": tool,
        "tool_input": input,
    })
    .to_string()
}

pub fn session_in(project: &Path) -> SessionContext {
    SessionContext {
        project_dir: Some(project.to_path_buf()),
        cwd: Some(project.to_path_buf()),
        ..Default::default()
    }
}
