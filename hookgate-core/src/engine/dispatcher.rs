//! Front controller - resolves exactly one [`Decision`] per [`Event`].
//!
//! Handlers are walked in frozen priority order and the first one whose
//! predicate matches owns the decision. Nothing a handler does can escape
//! this boundary: predicate panics count as "no match", and execution
//! errors, panics, and timeouts are folded into a decision according to the
//! handler's [`FailureMode`].

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

use super::decision::{Decision, DecisionSource};
use super::event::Event;
use super::handler::{FailureMode, Handler};
use super::registry::{Registry, SharedRegistry};
use super::trace::DispatchTrace;

/// Default execution deadline for a handler
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_millis(5000);

/// Per-handler execution deadlines
#[derive(Debug, Clone, PartialEq)]
pub struct TimeoutPolicy {
    default: Duration,
    overrides: HashMap<String, Duration>,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_HANDLER_TIMEOUT)
    }
}

impl TimeoutPolicy {
    pub fn new(default: Duration) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, handler: impl Into<String>, timeout: Duration) -> Self {
        self.overrides.insert(handler.into(), timeout);
        self
    }

    pub fn for_handler(&self, name: &str) -> Duration {
        self.overrides.get(name).copied().unwrap_or(self.default)
    }
}

/// Why a matched handler produced no decision of its own
#[derive(Debug)]
enum HandlerFailure {
    Error(String),
    Panic(String),
    Timeout(Duration),
    Cancelled,
}

impl std::fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerFailure::Error(msg) => write!(f, "{msg}"),
            HandlerFailure::Panic(msg) => write!(f, "handler panicked: {msg}"),
            HandlerFailure::Timeout(limit) => {
                write!(f, "handler timed out after {}ms", limit.as_millis())
            }
            HandlerFailure::Cancelled => write!(f, "handler task was cancelled"),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Evaluate a predicate, treating a panic as "does not match"
fn evaluate_match(handler: &dyn Handler, event: &Event) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| handler.matches(event))) {
        Ok(matched) => matched,
        Err(payload) => {
            warn!(
                handler = handler.name(),
                panic = %panic_message(payload.as_ref()),
                "Handler predicate panicked; treating as no match"
            );
            false
        }
    }
}

/// Dispatcher for one event kind
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: SharedRegistry,
}

impl Dispatcher {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: SharedRegistry::new(registry),
        }
    }

    pub fn from_shared(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Atomically replace the active registry
    ///
    /// Dispatches already running keep the snapshot they started with.
    pub fn reload(&self, registry: Registry) {
        self.registry.replace(registry);
    }

    /// Resolve one event to a decision. Never fails.
    pub async fn dispatch(&self, event: &Event) -> Decision {
        let registry = self.registry.snapshot();
        let run = DispatchTrace::start(event);

        trace!(
            trace_id = %run.trace_id,
            session_id = %run.session_id,
            event = %event.kind(),
            tool = event.tool_name(),
            candidates = registry.len(),
            "Dispatch started"
        );

        for handler in registry.iter() {
            if !evaluate_match(handler.as_ref(), event) {
                trace!(trace_id = %run.trace_id, handler = handler.name(), "No match");
                continue;
            }

            debug!(
                trace_id = %run.trace_id,
                handler = handler.name(),
                priority = handler.priority(),
                tool = event.tool_name(),
                "Handler matched"
            );

            let deadline = registry.timeouts().for_handler(handler.name());
            let decision = run_handler(Arc::clone(handler), event, deadline).await;

            info!(
                trace_id = %run.trace_id,
                event = %event.kind(),
                handler = handler.name(),
                verdict = %decision.verdict(),
                elapsed_ms = run.elapsed_ms(),
                "Dispatch resolved"
            );
            return decision;
        }

        debug!(
            trace_id = %run.trace_id,
            event = %event.kind(),
            tool = event.tool_name(),
            "No handler matched; default allow"
        );
        Decision::allow()
    }
}

/// Run a matched handler on its own task so panics and overruns stay contained
async fn run_handler(handler: Arc<dyn Handler>, event: &Event, deadline: Duration) -> Decision {
    let name = handler.name().to_string();
    let mode = handler.failure_mode();
    let owned = event.clone();

    let task = tokio::spawn(async move { handler.handle(&owned).await });
    let abort = task.abort_handle();

    let failure = match tokio::time::timeout(deadline, task).await {
        Ok(Ok(Ok(decision))) => {
            return decision.with_source(DecisionSource::Handler(name));
        }
        Ok(Ok(Err(err))) => HandlerFailure::Error(err.to_string()),
        Ok(Err(join_err)) if join_err.is_panic() => {
            HandlerFailure::Panic(panic_message(join_err.into_panic().as_ref()))
        }
        Ok(Err(_)) => HandlerFailure::Cancelled,
        Err(_elapsed) => {
            abort.abort();
            HandlerFailure::Timeout(deadline)
        }
    };

    resolve_failure(&name, mode, failure)
}

fn resolve_failure(name: &str, mode: FailureMode, failure: HandlerFailure) -> Decision {
    match mode {
        FailureMode::Advisory => {
            warn!(
                handler = name,
                failure = %failure,
                "Advisory handler failed; allowing without guidance"
            );
            Decision::allow().with_source(DecisionSource::HandlerFailure(name.to_string()))
        }
        FailureMode::FailClosed => {
            error!(
                handler = name,
                failure = %failure,
                "Handler failed; denying"
            );
            Decision::internal_error(name, &failure)
        }
    }
}
