//! Dispatcher properties: ordering, containment of handler failures,
//! deadlines, hot reload, and concurrent dispatch.

mod common;

use common::*;
use futures::future::join_all;
use hookgate_core::engine::{
    Decision, DecisionSource, Dispatcher, Registry, RegistryError, TimeoutPolicy, Verdict,
};
use hookgate_core::harness::types::HookEventName;
use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn dispatcher(handlers: Vec<Scripted>) -> Dispatcher {
    let builder = handlers
        .into_iter()
        .fold(Registry::builder(HookEventName::PreToolUse), |b, h| b.register(h));
    Dispatcher::new(builder.build().unwrap())
}

#[tokio::test]
async fn test_empty_registry_allows_everything() {
    init_test_logging();
    let dispatcher = Dispatcher::new(Registry::empty(HookEventName::PreToolUse));

    for tool in ["Bash", "Write", "Read", "mcp__github__create_issue"] {
        let decision = dispatcher.dispatch(&tool_event(tool)).await;
        assert!(decision.is_silent_allow());
        assert_eq!(decision.source(), &DecisionSource::Default);
    }
}

#[tokio::test]
async fn test_only_the_first_match_runs() {
    init_test_logging();
    let first = Scripted::new("first", 10, Behaviour::Decide(Decision::deny("first")));
    let second = Scripted::new("second", 30, Behaviour::Decide(Decision::ask("second")));
    let (first_calls, second_calls) = (first.counter(), second.counter());

    // Registered out of priority order on purpose
    let dispatcher = dispatcher(vec![second, first]);
    let decision = dispatcher.dispatch(&tool_event("Bash")).await;

    assert_eq!(decision.reason(), Some("first"));
    assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_equal_priority_resolves_by_registration_order() {
    let a = Scripted::new("registered-first", 20, Behaviour::Decide(Decision::deny("a")));
    let b = Scripted::new("registered-second", 20, Behaviour::Decide(Decision::deny("b")));

    let decision = dispatcher(vec![a, b]).dispatch(&tool_event("Bash")).await;
    assert_eq!(
        decision.source(),
        &DecisionSource::Handler("registered-first".to_string())
    );
}

#[tokio::test]
async fn test_non_matching_handlers_are_skipped() {
    let writes = Scripted::new("writes", 5, Behaviour::Decide(Decision::deny("w")))
        .for_tools(&["Write", "Edit"]);
    let bash = Scripted::new("bash", 40, Behaviour::Decide(Decision::ask("b")))
        .for_tools(&["Bash"]);
    let dispatcher = dispatcher(vec![writes, bash]);

    assert_eq!(dispatcher.dispatch(&tool_event("Bash")).await.verdict(), Verdict::Ask);
    assert_eq!(dispatcher.dispatch(&tool_event("Edit")).await.verdict(), Verdict::Deny);
    assert!(dispatcher.dispatch(&tool_event("Read")).await.is_silent_allow());
}

#[tokio::test]
async fn test_predicate_panic_is_no_match() {
    init_test_logging();
    let broken = Scripted::new("broken-predicate", 5, Behaviour::Decide(Decision::deny("x")))
        .panicking_predicate();
    let next = Scripted::new("next", 50, Behaviour::Decide(Decision::ask("next")));
    let broken_calls = broken.counter();

    let decision = dispatcher(vec![broken, next]).dispatch(&tool_event("Bash")).await;
    assert_eq!(decision.verdict(), Verdict::Ask);
    assert_eq!(decision.source(), &DecisionSource::Handler("next".to_string()));
    assert_eq!(broken_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_fail_closed_handler_failure_is_internal_error_deny() {
    init_test_logging();
    for behaviour in [Behaviour::Fail, Behaviour::Panic] {
        let handler = Scripted::new("strict", 10, behaviour);
        let decision = dispatcher(vec![handler]).dispatch(&tool_event("Bash")).await;

        assert_eq!(decision.verdict(), Verdict::Deny);
        assert!(decision.is_internal_error());
        assert!(decision.reason().unwrap().contains("strict"));
        assert_eq!(decision.guidance(), None);
    }
}

#[tokio::test]
async fn test_advisory_handler_failure_allows() {
    for behaviour in [Behaviour::Fail, Behaviour::Panic] {
        let handler = Scripted::new("soft", 45, behaviour).advisory();
        let decision = dispatcher(vec![handler]).dispatch(&tool_event("Bash")).await;

        assert_eq!(decision.verdict(), Verdict::Allow);
        assert_eq!(decision.guidance(), None);
        assert!(!decision.is_internal_error());
    }
}

#[tokio::test]
async fn test_dispatcher_survives_a_panicking_handler() {
    let handler = Scripted::new("flaky", 10, Behaviour::Panic).for_tools(&["Bash"]);
    let dispatcher = dispatcher(vec![handler]);

    assert!(dispatcher.dispatch(&tool_event("Bash")).await.is_internal_error());
    assert!(dispatcher.dispatch(&tool_event("Read")).await.is_silent_allow());
    assert!(dispatcher.dispatch(&tool_event("Bash")).await.is_internal_error());
}

#[tokio::test]
async fn test_deadline_overrun_is_a_failure() {
    let slow = Scripted::new(
        "slow",
        10,
        Behaviour::Sleep(Duration::from_secs(10), Decision::allow()),
    );
    let registry = Registry::builder(HookEventName::PreToolUse)
        .register(slow)
        .timeouts(TimeoutPolicy::new(Duration::from_millis(50)))
        .build()
        .unwrap();

    let decision = Dispatcher::new(registry).dispatch(&tool_event("Bash")).await;
    assert!(decision.is_internal_error());
    assert!(decision.reason().unwrap().contains("timed out after 50ms"));
}

#[tokio::test]
async fn test_per_handler_deadline_override() {
    let patient = Scripted::new(
        "patient",
        10,
        Behaviour::Sleep(Duration::from_millis(100), Decision::deny("done waiting")),
    );
    let registry = Registry::builder(HookEventName::PreToolUse)
        .register(patient)
        .timeouts(
            TimeoutPolicy::new(Duration::from_millis(20))
                .with_override("patient", Duration::from_secs(5)),
        )
        .build()
        .unwrap();

    let decision = Dispatcher::new(registry).dispatch(&tool_event("Bash")).await;
    assert_eq!(decision.reason(), Some("done waiting"));
    assert!(!decision.is_internal_error());
}

#[tokio::test]
async fn test_guidance_is_returned_once_and_verbatim() {
    let guidance = "Remember to add Success Criteria.\n\n  - indented line";
    let handler = Scripted::new(
        "guide",
        45,
        Behaviour::Decide(Decision::allow_with_guidance(guidance)),
    )
    .advisory();

    let decision = dispatcher(vec![handler]).dispatch(&tool_event("Write")).await;
    assert_eq!(decision.verdict(), Verdict::Allow);
    assert_eq!(decision.guidance(), Some(guidance));
    assert_eq!(decision.reason(), None);
}

#[test]
fn test_out_of_band_priority_fails_build() {
    let mut misplaced = Scripted::new("misplaced", 30, Behaviour::Decide(Decision::allow()));
    misplaced.category = hookgate_core::engine::HandlerCategory::Safety;

    let err = Registry::builder(HookEventName::PreToolUse)
        .register(misplaced)
        .build()
        .unwrap_err();
    assert!(matches!(err, RegistryError::PriorityOutOfBand { priority: 30, .. }));
}

#[tokio::test]
async fn test_reload_does_not_disturb_dispatch_in_flight() {
    let slow_old = Scripted::new(
        "old",
        10,
        Behaviour::Sleep(Duration::from_millis(200), Decision::deny("old registry")),
    );
    let dispatcher = Arc::new(dispatcher(vec![slow_old]));

    let in_flight = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.dispatch(&tool_event("Bash")).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    dispatcher.reload(
        Registry::builder(HookEventName::PreToolUse)
            .register(Scripted::new("new", 10, Behaviour::Decide(Decision::ask("new registry"))))
            .build()
            .unwrap(),
    );

    assert_eq!(in_flight.await.unwrap().reason(), Some("old registry"));
    assert_eq!(
        dispatcher.dispatch(&tool_event("Bash")).await.reason(),
        Some("new registry")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dispatches_are_independent() {
    let bash = Scripted::new(
        "bash",
        10,
        Behaviour::Sleep(Duration::from_millis(20), Decision::deny("bash")),
    )
    .for_tools(&["Bash"]);
    let write = Scripted::new(
        "write",
        30,
        Behaviour::Sleep(Duration::from_millis(5), Decision::ask("write")),
    )
    .for_tools(&["Write"]);
    let bash_calls = bash.counter();
    let dispatcher = dispatcher(vec![bash, write]);

    let tools: Vec<&str> = (0..64)
        .map(|i| match i % 3 {
            0 => "Bash",
            1 => "Write",
            _ => "Read",
        })
        .collect();
    let events: Vec<_> = tools.iter().map(|tool| tool_event(tool)).collect();
    let decisions = join_all(events.iter().map(|event| dispatcher.dispatch(event))).await;

    for (tool, decision) in tools.iter().zip(&decisions) {
        let expected = match *tool {
            "Bash" => Verdict::Deny,
            "Write" => Verdict::Ask,
            _ => Verdict::Allow,
        };
        assert_eq!(decision.verdict(), expected, "{tool}");
    }
    assert_eq!(bash_calls.load(Ordering::SeqCst), 22);
}
