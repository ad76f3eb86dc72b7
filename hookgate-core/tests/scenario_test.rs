//! End-to-end scenarios: raw Claude Code payloads through the engine with
//! the built-in handler registries, out to the hook response.

mod common;

use common::*;
use hookgate_core::bootstrap::RegistrySet;
use hookgate_core::engine::{
    Decision, DecisionSource, Engine, HookgateConfig, Registry, Verdict,
};
use hookgate_core::handlers::pre_tool_use::SystemPathsHandler;
use hookgate_core::harness::types::HookEventName;
use hookgate_core::harness::{AdapterEnv, ClaudeHarness, EXIT_ALLOW, EXIT_DENY};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::io::Write as _;
use std::path::PathBuf;
use tempfile::{NamedTempFile, TempDir};

fn default_engine() -> Engine {
    Engine::from_settings(&HookgateConfig::default()).unwrap()
}

fn env_for(project: impl Into<PathBuf>) -> AdapterEnv {
    AdapterEnv {
        project_dir: Some(project.into()),
        remote: false,
    }
}

fn handler_of(decision: &Decision) -> Option<&str> {
    match decision.source() {
        DecisionSource::Handler(name) => Some(name),
        _ => None,
    }
}

#[tokio::test]
async fn test_write_to_etc_is_denied_with_project_alternative() {
    init_test_logging();
    let engine = default_engine();
    let input = pre_tool_use("Write", json!({"file_path": "/etc/hosts", "content": "x"}));

    let decision = engine
        .evaluate_input(HookEventName::PreToolUse, &input, &AdapterEnv::default())
        .await;
    assert_eq!(decision.verdict(), Verdict::Deny);
    assert_eq!(handler_of(&decision), Some("validate-system-paths"));
    let reason = decision.reason().unwrap();
    assert!(reason.contains("/etc/hosts"));
    assert!(reason.contains("files/etc/hosts"));

    let output = ClaudeHarness::format_response(HookEventName::PreToolUse, &decision).unwrap();
    assert_eq!(output.exit_code, EXIT_DENY);
    let stdout: Value = serde_json::from_str(&output.stdout).unwrap();
    assert_eq!(stdout["hookSpecificOutput"]["permissionDecision"], "deny");
    assert_eq!(
        stdout["hookSpecificOutput"]["permissionDecisionReason"],
        reason
    );
    let diagnostic: Value = serde_json::from_str(output.stderr.as_deref().unwrap()).unwrap();
    assert_eq!(diagnostic["handler"], "validate-system-paths");
    assert_eq!(diagnostic["internal_error"], false);
}

#[tokio::test]
async fn test_agent_reported_cwd_does_not_exempt_system_paths() {
    let engine = default_engine();
    for cwd in ["/etc", "/"] {
        let input = json!({
            "hook_event_name": "PreToolUse",
            "cwd": cwd,
            "tool_name": "Write",
            "tool_input": {"file_path": "/etc/hosts", "content": "x"}
        })
        .to_string();

        let decision = engine
            .evaluate_input(HookEventName::PreToolUse, &input, &AdapterEnv::default())
            .await;
        assert_eq!(decision.verdict(), Verdict::Deny, "cwd {cwd}");
        assert_eq!(handler_of(&decision), Some("validate-system-paths"));
    }
}

#[tokio::test]
async fn test_write_outside_blocked_prefix_falls_through() {
    let mut registries = RegistrySet::default();
    registries.insert(
        Registry::builder(HookEventName::PreToolUse)
            .register(SystemPathsHandler::new(vec!["/etc/".to_string()]))
            .build()
            .unwrap(),
    );
    let engine = Engine::from_registries(registries);
    let input = pre_tool_use("Write", json!({"file_path": "/home/user/project/notes.md"}));

    let decision = engine
        .evaluate_input(HookEventName::PreToolUse, &input, &AdapterEnv::default())
        .await;
    assert!(decision.is_silent_allow());
    assert_eq!(decision.source(), &DecisionSource::Default);
}

#[tokio::test]
async fn test_home_prefix_depends_on_project_root() {
    let engine = default_engine();
    let input = pre_tool_use(
        "Write",
        json!({"file_path": "/home/user/project/notes.md", "content": "notes"}),
    );

    // Outside any known project, /home/ is a blocked system prefix
    let outside = engine
        .evaluate_input(HookEventName::PreToolUse, &input, &AdapterEnv::default())
        .await;
    assert_eq!(handler_of(&outside), Some("validate-system-paths"));

    // Inside the project the system-path check steps aside; the markdown
    // placement rule is the one that objects
    let inside = engine
        .evaluate_input(
            HookEventName::PreToolUse,
            &input,
            &env_for("/home/user/project"),
        )
        .await;
    assert_eq!(handler_of(&inside), Some("enforce-markdown-organization"));
}

#[tokio::test]
async fn test_plan_guidance_reaches_agent_unmodified() {
    let project = TempDir::new().unwrap();
    let settings = HookgateConfig {
        disabled: vec!["validate-plan-number".to_string()],
        ..Default::default()
    };
    let engine = Engine::from_settings(&settings).unwrap();
    let input = pre_tool_use(
        "Write",
        json!({"file_path": "CLAUDE/Plan/004-auth/plan.md", "content": "# Auth plan\n"}),
    );

    let decision = engine
        .evaluate_input(HookEventName::PreToolUse, &input, &env_for(project.path()))
        .await;
    assert_eq!(decision.verdict(), Verdict::Allow);
    assert_eq!(handler_of(&decision), Some("plan-workflow-guidance"));
    let guidance = decision.guidance().unwrap().to_string();
    assert!(guidance.contains("Success Criteria"));

    let output = ClaudeHarness::format_response(HookEventName::PreToolUse, &decision).unwrap();
    assert_eq!(output.exit_code, EXIT_ALLOW);
    let stdout: Value = serde_json::from_str(&output.stdout).unwrap();
    assert_eq!(stdout["hookSpecificOutput"]["guidance"], guidance.as_str());
    let context = stdout["hookSpecificOutput"]["additionalContext"].as_str().unwrap();
    assert!(context.contains("GUIDANCE from handler 'plan-workflow-guidance'"));
    assert!(context.contains(&guidance));
    assert_eq!(context.matches(&guidance).count(), 1);
}

#[tokio::test]
async fn test_advisory_linter_failure_fails_open() {
    let project = TempDir::new().unwrap();
    std::fs::create_dir_all(project.path().join("src")).unwrap();
    std::fs::write(project.path().join("src/app.ts"), "export const a = 1;\n").unwrap();

    let mut settings = HookgateConfig::default();
    settings.lint.eslint_command = "no-such-eslint-wrapper-xyz".to_string();
    let engine = Engine::from_settings(&settings).unwrap();

    let input = json!({
        "hook_event_name": "PostToolUse",
        "tool_name": "Write",
        "tool_input": {"file_path": "src/app.ts", "content": "export const a = 1;\n"},
        "tool_response": {"success": true}
    })
    .to_string();
    let decision = engine
        .evaluate_input(HookEventName::PostToolUse, &input, &env_for(project.path()))
        .await;

    assert_eq!(decision.verdict(), Verdict::Allow);
    assert_eq!(decision.guidance(), None);
    assert!(!decision.is_internal_error());
    assert_eq!(
        decision.source(),
        &DecisionSource::HandlerFailure("validate-eslint-on-write".to_string())
    );
}

#[tokio::test]
async fn test_destructive_git_and_idempotence() {
    let engine = default_engine();
    let input = pre_tool_use("Bash", json!({"command": "git reset --hard HEAD~3"}));
    let env = AdapterEnv::default();

    let first = engine
        .evaluate_input(HookEventName::PreToolUse, &input, &env)
        .await;
    let second = engine
        .evaluate_input(HookEventName::PreToolUse, &input, &env)
        .await;
    assert_eq!(first.verdict(), Verdict::Deny);
    assert_eq!(handler_of(&first), Some("prevent-destructive-git"));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_unrelated_tools_are_silent() {
    let engine = default_engine();
    let env = AdapterEnv::default();

    for (tool, input) in [
        ("Read", json!({"file_path": "src/main.rs"})),
        ("Bash", json!({"command": "ls -la"})),
        ("Grep", json!({"pattern": "TODO"})),
    ] {
        let decision = engine
            .evaluate_input(HookEventName::PreToolUse, &pre_tool_use(tool, input), &env)
            .await;
        assert!(decision.is_silent_allow(), "{tool}");
    }

    let stop = engine
        .evaluate_input(HookEventName::Stop, r#"{"hook_event_name":"Stop"}"#, &env)
        .await;
    assert!(stop.is_silent_allow());
}

fn transcript(lines: &[Value]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file
}

#[tokio::test]
async fn test_minimal_reply_after_question_auto_continues() {
    let engine = default_engine();
    let file = transcript(&[json!({
        "type": "assistant",
        "message": {"role": "assistant", "content": [
            {"type": "text", "text": "Phase 1 complete. Would you like me to continue with phase 2?"}
        ]}
    })]);
    let input = json!({
        "hook_event_name": "UserPromptSubmit",
        "transcript_path": file.path(),
        "prompt": "yes"
    })
    .to_string();

    let decision = engine
        .evaluate_input(HookEventName::UserPromptSubmit, &input, &AdapterEnv::default())
        .await;
    assert_eq!(handler_of(&decision), Some("auto-continue"));
    assert!(decision.context().unwrap().contains("AUTO-CONTINUE MODE"));
}

#[tokio::test]
async fn test_subagent_stop_reminders() {
    let engine = default_engine();
    let builder = transcript(&[json!({
        "type": "message",
        "message": {"role": "assistant", "content": [
            {"type": "tool_use", "name": "Task", "input": {"subagent_type": "sitemap-modifier"}}
        ]}
    })]);
    let input = |path: &std::path::Path| {
        json!({"hook_event_name": "SubagentStop", "transcript_path": path}).to_string()
    };

    let after_builder = engine
        .evaluate_input(
            HookEventName::SubagentStop,
            &input(builder.path()),
            &AdapterEnv::default(),
        )
        .await;
    assert_eq!(handler_of(&after_builder), Some("remind-validator"));
    assert!(after_builder.context().unwrap().contains("sitemap-validator"));

    let plain = transcript(&[]);
    let after_other = engine
        .evaluate_input(
            HookEventName::SubagentStop,
            &input(plain.path()),
            &AdapterEnv::default(),
        )
        .await;
    assert_eq!(handler_of(&after_other), Some("remind-prompt-library"));
}

#[tokio::test]
async fn test_workflow_survives_compaction() {
    let project = TempDir::new().unwrap();
    std::fs::write(
        project.path().join("CLAUDE.local.md"),
        "## WORKFLOW STATE\nWorkflow: Page Build\nPhase: 3/6 - Review\n@CLAUDE/PageBuild.md\n",
    )
    .unwrap();
    let engine = default_engine();
    let env = env_for(project.path());

    let before = engine
        .evaluate_input(
            HookEventName::PreCompact,
            r#"{"hook_event_name":"PreCompact","trigger":"auto"}"#,
            &env,
        )
        .await;
    assert!(before.is_silent_allow());
    assert!(project.path().join("untracked/workflow-state/page-build").is_dir());

    let startup = engine
        .evaluate_input(
            HookEventName::SessionStart,
            r#"{"hook_event_name":"SessionStart","source":"startup"}"#,
            &env,
        )
        .await;
    assert!(startup.is_silent_allow());

    let resumed = engine
        .evaluate_input(
            HookEventName::SessionStart,
            r#"{"hook_event_name":"SessionStart","source":"compact"}"#,
            &env,
        )
        .await;
    assert_eq!(handler_of(&resumed), Some("workflow-state-restoration"));

    let output = ClaudeHarness::format_response(HookEventName::SessionStart, &resumed).unwrap();
    assert_eq!(output.exit_code, EXIT_ALLOW);
    let stdout: Value = serde_json::from_str(&output.stdout).unwrap();
    let context = stdout["hookSpecificOutput"]["additionalContext"].as_str().unwrap();
    assert!(context.contains("Workflow: Page Build"));
    assert!(context.contains("Phase: 3/6 - Review"));
    assert!(context.contains("@CLAUDE/PageBuild.md"));
}
