//! Claude Code hook payloads → [`Event`] envelopes.
//!
//! This is the only place that reads process environment state. Everything
//! a handler needs from it is captured in [`AdapterEnv`] and copied into the
//! event's [`SessionContext`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

use super::types::HookEventName;
use crate::engine::event::{Event, EventError, ParamValue, SessionContext};

/// Environment variable naming the project root
pub const PROJECT_DIR_ENV: &str = "CLAUDE_PROJECT_DIR";

/// Environment variable flagging a remote or sandboxed session
pub const REMOTE_ENV: &str = "CLAUDE_CODE_REMOTE";

/// Ambient process context captured at the adapter boundary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterEnv {
    #[serde(default)]
    pub project_dir: Option<PathBuf>,
    #[serde(default)]
    pub remote: bool,
}

impl AdapterEnv {
    /// Capture `CLAUDE_PROJECT_DIR` and `CLAUDE_CODE_REMOTE`
    pub fn from_process_env() -> Self {
        Self {
            project_dir: std::env::var_os(PROJECT_DIR_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            remote: std::env::var(REMOTE_ENV)
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

/// Convert one decoded hook payload into an event
///
/// Tool events must carry a non-empty `tool_name`; its `tool_input` becomes
/// the parameter map. Lifecycle events use the event name as tool name.
/// Remaining top-level fields (`prompt`, `tool_response`, `agent_type`, ...)
/// are kept as parameters unless they would shadow a tool input key.
pub fn event_from_value(
    kind: HookEventName,
    value: Value,
    env: &AdapterEnv,
) -> Result<Event, EventError> {
    let Value::Object(mut map) = value else {
        return Err(EventError::NotAnObject);
    };

    if let Some(declared) = map.remove("hook_event_name") {
        if declared.as_str() != Some(kind.as_str()) {
            debug!(expected = %kind, declared = %declared, "hook_event_name differs from dispatch target");
        }
    }

    let session = SessionContext {
        session_id: take_string(&mut map, "session_id"),
        transcript_path: take_string(&mut map, "transcript_path").map(PathBuf::from),
        cwd: take_string(&mut map, "cwd").map(PathBuf::from),
        permission_mode: take_string(&mut map, "permission_mode"),
        project_dir: env.project_dir.clone(),
        remote: env.remote,
        transcript: Default::default(),
    };

    let tool_name = match take_string(&mut map, "tool_name") {
        Some(name) if !name.trim().is_empty() => name,
        _ if kind.is_tool_event() => return Err(EventError::MissingToolName),
        _ => kind.as_str().to_string(),
    };

    let mut parameters: BTreeMap<String, ParamValue> = BTreeMap::new();
    match map.remove("tool_input") {
        Some(Value::Object(input)) => {
            parameters.extend(input.into_iter().map(|(k, v)| (k, ParamValue::from(v))));
        }
        Some(Value::Null) | None => {}
        Some(other) => {
            parameters.insert("tool_input".to_string(), other.into());
        }
    }
    for (key, value) in map {
        parameters.entry(key).or_insert_with(|| value.into());
    }

    Ok(Event::new(kind, tool_name)?
        .with_parameters(parameters)
        .with_session(session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::Path;

    fn env() -> AdapterEnv {
        AdapterEnv {
            project_dir: Some(PathBuf::from("/home/user/project")),
            remote: true,
        }
    }

    #[test]
    fn test_pre_tool_use_payload() {
        let event = event_from_value(
            HookEventName::PreToolUse,
            json!({
                "hook_event_name": "PreToolUse",
                "session_id": "s-1",
                "transcript_path": "/tmp/t.jsonl",
                "cwd": "/home/user/project/src",
                "permission_mode": "acceptEdits",
                "tool_name": "Write",
                "tool_input": {"file_path": "/etc/hosts", "content": "127.0.0.1 localhost"},
                "tool_use_id": "toolu_1"
            }),
            &env(),
        )
        .unwrap();

        assert_eq!(event.tool_name(), "Write");
        assert_eq!(event.str_param("file_path"), Some("/etc/hosts"));
        assert_eq!(event.str_param("tool_use_id"), Some("toolu_1"));
        assert_eq!(event.param("session_id"), None);

        let session = event.session();
        assert_eq!(session.session_id.as_deref(), Some("s-1"));
        assert_eq!(session.permission_mode.as_deref(), Some("acceptEdits"));
        assert_eq!(session.project_root(), Some(Path::new("/home/user/project")));
        assert!(session.remote);
    }

    #[test]
    fn test_tool_input_keys_win_over_envelope_keys() {
        let event = event_from_value(
            HookEventName::PostToolUse,
            json!({
                "tool_name": "Edit",
                "tool_input": {"file_path": "a.ts"},
                "file_path": "shadow.ts",
                "tool_response": {"success": true}
            }),
            &AdapterEnv::default(),
        )
        .unwrap();

        assert_eq!(event.str_param("file_path"), Some("a.ts"));
        assert_eq!(
            event
                .param("tool_response")
                .and_then(|r| r.get("success"))
                .and_then(ParamValue::as_bool),
            Some(true)
        );
    }

    #[test]
    fn test_missing_tool_name_on_tool_event() {
        let err = event_from_value(
            HookEventName::PreToolUse,
            json!({"tool_input": {"command": "ls"}}),
            &AdapterEnv::default(),
        )
        .unwrap_err();
        assert_eq!(err, EventError::MissingToolName);

        let err = event_from_value(
            HookEventName::PreToolUse,
            json!({"tool_name": "", "tool_input": {}}),
            &AdapterEnv::default(),
        )
        .unwrap_err();
        assert_eq!(err, EventError::MissingToolName);
    }

    #[test]
    fn test_lifecycle_event_uses_event_name() {
        let event = event_from_value(
            HookEventName::UserPromptSubmit,
            json!({"hook_event_name": "UserPromptSubmit", "prompt": "yes"}),
            &AdapterEnv::default(),
        )
        .unwrap();

        assert_eq!(event.tool_name(), "UserPromptSubmit");
        assert_eq!(event.str_param("prompt"), Some("yes"));
    }

    #[test]
    fn test_non_object_payload() {
        assert_eq!(
            event_from_value(HookEventName::Stop, json!([1, 2]), &AdapterEnv::default())
                .unwrap_err(),
            EventError::NotAnObject
        );
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" 1 "));
        assert!(parse_flag("YES"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(""));
    }
}
