//! Event envelope - the normalized form of one intercepted hook event.
//!
//! An [`Event`] is built once at the harness boundary and is immutable for
//! the duration of a dispatch. Handlers only ever see this type, never the
//! raw hook JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::harness::types::HookEventName;

/// Errors raised while building an [`Event`] from external input
#[derive(Debug, Error, PartialEq)]
pub enum EventError {
    #[error("event payload is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("event payload must be a JSON object")]
    NotAnObject,

    #[error("event is missing a non-empty tool_name")]
    MissingToolName,
}

/// A parameter value - a small closed union over the JSON shapes hooks carry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, ParamValue>> {
        match self {
            ParamValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key when this value is a map
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.as_map().and_then(|map| map.get(key))
    }
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ParamValue::Null,
            Value::Bool(b) => ParamValue::Bool(b),
            // Integers beyond f64 precision lose digits; hook payloads never carry them
            Value::Number(n) => ParamValue::Number(n.as_f64().unwrap_or_default()),
            Value::String(s) => ParamValue::String(s),
            Value::Array(items) => ParamValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                ParamValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::String(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::String(s)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        ParamValue::Number(n)
    }
}

/// Ambient metadata about the session an event belongs to
///
/// Everything a handler may need from the environment is carried here so
/// handlers never consult process-global state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Claude Code session identifier
    #[serde(default)]
    pub session_id: Option<String>,

    /// Path to the session transcript (JSONL)
    #[serde(default)]
    pub transcript_path: Option<PathBuf>,

    /// Working directory reported by the agent
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Permission mode reported by the agent
    #[serde(default)]
    pub permission_mode: Option<String>,

    /// Project root (CLAUDE_PROJECT_DIR)
    #[serde(default)]
    pub project_dir: Option<PathBuf>,

    /// Running in a remote or sandboxed environment (CLAUDE_CODE_REMOTE)
    #[serde(default)]
    pub remote: bool,

    /// Facts read from the transcript, for events whose handlers need them
    #[serde(default)]
    pub transcript: TranscriptDigest,
}

/// What the adapter extracted from the session transcript
///
/// Filled in before dispatch so handlers can decide from the event alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptDigest {
    /// Text of the most recent assistant message
    #[serde(default)]
    pub last_assistant_text: Option<String>,

    /// `subagent_type` of the most recent Task tool call
    #[serde(default)]
    pub last_task_agent: Option<String>,
}

impl SessionContext {
    /// Project root, falling back to the reported working directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_dir.as_deref().or(self.cwd.as_deref())
    }

    /// Resolve a possibly relative path against the project root
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        match self.project_root() {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// One intercepted hook event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    kind: HookEventName,
    tool_name: String,
    parameters: BTreeMap<String, ParamValue>,
    session: SessionContext,
}

impl Event {
    /// Create an event with no parameters and an empty session context
    pub fn new(kind: HookEventName, tool_name: impl Into<String>) -> Result<Self, EventError> {
        let tool_name = tool_name.into();
        if tool_name.trim().is_empty() {
            return Err(EventError::MissingToolName);
        }

        Ok(Self {
            kind,
            tool_name,
            parameters: BTreeMap::new(),
            session: SessionContext::default(),
        })
    }

    /// Add one parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Replace the parameter map
    pub fn with_parameters(mut self, parameters: BTreeMap<String, ParamValue>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_session(mut self, session: SessionContext) -> Self {
        self.session = session;
        self
    }

    pub fn kind(&self) -> HookEventName {
        self.kind
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// True when the event is for any of the given tools
    pub fn is_tool(&self, names: &[&str]) -> bool {
        names.contains(&self.tool_name.as_str())
    }

    pub fn parameters(&self) -> &BTreeMap<String, ParamValue> {
        &self.parameters
    }

    pub fn param(&self, key: &str) -> Option<&ParamValue> {
        self.parameters.get(key)
    }

    /// String parameter, `None` when absent or not a string
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.param(key).and_then(ParamValue::as_str)
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }
}
