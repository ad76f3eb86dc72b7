//! Session transcript (JSONL) digest.
//!
//! Some handlers decide based on what happened earlier in the session. The
//! adapter reads the transcript once, before dispatch, and stores the facts
//! in the event's [`SessionContext`](crate::engine::SessionContext), so
//! handler predicates stay free of I/O.

use serde_json::Value;
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use super::types::HookEventName;
use crate::engine::event::{Event, TranscriptDigest};

/// Event kinds whose handlers consult the transcript
pub fn reads_transcript(kind: HookEventName) -> bool {
    matches!(
        kind,
        HookEventName::UserPromptSubmit | HookEventName::SubagentStop
    )
}

/// Scan a transcript for the latest assistant text and Task delegation
///
/// Lines that are not JSON objects are skipped.
pub async fn digest(path: &Path) -> io::Result<TranscriptDigest> {
    let mut lines = BufReader::new(File::open(path).await?).lines();
    let mut digest = TranscriptDigest::default();

    while let Some(line) = lines.next_line().await? {
        let Ok(entry) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        let Some(message) = assistant_message(&entry) else {
            continue;
        };

        let text = message_text(message);
        if !text.trim().is_empty() {
            digest.last_assistant_text = Some(text);
        }
        if let Some(agent) = task_agent(message) {
            digest.last_task_agent = Some(agent);
        }
    }

    Ok(digest)
}

/// Attach the transcript digest to events that need it
///
/// An unreadable transcript leaves the digest empty; the handlers that use
/// it then simply do not match.
pub async fn attach_digest(event: Event) -> Event {
    if !reads_transcript(event.kind()) {
        return event;
    }
    let Some(path) = event.session().transcript_path.clone() else {
        return event;
    };

    match digest(&path).await {
        Ok(found) => {
            let mut session = event.session().clone();
            session.transcript = found;
            event.with_session(session)
        }
        Err(e) => {
            debug!(path = ?path, error = %e, "Transcript unreadable; continuing without it");
            event
        }
    }
}

fn assistant_message(entry: &Value) -> Option<&Value> {
    let kind = entry.get("type").and_then(Value::as_str)?;
    if kind != "message" && kind != "assistant" {
        return None;
    }
    let message = entry.get("message")?;
    (message.get("role").and_then(Value::as_str) == Some("assistant")).then_some(message)
}

fn message_text(message: &Value) -> String {
    match message.get("content") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter_map(|block| match block {
                Value::String(text) => Some(text.as_str()),
                Value::Object(_) if block.get("type").and_then(Value::as_str) == Some("text") => {
                    block.get("text").and_then(Value::as_str)
                }
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

fn task_agent(message: &Value) -> Option<String> {
    message
        .get("content")?
        .as_array()?
        .iter()
        .rev()
        .filter(|block| {
            block.get("type").and_then(Value::as_str) == Some("tool_use")
                && block.get("name").and_then(Value::as_str) == Some("Task")
        })
        .find_map(|block| {
            block
                .get("input")?
                .get("subagent_type")?
                .as_str()
                .filter(|agent| !agent.is_empty())
                .map(str::to_string)
        })
}
