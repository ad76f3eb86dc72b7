//! Concrete policy handlers, grouped by the hook event they serve.
//!
//! Every handler is a stateless value implementing
//! [`Handler`](crate::engine::Handler). The helpers below give handlers a
//! uniform way to read the tool shapes they care about.

use regex::Regex;

use crate::engine::event::{Event, ParamValue};

pub mod post_tool_use;
pub mod pre_compact;
pub mod pre_tool_use;
pub mod session_start;
pub mod subagent_stop;
pub mod user_prompt_submit;
pub mod workflow_state;

/// Tools that write file content
pub const FILE_WRITE_TOOLS: [&str; 3] = ["Write", "Edit", "MultiEdit"];

/// Compile a built-in pattern literal
pub(crate) fn static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern {pattern:?}: {e}"))
}

/// Shell command of a Bash event
pub fn bash_command(event: &Event) -> Option<&str> {
    if event.tool_name() != "Bash" {
        return None;
    }
    event.str_param("command").filter(|c| !c.is_empty())
}

/// Target path of a Write/Edit/MultiEdit event
pub fn file_path(event: &Event) -> Option<&str> {
    if !event.is_tool(&FILE_WRITE_TOOLS) {
        return None;
    }
    event.str_param("file_path").filter(|p| !p.is_empty())
}

/// Full content of a Write event
pub fn file_content(event: &Event) -> Option<&str> {
    if event.tool_name() != "Write" {
        return None;
    }
    event.str_param("content")
}

/// Every piece of text an event would put into a file
///
/// Write content, Edit `new_string`, and each MultiEdit `new_string`.
pub fn written_text(event: &Event) -> Vec<&str> {
    match event.tool_name() {
        "Write" => event.str_param("content").into_iter().collect(),
        "Edit" => event.str_param("new_string").into_iter().collect(),
        "MultiEdit" => multi_edits(event)
            .filter_map(|edit| edit.get("new_string").and_then(ParamValue::as_str))
            .collect(),
        _ => Vec::new(),
    }
}

/// Every piece of text an edit touches, old and new
pub fn edited_text(event: &Event) -> Vec<&str> {
    match event.tool_name() {
        "Edit" => ["old_string", "new_string"]
            .iter()
            .filter_map(|key| event.str_param(key))
            .collect(),
        "MultiEdit" => multi_edits(event)
            .flat_map(|edit| {
                ["old_string", "new_string"]
                    .into_iter()
                    .filter_map(move |key| edit.get(key).and_then(ParamValue::as_str))
            })
            .collect(),
        _ => written_text(event),
    }
}

fn multi_edits(event: &Event) -> impl Iterator<Item = &ParamValue> {
    event
        .param("edits")
        .and_then(ParamValue::as_list)
        .unwrap_or_default()
        .iter()
}

/// Normalize Windows separators so path checks only deal with `/`
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Shorten text to at most `max` characters, marking the cut
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
