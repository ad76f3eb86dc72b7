//! Claude Code settings integration for `hookgate init`
//!
//! Installs one `hookgate eval --event <Kind>` command hook per event kind
//! into `settings.json` without disturbing anything already configured.

use anyhow::{anyhow, Context, Result};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use hookgate_core::harness::types::HookEventName;

/// Settings file location, project-local or in the user's home
pub fn settings_path(project_dir: &Path, global: bool) -> Result<PathBuf> {
    settings_path_in(project_dir, global, dirs::home_dir())
}

fn settings_path_in(project_dir: &Path, global: bool, home: Option<PathBuf>) -> Result<PathBuf> {
    let base = if global {
        home.context("Could not determine home directory for global settings")?
    } else {
        project_dir.to_path_buf()
    };
    Ok(base.join(".claude").join("settings.json"))
}

/// Tools whose post-execution events some handler cares about
const POST_TOOL_MATCHER: &str = "Edit|MultiEdit|Write";

/// Hook configuration for the given event kinds
pub fn generate_hooks(kinds: &[HookEventName]) -> Value {
    let hooks: Map<String, Value> = kinds
        .iter()
        .map(|kind| {
            let command = json!({
                "type": "command",
                "command": format!("hookgate eval --event {kind}")
            });
            let entry = match kind {
                HookEventName::PreToolUse | HookEventName::PermissionRequest => {
                    json!({"matcher": "*", "hooks": [command]})
                }
                HookEventName::PostToolUse => {
                    json!({"matcher": POST_TOOL_MATCHER, "hooks": [command]})
                }
                _ => json!({"hooks": [command]}),
            };
            (kind.to_string(), json!([entry]))
        })
        .collect();

    json!({ "hooks": hooks })
}

/// Merge `new` hooks into `existing` settings, skipping duplicates
pub fn merge_hooks(existing: &mut Value, new: Value) -> Result<()> {
    if !existing.is_object() {
        *existing = json!({});
    }

    let hooks = existing
        .as_object_mut()
        .ok_or_else(|| anyhow!("Invalid settings format"))?
        .entry("hooks")
        .or_insert_with(|| json!({}));
    if !hooks.is_object() {
        *hooks = json!({});
    }
    let hooks = hooks
        .as_object_mut()
        .ok_or_else(|| anyhow!("Invalid hooks format"))?;

    let new_hooks = new["hooks"]
        .as_object()
        .ok_or_else(|| anyhow!("Invalid hooks format"))?;

    for (event_name, new_matchers) in new_hooks {
        let event_array = hooks.entry(event_name).or_insert_with(|| json!([]));
        if !event_array.is_array() {
            *event_array = json!([]);
        }
        let event_array = event_array
            .as_array_mut()
            .ok_or_else(|| anyhow!("Invalid event array"))?;

        for new_matcher in new_matchers.as_array().into_iter().flatten() {
            if !contains_matcher(event_array, new_matcher) {
                event_array.push(new_matcher.clone());
            }
        }
    }

    Ok(())
}

/// Same matcher and at least one identical command
fn contains_matcher(array: &[Value], matcher: &Value) -> bool {
    array.iter().any(|existing| {
        if existing.get("matcher") != matcher.get("matcher") {
            return false;
        }
        let existing_hooks = existing.get("hooks").and_then(Value::as_array);
        let new_hooks = matcher.get("hooks").and_then(Value::as_array);

        match (existing_hooks, new_hooks) {
            (Some(existing_hooks), Some(new_hooks)) => new_hooks.iter().any(|new_hook| {
                existing_hooks
                    .iter()
                    .any(|existing_hook| existing_hook.get("command") == new_hook.get("command"))
            }),
            _ => false,
        }
    })
}

/// Create or update the settings file; returns whether it already existed
pub fn install_hooks(settings_path: &Path, kinds: &[HookEventName]) -> Result<bool> {
    if let Some(parent) = settings_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let new_hooks = generate_hooks(kinds);
    let existed = settings_path.exists();

    let settings = if existed {
        let content = fs::read_to_string(settings_path)
            .with_context(|| format!("Failed to read {}", settings_path.display()))?;
        let mut existing: Value = serde_json::from_str(&content)
            .map_err(|e| anyhow!("Invalid JSON in existing settings: {}", e))?;
        merge_hooks(&mut existing, new_hooks)?;
        existing
    } else {
        new_hooks
    };

    fs::write(settings_path, serde_json::to_string_pretty(&settings)?)
        .with_context(|| format!("Failed to write {}", settings_path.display()))?;
    Ok(existed)
}
