//! Workflow state that survives context compaction.
//!
//! Before a compaction the active workflow (from `CLAUDE.local.md` and any
//! in-progress plan) is saved under `untracked/workflow-state/<name>/`. When
//! the session resumes after compaction the most recently updated state is
//! read back and handed to the agent.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::handlers::static_regex;

/// Root of the saved state, relative to the project
pub const STATE_DIR: &str = "untracked/workflow-state";

/// Agent memory file that may declare the active workflow
pub const LOCAL_MEMORY_FILE: &str = "CLAUDE.local.md";

const PLAN_DIR: &str = "CLAUDE/Plan";

static CLAUDE_DOC: Lazy<Regex> = Lazy::new(|| static_regex(r"(CLAUDE/[^\s)]+\.md)"));
static DOT_CLAUDE_DOC: Lazy<Regex> = Lazy::new(|| static_regex(r"(\.claude/[^\s)]+\.md)"));
static NON_ALNUM: Lazy<Regex> = Lazy::new(|| static_regex(r"[^a-z0-9]+"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub current: u32,
    pub total: u32,
    pub name: String,
    pub status: String,
}

impl Default for Phase {
    fn default() -> Self {
        Self {
            current: 1,
            total: 1,
            name: "In Progress".to_string(),
            status: "in_progress".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    #[serde(default = "unknown_workflow")]
    pub workflow: String,
    #[serde(default = "custom_type")]
    pub workflow_type: String,
    #[serde(default)]
    pub phase: Phase,
    /// Files the agent must re-read, in `@path` form
    #[serde(default)]
    pub required_reading: Vec<String>,
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default)]
    pub key_reminders: Vec<String>,
    #[serde(default)]
    pub created_at: String,
}

fn unknown_workflow() -> String {
    "Unknown Workflow".to_string()
}

fn custom_type() -> String {
    "custom".to_string()
}

impl WorkflowState {
    pub fn new(created_at: String) -> Self {
        Self {
            workflow: unknown_workflow(),
            workflow_type: custom_type(),
            phase: Phase::default(),
            required_reading: Vec::new(),
            context: Map::new(),
            key_reminders: Vec::new(),
            created_at,
        }
    }

    fn add_reading(&mut self, entry: String) {
        if !self.required_reading.contains(&entry) {
            self.required_reading.push(entry);
        }
    }

    /// Pick up `Workflow:`, `Phase: 4/10 - Name` and `@file` lines
    pub fn apply_memory(&mut self, content: &str) {
        for line in content.lines() {
            if let Some(name) = strip_label(line, "Workflow:") {
                self.workflow = name.trim().to_string();
            }
            if let Some(phase) = strip_label(line, "Phase:") {
                self.apply_phase(phase.trim());
            }
            let trimmed = line.trim();
            if trimmed.starts_with('@') {
                self.add_reading(trimmed.to_string());
            }
        }
    }

    fn apply_phase(&mut self, phase: &str) {
        if !phase.contains('/') {
            return;
        }
        let (numbers, name) = match phase.split_once('-') {
            Some((numbers, name)) => (numbers, Some(name)),
            None => (phase, None),
        };
        if let Some((current, total)) = numbers.trim().split_once('/') {
            if let (Ok(current), Ok(total)) = (current.trim().parse(), total.trim().parse()) {
                self.phase.current = current;
                self.phase.total = total;
            }
        }
        if let Some(name) = name {
            self.phase.name = name.trim().to_string();
        }
    }

    /// Take the plan number, title and referenced docs from an active plan
    pub fn apply_plan(&mut self, plan_dir_name: &str, content: &str) {
        if plan_dir_name.starts_with(|c: char| c.is_ascii_digit()) {
            let number = plan_dir_name
                .split('-')
                .next()
                .and_then(|n| n.parse::<u64>().ok());
            if let Some(number) = number {
                self.context.insert("plan_number".into(), number.into());
                self.context
                    .insert("plan_name".into(), plan_dir_name.to_string().into());
            }
        }

        if let Some(title) = content.lines().find(|line| line.starts_with("# Plan")) {
            if let Some((_, name)) = title.split_once(':') {
                self.workflow = name.trim().to_string();
            }
        }

        for line in content.lines() {
            if !line.contains("CLAUDE/") && !line.contains(".claude/") {
                continue;
            }
            let docs: Vec<String> = CLAUDE_DOC
                .captures_iter(line)
                .chain(DOT_CLAUDE_DOC.captures_iter(line))
                .filter_map(|caps| caps.get(1).map(|m| format!("@{}", m.as_str())))
                .collect();
            for doc in docs {
                self.add_reading(doc);
            }
        }
    }

    /// Message handed to the agent when the session resumes
    pub fn restoration_message(&self) -> String {
        let mut parts = vec![
            "⚠️ WORKFLOW RESTORED AFTER COMPACTION ⚠️".to_string(),
            String::new(),
            format!("Workflow: {}", self.workflow),
            format!("Type: {}", self.workflow_type),
            format!(
                "Phase: {}/{} - {} ({})",
                self.phase.current, self.phase.total, self.phase.name, self.phase.status
            ),
            String::new(),
        ];

        if !self.required_reading.is_empty() {
            parts.push("REQUIRED READING (read ALL now with @ syntax):".to_string());
            parts.extend(self.required_reading.iter().cloned());
            parts.push(String::new());
        }

        if !self.key_reminders.is_empty() {
            parts.push("Key Reminders:".to_string());
            parts.extend(self.key_reminders.iter().map(|r| format!("- {r}")));
            parts.push(String::new());
        }

        if !self.context.is_empty() {
            parts.push("Context:".to_string());
            parts.push(
                serde_json::to_string_pretty(&self.context).unwrap_or_else(|_| "{}".to_string()),
            );
            parts.push(String::new());
        }

        parts.extend([
            "ACTION REQUIRED:".to_string(),
            "1. Read ALL files listed above using @ syntax".to_string(),
            "2. Confirm understanding of workflow phase".to_string(),
            "3. DO NOT proceed with assumptions or hallucinated logic".to_string(),
        ]);
        parts.join("\n")
    }
}

/// `Workflow:` or `workflow:` prefix
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    line.strip_prefix(label)
        .or_else(|| line.strip_prefix(label.to_ascii_lowercase().as_str()))
}

/// Lowercase, hyphen-separated, at most 50 characters
pub fn sanitize_workflow_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let hyphenated = NON_ALNUM.replace_all(&lowered, "-");
    let sanitized: String = hyphenated.trim_matches('-').chars().take(50).collect();
    if sanitized.is_empty() {
        "unknown-workflow".to_string()
    } else {
        sanitized
    }
}

pub fn plan_in_progress(content: &str) -> bool {
    content.contains("🔄 In Progress") || content.to_lowercase().contains("🔄 in_progress")
}

fn memory_declares_workflow(content: &str) -> bool {
    content.contains("WORKFLOW STATE") || content.to_lowercase().contains("workflow:")
}

async fn read_optional(path: &Path) -> std::io::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// `(folder name, PLAN.md content)` for every plan folder, by name
async fn plan_documents(project: &Path) -> std::io::Result<Vec<(String, String)>> {
    let plan_root = project.join(PLAN_DIR);
    if !tokio::fs::try_exists(&plan_root).await? {
        return Ok(Vec::new());
    }

    let mut plans = Vec::new();
    let mut entries = tokio::fs::read_dir(&plan_root).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let folder = entry.file_name().to_string_lossy().into_owned();
        if let Some(content) = read_optional(&entry.path().join("PLAN.md")).await? {
            plans.push((folder, content));
        }
    }
    plans.sort();
    Ok(plans)
}

/// The active workflow of a project, if it declares one
pub async fn detect(project: &Path, created_at: String) -> std::io::Result<Option<WorkflowState>> {
    let memory = read_optional(&project.join(LOCAL_MEMORY_FILE)).await?;
    let plans = plan_documents(project).await?;

    let declared = memory.as_deref().is_some_and(memory_declares_workflow);
    let phased_plan = plans.iter().any(|(_, content)| {
        let lower = content.to_lowercase();
        plan_in_progress(content) && (lower.contains("phase") || lower.contains("workflow"))
    });
    if !declared && !phased_plan {
        return Ok(None);
    }

    let mut state = WorkflowState::new(created_at);
    if let Some(memory) = memory.as_deref() {
        state.apply_memory(memory);
    }
    if let Some((folder, content)) = plans.iter().find(|(_, content)| plan_in_progress(content)) {
        state.apply_plan(folder, content);
    }
    Ok(Some(state))
}

/// Write the state, updating the workflow's existing file if there is one
///
/// An existing file keeps its name and the `created_at` it was first saved with.
pub async fn save(
    project: &Path,
    mut state: WorkflowState,
    started: &str,
) -> std::io::Result<PathBuf> {
    let name = sanitize_workflow_name(&state.workflow);
    let dir = project.join(STATE_DIR).join(&name);
    tokio::fs::create_dir_all(&dir).await?;

    let prefix = format!("state-{name}-");
    let mut existing = None;
    let mut entries = tokio::fs::read_dir(&dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.starts_with(&prefix) && file_name.ends_with(".json") {
            existing = Some(entry.path());
            break;
        }
    }

    let path = match existing {
        Some(path) => {
            let previous = tokio::fs::read_to_string(&path)
                .await
                .ok()
                .and_then(|raw| serde_json::from_str::<WorkflowState>(&raw).ok());
            if let Some(previous) = previous.filter(|p| !p.created_at.is_empty()) {
                state.created_at = previous.created_at;
            }
            path
        }
        None => dir.join(format!("{prefix}{started}.json")),
    };

    let encoded = serde_json::to_string_pretty(&state)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    tokio::fs::write(&path, encoded).await?;
    Ok(path)
}

/// The most recently updated state file across all workflows
pub async fn latest_state_file(project: &Path) -> std::io::Result<Option<PathBuf>> {
    let root = project.join(STATE_DIR);
    if !tokio::fs::try_exists(&root).await? {
        return Ok(None);
    }

    let mut latest: Option<(SystemTime, PathBuf)> = None;
    let mut workflows = tokio::fs::read_dir(&root).await?;
    while let Some(workflow) = workflows.next_entry().await? {
        if !workflow.file_type().await?.is_dir() {
            continue;
        }
        let mut files = tokio::fs::read_dir(workflow.path()).await?;
        while let Some(file) = files.next_entry().await? {
            let file_name = file.file_name().to_string_lossy().into_owned();
            if !file_name.starts_with("state-") || !file_name.ends_with(".json") {
                continue;
            }
            let modified = file.metadata().await?.modified()?;
            if latest.as_ref().map_or(true, |(newest, _)| modified > *newest) {
                latest = Some((modified, file.path()));
            }
        }
    }
    Ok(latest.map(|(_, path)| path))
}
