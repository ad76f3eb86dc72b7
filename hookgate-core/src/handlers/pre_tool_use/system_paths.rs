use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use crate::engine::{Decision, Event, Handler, HandlerCategory, HandlerError};
use crate::handlers::file_path;

/// Blocks direct edits of deployed system files; changes go through the
/// project's `files/` tree and the configuration-management playbooks
pub struct SystemPathsHandler {
    blocked_prefixes: Vec<String>,
}

impl SystemPathsHandler {
    pub fn new(blocked_prefixes: Vec<String>) -> Self {
        Self { blocked_prefixes }
    }

    fn blocked_prefix(&self, path: &str) -> Option<&str> {
        self.blocked_prefixes
            .iter()
            .map(String::as_str)
            .find(|prefix| path.starts_with(prefix))
    }

    /// Write target, lexically normalized, when it is not inside the project
    fn system_target(&self, event: &Event) -> Option<String> {
        if !event.is_tool(&["Write", "Edit"]) {
            return None;
        }
        let raw = file_path(event)?;
        let normalized = lexical_normalize(Path::new(raw));

        // Only the configured project dir counts; the agent-reported cwd does not
        if let Some(root) = event.session().project_dir.as_deref() {
            let root = lexical_normalize(root);
            if self.exempt_root(&root) && normalized.starts_with(&root) {
                return None;
            }
        }
        Some(normalized.to_string_lossy().into_owned())
    }

    /// A project root may exempt its own files unless it is a system
    /// directory itself. Under a blocked prefix it must sit at least two
    /// levels down (`/home/<user>/<project>`), so `/etc`, `/etc/ansible` or a
    /// bare home directory never qualify.
    fn exempt_root(&self, root: &Path) -> bool {
        if !root.is_absolute() || root.parent().is_none() {
            return false;
        }
        self.blocked_prefixes.iter().all(|prefix| {
            let prefix = Path::new(prefix.trim_end_matches('/'));
            match root.strip_prefix(prefix) {
                Ok(rest) => rest.components().count() >= 2,
                Err(_) => true,
            }
        })
    }
}

/// Resolve `.` and `..` without touching the filesystem
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Where the project keeps the source of a deployed file
fn project_mirror(path: &str) -> String {
    format!("files/{}", path.trim_start_matches('/'))
}

#[async_trait]
impl Handler for SystemPathsHandler {
    fn name(&self) -> &str {
        "validate-system-paths"
    }

    fn priority(&self) -> u8 {
        8
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::Structural
    }

    fn matches(&self, event: &Event) -> bool {
        self.system_target(event)
            .is_some_and(|target| self.blocked_prefix(&target).is_some())
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let target = self.system_target(event).ok_or_else(|| {
            HandlerError::InvalidInput("event has no system file target".to_string())
        })?;
        let mirror = project_mirror(&target);

        let account_note = match self.blocked_prefix(&target) {
            Some("/root/") | Some("/home/") => {
                "\nUser and home directory files are managed by the user-configuration playbooks.\n"
            }
            _ => "",
        };

        Ok(Decision::deny(format!(
            "❌ BLOCKED: Direct editing of deployed system files is not allowed.\n\n\
             Target: {target}\n\n\
             This is a deployed file on the live filesystem. Editing it directly \
             bypasses version control and causes configuration drift.\n\n\
             ✓ CORRECT APPROACH:\n\
             1. Edit the project file instead: {mirror}\n\
             2. Deploy it with Ansible:\n   \
                ansible-playbook playbooks/imports/[appropriate-playbook].yml\n\
             {account_note}"
        )))
    }
}
