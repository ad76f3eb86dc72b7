//! Handlers that run after a tool has executed
//!
//! The linters shell out to project scripts. Their commands are configured
//! as a single shell-style string, split with `shell-words`, and the child
//! is killed if the dispatcher abandons the handler on timeout.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::engine::{Event, HandlerError};

mod ansible_lint;
mod eslint_on_write;
mod sitemap;

pub use ansible_lint::AnsibleLintHandler;
pub use eslint_on_write::EslintOnWriteHandler;
pub use sitemap::SitemapHandler;

/// Exit status and combined output of a linter run
#[derive(Debug)]
pub(crate) struct LintRun {
    pub success: bool,
    pub output: String,
}

/// Run `command_line` followed by `args` in `cwd`
pub(crate) async fn run_lint_command(
    command_line: &str,
    args: &[&str],
    cwd: Option<&Path>,
) -> Result<LintRun, HandlerError> {
    let words = shell_words::split(command_line).map_err(|e| HandlerError::Command {
        command: command_line.to_string(),
        detail: format!("unparseable command line: {e}"),
    })?;
    let Some((program, base_args)) = words.split_first() else {
        return Err(HandlerError::InvalidInput("empty lint command".to_string()));
    };

    // Project scripts like ./scripts/lint are relative to the project, not our cwd
    let program = match cwd {
        Some(dir) if program.contains('/') && Path::new(program).is_relative() => {
            dir.join(program).into_os_string()
        }
        _ => program.into(),
    };

    let mut command = Command::new(&program);
    command
        .args(base_args)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    debug!(program = ?program, ?args, "Running linter");
    let output = command.output().await.map_err(|e| HandlerError::Command {
        command: command_line.to_string(),
        detail: e.to_string(),
    })?;

    let mut text = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(stderr.trim_end());
    }

    Ok(LintRun {
        success: output.status.success(),
        output: text,
    })
}

/// `path` relative to the project root, dropping a `/workspace/` container prefix
pub(crate) fn project_relative(event: &Event, path: &str) -> String {
    if let Some(root) = event.session().project_root() {
        if let Ok(rest) = Path::new(path).strip_prefix(root) {
            return rest.to_string_lossy().into_owned();
        }
    }
    path.strip_prefix("/workspace/").unwrap_or(path).to_string()
}
