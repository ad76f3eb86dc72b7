use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::engine::{Decision, Event, Handler, HandlerCategory, HandlerError};
use crate::handlers::{bash_command, file_path, static_regex};

use super::plan_command::OFFICIAL_PLAN_COMMAND;

static PLAN_FILE: Lazy<Regex> = Lazy::new(|| static_regex(r"CLAUDE/Plan/(\d{3})-([^/]+)/"));
static PLAN_MKDIR: Lazy<Regex> =
    Lazy::new(|| static_regex(r"mkdir.*?CLAUDE/Plan/(\d{3})-([^\s/]+)"));
static PLAN_DIR_NAME: Lazy<Regex> = Lazy::new(|| static_regex(r"^(\d{3})-"));

/// A plan folder being created
#[derive(Debug, PartialEq, Eq)]
struct PlanTarget {
    number: u32,
    name: String,
}

/// Checks that a new plan folder takes the next free number
///
/// Runs before the write so the folder being created is not yet counted;
/// writes into a folder that already exists are not checked. A wrong number
/// is reported as context; the write itself proceeds.
pub struct PlanNumberHandler;

impl PlanNumberHandler {
    fn target(event: &Event) -> Option<PlanTarget> {
        let caps = match event.tool_name() {
            "Write" => PLAN_FILE.captures(file_path(event)?)?,
            "Bash" => PLAN_MKDIR.captures(bash_command(event)?)?,
            _ => return None,
        };
        Some(PlanTarget {
            number: caps.get(1)?.as_str().parse().ok()?,
            name: caps.get(2)?.as_str().to_string(),
        })
    }

    /// Highest `NNN-` folder across the active and completed plan dirs
    async fn highest_plan_number(plan_root: &Path) -> std::io::Result<u32> {
        let mut highest = 0;
        for dir in [plan_root.to_path_buf(), plan_root.join("Completed")] {
            if !tokio::fs::try_exists(&dir).await? {
                continue;
            }
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if !entry.file_type().await?.is_dir() {
                    continue;
                }
                let name = entry.file_name();
                let number = PLAN_DIR_NAME
                    .captures(&name.to_string_lossy())
                    .and_then(|caps| caps.get(1)?.as_str().parse::<u32>().ok());
                if let Some(number) = number {
                    highest = highest.max(number);
                }
            }
        }
        Ok(highest)
    }
}

#[async_trait]
impl Handler for PlanNumberHandler {
    fn name(&self) -> &str {
        "validate-plan-number"
    }

    fn priority(&self) -> u8 {
        30
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::Workflow
    }

    fn matches(&self, event: &Event) -> bool {
        Self::target(event).is_some()
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let Some(target) = Self::target(event) else {
            return Ok(Decision::allow());
        };
        let plan_root = event.session().resolve("CLAUDE/Plan");
        let folder = plan_root.join(format!("{:03}-{}", target.number, target.name));
        if tokio::fs::try_exists(&folder).await? {
            // Adding to a plan that already exists
            return Ok(Decision::allow());
        }
        let highest = Self::highest_plan_number(&plan_root).await?;
        let expected = highest + 1;

        if target.number == expected {
            return Ok(Decision::allow());
        }

        tracing::debug!(
            requested = target.number,
            expected,
            "Plan number out of sequence"
        );

        Ok(Decision::allow_with_context(format!(
            "PLAN NUMBER INCORRECT\n\n\
             You are creating: CLAUDE/Plan/{number:03}-{name}/\n\
             Highest existing plan: {highest:03}\n\
             Expected next number: {expected:03}\n\n\
             Both active plans (CLAUDE/Plan/) and completed plans \
             (CLAUDE/Plan/Completed/) were checked.\n\n\
             Find the highest number before creating a plan:\n  \
               {OFFICIAL_PLAN_COMMAND}\n\n\
             Use the correct plan number now:\n  \
               mkdir -p CLAUDE/Plan/{expected:03}-{name}",
            number = target.number,
            name = target.name,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Verdict;
    use crate::handlers::test_support::*;
    use tempfile::TempDir;

    fn project_with_plans(active: &[&str], completed: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        let plans = dir.path().join("CLAUDE/Plan");
        for name in active {
            std::fs::create_dir_all(plans.join(name)).unwrap();
        }
        for name in completed {
            std::fs::create_dir_all(plans.join("Completed").join(name)).unwrap();
        }
        std::fs::write(plans.join("CLAUDE.md"), "").unwrap();
        dir
    }

    #[test]
    fn test_target_extraction() {
        assert_eq!(
            PlanNumberHandler::target(&write("CLAUDE/Plan/007-auth/plan.md", "")),
            Some(PlanTarget {
                number: 7,
                name: "auth".into()
            })
        );
        assert_eq!(
            PlanNumberHandler::target(&bash("mkdir -p CLAUDE/Plan/012-search")),
            Some(PlanTarget {
                number: 12,
                name: "search".into()
            })
        );
        assert_eq!(PlanNumberHandler::target(&write("CLAUDE/Plan/notes.md", "")), None);
        assert_eq!(PlanNumberHandler::target(&bash("ls CLAUDE/Plan/012-search")), None);
    }

    #[tokio::test]
    async fn test_next_number_is_silent() {
        let project = project_with_plans(&["001-a", "003-c"], &["004-d"]);
        let event = in_project(write("CLAUDE/Plan/005-e/plan.md", ""), project.path());

        let decision = PlanNumberHandler.handle(&event).await.unwrap();
        assert!(decision.is_silent_allow());
    }

    #[tokio::test]
    async fn test_wrong_number_allows_with_context() {
        let project = project_with_plans(&["001-a", "002-b"], &["009-old"]);
        let event = in_project(bash("mkdir -p CLAUDE/Plan/003-new"), project.path());

        let decision = PlanNumberHandler.handle(&event).await.unwrap();
        assert_eq!(decision.verdict(), Verdict::Allow);
        let context = decision.context().unwrap();
        assert!(context.contains("Highest existing plan: 009"));
        assert!(context.contains("Expected next number: 010"));
        assert!(context.contains("mkdir -p CLAUDE/Plan/010-new"));
    }

    #[tokio::test]
    async fn test_more_files_in_existing_plan_are_silent() {
        let project = project_with_plans(&["003-c", "004-x"], &[]);
        for event in [
            write("CLAUDE/Plan/004-x/notes.md", ""),
            write("CLAUDE/Plan/003-c/plan.md", ""),
            bash("mkdir -p CLAUDE/Plan/004-x"),
        ] {
            let event = in_project(event, project.path());
            assert!(PlanNumberHandler.handle(&event).await.unwrap().is_silent_allow());
        }

        // Same number, different name: still a new folder out of sequence
        let clash = in_project(write("CLAUDE/Plan/004-other/plan.md", ""), project.path());
        assert!(PlanNumberHandler.handle(&clash).await.unwrap().context().is_some());
    }

    #[tokio::test]
    async fn test_missing_plan_dir_expects_one() {
        let project = TempDir::new().unwrap();
        let event = in_project(write("CLAUDE/Plan/001-first/plan.md", ""), project.path());
        assert!(PlanNumberHandler.handle(&event).await.unwrap().is_silent_allow());
    }
}
