use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::engine::{Decision, Event, Handler, HandlerCategory, HandlerError};
use crate::handlers::{bash_command, static_regex};

/// The documented way to find the highest plan number
pub const OFFICIAL_PLAN_COMMAND: &str =
    r"find CLAUDE/Plan -maxdepth 2 -type d -name '[0-9]*' | grep -oP '/\K\d{3}(?=-)' | sort -n | tail -1";

const ARCHIVAL_SUBDIRS: [&str; 4] = ["Completed", "Archive", "Backup", "Cancelled"];

static AD_HOC_LOOKUPS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"ls\s+(?:-\w+\s+)*\*/Plan/\[0-9\]",
        r"ls\s+(?:-\w+\s+)*CLAUDE/Plan/0",
        r"ls\s+(?:-\w+\s+)*CLAUDE/Plan[^|]*\|\s*grep",
        r"find\s+CLAUDE/Plan\s+-maxdepth\s+1\b",
        r"cd\s+CLAUDE/Plan\s+&&\s+ls",
        r"ls\s+(?:-\w+\s+)?CLAUDE/Plan(?:/|$)",
    ]
    .into_iter()
    .map(|pattern| static_regex(&format!("(?i){pattern}")))
    .collect()
});

static FIND_PLAN_ROOT: Lazy<Regex> = Lazy::new(|| static_regex(r"(?i)find\s+CLAUDE/Plan(?:\s|$)"));
static FIND_DEPTH_TWO: Lazy<Regex> =
    Lazy::new(|| static_regex(r"(?i)find\s+CLAUDE/Plan\s+-maxdepth\s+2\b"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| static_regex(r"\s+"));

/// Steers plan-number lookups to the one documented command instead of
/// ad-hoc `ls`/`find` variations
pub struct PlanCommandHandler;

impl PlanCommandHandler {
    fn is_archival_operation(command: &str) -> bool {
        ARCHIVAL_SUBDIRS.iter().any(|subdir| {
            command.contains(&format!("CLAUDE/Plan/{subdir}"))
                && ["mkdir", "mv", "cp", "ls"].iter().any(|op| command.contains(op))
        })
    }

    fn is_official_command(command: &str) -> bool {
        let squash = |s: &str| WHITESPACE.replace_all(s.trim(), " ").into_owned();
        squash(command) == squash(OFFICIAL_PLAN_COMMAND)
    }

    fn is_ad_hoc_lookup(command: &str) -> bool {
        AD_HOC_LOOKUPS.iter().any(|pattern| pattern.is_match(command))
            || (FIND_PLAN_ROOT.is_match(command) && !FIND_DEPTH_TWO.is_match(command))
            || command.contains("[0-9]")
    }
}

#[async_trait]
impl Handler for PlanCommandHandler {
    fn name(&self) -> &str {
        "enforce-official-plan-command"
    }

    fn priority(&self) -> u8 {
        25
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::Workflow
    }

    fn matches(&self, event: &Event) -> bool {
        let Some(command) = bash_command(event) else {
            return false;
        };
        if !command.contains("CLAUDE/Plan") && !command.contains("*/Plan/") {
            return false;
        }

        !Self::is_archival_operation(command)
            && !Self::is_official_command(command)
            && Self::is_ad_hoc_lookup(command)
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let command = bash_command(event).unwrap_or_default();

        Ok(Decision::deny(format!(
            "🚫 BLOCKED: Ad-hoc plan number lookup command detected\n\n\
             Command: {command}\n\n\
             Ad-hoc plan discovery commands are fragile and make assumptions \
             about the directory layout.\n\n\
             ✅ USE THE OFFICIAL COMMAND:\n  \
               {OFFICIAL_PLAN_COMMAND}\n\n\
             It searches active and completed plans, extracts the 3-digit \
             number, and returns the highest one.\n\n\
             REFERENCE: CLAUDE/Plan/CLAUDE.md, section Plan Numbering"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Verdict;
    use crate::handlers::test_support::*;

    #[test]
    fn test_matches_ad_hoc_lookups() {
        let handler = PlanCommandHandler;
        for command in [
            "ls -d */Plan/[0-9]*",
            "ls CLAUDE/Plan/0*",
            "ls CLAUDE/Plan | grep -E '^[0-9]'",
            "ls -la CLAUDE/Plan/",
            "ls CLAUDE/Plan",
            "find CLAUDE/Plan -type d",
            "find CLAUDE/Plan",
            "find CLAUDE/Plan -maxdepth 1 -type d",
            "cd CLAUDE/Plan && ls",
            "find CLAUDE/Plan -maxdepth 2 -name '[0-9]*' | sort",
        ] {
            assert!(handler.matches(&bash(command)), "should block: {command}");
        }
    }

    #[test]
    fn test_official_and_archival_pass() {
        let handler = PlanCommandHandler;
        assert!(!handler.matches(&bash(OFFICIAL_PLAN_COMMAND)));
        assert!(!handler.matches(&bash(&OFFICIAL_PLAN_COMMAND.replace(" | ", "   |   "))));
        assert!(!handler.matches(&bash("mkdir -p CLAUDE/Plan/Completed")));
        assert!(!handler.matches(&bash("mv CLAUDE/Plan/042-x CLAUDE/Plan/Completed/")));
        assert!(!handler.matches(&bash("ls -la CLAUDE/Plan/Archive/")));
        assert!(!handler.matches(&bash("cat CLAUDE/Plan/042-x/plan.md")));
        assert!(!handler.matches(&bash("ls src/")));
    }

    #[tokio::test]
    async fn test_reason_includes_official_command() {
        let decision = PlanCommandHandler
            .handle(&bash("ls CLAUDE/Plan"))
            .await
            .unwrap();
        assert_eq!(decision.verdict(), Verdict::Deny);
        assert!(decision.reason().unwrap().contains(OFFICIAL_PLAN_COMMAND));
    }
}
