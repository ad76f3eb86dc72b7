//! Handlers that run before a tool executes and may deny it

mod absolute_paths;
mod ansible_enforcement;
mod british_english;
mod controller_pattern;
mod destructive_git;
mod eslint_disable;
mod git_stash;
mod markdown_organization;
mod plan_command;
mod plan_number;
mod plan_time_estimates;
mod plan_workflow;
mod sed_blocker;
mod system_paths;
mod tdd;
mod websearch_year;
mod worktree_copy;

pub use absolute_paths::AbsolutePathsHandler;
pub use ansible_enforcement::AnsibleEnforcementHandler;
pub use british_english::BritishEnglishHandler;
pub use controller_pattern::ControllerPatternHandler;
pub use destructive_git::DestructiveGitHandler;
pub use eslint_disable::EslintDisableHandler;
pub use git_stash::GitStashHandler;
pub use markdown_organization::MarkdownOrganizationHandler;
pub use plan_command::{PlanCommandHandler, OFFICIAL_PLAN_COMMAND};
pub use plan_number::PlanNumberHandler;
pub use plan_time_estimates::PlanTimeEstimatesHandler;
pub use plan_workflow::PlanWorkflowHandler;
pub use sed_blocker::SedBlockerHandler;
pub use system_paths::SystemPathsHandler;
pub use tdd::TddHandler;
pub use websearch_year::WebSearchYearHandler;
pub use worktree_copy::WorktreeCopyHandler;
