//! Startup wiring: every built-in handler, registered per event kind.
//!
//! Registration order is the tie-breaker between equal priorities, so the
//! lists below are the source of truth for dispatch order within a band.

use anyhow::Result;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::engine::{Handler, HookgateConfig, Registry, RegistryError};
use crate::handlers::post_tool_use::{AnsibleLintHandler, EslintOnWriteHandler, SitemapHandler};
use crate::handlers::pre_compact::WorkflowSnapshotHandler;
use crate::handlers::pre_tool_use::*;
use crate::handlers::session_start::WorkflowRestoreHandler;
use crate::handlers::subagent_stop::{PromptLibraryHandler, ValidatorReminderHandler};
use crate::handlers::user_prompt_submit::AutoContinueHandler;
use crate::harness::types::HookEventName;

/// One built registry per event kind that has handlers
#[derive(Debug, Default)]
pub struct RegistrySet {
    registries: BTreeMap<HookEventName, Registry>,
}

impl RegistrySet {
    pub fn insert(&mut self, registry: Registry) {
        self.registries.insert(registry.event(), registry);
    }

    pub fn get(&self, kind: HookEventName) -> Option<&Registry> {
        self.registries.get(&kind)
    }

    /// Move a registry out, e.g. into its dispatcher
    pub fn take(&mut self, kind: HookEventName) -> Option<Registry> {
        self.registries.remove(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = HookEventName> + '_ {
        self.registries.keys().copied()
    }
}

/// The built-in handlers for each event kind, in registration order
pub fn builtin_handlers(config: &HookgateConfig) -> Vec<(HookEventName, Vec<Arc<dyn Handler>>)> {
    let pre_tool_use: Vec<Arc<dyn Handler>> = vec![
        Arc::new(ControllerPatternHandler),
        Arc::new(SystemPathsHandler::new(config.system_paths.blocked_prefixes.clone())),
        Arc::new(DestructiveGitHandler),
        Arc::new(SedBlockerHandler),
        Arc::new(AnsibleEnforcementHandler),
        Arc::new(AbsolutePathsHandler),
        Arc::new(TddHandler),
        Arc::new(WorktreeCopyHandler),
        Arc::new(GitStashHandler::new(config.git_stash.escape_phrase.clone())),
        Arc::new(PlanCommandHandler),
        Arc::new(EslintDisableHandler),
        Arc::new(PlanNumberHandler),
        Arc::new(MarkdownOrganizationHandler),
        Arc::new(PlanTimeEstimatesHandler),
        Arc::new(PlanWorkflowHandler),
        Arc::new(WebSearchYearHandler::new(config.web_search.current_year)),
        Arc::new(BritishEnglishHandler),
    ];

    let post_tool_use: Vec<Arc<dyn Handler>> = vec![
        Arc::new(EslintOnWriteHandler::new(config.lint.eslint_command.clone())),
        Arc::new(AnsibleLintHandler::new(config.lint.ansible_lint_command.clone())),
        Arc::new(SitemapHandler),
    ];

    let user_prompt_submit: Vec<Arc<dyn Handler>> = vec![Arc::new(AutoContinueHandler)];

    let subagent_stop: Vec<Arc<dyn Handler>> = vec![
        Arc::new(ValidatorReminderHandler),
        Arc::new(PromptLibraryHandler),
    ];

    let pre_compact: Vec<Arc<dyn Handler>> = vec![Arc::new(WorkflowSnapshotHandler)];

    let session_start: Vec<Arc<dyn Handler>> = vec![Arc::new(WorkflowRestoreHandler)];

    vec![
        (HookEventName::PreToolUse, pre_tool_use),
        (HookEventName::PostToolUse, post_tool_use),
        (HookEventName::UserPromptSubmit, user_prompt_submit),
        (HookEventName::SubagentStop, subagent_stop),
        (HookEventName::PreCompact, pre_compact),
        (HookEventName::SessionStart, session_start),
    ]
}

/// Build and validate every registry
///
/// Names listed in `disabled` are left out. A name in `disabled` or in
/// `dispatch.timeouts_ms` that matches no built-in handler is a
/// configuration error, as is a zero deadline. Any error aborts startup.
pub fn build_registries(config: &HookgateConfig) -> Result<RegistrySet> {
    let builtins = builtin_handlers(config);

    let known: HashSet<&str> = builtins
        .iter()
        .flat_map(|(_, handlers)| handlers.iter().map(|h| h.name()))
        .collect();
    if let Some(unknown) = config
        .disabled
        .iter()
        .chain(config.dispatch.timeouts_ms.keys())
        .find(|name| !known.contains(name.as_str()))
    {
        return Err(RegistryError::UnknownHandler(unknown.clone()).into());
    }

    if config.dispatch.default_timeout_ms == 0 {
        return Err(RegistryError::ZeroTimeout("default_timeout_ms".to_string()).into());
    }
    if let Some((name, _)) = config.dispatch.timeouts_ms.iter().find(|(_, ms)| **ms == 0) {
        return Err(RegistryError::ZeroTimeout(format!("'{name}'")).into());
    }

    let disabled: HashSet<&str> = config.disabled.iter().map(String::as_str).collect();
    let timeouts = config.timeout_policy();
    let mut set = RegistrySet::default();

    for (kind, handlers) in builtins {
        let mut builder = Registry::builder(kind).timeouts(timeouts.clone());
        for handler in handlers {
            if disabled.contains(handler.name()) {
                debug!(event = %kind, handler = handler.name(), "Handler disabled by configuration");
                continue;
            }
            builder = builder.register_shared(handler);
        }
        set.insert(builder.build()?);
    }

    info!(
        registries = set.registries.len(),
        disabled = disabled.len(),
        "Handler registries ready"
    );
    Ok(set)
}
