//! The Hookgate Engine - one front controller per hook event kind.
//!
//! Provides the event envelope, the handler contract, frozen priority
//! registries, first-match dispatch, and the guidance protocol.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

// Dispatch core
pub mod decision;
pub mod dispatcher;
pub mod event;
pub mod handler;
pub mod registry;

// Protocol conventions
pub mod guidance;

// Configuration
pub mod config;
pub mod global_config;

// Diagnostics
pub mod trace;

// Re-export types for public API
pub use config::{EngineConfig, HookgateConfig, ProjectPaths};
pub use decision::{Decision, DecisionSource, Verdict};
pub use dispatcher::{Dispatcher, TimeoutPolicy};
pub use event::{Event, EventError, ParamValue, SessionContext, TranscriptDigest};
pub use handler::{FailureMode, Handler, HandlerCategory, HandlerError};
pub use registry::{HandlerInfo, Registry, RegistryBuilder, RegistryError, SharedRegistry};

use crate::bootstrap::{self, RegistrySet};
use crate::harness::{AdapterEnv, ClaudeHarness};
use crate::harness::types::HookEventName;

/// The main Engine struct - a dispatcher per event kind
pub struct Engine {
    /// Where configuration is reloaded from; None for engines built in memory
    config: Option<EngineConfig>,

    /// One front controller per event kind
    dispatchers: BTreeMap<HookEventName, Dispatcher>,
}

impl Engine {
    /// Load configuration for a project and build every registry
    ///
    /// Fails when the configuration is invalid or a registry does not
    /// validate; the caller must not start dispatching in that case.
    pub fn new(config: EngineConfig) -> Result<Self> {
        info!("Initializing Hookgate Engine");
        info!("Project root: {:?}", config.project_dir);

        let settings = config
            .load()
            .context("Failed to load hookgate configuration")?;
        let mut engine = Self::from_settings(&settings)?;
        engine.config = Some(config);
        Ok(engine)
    }

    /// Build from an already loaded configuration
    pub fn from_settings(settings: &HookgateConfig) -> Result<Self> {
        let registries =
            bootstrap::build_registries(settings).context("Failed to build handler registries")?;
        Ok(Self::from_registries(registries))
    }

    /// Build from explicit registries; event kinds without one get an empty registry
    pub fn from_registries(mut registries: RegistrySet) -> Self {
        let dispatchers = HookEventName::ALL
            .into_iter()
            .map(|kind| {
                let registry = registries.take(kind).unwrap_or_else(|| Registry::empty(kind));
                (kind, Dispatcher::new(registry))
            })
            .collect();

        Self {
            config: None,
            dispatchers,
        }
    }

    /// Dispatch a well-formed event to its front controller
    pub async fn evaluate(&self, event: &Event) -> Decision {
        match self.dispatchers.get(&event.kind()) {
            Some(dispatcher) => dispatcher.dispatch(event).await,
            None => Decision::allow(),
        }
    }

    /// Parse raw hook input and dispatch it
    ///
    /// Input that cannot be turned into an event resolves to the default
    /// allow without consulting any handler.
    pub async fn evaluate_input(
        &self,
        kind: HookEventName,
        input: &str,
        env: &AdapterEnv,
    ) -> Decision {
        match ClaudeHarness::parse_event(kind, input, env).await {
            Ok(event) => self.evaluate(&event).await,
            Err(e) => {
                warn!(event = %kind, error = %e, "Malformed hook event; default allow");
                Decision::allow()
            }
        }
    }

    /// Rebuild every registry from `settings` and swap them in
    ///
    /// Nothing is swapped unless all registries build.
    pub fn reload(&self, settings: &HookgateConfig) -> Result<()> {
        let mut registries =
            bootstrap::build_registries(settings).context("Failed to rebuild handler registries")?;

        for (kind, dispatcher) in &self.dispatchers {
            let registry = registries
                .take(*kind)
                .unwrap_or_else(|| Registry::empty(*kind));
            dispatcher.reload(registry);
        }
        info!("Handler registries reloaded");
        Ok(())
    }

    /// Re-read configuration from disk and reload
    pub fn reload_from_disk(&self) -> Result<()> {
        let Some(config) = &self.config else {
            debug!("Engine was built in memory; nothing to reload from disk");
            return Ok(());
        };
        let settings = config
            .load()
            .context("Failed to reload hookgate configuration")?;
        self.reload(&settings)
    }

    pub fn dispatcher(&self, kind: HookEventName) -> Option<&Dispatcher> {
        self.dispatchers.get(&kind)
    }

    /// Registered handlers for an event kind, in dispatch order
    pub fn handlers(&self, kind: HookEventName) -> Vec<HandlerInfo> {
        self.dispatchers
            .get(&kind)
            .map(|d| d.registry().snapshot().describe())
            .unwrap_or_default()
    }
}
