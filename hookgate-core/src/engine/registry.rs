//! Handler registry - the frozen, priority-ordered handler list.
//!
//! A [`Registry`] can only be produced by [`RegistryBuilder::build`], which
//! rejects duplicate names and out-of-band priorities. Once built it is never
//! mutated; [`SharedRegistry`] swaps whole registries for hot reload.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, info};

use super::dispatcher::TimeoutPolicy;
use super::handler::{FailureMode, Handler, HandlerCategory};
use crate::harness::types::HookEventName;

/// Static misconfiguration found while building a registry
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("duplicate handler name '{name}' in {event} registry")]
    DuplicateName { event: HookEventName, name: String },

    #[error(
        "handler '{name}' has priority {priority}, outside the {category} band {min}-{max}"
    )]
    PriorityOutOfBand {
        name: String,
        priority: u8,
        category: HandlerCategory,
        min: u8,
        max: u8,
    },

    #[error("unknown handler name '{0}' in configuration")]
    UnknownHandler(String),

    #[error("dispatch deadline for {0} must be greater than zero")]
    ZeroTimeout(String),
}

/// Summary of one registered handler, in dispatch order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerInfo {
    pub order: usize,
    pub name: String,
    pub priority: u8,
    pub category: HandlerCategory,
    pub failure_mode: FailureMode,
}

/// Collects handlers for one event kind in registration order
pub struct RegistryBuilder {
    event: HookEventName,
    handlers: Vec<Arc<dyn Handler>>,
    timeouts: TimeoutPolicy,
}

impl RegistryBuilder {
    pub fn new(event: HookEventName) -> Self {
        Self {
            event,
            handlers: Vec::new(),
            timeouts: TimeoutPolicy::default(),
        }
    }

    /// Register a handler. Registration order breaks priority ties.
    pub fn register(mut self, handler: impl Handler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Register an already shared handler
    pub fn register_shared(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn timeouts(mut self, timeouts: TimeoutPolicy) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Validate and freeze the registry
    pub fn build(self) -> Result<Registry, RegistryError> {
        let mut seen = HashSet::new();

        for handler in &self.handlers {
            if !seen.insert(handler.name().to_string()) {
                return Err(RegistryError::DuplicateName {
                    event: self.event,
                    name: handler.name().to_string(),
                });
            }

            let category = handler.category();
            let band = category.priority_band();
            if !band.contains(&handler.priority()) {
                return Err(RegistryError::PriorityOutOfBand {
                    name: handler.name().to_string(),
                    priority: handler.priority(),
                    category,
                    min: *band.start(),
                    max: *band.end(),
                });
            }
        }

        let mut handlers = self.handlers;
        // sort_by_key is stable, so registration order survives within a priority
        handlers.sort_by_key(|h| h.priority());

        for (order, handler) in handlers.iter().enumerate() {
            debug!(
                event = %self.event,
                order,
                handler = handler.name(),
                priority = handler.priority(),
                "Registered handler"
            );
        }
        info!(
            event = %self.event,
            handlers = handlers.len(),
            "Handler registry built"
        );

        Ok(Registry {
            event: self.event,
            handlers,
            timeouts: self.timeouts,
        })
    }
}

/// Frozen, ordered handler list for one event kind
pub struct Registry {
    event: HookEventName,
    handlers: Vec<Arc<dyn Handler>>,
    timeouts: TimeoutPolicy,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("event", &self.event)
            .field("handlers", &self.names())
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl Registry {
    pub fn builder(event: HookEventName) -> RegistryBuilder {
        RegistryBuilder::new(event)
    }

    /// Registry with no handlers - every dispatch resolves to the default
    pub fn empty(event: HookEventName) -> Self {
        Self {
            event,
            handlers: Vec::new(),
            timeouts: TimeoutPolicy::default(),
        }
    }

    pub fn event(&self) -> HookEventName {
        self.event
    }

    /// Handlers in dispatch order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Handler>> {
        self.handlers.iter()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn timeouts(&self) -> &TimeoutPolicy {
        &self.timeouts
    }

    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn describe(&self) -> Vec<HandlerInfo> {
        self.handlers
            .iter()
            .enumerate()
            .map(|(order, h)| HandlerInfo {
                order,
                name: h.name().to_string(),
                priority: h.priority(),
                category: h.category(),
                failure_mode: h.failure_mode(),
            })
            .collect()
    }
}

/// The active registry for a dispatcher, replaceable as a whole
///
/// Readers take an `Arc` snapshot and never hold the lock across a dispatch,
/// so an in-flight dispatch keeps the registry it started with.
#[derive(Debug, Clone)]
pub struct SharedRegistry {
    active: Arc<RwLock<Arc<Registry>>>,
}

impl SharedRegistry {
    pub fn new(registry: Registry) -> Self {
        Self {
            active: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    pub fn snapshot(&self) -> Arc<Registry> {
        let guard = self.active.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Swap in a new registry, returning the previous one
    pub fn replace(&self, registry: Registry) -> Arc<Registry> {
        let next = Arc::new(registry);
        let mut guard = self.active.write().unwrap_or_else(|e| e.into_inner());
        info!(
            event = %next.event(),
            handlers = next.len(),
            "Swapping active handler registry"
        );
        std::mem::replace(&mut *guard, next)
    }
}
