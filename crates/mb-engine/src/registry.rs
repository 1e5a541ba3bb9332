//! Handler registry
//!
//! Maps every [`ActionKind`] to its handler. A registry built with
//! [`HandlerRegistry::new`] holds the standard handler for all kinds, wired
//! to one set of ports; individual handlers can be replaced afterwards.

use dashmap::DashMap;
use mb_config::EngineConfig;
use mb_core::{Action, ActionKind, ActionResult};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::context::ExecutionContext;
use crate::handlers::{default_handlers, ActionHandler};
use crate::ports::Ports;

/// Registry of action handlers keyed by action kind
pub struct HandlerRegistry {
    handlers: DashMap<ActionKind, Arc<dyn ActionHandler>>,
}

impl HandlerRegistry {
    /// Create a registry with the standard handler for every kind
    pub fn new(ports: Ports, settings: EngineConfig) -> Self {
        let registry = Self::empty();
        for (kind, handler) in default_handlers(&ports, &settings) {
            registry.handlers.insert(kind, handler);
        }
        debug!(?ports, count = registry.handlers.len(), "Registered default handlers");
        registry
    }

    /// Create a registry without any handlers
    pub fn empty() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Register or replace the handler for a kind
    #[instrument(skip(self, handler))]
    pub fn register_handler(&self, kind: ActionKind, handler: Arc<dyn ActionHandler>) {
        debug!(kind = %kind, "Registering handler");
        self.handlers.insert(kind, handler);
    }

    pub fn get_handler(&self, kind: ActionKind) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(&kind).map(|h| h.clone())
    }

    pub fn has_handler(&self, kind: ActionKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Run one action through its handler, always producing a result
    ///
    /// The registry is attached to the context first so that RUN_ROW can
    /// dispatch nested actions through it.
    pub async fn dispatch(self: &Arc<Self>, action: &Action, ctx: &mut ExecutionContext) -> ActionResult {
        let Some(handler) = self.get_handler(action.kind) else {
            return ActionResult::err(action, format!("no handler for kind {}", action.kind));
        };

        ctx.attach_registry(Arc::clone(self));
        match handler.execute(action, ctx).await {
            Ok(result) => result,
            Err(e) => {
                debug!(action = %action.name, kind = %action.kind, error = %e, "Handler failed");
                ActionResult::err(action, e.to_string())
            }
        }
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&'static str> = self.handlers.iter().map(|e| e.key().as_str()).collect();
        kinds.sort_unstable();
        f.debug_struct("HandlerRegistry").field("kinds", &kinds).finish()
    }
}
