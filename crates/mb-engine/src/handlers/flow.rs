//! Control-flow handlers: conditionals, loops and row calls

use async_trait::async_trait;
use mb_config::EngineConfig;
use mb_core::{value_to_text, Action, ActionResult};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio::task::yield_now;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::{ActionHandler, HandlerError, HandlerResult};
use crate::context::ExecutionContext;
use crate::ports::Ports;

/// What a conditional does with the action that follows it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    ExecuteNext,
    SkipNext,
    Break,
}

impl Decision {
    /// Parse a decision name; anything unrecognized continues normally
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "skip_next" => Decision::SkipNext,
            "break" => Decision::Break,
            _ => Decision::ExecuteNext,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::ExecuteNext => "execute_next",
            Decision::SkipNext => "skip_next",
            Decision::Break => "break",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CONDITIONAL: evaluate a condition and signal skip/break to the engine
///
/// Supported `condition_type` values are `variable_equals` (default),
/// `image_exists` and `pixel_color`. The action itself always succeeds;
/// its message reports the outcome and the decision taken.
pub struct ConditionalHandler {
    ports: Ports,
}

impl ConditionalHandler {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }

    fn evaluate(&self, action: &Action, ctx: &ExecutionContext) -> HandlerResult<bool> {
        let condition_type = action.meta_str_or("condition_type", "variable_equals");

        match condition_type.as_str() {
            "variable_equals" => {
                let name = action.meta_str_or("variable_name", "");
                let current = ctx.get_var(&name).map(value_to_text).unwrap_or_default();
                let expected = action.meta_str("condition_value").unwrap_or_default();
                Ok(current == expected)
            }
            "image_exists" => {
                let Some(screen) = &self.ports.screen else {
                    return Ok(false);
                };
                let image_path = action.meta_str_or("image_path", "");
                let confidence = action.meta_f64("confidence").unwrap_or(0.9);
                Ok(screen.find_image(&image_path, confidence)?.is_some())
            }
            "pixel_color" => {
                let (Some(screen), Some(at), Some(target)) =
                    (&self.ports.screen, action.coordinates, action.color)
                else {
                    return Ok(false);
                };
                Ok(screen
                    .get_pixel_color(at.x, at.y)?
                    .is_some_and(|current| target.matches(&current)))
            }
            other => {
                warn!(condition_type = %other, "Unknown condition type, treating as false");
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl ActionHandler for ConditionalHandler {
    async fn execute(
        &self,
        action: &Action,
        ctx: &mut ExecutionContext,
    ) -> HandlerResult<ActionResult> {
        let outcome = self.evaluate(action, ctx)?;
        let decision = if outcome {
            Decision::parse(&action.meta_str_or("if_true", "execute_next"))
        } else {
            Decision::parse(&action.meta_str_or("if_false", "skip_next"))
        };

        match decision {
            Decision::SkipNext => ctx.request_skip(),
            Decision::Break => ctx.request_break(),
            Decision::ExecuteNext => {}
        }

        debug!(action = %action.name, outcome, %decision, "Condition evaluated");
        Ok(ActionResult::ok(
            action,
            format!("condition={}; decision={}", outcome, decision),
        ))
    }
}

/// LOOP: a counted pause that publishes `_loop_index` on every iteration
///
/// Without a delay each iteration still yields to the runtime.
pub struct LoopHandler;

impl LoopHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoopHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionHandler for LoopHandler {
    async fn execute(
        &self,
        action: &Action,
        ctx: &mut ExecutionContext,
    ) -> HandlerResult<ActionResult> {
        let iterations = action
            .meta_i64("iterations")
            .unwrap_or_else(|| i64::from(action.repeat_count))
            .max(1) as u64;
        let delay = Duration::from_millis(action.meta_u64("delay_ms").unwrap_or(0));

        for i in 0..iterations {
            ctx.set_var("_loop_index", Value::from(i + 1));
            if delay.is_zero() {
                yield_now().await;
            } else {
                sleep(delay).await;
            }
        }
        ctx.set_var("_loop_iterations", Value::from(iterations));

        Ok(ActionResult::ok(action, format!("loop completed: {} iterations", iterations)))
    }
}

/// RUN_ROW: run another row of the same board as a subroutine
///
/// The row's enabled actions are dispatched in order through the same
/// registry and context, without per-action delays. Their individual
/// results are not collected; the call succeeds once the row has run.
pub struct RunRowHandler {
    settings: EngineConfig,
}

impl RunRowHandler {
    pub fn new(settings: EngineConfig) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ActionHandler for RunRowHandler {
    async fn execute(
        &self,
        action: &Action,
        ctx: &mut ExecutionContext,
    ) -> HandlerResult<ActionResult> {
        let row_id = action.meta_str_or("row_id", "");
        let Some(board) = ctx.board().cloned() else {
            return Ok(ActionResult::err(action, "board not available for row call"));
        };
        let Some(row) = board.row(&row_id) else {
            return Ok(ActionResult::err(action, format!("row {} not found", row_id)));
        };
        if !row.enabled {
            return Ok(ActionResult::unmet(action, format!("row {} is disabled", row.name)));
        }
        if ctx.call_depth() >= self.settings.max_call_depth {
            return Ok(ActionResult::err(
                action,
                format!("call depth exceeded ({})", self.settings.max_call_depth),
            ));
        }
        let registry = ctx.registry().ok_or(HandlerError::MissingParameter("registry"))?;

        debug!(row = %row.name, depth = ctx.call_depth() + 1, "Entering row");
        ctx.enter_call();
        let mut failed = 0usize;
        let mut executed = 0usize;
        for sub in row.enabled_actions() {
            let result = registry.dispatch(sub, ctx).await;
            executed += 1;
            if !result.success {
                failed += 1;
            }
        }
        ctx.exit_call();

        Ok(ActionResult::ok(
            action,
            format!("row {} executed ({} actions, {} unsuccessful)", row.name, executed, failed),
        ))
    }
}
