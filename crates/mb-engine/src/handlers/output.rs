//! Screenshot and log handlers

use async_trait::async_trait;
use mb_core::{Action, ActionResult, Region};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::{ActionHandler, HandlerError, HandlerResult};
use crate::context::ExecutionContext;
use crate::ports::Ports;

/// SCREENSHOT: capture the screen, or a region when one is configured
pub struct ScreenshotHandler {
    ports: Ports,
}

impl ScreenshotHandler {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }
}

fn region(action: &Action) -> Option<Region> {
    let width = action.meta_i64("region_width").unwrap_or(0);
    let height = action.meta_i64("region_height").unwrap_or(0);
    if width <= 0 || height <= 0 {
        return None;
    }
    Some(Region {
        x: action.meta_i64("region_x").unwrap_or(0) as i32,
        y: action.meta_i64("region_y").unwrap_or(0) as i32,
        width: width as u32,
        height: height as u32,
    })
}

#[async_trait]
impl ActionHandler for ScreenshotHandler {
    async fn execute(
        &self,
        action: &Action,
        ctx: &mut ExecutionContext,
    ) -> HandlerResult<ActionResult> {
        let screen = self.ports.screen.as_ref().ok_or(HandlerError::PortMissing("screen"))?;

        match screen.take_screenshot(region(action))? {
            Some(path) => {
                ctx.set_var("last_screenshot", Value::String(path.clone()));
                Ok(ActionResult::ok(action, format!("screenshot saved: {}", path)))
            }
            None => Ok(ActionResult::unmet(action, "screenshot could not be taken")),
        }
    }
}

/// LOG: emit a message and remember it in `last_log_message`
pub struct LogHandler;

impl LogHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionHandler for LogHandler {
    async fn execute(
        &self,
        action: &Action,
        ctx: &mut ExecutionContext,
    ) -> HandlerResult<ActionResult> {
        let message = action.meta_str("message").unwrap_or_else(|| action.name.clone());
        let level = action.meta_str_or("log_level", "INFO").to_uppercase();

        match level.as_str() {
            "DEBUG" | "TRACE" => debug!(target: "macroboard::board", "{}", message),
            "WARNING" | "WARN" => warn!(target: "macroboard::board", "{}", message),
            "ERROR" | "CRITICAL" => error!(target: "macroboard::board", "{}", message),
            _ => info!(target: "macroboard::board", "{}", message),
        }

        ctx.set_var("last_log_message", Value::String(message.clone()));
        ctx.set_var("last_log_level", Value::String(level.clone()));
        Ok(ActionResult::ok(action, format!("[{}] {}", level, message)))
    }
}
