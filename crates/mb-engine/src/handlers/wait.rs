//! Waiting handlers
//!
//! Pixel and image waits poll the screen port at a fixed interval until they
//! match or their timeout passes. A timeout is an unmet outcome, not an
//! error.

use async_trait::async_trait;
use mb_config::EngineConfig;
use mb_core::{value_to_text, Action, ActionResult, Color};
use serde_json::Value;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use super::{polling, ActionHandler, HandlerError, HandlerResult};
use crate::context::ExecutionContext;
use crate::ports::Ports;

/// WAIT_TIME: suspend for `delay_before_ms`, else `wait_ms`, else the default
pub struct WaitTimeHandler {
    settings: EngineConfig,
}

impl WaitTimeHandler {
    pub fn new(settings: EngineConfig) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ActionHandler for WaitTimeHandler {
    async fn execute(
        &self,
        action: &Action,
        _ctx: &mut ExecutionContext,
    ) -> HandlerResult<ActionResult> {
        let duration = if action.delay_before_ms > 0 {
            action.delay_before()
        } else {
            action
                .meta_u64("wait_ms")
                .map(Duration::from_millis)
                .unwrap_or_else(|| self.settings.default_delay())
        };

        sleep(duration).await;
        Ok(ActionResult::ok(action, format!("waited {} ms", duration.as_millis())))
    }
}

/// Target color from the action's color, or from `color_r/g/b` metadata
///
/// Missing channels read as 0 and a missing tolerance as the default, so
/// an action with no color at all waits for black.
fn target_color(action: &Action) -> Color {
    if let Some(color) = action.color {
        return color;
    }
    let channel = |key: &str| action.meta_i64(key).map(|v| v.clamp(0, 255) as u8);
    let color = Color::rgb(
        channel("color_r").unwrap_or(0),
        channel("color_g").unwrap_or(0),
        channel("color_b").unwrap_or(0),
    );
    match channel("tolerance") {
        Some(tolerance) => color.with_tolerance(tolerance),
        None => color,
    }
}

/// WAIT_PIXEL_COLOR: wait until a pixel matches a color, or (with
/// `any_change`) until it differs from its initial sample
pub struct WaitPixelColorHandler {
    ports: Ports,
    settings: EngineConfig,
}

impl WaitPixelColorHandler {
    pub fn new(ports: Ports, settings: EngineConfig) -> Self {
        Self { ports, settings }
    }
}

#[async_trait]
impl ActionHandler for WaitPixelColorHandler {
    async fn execute(
        &self,
        action: &Action,
        _ctx: &mut ExecutionContext,
    ) -> HandlerResult<ActionResult> {
        let screen = self.ports.screen.as_ref().ok_or(HandlerError::PortMissing("screen"))?;
        let at = action.coordinates.ok_or(HandlerError::MissingCoordinates)?;
        let (timeout, interval) = polling(action, &self.settings);

        // In any-change mode the initial sample becomes the reference color
        let any_change = action.meta_bool("any_change").unwrap_or(false);
        let (target, want_match) = if any_change {
            match screen.get_pixel_color(at.x, at.y)? {
                Some(initial) => (initial, false),
                None => return Ok(ActionResult::err(action, "could not sample initial pixel color")),
            }
        } else {
            (target_color(action), true)
        };

        let start = Instant::now();
        while start.elapsed() <= timeout {
            if let Some(current) = screen.get_pixel_color(at.x, at.y)? {
                if target.matches(&current) == want_match {
                    debug!(x = at.x, y = at.y, ?current, "Pixel condition met");
                    let what = if any_change { "changed" } else { "matched" };
                    return Ok(ActionResult::ok(
                        action,
                        format!("pixel at ({}, {}) {}", at.x, at.y, what),
                    ));
                }
            }
            sleep(interval).await;
        }

        Ok(ActionResult::unmet(
            action,
            format!("timed out after {} ms waiting for pixel color", timeout.as_millis()),
        ))
    }
}

/// WAIT_PIXEL_CHANGE: wait until a pixel no longer matches its initial sample
pub struct WaitPixelChangeHandler {
    ports: Ports,
    settings: EngineConfig,
}

impl WaitPixelChangeHandler {
    pub fn new(ports: Ports, settings: EngineConfig) -> Self {
        Self { ports, settings }
    }
}

#[async_trait]
impl ActionHandler for WaitPixelChangeHandler {
    async fn execute(
        &self,
        action: &Action,
        _ctx: &mut ExecutionContext,
    ) -> HandlerResult<ActionResult> {
        let screen = self.ports.screen.as_ref().ok_or(HandlerError::PortMissing("screen"))?;
        let at = action.coordinates.ok_or(HandlerError::MissingCoordinates)?;
        let (timeout, interval) = polling(action, &self.settings);

        let Some(initial) = screen.get_pixel_color(at.x, at.y)? else {
            return Ok(ActionResult::err(action, "could not sample initial pixel color"));
        };

        let start = Instant::now();
        while start.elapsed() <= timeout {
            if let Some(current) = screen.get_pixel_color(at.x, at.y)? {
                if !initial.matches(&current) {
                    return Ok(ActionResult::ok(
                        action,
                        format!("pixel at ({}, {}) changed", at.x, at.y),
                    ));
                }
            }
            sleep(interval).await;
        }

        Ok(ActionResult::unmet(
            action,
            format!("no pixel change within {} ms", timeout.as_millis()),
        ))
    }
}

/// WAIT_IMAGE: wait until an image appears on screen
///
/// The location of the match is stored in `last_image_x` / `last_image_y`.
pub struct WaitImageHandler {
    ports: Ports,
    settings: EngineConfig,
}

impl WaitImageHandler {
    pub fn new(ports: Ports, settings: EngineConfig) -> Self {
        Self { ports, settings }
    }
}

const DEFAULT_CONFIDENCE: f64 = 0.9;

#[async_trait]
impl ActionHandler for WaitImageHandler {
    async fn execute(
        &self,
        action: &Action,
        ctx: &mut ExecutionContext,
    ) -> HandlerResult<ActionResult> {
        let screen = self.ports.screen.as_ref().ok_or(HandlerError::PortMissing("screen"))?;
        let image_path = action
            .meta_str("image_path")
            .filter(|p| !p.trim().is_empty())
            .ok_or(HandlerError::MissingParameter("image_path"))?;
        let confidence = action.meta_f64("confidence").unwrap_or(DEFAULT_CONFIDENCE);
        let (timeout, interval) = polling(action, &self.settings);

        let start = Instant::now();
        while start.elapsed() <= timeout {
            if let Some(found) = screen.find_image(&image_path, confidence)? {
                ctx.set_var("last_image_x", Value::from(found.x));
                ctx.set_var("last_image_y", Value::from(found.y));
                return Ok(ActionResult::ok(
                    action,
                    format!("image found at ({}, {})", found.x, found.y),
                ));
            }
            sleep(interval).await;
        }

        Ok(ActionResult::unmet(
            action,
            format!("image {} not found within {} ms", image_path, timeout.as_millis()),
        ))
    }
}

/// WAIT_TEXT: check recognized screen text held in the `ocr_text` variable
///
/// Text recognition itself is not provided; a caller that has it stores its
/// output in `ocr_text` before this action runs.
pub struct WaitTextHandler;

impl WaitTextHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WaitTextHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionHandler for WaitTextHandler {
    async fn execute(
        &self,
        action: &Action,
        ctx: &mut ExecutionContext,
    ) -> HandlerResult<ActionResult> {
        let expected = action.meta_str_or("search_text", "");
        let recognized = ctx.get_var("ocr_text").map(value_to_text).unwrap_or_default();

        if !expected.is_empty() && recognized.contains(&expected) {
            return Ok(ActionResult::ok(action, format!("text '{}' found", expected)));
        }
        Ok(ActionResult::unmet(
            action,
            "text not found; WAIT_TEXT requires a text recognition provider",
        ))
    }
}
