//! Pointer and keyboard handlers

use async_trait::async_trait;
use mb_core::{Action, ActionResult};
use std::time::Duration;
use tracing::debug;

use super::{ActionHandler, HandlerError, HandlerResult};
use crate::context::ExecutionContext;
use crate::ports::Ports;

/// MOUSE_CLICK: move to the coordinates, then click the configured button
pub struct MouseClickHandler {
    ports: Ports,
}

impl MouseClickHandler {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }
}

#[async_trait]
impl ActionHandler for MouseClickHandler {
    async fn execute(
        &self,
        action: &Action,
        _ctx: &mut ExecutionContext,
    ) -> HandlerResult<ActionResult> {
        let pointer = self.ports.pointer.as_ref().ok_or(HandlerError::PortMissing("pointer"))?;
        let at = action.coordinates.ok_or(HandlerError::MissingCoordinates)?;

        pointer.move_to(at.x, at.y, Duration::ZERO)?;
        pointer.click(&action.mouse_button)?;

        debug!(x = at.x, y = at.y, button = %action.mouse_button, "Clicked");
        Ok(ActionResult::ok(
            action,
            format!("clicked {} at ({}, {})", action.mouse_button, at.x, at.y),
        ))
    }
}

/// MOUSE_MOVE: move to the coordinates over `move_duration_ms`
pub struct MouseMoveHandler {
    ports: Ports,
}

impl MouseMoveHandler {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }
}

#[async_trait]
impl ActionHandler for MouseMoveHandler {
    async fn execute(
        &self,
        action: &Action,
        _ctx: &mut ExecutionContext,
    ) -> HandlerResult<ActionResult> {
        let pointer = self.ports.pointer.as_ref().ok_or(HandlerError::PortMissing("pointer"))?;
        let at = action.coordinates.ok_or(HandlerError::MissingCoordinates)?;
        let duration = Duration::from_millis(action.meta_u64("move_duration_ms").unwrap_or(0));

        pointer.move_to(at.x, at.y, duration)?;
        Ok(ActionResult::ok(action, format!("moved to ({}, {})", at.x, at.y)))
    }
}

/// KEY_PRESS: press a single key or a `+`-joined combination
pub struct KeyPressHandler {
    ports: Ports,
}

impl KeyPressHandler {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }
}

/// Split a `ctrl+shift+s` descriptor into its keys; a lone `+` is a key
pub(crate) fn combo_keys(descriptor: &str) -> Vec<String> {
    if descriptor.len() <= 1 || !descriptor.contains('+') {
        return vec![descriptor.to_string()];
    }
    let keys: Vec<String> = descriptor
        .split('+')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect();
    if keys.is_empty() {
        vec![descriptor.to_string()]
    } else {
        keys
    }
}

#[async_trait]
impl ActionHandler for KeyPressHandler {
    async fn execute(
        &self,
        action: &Action,
        _ctx: &mut ExecutionContext,
    ) -> HandlerResult<ActionResult> {
        let keys = self.ports.keys.as_ref().ok_or(HandlerError::PortMissing("keyboard"))?;
        let descriptor = action
            .key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(HandlerError::MissingKey)?;

        let combo = combo_keys(descriptor);
        if combo.len() > 1 {
            keys.press_hotkey(&combo)?;
        } else {
            keys.press(&combo[0])?;
        }

        Ok(ActionResult::ok(action, format!("pressed {}", descriptor)))
    }
}
