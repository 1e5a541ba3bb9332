//! Action types
//!
//! An action is one typed, parameterized automation step. Handler-specific
//! parameters (timeouts, record-store references, condition settings,
//! sub-row references) travel in the open-ended `metadata` map.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::geometry::{Color, Coordinates};

/// Handler-specific action parameters
pub type Metadata = HashMap<String, Value>;

/// The closed set of action kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    MouseClick,
    MouseMove,
    KeyPress,
    WaitTime,
    WaitPixelColor,
    WaitPixelChange,
    WaitImage,
    WaitText,
    Conditional,
    Loop,
    Screenshot,
    Log,
    DbSearch,
    DbGetValue,
    DbIterate,
    DbSave,
    CheckValue,
    RunRow,
}

impl ActionKind {
    /// Every kind, in declaration order
    pub const ALL: [ActionKind; 18] = [
        ActionKind::MouseClick,
        ActionKind::MouseMove,
        ActionKind::KeyPress,
        ActionKind::WaitTime,
        ActionKind::WaitPixelColor,
        ActionKind::WaitPixelChange,
        ActionKind::WaitImage,
        ActionKind::WaitText,
        ActionKind::Conditional,
        ActionKind::Loop,
        ActionKind::Screenshot,
        ActionKind::Log,
        ActionKind::DbSearch,
        ActionKind::DbGetValue,
        ActionKind::DbIterate,
        ActionKind::DbSave,
        ActionKind::CheckValue,
        ActionKind::RunRow,
    ];

    /// The persisted name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::MouseClick => "MOUSE_CLICK",
            ActionKind::MouseMove => "MOUSE_MOVE",
            ActionKind::KeyPress => "KEY_PRESS",
            ActionKind::WaitTime => "WAIT_TIME",
            ActionKind::WaitPixelColor => "WAIT_PIXEL_COLOR",
            ActionKind::WaitPixelChange => "WAIT_PIXEL_CHANGE",
            ActionKind::WaitImage => "WAIT_IMAGE",
            ActionKind::WaitText => "WAIT_TEXT",
            ActionKind::Conditional => "CONDITIONAL",
            ActionKind::Loop => "LOOP",
            ActionKind::Screenshot => "SCREENSHOT",
            ActionKind::Log => "LOG",
            ActionKind::DbSearch => "DB_SEARCH",
            ActionKind::DbGetValue => "DB_GET_VALUE",
            ActionKind::DbIterate => "DB_ITERATE",
            ActionKind::DbSave => "DB_SAVE",
            ActionKind::CheckValue => "CHECK_VALUE",
            ActionKind::RunRow => "RUN_ROW",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single automation step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier
    #[serde(default)]
    pub id: String,

    /// Which handler executes this action
    #[serde(rename = "action_type")]
    pub kind: ActionKind,

    /// Display label
    #[serde(default)]
    pub name: String,

    /// Disabled actions are never dispatched
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Suspension before dispatch
    #[serde(default)]
    pub delay_before_ms: u64,

    /// Suspension after dispatch, net of the handler's execution time
    #[serde(default)]
    pub delay_after_ms: u64,

    /// Advisory repeat count; only LOOP reads it
    #[serde(default = "default_repeat_count")]
    pub repeat_count: u32,

    #[serde(default)]
    pub coordinates: Option<Coordinates>,

    #[serde(default)]
    pub color: Option<Color>,

    #[serde(default = "default_mouse_button")]
    pub mouse_button: String,

    /// Key or combo descriptor (`enter`, `ctrl+c`)
    #[serde(default)]
    pub key: Option<String>,

    #[serde(default)]
    pub metadata: Metadata,
}

fn default_enabled() -> bool {
    true
}

fn default_repeat_count() -> u32 {
    1
}

fn default_mouse_button() -> String {
    "left".to_string()
}

impl Action {
    /// Create an enabled action with a generated id
    pub fn new(kind: ActionKind, name: impl Into<String>) -> Self {
        Self {
            id: crate::new_id("action"),
            kind,
            name: name.into(),
            enabled: true,
            delay_before_ms: 0,
            delay_after_ms: 0,
            repeat_count: default_repeat_count(),
            coordinates: None,
            color: None,
            mouse_button: default_mouse_button(),
            key: None,
            metadata: Metadata::new(),
        }
    }

    /// Replace the generated id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_coordinates(mut self, x: i32, y: i32) -> Self {
        self.coordinates = Some(Coordinates::new(x, y));
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_button(mut self, button: impl Into<String>) -> Self {
        self.mouse_button = button.into();
        self
    }

    pub fn with_delays(mut self, before_ms: u64, after_ms: u64) -> Self {
        self.delay_before_ms = before_ms;
        self.delay_after_ms = after_ms;
        self
    }

    /// Add a metadata entry
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn delay_before(&self) -> Duration {
        Duration::from_millis(self.delay_before_ms)
    }

    pub fn delay_after(&self) -> Duration {
        Duration::from_millis(self.delay_after_ms)
    }

    /// Raw metadata value
    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key).filter(|v| !v.is_null())
    }

    /// Metadata value rendered as text
    pub fn meta_str(&self, key: &str) -> Option<String> {
        self.meta(key).map(value_to_text)
    }

    /// Metadata text, trimmed, or `default` when absent or blank
    pub fn meta_str_or(&self, key: &str, default: &str) -> String {
        match self.meta_str(key) {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => default.to_string(),
        }
    }

    /// Metadata value as an integer; numeric strings are accepted
    pub fn meta_i64(&self, key: &str) -> Option<i64> {
        match self.meta(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
            }
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Metadata value as a non-negative integer
    pub fn meta_u64(&self, key: &str) -> Option<u64> {
        self.meta_i64(key).map(|v| v.max(0) as u64)
    }

    pub fn meta_f64(&self, key: &str) -> Option<f64> {
        match self.meta(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn meta_bool(&self, key: &str) -> Option<bool> {
        match self.meta(key)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_f64().map(|f| f != 0.0),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" | "" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Render a JSON value the way it appears to a user: strings without quotes,
/// null as the empty string, everything else as compact JSON
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_serializes_as_screaming_name() {
        let value = serde_json::to_value(ActionKind::WaitPixelChange).unwrap();
        assert_eq!(value, json!("WAIT_PIXEL_CHANGE"));

        for kind in ActionKind::ALL {
            let parsed: ActionKind = serde_json::from_value(json!(kind.as_str())).unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_action_defaults_on_deserialize() {
        let action: Action =
            serde_json::from_value(json!({"id": "a1", "action_type": "LOG"})).unwrap();
        assert!(action.enabled);
        assert_eq!(action.repeat_count, 1);
        assert_eq!(action.mouse_button, "left");
        assert!(action.metadata.is_empty());
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let result: Result<Action, _> =
            serde_json::from_value(json!({"id": "a1", "action_type": "TELEPORT"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_metadata_accessors_tolerate_text() {
        let action = Action::new(ActionKind::WaitPixelColor, "wait")
            .with_meta("timeout_ms", "250")
            .with_meta("confidence", "0.8")
            .with_meta("any_change", "true")
            .with_meta("interval", 7.9)
            .with_meta("blank", "  ");

        assert_eq!(action.meta_u64("timeout_ms"), Some(250));
        assert_eq!(action.meta_f64("confidence"), Some(0.8));
        assert_eq!(action.meta_bool("any_change"), Some(true));
        assert_eq!(action.meta_i64("interval"), Some(7));
        assert_eq!(action.meta_str_or("blank", "fallback"), "fallback");
        assert_eq!(action.meta_u64("missing"), None);
    }

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(&json!("abc")), "abc");
        assert_eq!(value_to_text(&json!(42)), "42");
        assert_eq!(value_to_text(&Value::Null), "");
        assert_eq!(value_to_text(&json!(true)), "true");
    }
}
