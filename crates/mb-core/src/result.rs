//! Per-action execution outcome

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::action::Action;

/// Outcome of executing one action
///
/// Produced exactly once per executed action; actions are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub action_id: String,
    pub action_name: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    /// A successful outcome
    pub fn ok(action: &Action, message: impl Into<String>) -> Self {
        Self {
            success: true,
            action_id: action.id.clone(),
            action_name: action.name.clone(),
            message: message.into(),
            error: None,
        }
    }

    /// A failure caused by an error (missing port, bad input, port failure)
    pub fn err(action: &Action, error: impl Into<String>) -> Self {
        Self {
            success: false,
            action_id: action.id.clone(),
            action_name: action.name.clone(),
            message: String::new(),
            error: Some(error.into()),
        }
    }

    /// An unsuccessful outcome that is not an error (timeout, no match)
    pub fn unmet(action: &Action, message: impl Into<String>) -> Self {
        Self {
            success: false,
            action_id: action.id.clone(),
            action_name: action.name.clone(),
            message: message.into(),
            error: None,
        }
    }
}

impl fmt::Display for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "✓" } else { "✗" };
        let detail = match (&self.error, self.message.is_empty()) {
            (_, false) => self.message.as_str(),
            (Some(error), true) => error.as_str(),
            (None, true) => "",
        };
        write!(f, "{} {}: {}", status, self.action_name, detail)
    }
}
