//! Action handlers
//!
//! One handler per [`ActionKind`], all sharing the [`ActionHandler`]
//! contract. Handlers report every expected failure (missing port, missing
//! coordinates, port errors, timeouts) as an [`ActionResult`]; a returned
//! [`HandlerError`] is turned into a failure result at the dispatch point,
//! so nothing escapes a run.

mod flow;
mod input;
mod output;
mod records;
mod wait;

pub use flow::{ConditionalHandler, Decision, LoopHandler, RunRowHandler};
pub use input::{KeyPressHandler, MouseClickHandler, MouseMoveHandler};
pub use output::{LogHandler, ScreenshotHandler};
pub use records::{
    CheckValueHandler, DbGetValueHandler, DbIterateHandler, DbSaveHandler, DbSearchHandler,
    ITERATE_LIMIT,
};
pub use wait::{
    WaitImageHandler, WaitPixelChangeHandler, WaitPixelColorHandler, WaitTextHandler,
    WaitTimeHandler,
};

use async_trait::async_trait;
use mb_config::EngineConfig;
use mb_core::{value_to_text, Action, ActionKind, ActionResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::context::ExecutionContext;
use crate::ports::{PortError, Ports};

/// Errors a handler may return instead of building a result itself
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0} port is not configured")]
    PortMissing(&'static str),

    #[error("coordinates are not set")]
    MissingCoordinates,

    #[error("key is not set")]
    MissingKey,

    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("record store '{0}' not found")]
    StoreNotFound(String),

    #[error(transparent)]
    Port(#[from] PortError),
}

/// Result type for handler execution
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Executable behavior bound to one action kind
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Execute `action` against the shared run context
    async fn execute(
        &self,
        action: &Action,
        ctx: &mut ExecutionContext,
    ) -> HandlerResult<ActionResult>;
}

/// Build the standard handler for every kind from one set of ports
pub fn default_handlers(
    ports: &Ports,
    settings: &EngineConfig,
) -> Vec<(ActionKind, Arc<dyn ActionHandler>)> {
    let p = || ports.clone();
    let s = || settings.clone();

    vec![
        (ActionKind::MouseClick, Arc::new(MouseClickHandler::new(p())) as Arc<dyn ActionHandler>),
        (ActionKind::MouseMove, Arc::new(MouseMoveHandler::new(p()))),
        (ActionKind::KeyPress, Arc::new(KeyPressHandler::new(p()))),
        (ActionKind::WaitTime, Arc::new(WaitTimeHandler::new(s()))),
        (ActionKind::WaitPixelColor, Arc::new(WaitPixelColorHandler::new(p(), s()))),
        (ActionKind::WaitPixelChange, Arc::new(WaitPixelChangeHandler::new(p(), s()))),
        (ActionKind::WaitImage, Arc::new(WaitImageHandler::new(p(), s()))),
        (ActionKind::WaitText, Arc::new(WaitTextHandler::new())),
        (ActionKind::Conditional, Arc::new(ConditionalHandler::new(p()))),
        (ActionKind::Loop, Arc::new(LoopHandler::new())),
        (ActionKind::Screenshot, Arc::new(ScreenshotHandler::new(p()))),
        (ActionKind::Log, Arc::new(LogHandler::new())),
        (ActionKind::DbSearch, Arc::new(DbSearchHandler::new(p()))),
        (ActionKind::DbGetValue, Arc::new(DbGetValueHandler::new())),
        (ActionKind::DbIterate, Arc::new(DbIterateHandler::new(p()))),
        (ActionKind::DbSave, Arc::new(DbSaveHandler::new(p()))),
        (ActionKind::CheckValue, Arc::new(CheckValueHandler::new(p()))),
        (ActionKind::RunRow, Arc::new(RunRowHandler::new(s()))),
    ]
}

/// Replace `{name}` placeholders with the text of shared variables
pub fn substitute_variables(text: &str, variables: &HashMap<String, Value>) -> String {
    if !text.contains('{') {
        return text.to_string();
    }
    variables.iter().fold(text.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{}}}", name), &value_to_text(value))
    })
}

/// Timeout and interval of a polling handler, from metadata or settings
fn polling(action: &Action, settings: &EngineConfig) -> (Duration, Duration) {
    let timeout = action
        .meta_u64("timeout_ms")
        .map(Duration::from_millis)
        .unwrap_or_else(|| settings.default_wait_timeout());
    let interval = action
        .meta_u64("check_interval_ms")
        .map(Duration::from_millis)
        .unwrap_or_else(|| settings.pixel_check_interval());
    (timeout, interval.max(Duration::from_millis(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_substitute_variables() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), json!("alice"));
        vars.insert("code".to_string(), json!(7));

        assert_eq!(
            substitute_variables("{name} has {code} ({missing})", &vars),
            "alice has 7 ({missing})"
        );
        assert_eq!(substitute_variables("plain", &vars), "plain");
    }

    #[test]
    fn test_default_handlers_cover_every_kind() {
        let handlers = default_handlers(&Ports::none(), &EngineConfig::default());
        for kind in ActionKind::ALL {
            assert!(handlers.iter().any(|(k, _)| *k == kind), "missing {kind}");
        }
    }

    #[test]
    fn test_polling_defaults_and_floor() {
        let settings = EngineConfig::default();
        let action = Action::new(ActionKind::WaitPixelChange, "w").with_meta("check_interval_ms", 0);
        let (timeout, interval) = polling(&action, &settings);
        assert_eq!(timeout, Duration::from_millis(5000));
        assert_eq!(interval, Duration::from_millis(1));
    }
}
