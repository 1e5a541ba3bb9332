//! Execution context
//!
//! One context exists per board run. It owns the shared variable space and
//! is passed by mutable reference into every handler call, including the
//! nested calls made by RUN_ROW, so a subroutine sees and mutates the same
//! state as its caller.
//!
//! Control flow is signalled through reserved variables that the engine
//! checks at each iteration boundary:
//!
//! - `_skip_next_count` - number of upcoming actions to skip
//! - `_break_execution` - abort the run
//! - `_running` - false once the run is finished or stopped
//! - `_board` - id of the board being run

use mb_core::Board;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::registry::HandlerRegistry;

/// Reserved variable: number of upcoming actions to skip
pub const SKIP_NEXT_COUNT: &str = "_skip_next_count";
/// Reserved variable: abort the run at the next boundary
pub const BREAK_EXECUTION: &str = "_break_execution";
/// Reserved variable: whether the run is still active
pub const RUNNING: &str = "_running";
/// Reserved variable: id of the running board
pub const BOARD: &str = "_board";

/// Shared mutable state of a single run
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Shared variables visible to every handler
    pub variables: HashMap<String, Value>,

    board: Option<Arc<Board>>,
    registry: Option<Arc<HandlerRegistry>>,
    call_depth: usize,
}

impl ExecutionContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context for running `board`
    pub fn for_board(board: Arc<Board>) -> Self {
        let mut ctx = Self::new();
        ctx.set_var(BOARD, Value::String(board.id.clone()));
        ctx.set_var(RUNNING, Value::Bool(true));
        ctx.board = Some(board);
        ctx
    }

    /// Add a variable to the context
    pub fn with_var(mut self, key: impl Into<String>, value: Value) -> Self {
        self.variables.insert(key.into(), value);
        self
    }

    /// Set a variable
    pub fn set_var(&mut self, key: impl Into<String>, value: Value) {
        self.variables.insert(key.into(), value);
    }

    /// Get a variable
    pub fn get_var(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// The board being run, for row lookups
    pub fn board(&self) -> Option<&Arc<Board>> {
        self.board.as_ref()
    }

    /// The registry that dispatched the current action
    pub fn registry(&self) -> Option<Arc<HandlerRegistry>> {
        self.registry.clone()
    }

    /// Inject the dispatching registry before a handler call
    pub fn attach_registry(&mut self, registry: Arc<HandlerRegistry>) {
        self.registry = Some(registry);
    }

    /// Whether the run is still active (`_running`, defaulting to true)
    pub fn is_running(&self) -> bool {
        self.get_var(RUNNING).and_then(Value::as_bool).unwrap_or(true)
    }

    pub(crate) fn set_running(&mut self, running: bool) {
        self.set_var(RUNNING, Value::Bool(running));
    }

    /// Ask the engine to skip one more upcoming action
    pub fn request_skip(&mut self) {
        let count = self.skip_count() + 1;
        self.set_var(SKIP_NEXT_COUNT, Value::from(count));
    }

    /// Pending skip count
    pub fn skip_count(&self) -> u64 {
        self.get_var(SKIP_NEXT_COUNT)
            .and_then(|v| v.as_u64().or_else(|| v.as_str()?.trim().parse().ok()))
            .unwrap_or(0)
    }

    /// Consume one pending skip, returning whether there was one
    pub(crate) fn take_skip(&mut self) -> bool {
        let count = self.skip_count();
        if count == 0 {
            return false;
        }
        self.set_var(SKIP_NEXT_COUNT, Value::from(count - 1));
        true
    }

    /// Ask the engine to abort the run
    pub fn request_break(&mut self) {
        self.set_var(BREAK_EXECUTION, Value::Bool(true));
    }

    pub fn break_requested(&self) -> bool {
        match self.get_var(BREAK_EXECUTION) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Null) | None => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }

    /// Current RUN_ROW nesting depth
    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    pub(crate) fn enter_call(&mut self) {
        self.call_depth += 1;
    }

    pub(crate) fn exit_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }
}
