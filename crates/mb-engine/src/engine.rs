//! Execution engine
//!
//! Runs a board's flattened action sequence strictly in order. Control flow
//! requests (skip, break) raised by handlers and the engine's own stop and
//! pause requests are observed at iteration boundaries only; a handler
//! that is already waiting finishes its own wait first.

use mb_config::EngineConfig;
use mb_core::{Action, ActionResult, Board};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};

use crate::context::ExecutionContext;
use crate::registry::HandlerRegistry;

/// Errors that prevent a run from starting
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("a board is already running on this engine")]
    AlreadyRunning,
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Observable engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Paused,
}

/// Sequential board runner
pub struct ExecutionEngine {
    registry: Arc<HandlerRegistry>,
    settings: EngineConfig,
    running: AtomicBool,
    paused: AtomicBool,
    stop_requested: AtomicBool,
    variables: RwLock<HashMap<String, Value>>,
    seeds: RwLock<HashMap<String, Value>>,
    results: RwLock<Vec<ActionResult>>,
}

impl ExecutionEngine {
    pub fn new(registry: Arc<HandlerRegistry>, settings: EngineConfig) -> Self {
        Self {
            registry,
            settings,
            running: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            variables: RwLock::new(HashMap::new()),
            seeds: RwLock::new(HashMap::new()),
            results: RwLock::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn state(&self) -> EngineState {
        if !self.running.load(Ordering::SeqCst) {
            EngineState::Idle
        } else if self.paused.load(Ordering::SeqCst) {
            EngineState::Paused
        } else {
            EngineState::Running
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request the active run to end at the next boundary
    pub fn stop(&self) {
        if self.running.load(Ordering::SeqCst) {
            info!("Stop requested");
        }
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        debug!("Pause requested");
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        debug!("Resume requested");
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Run every enabled action of `board`
    pub async fn execute_board(&self, board: impl Into<Arc<Board>>) -> EngineResult<Vec<ActionResult>> {
        self.execute_board_with(board, HashMap::new()).await
    }

    /// Run `board` with extra shared variables seeded before the first action
    ///
    /// Variables set through [`set_variable`](Self::set_variable) since the
    /// previous run are seeded as well; `seed` wins on conflicts.
    #[instrument(skip_all)]
    pub async fn execute_board_with(
        &self,
        board: impl Into<Arc<Board>>,
        seed: HashMap<String, Value>,
    ) -> EngineResult<Vec<ActionResult>> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Engine already running");
            return Err(EngineError::AlreadyRunning);
        }
        let _guard = RunGuard(&self.running);
        self.stop_requested.store(false, Ordering::SeqCst);

        let board = board.into();
        let actions: Vec<Action> = board.get_all_actions().into_iter().cloned().collect();
        info!(board = %board.id, actions = actions.len(), "Starting board run");

        let mut ctx = ExecutionContext::for_board(Arc::clone(&board));
        {
            let mut pending = self.seeds.write().await;
            for (name, value) in pending.drain().chain(seed) {
                ctx.set_var(name, value);
            }
        }
        self.results.write().await.clear();

        let mut results = Vec::with_capacity(actions.len());
        for action in &actions {
            if self.stop_requested.load(Ordering::SeqCst) {
                info!(board = %board.id, "Run stopped");
                break;
            }
            if ctx.break_requested() {
                debug!(action = %action.name, "Break requested, ending run");
                break;
            }
            if ctx.take_skip() {
                debug!(action = %action.name, "Skipping action");
                continue;
            }
            while self.paused.load(Ordering::SeqCst) && !self.stop_requested.load(Ordering::SeqCst) {
                sleep(self.settings.pause_poll_interval()).await;
            }
            if self.stop_requested.load(Ordering::SeqCst) {
                info!(board = %board.id, "Run stopped while paused");
                break;
            }

            let result = self.execute_action(action, &mut ctx).await;
            self.results.write().await.push(result.clone());
            results.push(result);
        }

        ctx.set_running(false);
        *self.variables.write().await = ctx.variables;
        self.paused.store(false, Ordering::SeqCst);

        let failed = results.iter().filter(|r| !r.success).count();
        info!(board = %board.id, executed = results.len(), failed, "Board run finished");
        Ok(results)
    }

    /// Execute a single action with its delays, always producing a result
    pub async fn execute_action(&self, action: &Action, ctx: &mut ExecutionContext) -> ActionResult {
        if !action.enabled {
            return ActionResult::unmet(action, "disabled");
        }

        if action.delay_before_ms > 0 {
            sleep(action.delay_before()).await;
        }

        let started = Instant::now();
        let result = self.registry.dispatch(action, ctx).await;
        let elapsed = started.elapsed();

        debug!(
            action = %action.name,
            kind = %action.kind,
            success = result.success,
            elapsed_ms = elapsed.as_millis() as u64,
            "Action executed"
        );

        let remaining = action.delay_after().saturating_sub(elapsed);
        if !remaining.is_zero() {
            sleep(remaining).await;
        }

        result
    }

    /// Results of the last run
    pub async fn results(&self) -> Vec<ActionResult> {
        self.results.read().await.clone()
    }

    /// Shared variables left by the last run
    pub async fn variables(&self) -> HashMap<String, Value> {
        self.variables.read().await.clone()
    }

    pub async fn get_variable(&self, name: &str) -> Option<Value> {
        self.variables.read().await.get(name).cloned()
    }

    /// Set a variable that the next run starts with
    pub async fn set_variable(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.variables.write().await.insert(name.clone(), value.clone());
        self.seeds.write().await.insert(name, value);
    }
}

/// Clears the running flag when a run ends, including when its future is dropped
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("state", &self.state())
            .field("registry", &self.registry)
            .finish()
    }
}
