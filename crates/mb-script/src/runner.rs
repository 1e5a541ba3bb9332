//! Script execution: native interpreter or in-engine emulation
//!
//! `execute_file` checks path containment, parses and validates the
//! script, then either hands the file to a native interpreter process or
//! translates it to a board and runs it on the [`ExecutionEngine`]. Every
//! failure is reported through [`ScriptExecution`]; nothing is returned as
//! an `Err`.

use mb_config::ScriptConfig;
use mb_core::{ActionResult, Board};
use mb_engine::ExecutionEngine;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command as ProcessCommand;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::ScriptResult;
use crate::model::{Diagnostic, Script, ValidationResult};
use crate::parser::parse_file;
use crate::translator::to_board;
use crate::validator::Validator;

/// Environment variable naming the native interpreter
pub const INTERPRETER_ENV: &str = "AUTOHOTKEY_EXE";

#[cfg(windows)]
const INSTALL_PATHS: &[&str] = &[
    r"C:\Program Files\AutoHotkey\v2\AutoHotkey64.exe",
    r"C:\Program Files\AutoHotkey\AutoHotkey.exe",
];

#[cfg(windows)]
const PATH_NAMES: &[&str] = &["AutoHotkey64.exe", "AutoHotkey.exe"];

/// How long a killed process gets to flush its pipes
const OUTPUT_GRACE: Duration = Duration::from_millis(250);

/// Requested execution mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Native when an interpreter can be found, emulated otherwise
    #[default]
    Auto,
    Native,
    Emulated,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(RunMode::Auto),
            "native" => Ok(RunMode::Native),
            "emulated" => Ok(RunMode::Emulated),
            other => Err(format!("Unknown mode: {}", other)),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunMode::Auto => "auto",
            RunMode::Native => "native",
            RunMode::Emulated => "emulated",
        };
        f.write_str(s)
    }
}

/// Mode a script actually ran in; `None` when it was rejected up front
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutedMode {
    None,
    Native,
    Emulated,
}

/// Outcome of [`ScriptRunner::execute_file`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptExecution {
    pub success: bool,
    pub mode: ExecutedMode,
    pub return_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub diagnostics: Vec<Diagnostic>,
    /// Translated board of an emulated run
    pub board: Option<Board>,
    /// Per-action results of an emulated run
    pub results: Vec<ActionResult>,
}

impl ScriptExecution {
    fn rejected(diagnostics: Vec<Diagnostic>) -> Self {
        Self::failed(ExecutedMode::None, diagnostics)
    }

    fn failed(mode: ExecutedMode, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            success: false,
            mode,
            return_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            diagnostics,
            board: None,
            results: Vec::new(),
        }
    }
}

/// Runs script files natively or through the execution engine
pub struct ScriptRunner {
    engine: Arc<ExecutionEngine>,
    config: ScriptConfig,
    validator: Validator,
}

impl ScriptRunner {
    pub fn new(engine: Arc<ExecutionEngine>, config: ScriptConfig) -> Self {
        Self {
            engine,
            config,
            validator: Validator::new(),
        }
    }

    /// Replace the validator
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn engine(&self) -> &Arc<ExecutionEngine> {
        &self.engine
    }

    pub fn parse_file(&self, path: impl AsRef<Path>) -> ScriptResult<Script> {
        parse_file(path)
    }

    pub fn validate_file(&self, path: impl AsRef<Path>) -> ScriptResult<ValidationResult> {
        Ok(self.validator.validate(&parse_file(path)?))
    }

    /// Locate the native interpreter
    ///
    /// Checked in order: `AUTOHOTKEY_EXE`, the configured interpreter path,
    /// then on Windows the standard install locations and `PATH`.
    pub fn find_interpreter(&self) -> Option<PathBuf> {
        let env_path = env::var_os(INTERPRETER_ENV).map(PathBuf::from);
        let candidates = env_path.into_iter().chain(self.config.interpreter_path.clone());
        for candidate in candidates {
            if candidate.is_file() {
                return Some(candidate);
            }
            debug!(path = %candidate.display(), "Interpreter candidate does not exist");
        }
        platform_interpreter()
    }

    /// Run a script file
    ///
    /// `timeout` and `allowed_root` fall back to the configured values.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn execute_file(
        &self,
        path: impl AsRef<Path>,
        mode: RunMode,
        timeout: Option<Duration>,
        allowed_root: Option<&Path>,
    ) -> ScriptExecution {
        let path = resolve(path.as_ref());

        if let Some(root) = allowed_root.or(self.config.allowed_root.as_deref()) {
            let root = resolve(root);
            if !path.starts_with(&root) {
                warn!(path = %path.display(), root = %root.display(), "Script outside allowed root");
                return ScriptExecution::rejected(vec![Diagnostic::error(format!(
                    "Path outside allowed root: {}",
                    path.display()
                ))]);
            }
        }

        let script = match parse_file(&path) {
            Ok(script) => script,
            Err(e) => return ScriptExecution::rejected(vec![Diagnostic::error(e.to_string())]),
        };

        let validation = self.validator.validate(&script);
        if !validation.is_valid {
            info!(diagnostics = validation.diagnostics.len(), "Script failed validation");
            return ScriptExecution::rejected(validation.diagnostics);
        }

        let interpreter = match mode {
            RunMode::Emulated => None,
            RunMode::Auto | RunMode::Native => self.find_interpreter(),
        };

        match (mode, interpreter) {
            (RunMode::Native, None) => {
                let mut diagnostics = validation.diagnostics;
                diagnostics.push(Diagnostic::error("AutoHotkey executable not found"));
                ScriptExecution::failed(ExecutedMode::Native, diagnostics)
            }
            (RunMode::Native | RunMode::Auto, Some(exe)) => {
                let timeout = timeout.unwrap_or_else(|| self.config.native_timeout());
                run_native(&exe, &path, timeout, validation.diagnostics).await
            }
            (RunMode::Emulated | RunMode::Auto, _) => {
                self.run_emulated(&script, validation.diagnostics).await
            }
        }
    }

    async fn run_emulated(&self, script: &Script, mut diagnostics: Vec<Diagnostic>) -> ScriptExecution {
        let (board, translate_diags) = to_board(script, "Imported script");
        diagnostics.extend(translate_diags);
        info!(board = %board.id, actions = board.action_count(), "Running script in emulation");

        match self.engine.execute_board(board.clone()).await {
            Ok(results) => ScriptExecution {
                success: results.iter().all(|r| r.success),
                mode: ExecutedMode::Emulated,
                return_code: 0,
                stdout: String::new(),
                stderr: String::new(),
                diagnostics,
                board: Some(board),
                results,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(format!("Emulation failed: {}", e)));
                let mut execution = ScriptExecution::failed(ExecutedMode::Emulated, diagnostics);
                execution.board = Some(board);
                execution
            }
        }
    }
}

impl fmt::Debug for ScriptRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRunner")
            .field("config", &self.config)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

#[cfg(windows)]
fn platform_interpreter() -> Option<PathBuf> {
    INSTALL_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
        .or_else(|| PATH_NAMES.iter().find_map(|name| which::which(name).ok()))
}

#[cfg(not(windows))]
fn platform_interpreter() -> Option<PathBuf> {
    None
}

type OutputBuffer = Arc<Mutex<Vec<u8>>>;

/// Copy a pipe into a shared buffer as data arrives
fn capture<R>(pipe: Option<R>) -> (OutputBuffer, Option<JoinHandle<()>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buffer = OutputBuffer::default();
    let handle = pipe.map(|mut pipe| {
        let sink = buffer.clone();
        tokio::spawn(async move {
            let mut chunk = [0u8; 4096];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        sink.lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .extend_from_slice(&chunk[..n]);
                    }
                }
            }
        })
    });
    (buffer, handle)
}

async fn drain(buffer: &OutputBuffer, handle: Option<JoinHandle<()>>) -> String {
    if let Some(mut handle) = handle {
        if tokio::time::timeout(OUTPUT_GRACE, &mut handle).await.is_err() {
            handle.abort();
        }
    }
    let bytes = buffer.lock().unwrap_or_else(PoisonError::into_inner);
    String::from_utf8_lossy(&bytes).into_owned()
}

async fn run_native(
    exe: &Path,
    script: &Path,
    timeout: Duration,
    mut diagnostics: Vec<Diagnostic>,
) -> ScriptExecution {
    info!(interpreter = %exe.display(), timeout_secs = timeout.as_secs_f64(), "Running script natively");

    let spawned = ProcessCommand::new(exe)
        .arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            diagnostics.push(Diagnostic::error(format!("Native run failed: {}", e)));
            let mut execution = ScriptExecution::failed(ExecutedMode::Native, diagnostics);
            execution.return_code = -1;
            execution.stderr = e.to_string();
            return execution;
        }
    };

    let (stdout_buf, stdout_task) = capture(child.stdout.take());
    let (stderr_buf, stderr_task) = capture(child.stderr.take());

    let (success, return_code, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => (status.success(), status.code().unwrap_or(-1), false),
        Ok(Err(e)) => {
            diagnostics.push(Diagnostic::error(format!("Native run failed: {}", e)));
            (false, -1, false)
        }
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs_f64(), "Native run timed out; killing interpreter");
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill interpreter");
            }
            diagnostics.push(Diagnostic::error("Native AHK execution timeout"));
            (false, -1, true)
        }
    };

    let stdout = drain(&stdout_buf, stdout_task).await;
    let mut stderr = drain(&stderr_buf, stderr_task).await;
    if timed_out && stderr.is_empty() {
        stderr = "Timeout".to_string();
    }

    debug!(return_code, stdout_len = stdout.len(), stderr_len = stderr.len(), "Native run finished");
    ScriptExecution {
        success,
        mode: ExecutedMode::Native,
        return_code,
        stdout,
        stderr,
        diagnostics,
        board: None,
        results: Vec::new(),
    }
}

/// Absolute form of `path`: canonical when it exists, otherwise joined to
/// the working directory and normalized lexically
fn resolve(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map(|cwd| cwd.join(path)).unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_mode_parsing() {
        assert_eq!("Native".parse::<RunMode>(), Ok(RunMode::Native));
        assert_eq!("auto".parse::<RunMode>(), Ok(RunMode::Auto));
        assert_eq!("turbo".parse::<RunMode>(), Err("Unknown mode: turbo".to_string()));
        assert_eq!(RunMode::Emulated.to_string(), "emulated");
    }

    #[test]
    fn test_resolve_normalizes_missing_paths() {
        let resolved = resolve(Path::new("/nonexistent-root/a/../b/./c.ahk"));
        assert_eq!(resolved, PathBuf::from("/nonexistent-root/b/c.ahk"));
        assert!(!resolved.starts_with("/nonexistent-root/a"));
    }

    #[test]
    fn test_executed_mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ExecutedMode::None).unwrap(), "\"none\"");
    }
}
