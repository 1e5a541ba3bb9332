//! Script parsing, validation and execution tests

use mb_config::{EngineConfig, ScriptConfig};
use mb_core::{ActionKind, Coordinates};
use mb_engine::testing::MockDevices;
use mb_engine::{ExecutionEngine, HandlerRegistry};
use mb_script::{
    parse_text, to_board, ExecutedMode, Level, RunMode, ScriptRunner, Validator,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const SAMPLE: &str = r#"#Requires AutoHotkey v2.0
#SingleInstance Force

global counter := 0

F1:: {
    Click(100, 200)
    Send("{Enter}")
    Sleep(50)
    MouseMove(10, 20)
    Helper()
}

Helper() {
    counter := counter + 1
    MsgBox("done") ; tell the user
}
"#;

fn runner_with(devices: &MockDevices, config: ScriptConfig) -> ScriptRunner {
    let settings = EngineConfig::default();
    let registry = Arc::new(HandlerRegistry::new(devices.ports(), settings.clone()));
    let engine = Arc::new(ExecutionEngine::new(registry, settings));
    ScriptRunner::new(engine, config).with_validator(Validator::for_platform(false))
}

fn write_script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

// ============================================================================
// Parsing and translation
// ============================================================================

#[test]
fn test_sample_script_structure() {
    let script = parse_text(SAMPLE);

    assert_eq!(script.requires.as_deref(), Some("2.0"));
    assert_eq!(script.directives, vec!["#SingleInstance Force"]);
    assert_eq!(script.globals["counter"], "0");
    assert!(script.top_level.is_empty());

    let body = &script.hotkeys["F1"];
    let names: Vec<&str> = body.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Click", "Send", "Sleep", "MouseMove", "Helper"]);
    assert_eq!(body[0].line_no, 7);

    let helper = &script.functions["Helper"];
    assert_eq!(helper.body.len(), 2);
    assert_eq!(helper.body[1].raw, "MsgBox(\"done\")");
}

#[test]
fn test_sample_script_translation() {
    let (board, diagnostics) = to_board(&parse_text(SAMPLE), "sample");
    assert!(diagnostics.is_empty());

    let kinds: Vec<ActionKind> = board.rows[0].actions.iter().map(|a| a.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ActionKind::MouseClick,
            ActionKind::KeyPress,
            ActionKind::WaitTime,
            ActionKind::MouseMove,
            ActionKind::RunRow,
        ]
    );
    // The function row only runs through the call
    assert_eq!(board.get_all_actions().len(), 5);
    assert_eq!(board.action_count(), 7);
}

#[test]
fn test_validation_levels() {
    let validator = Validator::for_platform(false);

    let result = validator.validate(&parse_text(SAMPLE));
    assert!(result.is_valid);
    assert!(result.diagnostics.is_empty());

    let result = validator.validate(&parse_text("RunWait(\"cmd.exe\")\nComObject(\"x\")\n"));
    assert!(result.is_valid);
    let levels: Vec<Level> = result.diagnostics.iter().map(|d| d.level).collect();
    assert_eq!(levels, vec![Level::Warning, Level::Warning, Level::Info]);
}

// ============================================================================
// Emulated execution
// ============================================================================

#[tokio::test]
async fn test_emulated_click_drives_pointer() {
    let dir = TempDir::new().unwrap();
    let path = write_script(dir.path(), "click.ahk", "#Requires AutoHotkey v2.0\nClick(100, 200)\n");

    let devices = MockDevices::new();
    let runner = runner_with(&devices, ScriptConfig::default());
    let execution = runner.execute_file(&path, RunMode::Emulated, None, None).await;

    assert!(execution.success, "{:?}", execution.diagnostics);
    assert_eq!(execution.mode, ExecutedMode::Emulated);
    assert_eq!(execution.results.len(), 1);
    assert!(execution.board.is_some());

    let moves = devices.pointer.moves();
    assert_eq!(moves.len(), 1);
    assert_eq!((moves[0].x, moves[0].y), (100, 200));
    assert_eq!(
        devices.pointer.clicks(),
        vec![(Coordinates::new(100, 200), "left".to_string())]
    );
}

#[tokio::test]
async fn test_emulated_function_call_and_unsupported_commands() {
    let dir = TempDir::new().unwrap();
    let path = write_script(
        dir.path(),
        "calls.ahk",
        "#Requires AutoHotkey v2.0\nPress() {\n  Send(\"^c\")\n}\nPress()\nFrobnicate(1)\n",
    );

    let devices = MockDevices::new();
    let runner = runner_with(&devices, ScriptConfig::default());
    let execution = runner.execute_file(&path, RunMode::Emulated, None, None).await;

    assert!(execution.success);
    assert_eq!(devices.keys.hotkeys(), vec![vec!["ctrl".to_string(), "c".to_string()]]);
    assert!(execution
        .diagnostics
        .iter()
        .any(|d| d.level == Level::Info && d.message == "Unsupported command in emulation: Frobnicate"));
}

#[tokio::test]
async fn test_empty_script_succeeds_vacuously() {
    let dir = TempDir::new().unwrap();
    let path = write_script(dir.path(), "empty.ahk", "#Requires AutoHotkey v2.0\n; nothing\n");

    let runner = runner_with(&MockDevices::new(), ScriptConfig::default());
    let execution = runner.execute_file(&path, RunMode::Emulated, None, None).await;

    assert!(execution.success);
    assert!(execution.results.is_empty());
}

// ============================================================================
// Rejection before execution
// ============================================================================

#[tokio::test]
async fn test_path_outside_root_is_rejected_before_parsing() {
    let root = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    // Not UTF-8: parsing it would fail with a read error
    let path = elsewhere.path().join("bad.ahk");
    fs::write(&path, [0xff, 0xfe, 0x00, 0xd8]).unwrap();

    let devices = MockDevices::new();
    let runner = runner_with(&devices, ScriptConfig::default());
    let execution = runner
        .execute_file(&path, RunMode::Emulated, None, Some(root.path()))
        .await;

    assert!(!execution.success);
    assert_eq!(execution.mode, ExecutedMode::None);
    assert_eq!(execution.diagnostics.len(), 1);
    assert!(execution.diagnostics[0].message.starts_with("Path outside allowed root"));

    let inside = root.path().join("bad.ahk");
    fs::write(&inside, [0xff, 0xfe, 0x00, 0xd8]).unwrap();
    let execution = runner
        .execute_file(&inside, RunMode::Emulated, None, Some(root.path()))
        .await;
    assert_eq!(execution.mode, ExecutedMode::None);
    assert!(execution.diagnostics[0].message.contains("failed to read script"));
}

#[tokio::test]
async fn test_configured_root_applies_without_argument() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("..").join("escape.ahk");

    let config = ScriptConfig {
        allowed_root: Some(root.path().to_path_buf()),
        ..ScriptConfig::default()
    };
    let runner = runner_with(&MockDevices::new(), config);
    let execution = runner.execute_file(&path, RunMode::Emulated, None, None).await;

    assert_eq!(execution.mode, ExecutedMode::None);
    assert!(execution.diagnostics[0].message.starts_with("Path outside allowed root"));
}

#[tokio::test]
async fn test_invalid_script_is_not_run() {
    let dir = TempDir::new().unwrap();
    let path = write_script(dir.path(), "old.ahk", "#Requires AutoHotkey v1.1\nClick(1, 1)\n");

    let devices = MockDevices::new();
    let runner = runner_with(&devices, ScriptConfig::default());
    let execution = runner.execute_file(&path, RunMode::Emulated, None, None).await;

    assert!(!execution.success);
    assert_eq!(execution.mode, ExecutedMode::None);
    assert_eq!(execution.diagnostics[0].message, "Unsupported AHK version: 1.1");
    assert!(devices.pointer.clicks().is_empty());
}

// ============================================================================
// Native execution
// ============================================================================

#[cfg(unix)]
mod native {
    use super::*;

    fn native_config(interpreter: &str) -> ScriptConfig {
        ScriptConfig {
            interpreter_path: Some(interpreter.into()),
            ..ScriptConfig::default()
        }
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let dir = TempDir::new().unwrap();
        let path = write_script(dir.path(), "a.ahk", "#Requires AutoHotkey v2.0\nClick(1, 1)\n");

        let runner = runner_with(&MockDevices::new(), native_config("/nonexistent/AutoHotkey.exe"));
        let execution = runner.execute_file(&path, RunMode::Native, None, None).await;

        assert!(!execution.success);
        assert_eq!(execution.mode, ExecutedMode::Native);
        assert!(execution
            .diagnostics
            .iter()
            .any(|d| d.message == "AutoHotkey executable not found"));
    }

    #[tokio::test]
    async fn test_auto_prefers_configured_interpreter() {
        let dir = TempDir::new().unwrap();
        let path = write_script(dir.path(), "a.ahk", "#Requires AutoHotkey v2.0\nClick(1, 2)\n");

        let devices = MockDevices::new();
        let runner = runner_with(&devices, native_config("/bin/cat"));
        let execution = runner.execute_file(&path, RunMode::Auto, None, None).await;

        assert!(execution.success, "{:?}", execution);
        assert_eq!(execution.mode, ExecutedMode::Native);
        assert_eq!(execution.return_code, 0);
        assert!(execution.stdout.contains("Click(1, 2)"));
        assert!(devices.pointer.clicks().is_empty());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let dir = TempDir::new().unwrap();
        let path = write_script(
            dir.path(),
            "fail.ahk",
            "#Requires AutoHotkey v2.0\necho oops >&2\nexit 3\n",
        );

        let runner = runner_with(&MockDevices::new(), native_config("/bin/sh"));
        let execution = runner.execute_file(&path, RunMode::Native, None, None).await;

        assert!(!execution.success);
        assert_eq!(execution.return_code, 3);
        assert_eq!(execution.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_timeout_kills_and_keeps_partial_output() {
        let dir = TempDir::new().unwrap();
        let path = write_script(
            dir.path(),
            "slow.ahk",
            "#Requires AutoHotkey v2.0\necho partial\nexec sleep 5\n",
        );

        let runner = runner_with(&MockDevices::new(), native_config("/bin/sh"));
        let started = std::time::Instant::now();
        let execution = runner
            .execute_file(&path, RunMode::Native, Some(Duration::from_millis(500)), None)
            .await;

        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(!execution.success);
        assert_eq!(execution.return_code, -1);
        assert_eq!(execution.stdout.trim(), "partial");
        assert_eq!(execution.stderr, "Timeout");
        assert!(execution
            .diagnostics
            .iter()
            .any(|d| d.level == Level::Error && d.message == "Native AHK execution timeout"));
    }
}
