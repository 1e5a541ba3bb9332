//! Script to board translation
//!
//! Every command becomes at most one action. Commands the engine can act
//! on (clicks, pointer moves, key sends, sleeps, pixel waits) map to real
//! actions; calls to script functions become RUN_ROW actions targeting the
//! function's row; everything else is kept as a LOG action carrying the
//! source text, so the board mirrors the script line for line.

use indexmap::IndexMap;
use mb_core::{Action, ActionKind, Board, Row};
use tracing::debug;

use crate::keys::map_send_argument;
use crate::model::{Command, Diagnostic, Script};

/// Id of the row holding the script's entry point
pub const MAIN_ROW_ID: &str = "row_main";

const CONTROL_KEYWORDS: &[&str] = &[
    "if", "for", "loop", "switch", "try", "catch", "throw", "return", "continue", "break",
    "else", "finally",
];

const INFORMATIONAL_COMMANDS: &[&str] = &[
    "winexist",
    "winactivate",
    "winwaitactive",
    "clipboard",
    "fileread",
    "fileappend",
    "filedelete",
    "fileexist",
    "msgbox",
    "comobject",
    "map",
    "array",
    "instr",
    "strsplit",
    "substr",
    "trim",
];

const DEFAULT_PIXEL_TIMEOUT_MS: i64 = 5000;
const DEFAULT_PIXEL_INTERVAL_MS: i64 = 100;

/// Row id for a script function
pub fn function_row_id(name: &str) -> String {
    format!("row_fn_{}", name.to_lowercase())
}

/// Translate a parsed script into a board plus informational diagnostics
///
/// The main row is filled from the top-level commands, or the first
/// hotkey's body when there are none, or a call to `Main` when that
/// function exists. Each function gets its own subroutine row.
pub fn to_board(script: &Script, board_name: &str) -> (Board, Vec<Diagnostic>) {
    let mut board = Board::with_id(format!("script_{}", std::process::id()), board_name);
    let mut diagnostics = Vec::new();

    let function_rows: IndexMap<&str, String> = script
        .functions
        .keys()
        .map(|name| (name.as_str(), function_row_id(name)))
        .collect();

    let synthetic_main;
    let commands: &[Command] = if !script.top_level.is_empty() {
        &script.top_level
    } else if let Some((_, body)) = script.hotkeys.first() {
        body
    } else if script.functions.contains_key("Main") {
        synthetic_main = [Command::new("Main", Vec::new(), "Main()", 0)];
        &synthetic_main
    } else {
        &[]
    };

    let mut main = Row::with_id(MAIN_ROW_ID, "Script Main");
    for cmd in commands {
        main.add_action(command_to_action(cmd, &function_rows, &mut diagnostics));
    }
    board.add_row(main);

    for (name, function) in &script.functions {
        let row_id = function_row_id(name);
        let mut row = Row::with_id(row_id, format!("Fn: {}", name)).as_subroutine();
        for cmd in &function.body {
            row.add_action(command_to_action(cmd, &function_rows, &mut diagnostics));
        }
        board.add_row(row);
    }

    debug!(
        board = %board.id,
        rows = board.rows.len(),
        actions = board.action_count(),
        "Translated script"
    );
    (board, diagnostics)
}

fn command_to_action(
    cmd: &Command,
    function_rows: &IndexMap<&str, String>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Action {
    let name = cmd.name.to_lowercase();
    let id = format!("script_line_{}_{}", cmd.line_no, name);

    if let Some(row_id) = function_rows.get(cmd.name.as_str()) {
        return Action::new(ActionKind::RunRow, format!("Call {}", cmd.name))
            .with_id(id)
            .with_meta("row_id", row_id.as_str())
            .with_meta("wait_complete", true);
    }

    match name.as_str() {
        "click" => {
            let (x, y) = xy(cmd, diagnostics);
            Action::new(ActionKind::MouseClick, "Click")
                .with_id(id)
                .with_coordinates(x, y)
                .with_button(button(&cmd.args))
        }
        "mousemove" => {
            let (x, y) = xy(cmd, diagnostics);
            Action::new(ActionKind::MouseMove, "MouseMove")
                .with_id(id)
                .with_coordinates(x, y)
        }
        "send" | "sendinput" | "sendtext" | "sendevent" => {
            let key = cmd.args.first().map(|a| map_send_argument(a)).unwrap_or_default();
            Action::new(ActionKind::KeyPress, cmd.name.clone())
                .with_id(id)
                .with_key(key)
        }
        "sleep" => {
            let ms = cmd.args.first().and_then(|a| int_arg(a)).unwrap_or(0).max(0);
            Action::new(ActionKind::WaitTime, "Sleep")
                .with_id(id)
                .with_meta("wait_ms", ms)
        }
        "pixelwaitchange" => {
            let (x, y) = xy(cmd, diagnostics);
            let timeout = cmd.args.get(2).and_then(|a| int_arg(a)).unwrap_or(DEFAULT_PIXEL_TIMEOUT_MS);
            let interval = cmd.args.get(3).and_then(|a| int_arg(a)).unwrap_or(DEFAULT_PIXEL_INTERVAL_MS);
            Action::new(ActionKind::WaitPixelChange, "PixelWaitChange")
                .with_id(id)
                .with_coordinates(x, y)
                .with_meta("timeout_ms", timeout)
                .with_meta("check_interval_ms", interval)
        }
        "clipwait" => {
            let secs = cmd
                .args
                .first()
                .and_then(|a| a.trim().trim_matches('"').parse::<f64>().ok())
                .unwrap_or(1.0);
            Action::new(ActionKind::WaitTime, "ClipWait")
                .with_id(id)
                .with_meta("wait_ms", (secs * 1000.0).max(0.0) as i64)
        }
        "pixelgetcolor" | "pixelsearch" => {
            let (x, y) = xy(cmd, diagnostics);
            Action::new(ActionKind::WaitPixelChange, cmd.name.clone())
                .with_id(id)
                .with_coordinates(x, y)
                .with_meta("timeout_ms", DEFAULT_PIXEL_TIMEOUT_MS)
                .with_meta("check_interval_ms", DEFAULT_PIXEL_INTERVAL_MS)
        }
        _ if cmd.raw.contains(":=") => log_action(id, "Assign", cmd, "DEBUG"),
        n if CONTROL_KEYWORDS.contains(&n) => log_action(id, &cmd.name, cmd, "DEBUG"),
        n if INFORMATIONAL_COMMANDS.contains(&n) => log_action(id, &cmd.name, cmd, "INFO"),
        _ => {
            diagnostics.push(
                Diagnostic::info(format!("Unsupported command in emulation: {}", cmd.name))
                    .at_line(cmd.line_no),
            );
            log_action(id, &format!("Unsupported: {}", cmd.name), cmd, "WARNING")
        }
    }
}

fn log_action(id: String, name: &str, cmd: &Command, level: &str) -> Action {
    Action::new(ActionKind::Log, name)
        .with_id(id)
        .with_meta("message", cmd.raw.as_str())
        .with_meta("log_level", level)
}

/// Integer argument with surrounding quotes removed
fn int_arg(arg: &str) -> Option<i64> {
    arg.trim().trim_matches('"').trim().parse().ok()
}

/// The first two integer arguments, or the origin
///
/// A value outside the `i32` range reads as 0 and is reported.
fn xy(cmd: &Command, diagnostics: &mut Vec<Diagnostic>) -> (i32, i32) {
    let mut numbers = cmd.args.iter().filter_map(|a| int_arg(a));
    let (x, y) = match (numbers.next(), numbers.next()) {
        (Some(x), Some(y)) => (x, y),
        _ => return (0, 0),
    };
    let mut coordinate = |n: i64| {
        i32::try_from(n).unwrap_or_else(|_| {
            diagnostics.push(
                Diagnostic::warning(format!("Coordinate out of range in {}: {}", cmd.name, n))
                    .at_line(cmd.line_no),
            );
            0
        })
    };
    (coordinate(x), coordinate(y))
}

/// Mouse button named among the arguments, defaulting to left
fn button(args: &[String]) -> &'static str {
    args.iter()
        .map(|a| a.trim().trim_matches('"').to_lowercase())
        .find_map(|a| match a.as_str() {
            "left" | "l" => Some("left"),
            "right" | "r" => Some("right"),
            "middle" | "m" => Some("middle"),
            _ => None,
        })
        .unwrap_or("left")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Level;
    use crate::parser::parse_text;
    use serde_json::json;

    fn main_actions(source: &str) -> (Vec<Action>, Vec<Diagnostic>) {
        let (board, diags) = to_board(&parse_text(source), "test");
        (board.rows[0].actions.clone(), diags)
    }

    #[test]
    fn test_input_commands() {
        let (actions, diags) = main_actions(
            "Click(100, 200)\nClick(5, 6, \"Right\")\nMouseMove(7, 8)\nSend(\"{Enter}\")\nSendInput(\"^c\")\n",
        );
        assert!(diags.is_empty());

        assert_eq!(actions[0].kind, ActionKind::MouseClick);
        assert_eq!(actions[0].coordinates.map(|c| (c.x, c.y)), Some((100, 200)));
        assert_eq!(actions[0].id, "script_line_1_click");
        assert_eq!(actions[1].mouse_button, "right");
        assert_eq!(actions[2].kind, ActionKind::MouseMove);
        assert_eq!(actions[3].key.as_deref(), Some("enter"));
        assert_eq!(actions[4].key.as_deref(), Some("ctrl+c"));
    }

    #[test]
    fn test_out_of_range_coordinates_fall_back_to_zero() {
        let (actions, diags) = main_actions("Click(4294967396, 5)\nMouseMove(3, -4294967296)\n");
        assert_eq!(actions[0].coordinates.map(|c| (c.x, c.y)), Some((0, 5)));
        assert_eq!(actions[1].coordinates.map(|c| (c.x, c.y)), Some((3, 0)));

        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].line_no, 1);
        assert_eq!(diags[0].level, Level::Warning);
        assert!(diags[0].message.contains("4294967396"));
        assert_eq!(diags[1].line_no, 2);
    }

    #[test]
    fn test_waits_use_wait_ms() {
        let (actions, _) = main_actions("Sleep(250)\nClipWait(2)\nClipWait()\nPixelWaitChange(10, 20, 3000)\n");
        assert_eq!(actions[0].meta("wait_ms"), Some(&json!(250)));
        assert_eq!(actions[0].delay_before_ms, 0);
        assert_eq!(actions[1].meta("wait_ms"), Some(&json!(2000)));
        assert_eq!(actions[2].meta("wait_ms"), Some(&json!(1000)));
        assert_eq!(actions[3].coordinates.map(|c| (c.x, c.y)), Some((10, 20)));
        assert_eq!(actions[3].meta("timeout_ms"), Some(&json!(3000)));
        assert_eq!(actions[3].meta("check_interval_ms"), Some(&json!(100)));
    }

    #[test]
    fn test_log_lowering_and_unsupported() {
        let (actions, diags) = main_actions("x := Foo()\nreturn\nMsgBox(\"hi\")\nFrobnicate(1)\n");
        // Top-level `x := ...` is a global, not a command
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0].meta_str("log_level").as_deref(), Some("DEBUG"));
        assert_eq!(actions[1].meta_str("log_level").as_deref(), Some("INFO"));
        assert_eq!(actions[2].meta_str("log_level").as_deref(), Some("WARNING"));
        assert_eq!(actions[2].meta_str("message").as_deref(), Some("Frobnicate(1)"));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "Unsupported command in emulation: Frobnicate");
        assert_eq!(diags[0].line_no, 4);
    }

    #[test]
    fn test_function_rows_and_calls() {
        let (board, _) = to_board(
            &parse_text("Helper() {\n  total := total + 1\n  Click(1, 1)\n}\nHelper()\nhelper()\n"),
            "test",
        );
        assert_eq!(board.rows.len(), 2);
        assert_eq!(board.rows[1].id, "row_fn_helper");
        assert_eq!(board.rows[1].name, "Fn: Helper");
        assert!(board.rows[1].subroutine);
        assert_eq!(board.rows[1].actions[0].name, "Assign");

        let main = &board.rows[0].actions;
        assert_eq!(main[0].kind, ActionKind::RunRow);
        assert_eq!(main[0].meta_str("row_id").as_deref(), Some("row_fn_helper"));
        // Calls are case-sensitive
        assert_eq!(main[1].kind, ActionKind::Log);
    }

    #[test]
    fn test_main_fallbacks() {
        let (actions, _) = main_actions("F1::Click(3, 4)\nF2::Sleep(1)\n");
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::MouseClick);

        let (actions, _) = main_actions("Main() {\n  Sleep(1)\n}\n");
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::RunRow);
        assert_eq!(actions[0].id, "script_line_0_main");

        let (actions, _) = main_actions("; nothing here\n");
        assert!(actions.is_empty());
    }
}
