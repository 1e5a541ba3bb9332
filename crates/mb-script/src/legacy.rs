//! Import of legacy comma-form macros (`Click, left, 10, 20`)
//!
//! Only five commands are recognized; every other line is skipped. When a
//! file yields nothing this way it is parsed as a structured script
//! instead.

use mb_core::{board_from_json, load_board, Action, ActionKind, Board, Row};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::error::{ScriptError, ScriptResult};
use crate::keys::map_key;
use crate::parser::{parse_text, pattern};
use crate::translator::to_board;

fn click_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"(?i)^Click\s*,\s*(?P<args>.*)$")
}

fn move_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"(?i)^MouseMove\s*,\s*(?P<x>-?\d+)\s*,\s*(?P<y>-?\d+)")
}

fn send_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"(?i)^Send\s*,\s*\{(?P<key>[^}]+)\}")
}

fn sleep_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"(?i)^Sleep\s*,\s*(?P<ms>\d+)")
}

fn loop_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"(?i)^Loop\s*,\s*(?P<n>\d+)")
}

/// Importer for legacy macros and saved boards
#[derive(Debug, Clone)]
pub struct LegacyImporter {
    board_name: String,
}

impl Default for LegacyImporter {
    fn default() -> Self {
        Self::new("Imported Board")
    }
}

impl LegacyImporter {
    pub fn new(board_name: impl Into<String>) -> Self {
        Self {
            board_name: board_name.into(),
        }
    }

    /// Import legacy macro text into a single-row board
    pub fn import_text(&self, text: &str) -> Board {
        let mut board = Board::new(self.board_name.clone());
        let mut row = Row::new("Imported Row");

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(action) = parse_line(line) {
                row.add_action(action);
            }
        }

        debug!(actions = row.actions.len(), "Imported legacy macro");
        board.add_row(row);
        board
    }

    /// Import a file
    ///
    /// `.json` files and content starting with `{` load as saved boards.
    /// Anything else is imported as a legacy macro, falling back to the
    /// structured script parser when no legacy command is recognized.
    pub fn import_file(&self, path: impl AsRef<Path>) -> ScriptResult<Board> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            return Ok(load_board(path)?);
        }

        let text = fs::read_to_string(path).map_err(|e| ScriptError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let text = text.trim_start_matches('\u{feff}');
        if text.trim_start().starts_with('{') {
            return Ok(board_from_json(text)?);
        }

        let board = self.import_text(text);
        if board.action_count() > 0 {
            return Ok(board);
        }

        info!(path = %path.display(), "No legacy commands found; translating as a script");
        let (board, _) = to_board(&parse_text(text), &self.board_name);
        Ok(board)
    }
}

fn parse_line(line: &str) -> Option<Action> {
    if let Some(caps) = click_re().captures(line) {
        let mut button = "left".to_string();
        let mut numbers = Vec::new();
        for token in caps["args"].split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match token.parse::<i32>() {
                Ok(n) => numbers.push(n),
                Err(_) => button = token.to_lowercase(),
            }
        }
        let x = numbers.first().copied().unwrap_or(0);
        let y = numbers.get(1).copied().unwrap_or(0);
        return Some(
            Action::new(ActionKind::MouseClick, "Legacy Click")
                .with_coordinates(x, y)
                .with_button(button),
        );
    }

    if let Some(caps) = move_re().captures(line) {
        let x = caps["x"].parse().ok()?;
        let y = caps["y"].parse().ok()?;
        return Some(Action::new(ActionKind::MouseMove, "Legacy Move").with_coordinates(x, y));
    }

    if let Some(caps) = send_re().captures(line) {
        let key = map_key(&caps["key"]);
        return Some(Action::new(ActionKind::KeyPress, format!("Legacy Key: {}", key)).with_key(key));
    }

    if let Some(caps) = sleep_re().captures(line) {
        let ms: u64 = caps["ms"].parse().ok()?;
        return Some(Action::new(ActionKind::WaitTime, "Legacy Wait").with_meta("wait_ms", ms));
    }

    if let Some(caps) = loop_re().captures(line) {
        let n: u64 = caps["n"].parse().ok()?;
        return Some(Action::new(ActionKind::Loop, "Legacy Loop").with_meta("iterations", n));
    }

    None
}
