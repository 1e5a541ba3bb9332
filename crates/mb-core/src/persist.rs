//! Board documents on disk
//!
//! Boards are stored as pretty-printed JSON with `version` and `app` tags
//! next to the board's own fields.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::board::Board;

/// Result type for board file operations
pub type BoardFileResult<T> = Result<T, BoardFileError>;

/// Errors that can occur while saving or loading boards
#[derive(Debug, Error)]
pub enum BoardFileError {
    #[error("failed to read board {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write board {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse board document: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("failed to serialize board: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// The persisted form of a board
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardDocument {
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub app: String,

    #[serde(flatten)]
    pub board: Board,
}

impl BoardDocument {
    /// Wrap a board with the current version and app tags
    pub fn new(board: Board) -> Self {
        Self {
            version: crate::FORMAT_VERSION.to_string(),
            app: crate::APP_NAME.to_string(),
            board,
        }
    }
}

/// Serialize a board document to pretty JSON
pub fn board_to_json(board: &Board) -> BoardFileResult<String> {
    serde_json::to_string_pretty(&BoardDocument::new(board.clone()))
        .map_err(BoardFileError::Serialize)
}

/// Parse a board document
pub fn board_from_json(text: &str) -> BoardFileResult<Board> {
    let document: BoardDocument = serde_json::from_str(text).map_err(BoardFileError::Parse)?;
    Ok(document.board)
}

/// Save a board, creating parent directories as needed
pub fn save_board(board: &Board, path: impl AsRef<Path>) -> BoardFileResult<()> {
    let path = path.as_ref();
    let json = board_to_json(board)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| BoardFileError::WriteFile {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, json).map_err(|source| BoardFileError::WriteFile {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), rows = board.rows.len(), "Saved board");
    Ok(())
}

/// Load a board saved by [`save_board`]
pub fn load_board(path: impl AsRef<Path>) -> BoardFileResult<Board> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| BoardFileError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    let board = board_from_json(text.trim_start_matches('\u{feff}'))?;
    debug!(path = %path.display(), rows = board.rows.len(), "Loaded board");
    Ok(board)
}
