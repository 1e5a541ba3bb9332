//! Error types for script handling

use mb_core::BoardFileError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for script operations
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Errors raised while reading or importing scripts
///
/// The runner never returns these; it folds them into diagnostics.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Failed to read a script file
    #[error("failed to read script {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to load a saved board
    #[error(transparent)]
    Board(#[from] BoardFileError),
}
