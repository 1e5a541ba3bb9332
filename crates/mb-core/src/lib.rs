//! Core types for macroboard
//!
//! This crate provides the fundamental value objects shared by the engine,
//! the script tooling and the command line: coordinates and colors, the
//! typed [`Action`], the [`Row`] and [`Board`] containers, per-action
//! [`ActionResult`]s and the JSON board document.

mod action;
mod board;
mod geometry;
mod persist;
mod result;

pub use action::{value_to_text, Action, ActionKind, Metadata};
pub use board::{Board, Row};
pub use geometry::{Color, Coordinates, Region};
pub use persist::{
    board_from_json, board_to_json, load_board, save_board, BoardDocument, BoardFileError,
    BoardFileResult,
};
pub use result::ActionResult;

/// Application tag written into saved boards
pub const APP_NAME: &str = "macroboard";

/// Board document format version
pub const FORMAT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Generate a fresh identifier of the form `<prefix>_<ulid>`
pub fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, ulid::Ulid::new().to_string().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_prefix_and_uniqueness() {
        let a = new_id("row");
        let b = new_id("row");
        assert!(a.starts_with("row_"));
        assert_ne!(a, b);
    }
}
