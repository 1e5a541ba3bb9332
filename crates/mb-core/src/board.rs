//! Rows and boards
//!
//! A board is an ordered list of rows, each an ordered list of actions.
//! The engine only ever sees [`Board::get_all_actions`], the flattened view
//! of enabled actions in enabled rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::Action;

/// A named, independently enable-able sequence of actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Only reachable through RUN_ROW; skipped when the board is flattened
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub subroutine: bool,

    #[serde(default)]
    pub actions: Vec<Action>,
}

fn default_enabled() -> bool {
    true
}

impl Row {
    /// Create an empty, enabled row with a generated id
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(crate::new_id("row"), name)
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            subroutine: false,
            actions: Vec::new(),
        }
    }

    /// Mark this row as callable only
    pub fn as_subroutine(mut self) -> Self {
        self.subroutine = true;
        self
    }

    pub fn add_action(&mut self, action: Action) {
        self.actions.push(action);
    }

    /// Remove an action by id, returning whether it existed
    pub fn remove_action(&mut self, action_id: &str) -> bool {
        match self.actions.iter().position(|a| a.id == action_id) {
            Some(index) => {
                self.actions.remove(index);
                true
            }
            None => false,
        }
    }

    /// Enabled actions of this row, ignoring the row's own flag
    pub fn enabled_actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter().filter(|a| a.enabled)
    }
}

/// The top-level ordered collection of rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    #[serde(default = "default_board_id")]
    pub id: String,

    #[serde(default = "default_board_name")]
    pub name: String,

    #[serde(default)]
    pub rows: Vec<Row>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

fn default_board_id() -> String {
    "board_1".to_string()
}

fn default_board_name() -> String {
    "Loaded board".to_string()
}

impl Board {
    /// Create an empty board with a generated id
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(crate::new_id("board"), name)
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            rows: Vec::new(),
            created_at: now,
            modified_at: now,
        }
    }

    pub fn add_row(&mut self, row: Row) {
        self.rows.push(row);
        self.touch();
    }

    /// Remove a row by id, returning whether it existed
    pub fn remove_row(&mut self, row_id: &str) -> bool {
        match self.rows.iter().position(|r| r.id == row_id) {
            Some(index) => {
                self.rows.remove(index);
                self.touch();
                true
            }
            None => false,
        }
    }

    pub fn row(&self, row_id: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == row_id)
    }

    pub fn row_mut(&mut self, row_id: &str) -> Option<&mut Row> {
        self.rows.iter_mut().find(|r| r.id == row_id)
    }

    /// Record a modification
    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    /// Enabled actions of enabled rows, in row order then action order
    ///
    /// A disabled row hides all of its actions regardless of their own flag.
    /// Subroutine rows are left out; they run only when called.
    pub fn get_all_actions(&self) -> Vec<&Action> {
        self.rows
            .iter()
            .filter(|row| row.enabled && !row.subroutine)
            .flat_map(|row| row.enabled_actions())
            .collect()
    }

    /// Total number of actions, including disabled ones
    pub fn action_count(&self) -> usize {
        self.rows.iter().map(|r| r.actions.len()).sum()
    }
}
