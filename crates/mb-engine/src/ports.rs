//! Capability ports
//!
//! The engine drives the pointer, the keyboard, the screen and a flat record
//! store through these traits. Implementations live outside this crate; any
//! of them may be absent, and every handler checks for that explicitly.

use mb_core::{Color, Coordinates, Region};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for port calls
pub type PortResult<T> = Result<T, PortError>;

/// Errors reported by port implementations
#[derive(Debug, Clone, Error)]
pub enum PortError {
    #[error("device unavailable: {0}")]
    Unavailable(String),

    #[error("device call failed: {0}")]
    Failed(String),
}

/// Pointer (mouse) driver
pub trait PointerPort: Send + Sync {
    fn get_position(&self) -> PortResult<Coordinates>;

    /// Move to `(x, y)`, interpolating over `duration` when it is non-zero
    fn move_to(&self, x: i32, y: i32, duration: Duration) -> PortResult<()>;

    /// Click `button` ("left", "right", "middle") at the current position
    fn click(&self, button: &str) -> PortResult<()>;
}

/// Keyboard driver
pub trait KeyPort: Send + Sync {
    fn press(&self, key: &str) -> PortResult<()>;

    /// Press all keys together, in order, then release them
    fn press_hotkey(&self, keys: &[String]) -> PortResult<()>;
}

/// Screen capture and matching
pub trait ScreenPort: Send + Sync {
    /// Color at `(x, y)`, or `None` if it could not be sampled
    fn get_pixel_color(&self, x: i32, y: i32) -> PortResult<Option<Color>>;

    /// Capture the screen (or a region) and return the saved file path
    fn take_screenshot(&self, region: Option<Region>) -> PortResult<Option<String>>;

    /// Locate an image on screen with at least `confidence` similarity
    fn find_image(&self, image_path: &str, confidence: f64) -> PortResult<Option<Coordinates>>;
}

/// One record of a flat table, keyed by column name
pub type Record = serde_json::Map<String, Value>;

/// A flat table: column names plus records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordTable {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub data: Vec<Record>,
}

/// Flat record store (spreadsheet/CSV tables keyed by store name)
pub trait RecordStore: Send + Sync {
    /// First record whose `column` equals `value` (compared as trimmed text)
    fn search(&self, store: &str, column: &str, value: &str) -> PortResult<Option<Record>>;

    fn get_columns(&self, store: &str) -> PortResult<Vec<String>>;

    /// Snapshot of a whole table
    fn table(&self, store: &str) -> PortResult<Option<RecordTable>>;

    /// Set `update_column` on the first record whose `match_column` equals
    /// `match_value`; returns whether a record was updated
    fn update_first(
        &self,
        store: &str,
        match_column: &str,
        match_value: &str,
        update_column: &str,
        new_value: Value,
    ) -> PortResult<bool>;
}

/// The set of ports handed to every handler
#[derive(Clone, Default)]
pub struct Ports {
    pub pointer: Option<Arc<dyn PointerPort>>,
    pub keys: Option<Arc<dyn KeyPort>>,
    pub screen: Option<Arc<dyn ScreenPort>>,
    pub records: Option<Arc<dyn RecordStore>>,
}

impl Ports {
    /// No ports at all
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_pointer(mut self, pointer: Arc<dyn PointerPort>) -> Self {
        self.pointer = Some(pointer);
        self
    }

    pub fn with_keys(mut self, keys: Arc<dyn KeyPort>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn with_screen(mut self, screen: Arc<dyn ScreenPort>) -> Self {
        self.screen = Some(screen);
        self
    }

    pub fn with_records(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = Some(records);
        self
    }
}

impl std::fmt::Debug for Ports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ports")
            .field("pointer", &self.pointer.is_some())
            .field("keys", &self.keys.is_some())
            .field("screen", &self.screen.is_some())
            .field("records", &self.records.is_some())
            .finish()
    }
}
