//! Screen geometry and pixel colors

use serde::{Deserialize, Serialize};

/// A point on the screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: i32,
    pub y: i32,
}

impl Coordinates {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A rectangular screen region used for screenshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// A pixel color with a per-channel match tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(default = "default_tolerance")]
    pub tolerance: u8,
}

fn default_tolerance() -> u8 {
    10
}

impl Color {
    /// Create a color with the default tolerance
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r,
            g,
            b,
            tolerance: default_tolerance(),
        }
    }

    /// Set the match tolerance
    pub fn with_tolerance(mut self, tolerance: u8) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Whether `other` is within this color's tolerance on every channel
    ///
    /// The comparison is per channel, not a Euclidean distance: a pixel that
    /// is off by `tolerance` on all three channels still matches.
    pub fn matches(&self, other: &Color) -> bool {
        let within = |a: u8, b: u8| (i16::from(a) - i16::from(b)).abs() <= i16::from(self.tolerance);
        within(self.r, other.r) && within(self.g, other.g) && within(self.b, other.b)
    }
}
