//! Recording port doubles for tests
//!
//! Each mock records every call it receives so tests can assert on exactly
//! what a run did to the pointer, keyboard and screen.

use mb_core::{Color, Coordinates, Region};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::memory_store::InMemoryRecordStore;
use crate::ports::{KeyPort, PointerPort, PortResult, Ports, ScreenPort};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A pointer move as recorded by [`MockPointer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerMove {
    pub x: i32,
    pub y: i32,
    pub duration: Duration,
}

/// Pointer that records moves and clicks
#[derive(Debug, Default)]
pub struct MockPointer {
    position: Mutex<Coordinates>,
    moves: Mutex<Vec<PointerMove>>,
    clicks: Mutex<Vec<(Coordinates, String)>>,
}

impl MockPointer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn moves(&self) -> Vec<PointerMove> {
        lock(&self.moves).clone()
    }

    /// Clicks with the position they happened at
    pub fn clicks(&self) -> Vec<(Coordinates, String)> {
        lock(&self.clicks).clone()
    }
}

impl PointerPort for MockPointer {
    fn get_position(&self) -> PortResult<Coordinates> {
        Ok(*lock(&self.position))
    }

    fn move_to(&self, x: i32, y: i32, duration: Duration) -> PortResult<()> {
        *lock(&self.position) = Coordinates::new(x, y);
        lock(&self.moves).push(PointerMove { x, y, duration });
        Ok(())
    }

    fn click(&self, button: &str) -> PortResult<()> {
        let at = *lock(&self.position);
        lock(&self.clicks).push((at, button.to_string()));
        Ok(())
    }
}

/// Keyboard that records single presses and combinations
#[derive(Debug, Default)]
pub struct MockKeys {
    presses: Mutex<Vec<String>>,
    hotkeys: Mutex<Vec<Vec<String>>>,
}

impl MockKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presses(&self) -> Vec<String> {
        lock(&self.presses).clone()
    }

    pub fn hotkeys(&self) -> Vec<Vec<String>> {
        lock(&self.hotkeys).clone()
    }
}

impl KeyPort for MockKeys {
    fn press(&self, key: &str) -> PortResult<()> {
        lock(&self.presses).push(key.to_string());
        Ok(())
    }

    fn press_hotkey(&self, keys: &[String]) -> PortResult<()> {
        lock(&self.hotkeys).push(keys.to_vec());
        Ok(())
    }
}

/// Screen with a scripted sequence of pixel colors
///
/// Each sample pops the next scripted color; the last one repeats once the
/// script is exhausted. With no script every sample is `None`.
#[derive(Debug, Default)]
pub struct MockScreen {
    colors: Mutex<VecDeque<Color>>,
    last: Mutex<Option<Color>>,
    samples: Mutex<usize>,
    images: Mutex<HashMap<String, Coordinates>>,
    screenshot_path: Option<String>,
    screenshots: Mutex<Vec<Option<Region>>>,
}

impl MockScreen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_colors(colors: impl IntoIterator<Item = Color>) -> Self {
        let screen = Self::new();
        lock(&screen.colors).extend(colors);
        screen
    }

    /// Make `image_path` findable at `at`
    pub fn with_image(self, image_path: impl Into<String>, at: Coordinates) -> Self {
        lock(&self.images).insert(image_path.into(), at);
        self
    }

    /// Path returned by every screenshot
    pub fn with_screenshot_path(mut self, path: impl Into<String>) -> Self {
        self.screenshot_path = Some(path.into());
        self
    }

    /// Number of pixel samples taken so far
    pub fn samples(&self) -> usize {
        *lock(&self.samples)
    }

    /// Regions of every screenshot taken so far
    pub fn screenshots(&self) -> Vec<Option<Region>> {
        lock(&self.screenshots).clone()
    }
}

impl ScreenPort for MockScreen {
    fn get_pixel_color(&self, _x: i32, _y: i32) -> PortResult<Option<Color>> {
        *lock(&self.samples) += 1;
        let mut last = lock(&self.last);
        if let Some(next) = lock(&self.colors).pop_front() {
            *last = Some(next);
        }
        Ok(*last)
    }

    fn take_screenshot(&self, region: Option<Region>) -> PortResult<Option<String>> {
        lock(&self.screenshots).push(region);
        Ok(self.screenshot_path.clone())
    }

    fn find_image(&self, image_path: &str, _confidence: f64) -> PortResult<Option<Coordinates>> {
        Ok(lock(&self.images).get(image_path).copied())
    }
}

/// One of each mock, shareable with the assertions of a test
#[derive(Debug, Clone)]
pub struct MockDevices {
    pub pointer: Arc<MockPointer>,
    pub keys: Arc<MockKeys>,
    pub screen: Arc<MockScreen>,
    pub records: Arc<InMemoryRecordStore>,
}

impl MockDevices {
    pub fn new() -> Self {
        Self::with_screen(MockScreen::new())
    }

    pub fn with_screen(screen: MockScreen) -> Self {
        Self {
            pointer: Arc::new(MockPointer::new()),
            keys: Arc::new(MockKeys::new()),
            screen: Arc::new(screen),
            records: Arc::new(InMemoryRecordStore::new()),
        }
    }

    /// Ports wired to these mocks
    pub fn ports(&self) -> Ports {
        Ports::none()
            .with_pointer(self.pointer.clone())
            .with_keys(self.keys.clone())
            .with_screen(self.screen.clone())
            .with_records(self.records.clone())
    }
}

impl Default for MockDevices {
    fn default() -> Self {
        Self::new()
    }
}
