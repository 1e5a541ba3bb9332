//! Dry-run ports
//!
//! Stand-ins for real input and screen drivers: every call is logged and
//! nothing touches the desktop. The pointer remembers where it was moved so
//! position queries stay consistent within a run.

use mb_core::{Color, Coordinates, Region};
use mb_engine::{KeyPort, PointerPort, PortResult, Ports, RecordStore, ScreenPort};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::info;

const TARGET: &str = "macroboard::dry_run";

#[derive(Debug, Default)]
pub struct DryRunPointer {
    position: Mutex<Coordinates>,
}

impl PointerPort for DryRunPointer {
    fn get_position(&self) -> PortResult<Coordinates> {
        Ok(*self.position.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn move_to(&self, x: i32, y: i32, duration: Duration) -> PortResult<()> {
        info!(target: TARGET, x, y, duration_ms = duration.as_millis() as u64, "pointer move");
        *self.position.lock().unwrap_or_else(PoisonError::into_inner) = Coordinates::new(x, y);
        Ok(())
    }

    fn click(&self, button: &str) -> PortResult<()> {
        let at = self.get_position()?;
        info!(target: TARGET, button, x = at.x, y = at.y, "pointer click");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct DryRunKeys;

impl KeyPort for DryRunKeys {
    fn press(&self, key: &str) -> PortResult<()> {
        info!(target: TARGET, key, "key press");
        Ok(())
    }

    fn press_hotkey(&self, keys: &[String]) -> PortResult<()> {
        info!(target: TARGET, keys = %keys.join("+"), "hotkey");
        Ok(())
    }
}

/// Screen that can never be sampled
#[derive(Debug, Default)]
pub struct DryRunScreen;

impl ScreenPort for DryRunScreen {
    fn get_pixel_color(&self, x: i32, y: i32) -> PortResult<Option<Color>> {
        info!(target: TARGET, x, y, "pixel sample (unavailable)");
        Ok(None)
    }

    fn take_screenshot(&self, region: Option<Region>) -> PortResult<Option<String>> {
        info!(target: TARGET, ?region, "screenshot (skipped)");
        Ok(None)
    }

    fn find_image(&self, image_path: &str, confidence: f64) -> PortResult<Option<Coordinates>> {
        info!(target: TARGET, image_path, confidence, "image search (unavailable)");
        Ok(None)
    }
}

/// Dry-run devices plus an optional record store
pub fn dry_run_ports(records: Option<Arc<dyn RecordStore>>) -> Ports {
    let ports = Ports::none()
        .with_pointer(Arc::new(DryRunPointer::default()))
        .with_keys(Arc::new(DryRunKeys))
        .with_screen(Arc::new(DryRunScreen));
    match records {
        Some(records) => ports.with_records(records),
        None => ports,
    }
}
