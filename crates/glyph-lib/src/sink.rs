//! Hardware frame sink — brightness scaling, the essential floor, and
//! best-effort writes.
//!
//! Every raw value (0..=4095) is normalised by [`MAX_BRIGHTNESS`] and rescaled
//! to the user's target level before reaching the device. Device failures are
//! logged and swallowed; playback never sees them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::device::{DeviceInfo, LedDevice};
use crate::registry::{StatusEvent, StatusRegistry};
use crate::topology::{LedTopology, MAX_BRIGHTNESS};

/// Raw value the essential zone never drops below while the overlay is on.
pub const ESSENTIAL_FLOOR_RAW: f64 = 2048.0;

/// Device targets for brightness levels 1–4.
pub const BRIGHTNESS_TARGETS: [u32; 4] = [102, 682, 1365, 4095];

/// User-selected brightness level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Brightness {
    level: u8,
}

impl Default for Brightness {
    fn default() -> Self {
        Brightness { level: 3 }
    }
}

impl Brightness {
    /// Level 1–4; anything else is `None`.
    pub fn from_level(level: u8) -> Option<Self> {
        (1..=4).contains(&level).then_some(Brightness { level })
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// Device value that raw full brightness maps to.
    pub fn target(&self) -> u32 {
        BRIGHTNESS_TARGETS[usize::from(self.level - 1)]
    }

    /// Scale one raw value to device units.
    pub fn scale(&self, raw: f64) -> u32 {
        let max = f64::from(MAX_BRIGHTNESS);
        let raw = if raw.is_finite() { raw.clamp(0.0, max) } else { 0.0 };
        (raw / max * f64::from(self.target())).round() as u32
    }
}

/// Shared writer in front of the LED device.
///
/// Routine writes (`frame`, `single`, `zero_*`) are dropped while the
/// all-LEDs override is active; the override itself flips the flag and
/// writes the whole device under the same gate, so a routine can never
/// overwrite it.
pub struct FrameSink {
    device: Arc<dyn LedDevice>,
    topology: &'static LedTopology,
    brightness: Brightness,
    registry: Arc<StatusRegistry>,
    gate: Mutex<()>,
}

impl FrameSink {
    pub fn new(
        device: Arc<dyn LedDevice>,
        topology: &'static LedTopology,
        brightness: Brightness,
        registry: Arc<StatusRegistry>,
    ) -> Self {
        FrameSink {
            device,
            topology,
            brightness,
            registry,
            gate: Mutex::new(()),
        }
    }

    pub fn topology(&self) -> &'static LedTopology {
        self.topology
    }

    pub fn brightness(&self) -> Brightness {
        self.brightness
    }

    pub fn device_info(&self) -> &DeviceInfo {
        self.device.info()
    }

    fn gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Scaled essential floor.
    pub fn floor_value(&self) -> u32 {
        self.brightness.scale(ESSENTIAL_FLOOR_RAW)
    }

    /// Write one zone-ordered frame of raw values.
    pub fn frame(&self, raw: &[f64]) {
        let mut values: Vec<u32> = raw.iter().map(|&v| self.brightness.scale(v)).collect();
        let _gate = self.gate();
        let flags = self.registry.snapshot();
        if flags.all_leds_override {
            return;
        }
        if flags.essential_overlay {
            if let Some(v) = values.get_mut(self.topology.essential_zone) {
                *v = (*v).max(self.floor_value());
            }
        }
        if let Err(e) = self.device.write_frame(&values) {
            log::warn!("frame write failed: {e}");
        }
    }

    /// Write one LED by hardware index.
    pub fn single(&self, led: u32, raw: f64) {
        let value = self.brightness.scale(raw);
        let _gate = self.gate();
        let flags = self.registry.snapshot();
        if flags.all_leds_override {
            return;
        }
        self.write_single_floored(led, value, flags.essential_overlay);
    }

    fn write_single_floored(&self, led: u32, value: u32, overlay: bool) {
        let value = if overlay && self.in_essential_zone(led) {
            value.max(self.floor_value())
        } else {
            value
        };
        if let Err(e) = self.device.write_single(led, value) {
            log::warn!("LED {led} write failed: {e}");
        }
    }

    fn in_essential_zone(&self, led: u32) -> bool {
        self.topology.zone_of_led(led) == Some(self.topology.essential_zone)
    }

    /// Zero every zone (floor still applies).
    pub fn zero_frame(&self) {
        self.frame(&vec![0.0; self.topology.zone_count()]);
    }

    /// Zero the given LEDs (floor still applies).
    pub fn zero_leds(&self, leds: impl IntoIterator<Item = u32>) {
        for led in leds {
            self.single(led, 0.0);
        }
    }

    /// Set every LED of one zone to a raw value.
    pub fn zone(&self, zone: usize, raw: f64) {
        if let Some(z) = self.topology.zones.get(zone) {
            for &led in z.leds {
                self.single(led, raw);
            }
        }
    }

    /// Bring the essential zone in line with the overlay flag: the floor
    /// while it is on, zero otherwise.
    ///
    /// While a routine is playing the write is deferred to that routine's
    /// cleanup. Skipped under the override.
    pub fn resync_essential_zone(&self) {
        let _gate = self.gate();
        self.resync_essential_locked();
    }

    /// Perform a write deferred by [`resync_essential_zone`] on behalf of
    /// the routine still holding the slot.
    ///
    /// [`resync_essential_zone`]: Self::resync_essential_zone
    pub fn flush_essential_resync(&self) {
        let _gate = self.gate();
        if !self.registry.take_essential_resync() || self.registry.override_active() {
            return;
        }
        let value = if self.registry.essential_overlay() {
            self.floor_value()
        } else {
            0
        };
        self.write_essential_zone(value);
    }

    fn resync_essential_locked(&self) {
        if self.registry.override_active() || self.registry.defer_essential_resync() {
            return;
        }
        let value = if self.registry.essential_overlay() {
            self.floor_value()
        } else {
            0
        };
        self.write_essential_zone(value);
    }

    fn write_essential_zone(&self, value: u32) {
        let zone = &self.topology.zones[self.topology.essential_zone];
        for &led in zone.leds {
            if let Err(e) = self.device.write_single(led, value) {
                log::warn!("LED {led} write failed: {e}");
            }
        }
    }

    /// Turn the all-LEDs override on or off.
    ///
    /// On writes full (scaled) brightness to the whole device. Off writes
    /// zero, then restores the essential floor if the overlay is active (at
    /// once, or when the running routine ends).
    pub fn set_override(&self, on: bool) {
        let _gate = self.gate();
        self.registry.notify(StatusEvent::AllLedsOverride(on));
        let value = if on {
            self.brightness.scale(f64::from(MAX_BRIGHTNESS))
        } else {
            0
        };
        if let Err(e) = self.device.write_all(value) {
            log::warn!("whole-device write failed: {e}");
        }
        if !on && self.registry.essential_overlay() {
            self.resync_essential_locked();
        }
    }

    /// Flip the override, returning the new state.
    pub fn toggle_override(&self) -> bool {
        let on = {
            let _gate = self.gate();
            !self.registry.override_active()
        };
        self.set_override(on);
        on
    }
}
