//! Glyph context — resolves topology, catalog, brightness and timing.
//!
//! Consolidates the resolution every CLI command repeats: pick the topology
//! (configured or detected from the device model) → open the catalog → build
//! the brightness scaler and timings.

use crate::config::Config;
use crate::device::{DeviceError, LedDevice};
use crate::error::{GlyphError, Result};
use crate::playback::Timing;
use crate::scheduler::SchedulerConfig;
use crate::script::Catalog;
use crate::sink::Brightness;
use crate::topology::{self, LedTopology};

/// Resolved runtime context for one device.
#[derive(Debug, Clone)]
pub struct GlyphContext {
    pub topology: &'static LedTopology,
    /// Whether the topology came from model detection rather than config.
    pub detected: bool,
    pub catalog: Catalog,
    pub brightness: Brightness,
    pub timing: Timing,
}

impl GlyphContext {
    /// Resolve context for `device` under `config`.
    ///
    /// Returns `Err(UnsupportedDevice)` when the topology is `auto` and the
    /// device model matches no known topology, and a topology error when the
    /// configured name is unknown.
    pub fn resolve(config: &Config, device: &dyn LedDevice) -> Result<Self> {
        let name = config.topology.trim();
        let (topology, detected) = if name.is_empty() || name.eq_ignore_ascii_case("auto") {
            let model = &device.info().model;
            let t = topology::detect_topology(model)
                .ok_or_else(|| DeviceError::UnsupportedDevice(model.clone()))?;
            (t, true)
        } else {
            let t = topology::by_name(name)
                .ok_or_else(|| GlyphError::Topology(format!("unknown topology \"{name}\"")))?;
            (t, false)
        };

        let timing = Timing {
            frame_interval: config.frame_interval(),
            ..Timing::default()
        };

        Ok(GlyphContext {
            topology,
            detected,
            catalog: Catalog::new(config.animations_path()),
            brightness: config.brightness(),
            timing,
        })
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            topology: self.topology,
            brightness: self.brightness,
            catalog: self.catalog.clone(),
            timing: self.timing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::MockDevice;
    use std::time::Duration;

    #[test]
    fn auto_detects_from_model() {
        let dev = MockDevice::with_model("Nothing Phone (2)");
        let ctx = GlyphContext::resolve(&Config::default(), &dev).unwrap();
        assert_eq!(ctx.topology.name, "phone2");
        assert!(ctx.detected);
    }

    #[test]
    fn explicit_topology_wins_over_model() {
        let dev = MockDevice::with_model("Nothing Phone (2)");
        let config = Config {
            topology: "phone1".into(),
            ..Config::default()
        };
        let ctx = GlyphContext::resolve(&config, &dev).unwrap();
        assert_eq!(ctx.topology.name, "phone1");
        assert!(!ctx.detected);
    }

    #[test]
    fn unknown_model_is_unsupported_device() {
        let dev = MockDevice::with_model("Pixel 9");
        let err = GlyphContext::resolve(&Config::default(), &dev).unwrap_err();
        assert!(
            err.to_string().contains("Unsupported device"),
            "expected UnsupportedDevice error, got: {err}"
        );
    }

    #[test]
    fn unknown_topology_name_is_error() {
        let dev = MockDevice::new();
        let config = Config {
            topology: "phone9".into(),
            ..Config::default()
        };
        let err = GlyphContext::resolve(&config, &dev).unwrap_err();
        assert!(matches!(err, GlyphError::Topology(_)));
    }

    #[test]
    fn config_values_flow_through() {
        let dev = MockDevice::new();
        let config = Config {
            brightness: 4,
            frame_interval_ms: 33,
            animations_dir: "/tmp/glyph-anims".into(),
            ..Config::default()
        };
        let ctx = GlyphContext::resolve(&config, &dev).unwrap();
        assert_eq!(ctx.brightness.target(), 4095);
        assert_eq!(ctx.timing.frame_interval, Duration::from_millis(33));
        assert_eq!(ctx.catalog.root(), std::path::Path::new("/tmp/glyph-anims"));
        assert_eq!(ctx.scheduler_config().topology.name, "phone1");
    }
}
