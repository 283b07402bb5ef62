//! Application configuration — TOML-based, platform-aware paths.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::DEFAULT_LED_PATH;
use crate::sink::Brightness;
use crate::topology;

/// Frame intervals outside this range are rejected by [`Config::validate`].
const FRAME_INTERVAL_RANGE_MS: std::ops::RangeInclusive<u64> = 1..=1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Brightness level 1–4. Default: 3.
    #[serde(default = "default_brightness")]
    pub brightness: u8,

    /// LED topology: "auto" (detect from the device model), "phone1" or "phone2".
    #[serde(default = "default_topology")]
    pub topology: String,

    /// LED class directory in sysfs.
    #[serde(default = "default_led_path")]
    pub led_path: String,

    /// Animation catalog directory. Empty = `animations` next to the config file.
    #[serde(default)]
    pub animations_dir: String,

    /// Script played by `call` when no name is given.
    #[serde(default = "default_call_animation")]
    pub call_animation: String,

    /// Script played for notifications when no name is given.
    #[serde(default = "default_notification_animation")]
    pub notification_animation: String,

    /// Scripted frame interval in milliseconds. Default: 16.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

fn default_brightness() -> u8 {
    3
}
fn default_topology() -> String {
    "auto".into()
}
fn default_led_path() -> String {
    DEFAULT_LED_PATH.into()
}
fn default_call_animation() -> String {
    "radiate".into()
}
fn default_notification_animation() -> String {
    "bulb".into()
}
fn default_frame_interval_ms() -> u64 {
    16
}

impl Default for Config {
    fn default() -> Self {
        Config {
            brightness: default_brightness(),
            topology: default_topology(),
            led_path: default_led_path(),
            animations_dir: String::new(),
            call_animation: default_call_animation(),
            notification_animation: default_notification_animation(),
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

/// Validation errors that [`Config::validate`] can return.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// `brightness` is outside 1–4.
    InvalidBrightness(u8),
    /// `topology` is neither "auto" nor a known topology name.
    UnknownTopology(String),
    /// `frame_interval_ms` is zero or unreasonably long.
    InvalidFrameInterval(u64),
    /// An animation name field is empty or contains a path separator.
    InvalidAnimationName { field: &'static str, name: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidBrightness(b) => {
                write!(f, "Invalid brightness {b} (expected 1-4)")
            }
            ValidationError::UnknownTopology(t) => {
                write!(f, "Unknown topology \"{t}\" (expected auto, phone1 or phone2)")
            }
            ValidationError::InvalidFrameInterval(ms) => write!(
                f,
                "Invalid frame_interval_ms {ms} (expected {}-{})",
                FRAME_INTERVAL_RANGE_MS.start(),
                FRAME_INTERVAL_RANGE_MS.end()
            ),
            ValidationError::InvalidAnimationName { field, name } => {
                write!(f, "Invalid {field}: \"{name}\"")
            }
        }
    }
}

impl Config {
    /// Platform-specific config directory.
    pub fn dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("glyph"))
    }

    /// Full path to config file.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Load config from disk, or return defaults if not found.
    pub fn load() -> Self {
        let (config, warnings) = Self::load_with_warnings();
        for w in &warnings {
            log::warn!("{w}");
        }
        config
    }

    /// Load config from an arbitrary path, returning the config and any parse warnings.
    ///
    /// Returns `(defaults, [])` if the file doesn't exist.
    /// Returns `(defaults, [warning])` if the file exists but can't be parsed.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, vec![]),
                Err(e) => {
                    let warning = format!(
                        "config parse error ({}), using defaults: {e}",
                        path.display()
                    );
                    (Self::default(), vec![warning])
                }
            },
            Err(_) => (Self::default(), vec![]),
        }
    }

    /// Load config from the default path, returning the config and any parse warnings.
    pub fn load_with_warnings() -> (Self, Vec<String>) {
        let Some(path) = Self::path() else {
            return (Self::default(), vec![]);
        };
        Self::load_from(&path)
    }

    /// Animation catalog directory, resolving the empty default.
    pub fn animations_path(&self) -> PathBuf {
        let dir = self.animations_dir.trim();
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
        Self::dir()
            .map(|d| d.join("animations"))
            .unwrap_or_else(|| PathBuf::from("animations"))
    }

    /// Brightness level, falling back to the default when out of range.
    pub fn brightness(&self) -> Brightness {
        Brightness::from_level(self.brightness).unwrap_or_default()
    }

    /// Scripted frame interval, falling back to the default when zero.
    pub fn frame_interval(&self) -> Duration {
        let ms = if self.frame_interval_ms == 0 {
            default_frame_interval_ms()
        } else {
            self.frame_interval_ms
        };
        Duration::from_millis(ms)
    }

    /// Validate the entire config, collecting all errors.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if Brightness::from_level(self.brightness).is_none() {
            errors.push(ValidationError::InvalidBrightness(self.brightness));
        }

        let topo = self.topology.trim();
        if !topo.eq_ignore_ascii_case("auto") && topology::by_name(topo).is_none() {
            errors.push(ValidationError::UnknownTopology(self.topology.clone()));
        }

        if !FRAME_INTERVAL_RANGE_MS.contains(&self.frame_interval_ms) {
            errors.push(ValidationError::InvalidFrameInterval(self.frame_interval_ms));
        }

        for (field, name) in [
            ("call_animation", &self.call_animation),
            ("notification_animation", &self.notification_animation),
        ] {
            if name.trim().is_empty() || name.contains(['/', '\\']) {
                errors.push(ValidationError::InvalidAnimationName {
                    field,
                    name: name.clone(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Config defaults ──

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.brightness, 3);
        assert_eq!(c.topology, "auto");
        assert_eq!(c.led_path, "/sys/class/leds/aw210xx_led");
        assert!(c.animations_dir.is_empty());
        assert_eq!(c.call_animation, "radiate");
        assert_eq!(c.notification_animation, "bulb");
        assert_eq!(c.frame_interval_ms, 16);
    }

    #[test]
    fn serialize_roundtrip() {
        let c = Config {
            brightness: 1,
            topology: "phone2".into(),
            animations_dir: "/data/glyph".into(),
            ..Config::default()
        };
        let toml_str = toml::to_string_pretty(&c).unwrap();
        let c2: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(c2, c);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let c: Config = toml::from_str("brightness = 4").unwrap();
        assert_eq!(c.brightness, 4);
        // Missing fields get defaults
        assert_eq!(c.topology, "auto");
        assert_eq!(c.call_animation, "radiate");
        assert_eq!(c.frame_interval_ms, 16);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let c: Config = toml::from_str("").unwrap();
        assert_eq!(c, Config::default());
    }

    #[test]
    fn wrong_type_toml_is_error() {
        let result: std::result::Result<Config, _> = toml::from_str("brightness = \"high\"");
        assert!(result.is_err());
    }

    #[test]
    fn config_path_ends_with_toml() {
        if let Some(path) = Config::path() {
            assert_eq!(path.file_name().unwrap(), "config.toml");
            assert_eq!(path.parent().unwrap().file_name().unwrap(), "glyph");
        }
    }

    // ── Derived values ──

    #[test]
    fn animations_path_prefers_explicit_dir() {
        let c = Config {
            animations_dir: "/tmp/anims".into(),
            ..Config::default()
        };
        assert_eq!(c.animations_path(), PathBuf::from("/tmp/anims"));
    }

    #[test]
    fn animations_path_defaults_next_to_config() {
        let c = Config::default();
        assert!(c.animations_path().ends_with("animations"));
    }

    #[test]
    fn brightness_falls_back_to_default() {
        let c = Config {
            brightness: 9,
            ..Config::default()
        };
        assert_eq!(c.brightness().level(), 3);
        let c = Config {
            brightness: 1,
            ..Config::default()
        };
        assert_eq!(c.brightness().target(), 102);
    }

    #[test]
    fn frame_interval_zero_uses_default() {
        let c = Config {
            frame_interval_ms: 0,
            ..Config::default()
        };
        assert_eq!(c.frame_interval(), Duration::from_millis(16));
    }

    // ── validate ──

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_known_topologies_ok() {
        for t in ["auto", "AUTO", "phone1", "phone2"] {
            let c = Config {
                topology: t.into(),
                ..Config::default()
            };
            assert!(c.validate().is_ok(), "{t}");
        }
    }

    #[test]
    fn validate_collects_multiple_errors() {
        let c = Config {
            brightness: 0,
            topology: "phone9".into(),
            frame_interval_ms: 0,
            call_animation: "../x".into(),
            notification_animation: " ".into(),
            ..Config::default()
        };
        let errors = c.validate().unwrap_err();
        assert_eq!(errors.len(), 5);
        assert_eq!(errors[0], ValidationError::InvalidBrightness(0));
        assert_eq!(errors[1], ValidationError::UnknownTopology("phone9".into()));
        assert_eq!(errors[2], ValidationError::InvalidFrameInterval(0));
    }

    #[test]
    fn validation_error_display() {
        assert_eq!(
            ValidationError::InvalidBrightness(7).to_string(),
            "Invalid brightness 7 (expected 1-4)"
        );
        assert_eq!(
            ValidationError::InvalidFrameInterval(5000).to_string(),
            "Invalid frame_interval_ms 5000 (expected 1-1000)"
        );
        assert_eq!(
            ValidationError::InvalidAnimationName {
                field: "call_animation",
                name: "a/b".into()
            }
            .to_string(),
            "Invalid call_animation: \"a/b\""
        );
    }

    // ── Persistence ──

    #[test]
    fn serialized_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let c = Config {
            brightness: 2,
            topology: "phone1".into(),
            ..Config::default()
        };
        std::fs::write(&path, toml::to_string_pretty(&c).unwrap()).unwrap();
        let (loaded, warnings) = Config::load_from(&path);
        assert!(warnings.is_empty());
        assert_eq!(loaded, c);
    }

    #[test]
    fn load_from_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (c, warnings) = Config::load_from(&dir.path().join("missing.toml"));
        assert!(warnings.is_empty());
        assert_eq!(c, Config::default());
    }

    #[test]
    fn load_from_invalid_toml_returns_defaults_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is { not valid toml").unwrap();
        let (c, warnings) = Config::load_from(&path);
        assert_eq!(c, Config::default());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("config parse error"));
    }
}
