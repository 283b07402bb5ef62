//! Device communication — trait + sysfs backend.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

// ── Error type ──

/// Device communication errors.
///
/// String payloads follow the convention **"context: details"** where *context*
/// names the file or step (e.g. `"frame_leds_effect"`) and *details* describes
/// what went wrong.
#[derive(Debug)]
pub enum DeviceError {
    NotFound(String),
    WriteFailed(String),
    UnsupportedDevice(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::NotFound(path) => write!(f, "LED device not found at {path}"),
            DeviceError::WriteFailed(e) => write!(f, "LED write failed: {e}"),
            DeviceError::UnsupportedDevice(name) => {
                write!(f, "Unsupported device: {name} (no known LED topology)")
            }
        }
    }
}

impl std::error::Error for DeviceError {}

pub type Result<T> = std::result::Result<T, DeviceError>;

// ── Device info ──

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    /// Base directory of the LED class device, or a pseudo path for mocks.
    pub path: String,
    /// Model string, e.g. "Nothing Phone (1)".
    pub model: String,
}

// ── Trait ──

/// Raw LED hardware interface.
///
/// Values handed to these methods are final device units (already scaled).
/// Implementations must be shareable across the worker and producer threads.
pub trait LedDevice: Send + Sync {
    fn info(&self) -> &DeviceInfo;
    /// Set every LED on the device to the same level.
    fn write_all(&self, value: u32) -> Result<()>;
    /// Write one value per zone, in topology order.
    fn write_frame(&self, values: &[u32]) -> Result<()>;
    /// Set a single LED by hardware index.
    fn write_single(&self, index: u32, value: u32) -> Result<()>;
}

// ── Sysfs backend ──

/// Default LED class directory of the AW210xx driver.
pub const DEFAULT_LED_PATH: &str = "/sys/class/leds/aw210xx_led";

const ALL_LEDS_FILE: &str = "all_white_leds_br";
const FRAME_FILE: &str = "frame_leds_effect";
const SINGLE_LED_FILE: &str = "single_led_br";
const MODEL_PATH: &str = "/proc/device-tree/model";

/// LED device exposed through sysfs attribute files.
pub struct SysfsDevice {
    info: DeviceInfo,
    base: PathBuf,
}

impl SysfsDevice {
    /// Open the LED class directory at `base`.
    ///
    /// Only checks that the directory exists; individual attribute writes
    /// report their own errors.
    pub fn open(base: &Path) -> Result<Self> {
        if !base.is_dir() {
            return Err(DeviceError::NotFound(base.display().to_string()));
        }
        let model = fs::read_to_string(MODEL_PATH)
            .map(|m| parse_model(m.as_bytes()))
            .unwrap_or_else(|_| "unknown".to_string());
        Ok(SysfsDevice {
            info: DeviceInfo {
                path: base.display().to_string(),
                model,
            },
            base: base.to_path_buf(),
        })
    }

    fn write_attr(&self, file: &str, value: &str) -> Result<()> {
        let path = self.base.join(file);
        fs::write(&path, value).map_err(|e| DeviceError::WriteFailed(format!("{file}: {e}")))
    }
}

/// Parse a null-terminated model string as found in the device tree.
pub fn parse_model(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).trim().to_string()
}

impl LedDevice for SysfsDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn write_all(&self, value: u32) -> Result<()> {
        self.write_attr(ALL_LEDS_FILE, &value.to_string())
    }

    fn write_frame(&self, values: &[u32]) -> Result<()> {
        let line: Vec<String> = values.iter().map(u32::to_string).collect();
        self.write_attr(FRAME_FILE, &line.join(" "))
    }

    fn write_single(&self, index: u32, value: u32) -> Result<()> {
        self.write_attr(SINGLE_LED_FILE, &format!("{index} {value}"))
    }
}

// ── Mock device for tests ──

pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// One recorded hardware write.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum DeviceWrite {
        All(u32),
        Frame(Vec<u32>),
        Single(u32, u32),
    }

    /// In-memory device for unit tests and dry runs. Records every write in
    /// order; `fail_writes` makes all writes return an error (after recording
    /// the attempt).
    pub struct MockDevice {
        info: DeviceInfo,
        pub writes: Mutex<Vec<DeviceWrite>>,
        pub fail_writes: AtomicBool,
        /// Log each write at info level (dry-run mode).
        pub echo: AtomicBool,
    }

    impl Default for MockDevice {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockDevice {
        pub fn new() -> Self {
            Self::with_model("Nothing Phone (1)")
        }

        pub fn with_model(model: &str) -> Self {
            MockDevice {
                info: DeviceInfo {
                    path: "mock://glyph".into(),
                    model: model.into(),
                },
                writes: Mutex::new(Vec::new()),
                fail_writes: AtomicBool::new(false),
                echo: AtomicBool::new(false),
            }
        }

        /// Copy of every write recorded so far.
        pub fn history(&self) -> Vec<DeviceWrite> {
            self.writes.lock().map(|w| w.clone()).unwrap_or_default()
        }

        pub fn clear(&self) {
            if let Ok(mut w) = self.writes.lock() {
                w.clear();
            }
        }

        /// Most recent frame write, if any.
        pub fn last_frame(&self) -> Option<Vec<u32>> {
            self.history().into_iter().rev().find_map(|w| match w {
                DeviceWrite::Frame(v) => Some(v),
                _ => None,
            })
        }

        /// All frame writes in order.
        pub fn frames(&self) -> Vec<Vec<u32>> {
            self.history()
                .into_iter()
                .filter_map(|w| match w {
                    DeviceWrite::Frame(v) => Some(v),
                    _ => None,
                })
                .collect()
        }

        /// All single-LED writes in order as `(index, value)`.
        pub fn singles(&self) -> Vec<(u32, u32)> {
            self.history()
                .into_iter()
                .filter_map(|w| match w {
                    DeviceWrite::Single(i, v) => Some((i, v)),
                    _ => None,
                })
                .collect()
        }

        /// Final value of every LED touched through single-LED writes.
        pub fn single_state(&self) -> HashMap<u32, u32> {
            self.singles().into_iter().collect()
        }

        fn record(&self, write: DeviceWrite) -> Result<()> {
            if self.echo.load(Ordering::Relaxed) {
                log::info!("[dry-run] {write:?}");
            }
            if let Ok(mut w) = self.writes.lock() {
                w.push(write);
            }
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(DeviceError::WriteFailed(
                    "mock: write failure injected".into(),
                ));
            }
            Ok(())
        }
    }

    impl LedDevice for MockDevice {
        fn info(&self) -> &DeviceInfo {
            &self.info
        }

        fn write_all(&self, value: u32) -> Result<()> {
            self.record(DeviceWrite::All(value))
        }

        fn write_frame(&self, values: &[u32]) -> Result<()> {
            self.record(DeviceWrite::Frame(values.to_vec()))
        }

        fn write_single(&self, index: u32, value: u32) -> Result<()> {
            self.record(DeviceWrite::Single(index, value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{DeviceWrite, MockDevice};
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn parse_model_stops_at_nul() {
        assert_eq!(parse_model(b"Nothing Phone (1)\0junk"), "Nothing Phone (1)");
    }

    #[test]
    fn parse_model_trims_whitespace() {
        assert_eq!(parse_model(b"  Nothing Phone (2)\n"), "Nothing Phone (2)");
    }

    #[test]
    fn sysfs_open_missing_dir_is_not_found() {
        let err = SysfsDevice::open(Path::new("/nonexistent/leds/glyph")).err().unwrap();
        assert!(matches!(err, DeviceError::NotFound(_)));
    }

    #[test]
    fn sysfs_writes_attribute_files() {
        let dir = tempfile::tempdir().unwrap();
        let dev = SysfsDevice::open(dir.path()).unwrap();

        dev.write_all(4095).unwrap();
        dev.write_frame(&[1, 2, 3]).unwrap();
        dev.write_single(16, 1365).unwrap();

        let read = |f: &str| fs::read_to_string(dir.path().join(f)).unwrap();
        assert_eq!(read(ALL_LEDS_FILE), "4095");
        assert_eq!(read(FRAME_FILE), "1 2 3");
        assert_eq!(read(SINGLE_LED_FILE), "16 1365");
    }

    #[test]
    fn sysfs_write_error_names_attribute() {
        let dir = tempfile::tempdir().unwrap();
        let dev = SysfsDevice::open(dir.path()).unwrap();
        std::fs::create_dir(dir.path().join(FRAME_FILE)).unwrap();
        let err = dev.write_frame(&[0]).unwrap_err();
        assert!(err.to_string().contains("frame_leds_effect"), "got: {err}");
    }

    #[test]
    fn mock_records_in_order() {
        let dev = MockDevice::new();
        dev.write_all(1).unwrap();
        dev.write_single(3, 4).unwrap();
        dev.write_frame(&[5, 6]).unwrap();
        assert_eq!(
            dev.history(),
            vec![
                DeviceWrite::All(1),
                DeviceWrite::Single(3, 4),
                DeviceWrite::Frame(vec![5, 6]),
            ]
        );
        assert_eq!(dev.last_frame(), Some(vec![5, 6]));
    }

    #[test]
    fn mock_failure_injection_still_records() {
        let dev = MockDevice::new();
        dev.fail_writes.store(true, Ordering::SeqCst);
        assert!(dev.write_single(1, 1).is_err());
        assert_eq!(dev.singles(), vec![(1, 1)]);
    }

    #[test]
    fn display_unsupported_device() {
        let e = DeviceError::UnsupportedDevice("Pixel 9".into());
        assert_eq!(
            e.to_string(),
            "Unsupported device: Pixel 9 (no known LED topology)"
        );
    }
}
