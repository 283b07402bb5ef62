//! CLI subcommands — configuration, catalog listing, one-shot triggers, daemon.

mod config_cmd;
mod daemon;
mod list;
mod play;
mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use clap::{Subcommand, ValueEnum};
use serde::Serialize;

pub(super) use crate::RUNNING;
pub(super) use glyph_lib::Scheduler;
pub(super) use glyph_lib::config::Config;
pub(super) use glyph_lib::context::GlyphContext;
pub(super) use glyph_lib::device::mock::MockDevice;
pub(super) use glyph_lib::device::{LedDevice, SysfsDevice};
pub(super) use glyph_lib::error::{GlyphError, Result};
pub(super) use glyph_lib::registry::StatusSnapshot;
pub(super) use glyph_lib::script::Section;
pub(super) use glyph_lib::topology::MusicBand;
pub(super) use glyph_lib::trigger::{OverrideAction, Trigger};

const PADDING: usize = 2;

/// How often blocking commands re-check the Ctrl+C flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Compute alignment width for a command's key-value output.
/// Ensures at least PADDING spaces after the longest key in either level,
/// with top-level and indent values aligned to the same column.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top_max = top.iter().map(|k| k.len()).max().unwrap_or(0);
    let indent_max = indent.iter().map(|k| k.len()).max().unwrap_or(0);
    let top_need = if top.is_empty() { 0 } else { top_max + PADDING };
    // Indent keys lose 2 chars of inner width to the "  " prefix
    let indent_need = if indent.is_empty() {
        0
    } else {
        indent_max + PADDING + 2
    };
    top_need.max(indent_need)
}

pub(super) fn format_kv(key: &str, value: impl std::fmt::Display, w: usize) -> String {
    format!("{key:<width$}{value}", width = w)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{}", format_kv(key, value, w));
}

pub(super) fn kv_indent(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("  {key:<width$}{value}", width = w - 2);
}

pub(super) fn print_json(value: &impl Serialize) -> Result<()> {
    let json_str = serde_json::to_string_pretty(value)
        .map_err(|e| GlyphError::Config(format!("JSON serialization failed: {e}")))?;
    println!("{json_str}");
    Ok(())
}

// ── Shared setup ──

/// Global flags every subcommand sees.
pub struct Options {
    pub json: bool,
    pub config_path: Option<PathBuf>,
    pub dry_run: bool,
}

impl Options {
    fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

/// Load config from `--config` or the platform default, logging parse warnings.
pub(super) fn load_config(path: Option<&Path>) -> Config {
    let (config, warnings) = match path {
        Some(p) => Config::load_from(p),
        None => Config::load_with_warnings(),
    };
    for w in &warnings {
        log::warn!("{w}");
    }
    config
}

/// Open the configured sysfs device, or an echoing mock for `--dry-run`.
pub(super) fn open_device(config: &Config, dry_run: bool) -> Result<Arc<dyn LedDevice>> {
    if dry_run {
        let dev = MockDevice::new();
        dev.echo.store(true, Ordering::Relaxed);
        return Ok(Arc::new(dev));
    }
    let dev = SysfsDevice::open(Path::new(&config.led_path))?;
    Ok(Arc::new(dev))
}

/// A running scheduler plus the context it was built from.
pub(super) struct Session {
    pub config: Config,
    pub ctx: GlyphContext,
    pub scheduler: Scheduler,
}

pub(super) fn start_session(opts: &Options) -> Result<Session> {
    let config = load_config(opts.config_path());
    if let Err(errors) = config.validate() {
        for e in &errors {
            log::warn!("config: {e}");
        }
    }
    let device = open_device(&config, opts.dry_run)?;
    let ctx = GlyphContext::resolve(&config, device.as_ref())?;
    log::debug!(
        "topology {} ({}), brightness level {}",
        ctx.topology.name,
        if ctx.detected { "detected" } else { "configured" },
        ctx.brightness.level()
    );
    let scheduler = Scheduler::start(device, ctx.scheduler_config());
    Ok(Session {
        config,
        ctx,
        scheduler,
    })
}

/// Block until the scheduler is idle or Ctrl+C is pressed.
/// Returns `false` if interrupted.
pub(super) fn wait_until_idle(scheduler: &Scheduler) -> bool {
    while RUNNING.load(Ordering::SeqCst) {
        if scheduler.wait_idle(POLL_INTERVAL) {
            return true;
        }
    }
    false
}

/// Sleep for `total`, waking early on Ctrl+C. Returns `false` if interrupted.
pub(super) fn sleep_while_running(total: Duration) -> bool {
    let mut left = total;
    while !left.is_zero() {
        if !RUNNING.load(Ordering::SeqCst) {
            return false;
        }
        let step = left.min(POLL_INTERVAL);
        std::thread::sleep(step);
        left -= step;
    }
    RUNNING.load(Ordering::SeqCst)
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct StatusOutput {
    pub version: String,
    pub device: Option<DeviceStatusJson>,
    pub config: ConfigSummaryJson,
}

#[derive(Serialize)]
pub(super) struct DeviceStatusJson {
    pub model: String,
    pub path: String,
    pub topology: Option<String>,
    pub detected: bool,
    pub zones: usize,
}

#[derive(Serialize)]
pub(super) struct ConfigSummaryJson {
    pub brightness: u8,
    pub brightness_target: u32,
    pub topology: String,
    pub animations_dir: String,
    pub call_animation: String,
    pub notification_animation: String,
}

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: Config,
    pub animations_dir: String,
    pub problems: Vec<String>,
}

#[derive(Serialize)]
pub(super) struct ListOutput {
    pub animations_dir: String,
    pub sections: Vec<SectionJson>,
}

#[derive(Serialize)]
pub(super) struct SectionJson {
    pub section: Section,
    pub animations: Vec<String>,
}

#[derive(Serialize)]
pub(super) struct DaemonStatusJson {
    pub status: StatusSnapshot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl From<Switch> for bool {
    fn from(s: Switch) -> bool {
        s == Switch::On
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OverrideArg {
    On,
    Off,
    Toggle,
}

impl From<OverrideArg> for OverrideAction {
    fn from(a: OverrideArg) -> Self {
        match a {
            OverrideArg::On => OverrideAction::On,
            OverrideArg::Off => OverrideAction::Off,
            OverrideArg::Toggle => OverrideAction::Toggle,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Show device, topology and configuration status
    Status,

    /// Show current configuration and file paths
    Config,

    /// List animations in the catalog
    List,

    /// Play a CSV animation from the catalog
    Play {
        /// Animation name (default: notification_animation from config)
        name: Option<String>,
        /// Wait for a running animation instead of dropping the request
        #[arg(long)]
        wait: bool,
    },

    /// Show the charging ladder for a battery percentage
    Charging {
        #[arg(value_parser = clap::value_parser!(u32).range(0..=100))]
        percent: u32,
    },

    /// Show the volume ladder; several values play as quick successive updates
    Volume {
        #[arg(required = true, num_args = 1.., value_parser = clap::value_parser!(u32).range(0..=100))]
        percent: Vec<u32>,
        /// Delay between successive updates in milliseconds
        #[arg(long, default_value_t = 150)]
        interval: u64,
    },

    /// Ring a call animation, then stop it
    Call {
        /// Animation name (default: call_animation from config)
        name: Option<String>,
        /// How long to ring before the call ends
        #[arg(long, default_value_t = 5)]
        seconds: u64,
    },

    /// Turn the essential-notification floor on or off
    Essential {
        #[arg(value_enum)]
        state: Switch,
    },

    /// Flash the zone for one music beat
    Tap {
        /// low, mid_low, mid, mid_high or high
        band: MusicBand,
    },

    /// Force every LED to full brightness, or release it
    Override {
        #[arg(value_enum)]
        action: OverrideArg,
    },

    /// Read triggers from stdin, one per line, until EOF or Ctrl+C
    Daemon,
}

/// Warn if `--json` was passed to a command that doesn't support it.
fn warn_json_unsupported(cmd_name: &str) {
    log::warn!("--json is not supported for `{cmd_name}` (ignored)");
}

pub fn run(cmd: Command, opts: &Options) -> Result<()> {
    let json = opts.json;
    match cmd {
        Command::Status => status::cmd_status(json, opts.config_path(), opts.dry_run),
        Command::Config => config_cmd::cmd_config(json, opts.config_path()),
        Command::List => list::cmd_list(json, opts.config_path()),
        Command::Daemon => daemon::cmd_daemon(opts),
        other => {
            if json {
                warn_json_unsupported("trigger commands");
            }
            play::cmd_trigger(other, opts)
        }
    }
}


#[cfg(test)]
mod setup_tests {
    use super::*;

    #[test]
    fn load_config_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.toml")));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_config_reads_custom_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glyph.toml");
        std::fs::write(&path, "brightness = 1\ntopology = \"phone2\"\n").unwrap();
        let config = load_config(Some(&path));
        assert_eq!(config.brightness, 1);
        assert_eq!(config.topology, "phone2");
    }

    #[test]
    fn dry_run_device_is_mock() {
        let dev = open_device(&Config::default(), true).unwrap();
        assert_eq!(dev.info().path, "mock://glyph");
    }

    #[test]
    fn missing_sysfs_device_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            led_path: dir.path().join("no-such-led").display().to_string(),
            ..Config::default()
        };
        assert!(open_device(&config, false).is_err());
    }

    #[test]
    fn dry_run_session_resolves_topology() {
        let dir = tempfile::tempdir().unwrap();
        let opts = Options {
            json: false,
            config_path: Some(dir.path().join("absent.toml")),
            dry_run: true,
        };
        let session = start_session(&opts).unwrap();
        assert_eq!(session.ctx.topology.name, "phone1");
        assert!(session.ctx.detected);
        assert_eq!(session.config, Config::default());
        assert!(!session.scheduler.registry().animation_active());
    }

    #[test]
    fn switch_and_override_conversions() {
        assert!(bool::from(Switch::On));
        assert!(!bool::from(Switch::Off));
        assert_eq!(OverrideAction::from(OverrideArg::Toggle), OverrideAction::Toggle);
    }
}

#[cfg(test)]
mod json_output_tests {
    use super::*;

    fn summary() -> ConfigSummaryJson {
        ConfigSummaryJson {
            brightness: 3,
            brightness_target: 1365,
            topology: "auto".into(),
            animations_dir: "/home/user/.config/glyph/animations".into(),
            call_animation: "radiate".into(),
            notification_animation: "bulb".into(),
        }
    }

    #[test]
    fn status_output_with_null_device() {
        let output = StatusOutput {
            version: "0.1.0".into(),
            device: None,
            config: summary(),
        };
        let json = serde_json::to_string_pretty(&output).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["version"], "0.1.0");
        assert!(parsed["device"].is_null());
        assert_eq!(parsed["config"]["brightness_target"], 1365);
    }

    #[test]
    fn status_output_with_device() {
        let output = StatusOutput {
            version: "0.1.0".into(),
            device: Some(DeviceStatusJson {
                model: "Nothing Phone (2)".into(),
                path: "/sys/class/leds/aw210xx_led".into(),
                topology: Some("phone2".into()),
                detected: true,
                zones: 11,
            }),
            config: summary(),
        };
        let parsed = serde_json::to_value(&output).unwrap();
        assert_eq!(parsed["device"]["topology"], "phone2");
        assert_eq!(parsed["device"]["zones"], 11);
        assert_eq!(parsed["device"]["detected"], true);
    }

    #[test]
    fn config_output_complete() {
        let output = ConfigOutput {
            config_file: Some("/home/user/.config/glyph/config.toml".into()),
            config_file_exists: true,
            settings: Config::default(),
            animations_dir: "/home/user/.config/glyph/animations".into(),
            problems: vec![],
        };
        let parsed = serde_json::to_value(&output).unwrap();
        assert!(parsed["config_file"].is_string());
        assert_eq!(parsed["settings"]["brightness"], 3);
        assert_eq!(parsed["settings"]["topology"], "auto");
        assert_eq!(parsed["settings"]["call_animation"], "radiate");
        assert!(parsed["problems"].as_array().unwrap().is_empty());
    }

    #[test]
    fn list_output_names_sections_lowercase() {
        let output = ListOutput {
            animations_dir: "/tmp/anims".into(),
            sections: vec![SectionJson {
                section: Section::Notification,
                animations: vec!["bulb".into()],
            }],
        };
        let parsed = serde_json::to_value(&output).unwrap();
        assert_eq!(parsed["sections"][0]["section"], "notification");
        assert_eq!(parsed["sections"][0]["animations"][0], "bulb");
    }

    #[test]
    fn daemon_status_wraps_snapshot() {
        let registry = glyph_lib::registry::StatusRegistry::new();
        let output = DaemonStatusJson {
            status: registry.snapshot(),
        };
        let parsed = serde_json::to_value(&output).unwrap();
        assert_eq!(parsed["status"]["animation_active"], false);
        assert_eq!(parsed["status"]["all_leds_override"], false);
    }
}
