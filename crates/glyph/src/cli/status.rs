//! `status` subcommand — show device, topology and configuration status.

use std::path::Path;

use super::{
    Config, ConfigSummaryJson, DeviceStatusJson, GlyphContext, LedDevice, Result, StatusOutput,
    kv, kv_indent, kv_width, open_device, print_json,
};

/// Collect device status from an open device.
fn collect_device_status(dev: &dyn LedDevice, config: &Config) -> DeviceStatusJson {
    let info = dev.info();
    let ctx = match GlyphContext::resolve(config, dev) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            log::debug!("topology not resolved: {e}");
            None
        }
    };
    DeviceStatusJson {
        model: info.model.clone(),
        path: info.path.clone(),
        topology: ctx.as_ref().map(|c| c.topology.name.to_string()),
        detected: ctx.as_ref().is_some_and(|c| c.detected),
        zones: ctx.as_ref().map_or(0, |c| c.topology.zone_count()),
    }
}

/// Print or serialize the status output.
fn print_status(device_status: Option<DeviceStatusJson>, config: &Config, json: bool) -> Result<()> {
    let brightness = config.brightness();
    let config_summary = ConfigSummaryJson {
        brightness: brightness.level(),
        brightness_target: brightness.target(),
        topology: config.topology.clone(),
        animations_dir: config.animations_path().display().to_string(),
        call_animation: config.call_animation.clone(),
        notification_animation: config.notification_animation.clone(),
    };

    if json {
        let output = StatusOutput {
            version: env!("CARGO_PKG_VERSION").to_string(),
            device: device_status,
            config: config_summary,
        };
        return print_json(&output);
    }

    // Human-readable output
    let w = kv_width(
        &["Version:", "Device:"],
        &[
            "Model:",
            "Path:",
            "Topology:",
            "Brightness:",
            "Animations:",
            "Call:",
            "Notification:",
        ],
    );

    kv("Version:", env!("CARGO_PKG_VERSION"), w);
    println!();

    match &device_status {
        Some(dev) => {
            kv("Device:", "AVAILABLE", w);
            kv_indent("Model:", &dev.model, w);
            kv_indent("Path:", &dev.path, w);
            match &dev.topology {
                Some(name) => {
                    let how = if dev.detected { "detected" } else { "configured" };
                    kv_indent(
                        "Topology:",
                        format_args!("{name} ({how}, {} zones)", dev.zones),
                        w,
                    );
                }
                None => kv_indent("Topology:", "unsupported", w),
            }
        }
        None => {
            kv("Device:", "NOT FOUND", w);
        }
    }

    println!();
    println!("Config:");
    kv_indent(
        "Brightness:",
        format_args!(
            "level {} (max {})",
            config_summary.brightness, config_summary.brightness_target
        ),
        w,
    );
    kv_indent("Topology:", &config_summary.topology, w);
    kv_indent("Animations:", &config_summary.animations_dir, w);
    kv_indent("Call:", &config_summary.call_animation, w);
    kv_indent("Notification:", &config_summary.notification_animation, w);

    Ok(())
}

pub(super) fn cmd_status(json: bool, config_path: Option<&Path>, dry_run: bool) -> Result<()> {
    let config = super::load_config(config_path);
    let device_status = match open_device(&config, dry_run) {
        Ok(dev) => Some(collect_device_status(dev.as_ref(), &config)),
        Err(e) => {
            log::debug!("device unavailable: {e}");
            None
        }
    };
    print_status(device_status, &config, json)
}
