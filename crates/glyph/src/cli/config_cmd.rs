//! `config` subcommand — show current configuration and file paths.

use std::path::Path;

use super::{Config, ConfigOutput, Result, kv, kv_indent, kv_width, print_json};

fn problems(config: &Config) -> Vec<String> {
    match config.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => errors.iter().map(ToString::to_string).collect(),
    }
}

pub(super) fn cmd_config(json: bool, custom_path: Option<&Path>) -> Result<()> {
    let config = super::load_config(custom_path);
    let config_path = custom_path.map(|p| p.to_path_buf()).or_else(Config::path);
    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());
    let animations = config.animations_path();
    let problems = problems(&config);

    if json {
        let output = ConfigOutput {
            config_file: config_path.as_ref().map(|p| p.display().to_string()),
            config_file_exists: config_exists,
            animations_dir: animations.display().to_string(),
            settings: config,
            problems,
        };
        return print_json(&output);
    }

    // Human-readable output
    let w = kv_width(
        &["Config file:"],
        &[
            "brightness:",
            "topology:",
            "led_path:",
            "animations_dir:",
            "call_animation:",
            "notification_animation:",
            "frame_interval_ms:",
        ],
    );

    match &config_path {
        Some(p) => {
            if config_exists {
                kv("Config file:", format_args!("{} (loaded)", p.display()), w);
            } else {
                kv(
                    "Config file:",
                    format_args!("{} (not found, using defaults)", p.display()),
                    w,
                );
            }
        }
        None => kv("Config file:", "(no config directory)", w),
    }
    println!();

    println!("Settings:");
    let brightness = config.brightness();
    kv_indent(
        "brightness:",
        format_args!("{} -> max {}", config.brightness, brightness.target()),
        w,
    );
    kv_indent("topology:", &config.topology, w);
    kv_indent("led_path:", &config.led_path, w);
    let anim_status = if animations.is_dir() {
        "present"
    } else {
        "not found"
    };
    kv_indent(
        "animations_dir:",
        format_args!("{} ({anim_status})", animations.display()),
        w,
    );
    kv_indent("call_animation:", &config.call_animation, w);
    kv_indent("notification_animation:", &config.notification_animation, w);
    kv_indent("frame_interval_ms:", config.frame_interval_ms, w);

    if !problems.is_empty() {
        println!();
        println!("Problems:");
        for p in &problems {
            println!("  {p}");
        }
    }
    Ok(())
}
