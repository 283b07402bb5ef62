//! Glyph CLI — drive LED animations on Nothing Phone glyph arrays.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

mod cli;

/// Shared shutdown flag — set by Ctrl+C handler.
pub static RUNNING: AtomicBool = AtomicBool::new(true);

#[derive(Parser)]
#[command(
    name = "glyph",
    version,
    about = "Animation scheduler for multi-zone glyph LED arrays"
)]
struct Args {
    /// Output as JSON (for status, config, list)
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use a config file other than the platform default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write to an in-memory device and log every write instead
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: cli::Command,
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));
    logger.format_timestamp(None).format_target(false);
    if args.dry_run && !args.verbose {
        // Dry-run writes are logged at info.
        logger.filter_module("glyph_lib::device", log::LevelFilter::Info);
    }
    logger.init();

    ctrlc::set_handler(move || {
        RUNNING.store(false, Ordering::SeqCst);
    })
    .ok();

    let opts = cli::Options {
        json: args.json,
        config_path: args.config,
        dry_run: args.dry_run,
    };
    if let Err(e) = cli::run(args.command, &opts) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
