//! `daemon` subcommand — read triggers from stdin and feed the scheduler.
//!
//! One trigger per line (`charging 62`, `call radiate`, `tap low`, ...).
//! Blank lines and `#` comments are skipped; `status` prints a JSON status
//! snapshot. Runs until stdin closes or Ctrl+C.

use std::io::BufRead;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use super::{
    DaemonStatusJson, Options, RUNNING, Result, Scheduler, Trigger, start_session,
    wait_until_idle,
};

const LINE_POLL: Duration = Duration::from_millis(100);

/// What one input line asks for.
#[derive(Debug, PartialEq)]
enum Line {
    Skip,
    Status,
    Fire(Trigger),
}

fn parse_line(line: &str) -> Result<Line> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(Line::Skip);
    }
    if line.eq_ignore_ascii_case("status") {
        return Ok(Line::Status);
    }
    Ok(Line::Fire(line.parse()?))
}

fn handle_line(scheduler: &Scheduler, line: &str) {
    match parse_line(line) {
        Ok(Line::Skip) => {}
        Ok(Line::Status) => {
            let output = DaemonStatusJson {
                status: scheduler.registry().snapshot(),
            };
            match serde_json::to_string(&output) {
                Ok(s) => println!("{s}"),
                Err(e) => log::warn!("status serialization failed: {e}"),
            }
        }
        Ok(Line::Fire(trigger)) => scheduler.dispatch(trigger),
        Err(e) => log::warn!("ignoring \"{}\": {e}", line.trim()),
    }
}

pub(super) fn cmd_daemon(opts: &Options) -> Result<()> {
    let mut session = start_session(opts)?;
    log::info!(
        "glyph daemon on {} ({})",
        session.ctx.topology.name,
        session.scheduler.sink().device_info().path
    );

    let (tx, rx) = mpsc::channel::<String>();
    thread::Builder::new()
        .name("glyph-stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(l) => {
                        if tx.send(l).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log::warn!("stdin read failed: {e}");
                        break;
                    }
                }
            }
        })?;

    while RUNNING.load(Ordering::SeqCst) {
        match rx.recv_timeout(LINE_POLL) {
            Ok(line) => handle_line(&session.scheduler, &line),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                log::debug!("stdin closed");
                wait_until_idle(&session.scheduler);
                break;
            }
        }
    }

    session.scheduler.shutdown();
    Ok(())
}
