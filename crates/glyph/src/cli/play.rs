//! One-shot trigger subcommands — play, charging, volume, call, essential,
//! tap, override.
//!
//! Each starts a scheduler, fires its trigger and blocks until the
//! animation finishes (or Ctrl+C), then shuts the scheduler down.

use std::time::Duration;

use glyph_lib::registry::WaitPolicy;

use super::{
    Command, GlyphError, Options, OverrideAction, Result, Scheduler, Session, Trigger,
    sleep_while_running, start_session, wait_until_idle,
};

/// Fail early with a readable error rather than a dropped request.
fn ensure_script(scheduler: &Scheduler, name: &str) -> Result<()> {
    scheduler.catalog().load(name)?;
    Ok(())
}

/// Map a one-shot command to the trigger it fires. `None` for non-trigger
/// commands.
fn trigger_for(cmd: &Command, session: &Session) -> Option<Trigger> {
    let trigger = match cmd {
        Command::Play { name, wait } => Trigger::Csv {
            name: name
                .clone()
                .unwrap_or_else(|| session.config.notification_animation.clone()),
            policy: if *wait {
                WaitPolicy::Wait
            } else {
                WaitPolicy::DropIfBusy
            },
        },
        Command::Charging { percent } => Trigger::Charging {
            percent: *percent,
            policy: WaitPolicy::Wait,
        },
        Command::Call { name, .. } => Trigger::Call {
            name: name
                .clone()
                .unwrap_or_else(|| session.config.call_animation.clone()),
        },
        Command::Essential { state } => Trigger::Essential((*state).into()),
        Command::Tap { band } => Trigger::Tap(*band),
        Command::Override { action } => Trigger::Override((*action).into()),
        _ => return None,
    };
    Some(trigger)
}

fn run_volume(scheduler: &Scheduler, levels: &[u32], interval: Duration) {
    for (i, &percent) in levels.iter().enumerate() {
        if i > 0 && !sleep_while_running(interval) {
            return;
        }
        scheduler.dispatch(Trigger::Volume {
            percent,
            policy: WaitPolicy::Wait,
        });
    }
}

fn run_call(scheduler: &Scheduler, name: String, ring_for: Duration) -> Result<()> {
    ensure_script(scheduler, &name)?;
    scheduler.dispatch(Trigger::Call { name });
    println!("Ringing for {}s (Ctrl+C to end early)...", ring_for.as_secs());
    sleep_while_running(ring_for);
    scheduler.dispatch(Trigger::StopCall);
    Ok(())
}

pub(super) fn cmd_trigger(cmd: Command, opts: &Options) -> Result<()> {
    let mut session = start_session(opts)?;

    match &cmd {
        Command::Volume { percent, interval } => {
            run_volume(&session.scheduler, percent, Duration::from_millis(*interval));
        }
        Command::Call { seconds, .. } => {
            let Some(Trigger::Call { name }) = trigger_for(&cmd, &session) else {
                return Err(GlyphError::Trigger("call requires a name".into()));
            };
            run_call(&session.scheduler, name, Duration::from_secs(*seconds))?;
        }
        Command::Override {
            action: super::OverrideArg::Toggle,
        } => {
            let on = session.scheduler.toggle_all_leds();
            println!("All-LEDs override {}", if on { "on" } else { "off" });
        }
        _ => {
            let trigger = trigger_for(&cmd, &session)
                .ok_or_else(|| GlyphError::Trigger("not a trigger command".into()))?;
            if let Trigger::Csv { name, .. } = &trigger {
                ensure_script(&session.scheduler, name)?;
            }
            let tap = matches!(trigger, Trigger::Tap(_));
            if let Trigger::Override(action) = &trigger {
                let on = *action == OverrideAction::On;
                println!("All-LEDs override {}", if on { "on" } else { "off" });
            }
            session.scheduler.dispatch(trigger);
            if tap {
                // Taps run outside the scheduler queue.
                sleep_while_running(session.ctx.timing.tap_flash * 2);
            }
        }
    }

    if !wait_until_idle(&session.scheduler) {
        log::info!("interrupted, stopping animation");
    }
    session.scheduler.shutdown();
    Ok(())
}
