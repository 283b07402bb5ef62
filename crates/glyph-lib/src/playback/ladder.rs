//! Ladder indicators for charging level and volume.
//!
//! Rungs light low→high with a stagger, hold, unlight high→low, then pause.
//! Hold and pause are sliced into rung steps so an interruption is noticed
//! within one step. A volume routine interrupted by a newer volume request
//! hands its lit rungs over instead of unlighting them.

use std::time::Duration;

use super::{LadderTiming, Playback, RoutineGuard, sleep_unless};
use crate::registry::{Admission, RoutineKind};
use crate::topology::MAX_BRIGHTNESS;

/// Number of lit rungs for `percent` on a ladder of `rungs`.
///
/// `floor(p/100 * (rungs-1)) + 1` for `p > 0`, else 0. Percentages above 100
/// count as 100.
pub fn lit_rungs(percent: u32, rungs: usize) -> usize {
    if percent == 0 || rungs == 0 {
        return 0;
    }
    let p = f64::from(percent.min(100));
    let lit = (p / 100.0 * (rungs - 1) as f64).floor() as usize + 1;
    lit.min(rungs)
}

struct Stopped;

struct Ladder<'a> {
    pb: &'a Playback,
    guard: RoutineGuard<'a>,
    kind: RoutineKind,
    leds: &'static [u32],
    lit: usize,
}

impl Ladder<'_> {
    fn interrupted(&self) -> bool {
        self.pb.registry.should_interrupt(self.kind)
    }

    fn stop(&mut self) -> Result<(), Stopped> {
        if self.kind == RoutineKind::Volume && self.pb.registry.try_volume_handoff(self.lit) {
            self.guard.hand_off();
        }
        Err(Stopped)
    }

    fn check(&mut self) -> Result<(), Stopped> {
        if self.interrupted() {
            return self.stop();
        }
        Ok(())
    }

    fn wait(&mut self, total: Duration, slice: Duration) -> Result<(), Stopped> {
        let pb = self.pb;
        let kind = self.kind;
        if sleep_unless(total, slice, || pb.registry.should_interrupt(kind)) {
            Ok(())
        } else {
            self.stop()
        }
    }

    fn light_next(&mut self, timing: &LadderTiming) -> Result<(), Stopped> {
        self.check()?;
        let led = self.leds[self.lit];
        self.pb.sink.single(led, f64::from(MAX_BRIGHTNESS));
        self.guard.touch_led(led);
        self.lit += 1;
        self.wait(timing.stagger_in, timing.step())
    }

    fn unlight_top(&mut self, timing: &LadderTiming) -> Result<(), Stopped> {
        self.check()?;
        self.lit -= 1;
        self.pb.sink.single(self.leds[self.lit], 0.0);
        self.wait(timing.stagger_out, timing.step())
    }

    fn run(&mut self, target: usize, timing: &LadderTiming) -> Result<(), Stopped> {
        while self.lit < target {
            self.light_next(timing)?;
        }
        // A carried-over ladder may already be above the new level.
        while self.lit > target {
            self.unlight_top(timing)?;
        }
        if self.lit > 0 {
            self.wait(timing.hold, timing.step())?;
        }
        while self.lit > 0 {
            self.unlight_top(timing)?;
        }
        self.wait(timing.pause, timing.step())
    }
}

/// Play a charging or volume ladder for an admitted request.
pub(crate) fn play(pb: &Playback, admission: Admission, percent: u32) {
    let topology = pb.sink.topology();
    let (leds, timing) = match admission.kind {
        RoutineKind::Volume => (topology.volume_ladder, pb.timing.volume),
        _ => (topology.charging_ladder, pb.timing.charging),
    };
    let carried = admission.carried_rungs.min(leds.len());
    let mut guard = RoutineGuard::new(pb, admission.kind);
    for &led in &leds[..carried] {
        guard.touch_led(led);
    }
    let mut ladder = Ladder {
        pb,
        guard,
        kind: admission.kind,
        leds,
        lit: carried,
    };
    let target = lit_rungs(percent, leds.len());
    log::debug!(
        "{} ladder: {percent}% → {target}/{} rungs (carried {carried})",
        admission.kind,
        leds.len()
    );
    if ladder.run(target, &timing).is_err() {
        log::debug!("{} ladder interrupted at {} rungs", admission.kind, ladder.lit);
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::playback;
    use super::*;
    use crate::registry::{StatusEvent, WaitPolicy};
    use crate::topology::{PHONE1, PHONE2};
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn admit(pb: &Playback, kind: RoutineKind) -> Admission {
        pb.registry
            .admit(kind, WaitPolicy::DropIfBusy, Duration::from_millis(10))
            .unwrap()
    }

    #[test]
    fn lit_rungs_formula() {
        assert_eq!(lit_rungs(100, 8), 8);
        assert_eq!(lit_rungs(62, 8), 5);
        assert_eq!(lit_rungs(11, 8), 1);
        assert_eq!(lit_rungs(1, 8), 1);
        assert_eq!(lit_rungs(0, 8), 0);
        assert_eq!(lit_rungs(250, 8), 8);
        assert_eq!(lit_rungs(50, 16), 8);
        assert_eq!(lit_rungs(50, 0), 0);
    }

    #[test]
    fn charging_lights_then_clears() {
        let (dev, pb) = playback(&PHONE1);
        let a = admit(&pb, RoutineKind::Charging);
        play(&pb, a, 62);

        let lit: Vec<u32> = dev
            .singles()
            .into_iter()
            .filter(|&(_, v)| v > 0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(lit, PHONE1.charging_ladder[..5].to_vec());
        assert!(dev.single_state().values().all(|&v| v == 0));
        assert!(!pb.registry.animation_active());
    }

    #[test]
    fn charging_zero_writes_nothing() {
        let (dev, pb) = playback(&PHONE1);
        let a = admit(&pb, RoutineKind::Charging);
        play(&pb, a, 0);
        assert!(dev.history().is_empty());
        assert!(!pb.registry.animation_active());
    }

    #[test]
    fn volume_uses_volume_ladder() {
        let (dev, pb) = playback(&PHONE2);
        let a = admit(&pb, RoutineKind::Volume);
        play(&pb, a, 100);
        let on = dev.singles().iter().filter(|&&(_, v)| v > 0).count();
        assert_eq!(on, PHONE2.volume_ladder.len());
        assert!(!pb.registry.snapshot().volume_active);
    }

    #[test]
    fn carried_rungs_only_write_delta() {
        let (dev, pb) = playback(&PHONE1);
        let a = Admission {
            kind: RoutineKind::Volume,
            carried_rungs: 3,
        };
        admit(&pb, RoutineKind::Volume);
        play(&pb, a, 100);
        let first_on: Vec<u32> = dev
            .singles()
            .into_iter()
            .filter(|&(_, v)| v > 0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(first_on, PHONE1.volume_ladder[3..].to_vec());
        // Carried rungs are still cleaned up.
        assert_eq!(dev.single_state()[&PHONE1.volume_ladder[0]], 0);
    }

    #[test]
    fn carried_above_target_unlights_down() {
        let (dev, pb) = playback(&PHONE1);
        admit(&pb, RoutineKind::Volume);
        let a = Admission {
            kind: RoutineKind::Volume,
            carried_rungs: 6,
        };
        play(&pb, a, 20);
        let singles = dev.singles();
        assert_eq!(singles[0], (PHONE1.volume_ladder[5], 0));
        assert_eq!(singles[1], (PHONE1.volume_ladder[4], 0));
        assert!(singles.iter().all(|&(_, v)| v == 0));
    }

    #[test]
    fn override_interrupts_without_cleanup() {
        let (dev, mut pb) = playback(&PHONE1);
        pb.timing.charging.hold = Duration::from_secs(2);
        let pb = Arc::new(pb);
        let a = admit(&pb, RoutineKind::Charging);
        let pb2 = Arc::clone(&pb);
        let t = thread::spawn(move || play(&pb2, a, 100));
        thread::sleep(Duration::from_millis(12));
        pb.registry.notify(StatusEvent::AllLedsOverride(true));
        t.join().unwrap();
        assert!(!pb.registry.animation_active());
        assert!(dev.singles().iter().all(|&(_, v)| v > 0));
    }

    #[test]
    fn call_enable_interrupts_and_zeroes() {
        let (dev, mut pb) = playback(&PHONE1);
        pb.timing.charging.hold = Duration::from_secs(2);
        let pb = Arc::new(pb);
        let a = admit(&pb, RoutineKind::Charging);
        let pb2 = Arc::clone(&pb);
        let start = Instant::now();
        let t = thread::spawn(move || play(&pb2, a, 100));
        thread::sleep(Duration::from_millis(12));
        pb.registry.notify(StatusEvent::CallEnabled(true));
        t.join().unwrap();
        assert!(start.elapsed() < Duration::from_millis(500));
        assert!(dev.single_state().values().all(|&v| v == 0));
    }
}
