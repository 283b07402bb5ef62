//! Playback engines — scripted frames, ladders, the essential ramp and music
//! taps — plus the pacing and cleanup machinery they share.

pub mod csv;
pub mod essential;
pub mod ladder;
pub mod tap;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::registry::{RoutineKind, StatusRegistry};
use crate::sink::FrameSink;

/// Upper bound on how long a waiting request blocks its producer.
pub const ADMISSION_TIMEOUT: Duration = Duration::from_millis(2500);

/// Nominal scripted frame interval.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Stagger/hold/pause timings of a ladder indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LadderTiming {
    pub stagger_in: Duration,
    pub hold: Duration,
    pub stagger_out: Duration,
    pub pause: Duration,
}

impl LadderTiming {
    pub const CHARGING: LadderTiming = LadderTiming {
        stagger_in: Duration::from_millis(10),
        hold: Duration::from_millis(1000),
        stagger_out: Duration::from_millis(10),
        pause: Duration::from_millis(730),
    };

    pub const VOLUME: LadderTiming = LadderTiming {
        stagger_in: Duration::from_millis(10),
        hold: Duration::from_millis(1000),
        stagger_out: Duration::from_millis(10),
        pause: Duration::from_millis(200),
    };

    /// Slice length for hold and pause; one rung step.
    pub fn step(&self) -> Duration {
        self.stagger_in.max(Duration::from_millis(1))
    }
}

/// Every timing constant used by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub frame_interval: Duration,
    pub admission_timeout: Duration,
    pub charging: LadderTiming,
    pub volume: LadderTiming,
    pub essential_step: Duration,
    pub essential_steps: u32,
    pub tap_flash: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            frame_interval: FRAME_INTERVAL,
            admission_timeout: ADMISSION_TIMEOUT,
            charging: LadderTiming::CHARGING,
            volume: LadderTiming::VOLUME,
            essential_step: Duration::from_millis(16),
            essential_steps: 8,
            tap_flash: Duration::from_millis(90),
        }
    }
}

/// State shared by the worker thread and tap threads.
pub(crate) struct Playback {
    pub sink: Arc<FrameSink>,
    pub registry: Arc<StatusRegistry>,
    pub timing: Timing,
}

/// Deadline-based pacer: each `wait` sleeps until the next tick of a fixed
/// cadence, absorbing the time spent writing the frame.
pub(crate) struct Pacer {
    interval: Duration,
    next: Instant,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Pacer {
            interval,
            next: Instant::now(),
        }
    }

    pub fn wait(&mut self) {
        self.next += self.interval;
        let now = Instant::now();
        if self.next > now {
            std::thread::sleep(self.next - now);
        } else {
            // Fell behind; restart the cadence rather than bursting.
            self.next = now;
        }
    }
}

/// Sleep for `total` in slices of at most `slice`, checking `stop` before
/// each slice. Returns `false` as soon as `stop` reports true.
pub(crate) fn sleep_unless(total: Duration, slice: Duration, stop: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if stop() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(slice.min(deadline - now));
    }
}

/// Termination path for an admitted routine.
///
/// On drop (normal end, interruption, script error or panic) zeroes what the
/// routine touched unless the override is active, then releases the
/// routine's flags and performs any essential-zone write deferred to it. A
/// volume routine that handed its rungs over skips all of this.
pub(crate) struct RoutineGuard<'a> {
    pb: &'a Playback,
    kind: RoutineKind,
    frame_touched: bool,
    leds: BTreeSet<u32>,
    handed_off: bool,
}

impl<'a> RoutineGuard<'a> {
    pub fn new(pb: &'a Playback, kind: RoutineKind) -> Self {
        log::debug!("{kind} routine started");
        RoutineGuard {
            pb,
            kind,
            frame_touched: false,
            leds: BTreeSet::new(),
            handed_off: false,
        }
    }

    pub fn touch_frame(&mut self) {
        self.frame_touched = true;
    }

    pub fn touch_led(&mut self, led: u32) {
        self.leds.insert(led);
    }

    pub fn hand_off(&mut self) {
        self.handed_off = true;
    }
}

impl Drop for RoutineGuard<'_> {
    fn drop(&mut self) {
        if self.handed_off {
            log::debug!("{} routine handed off", self.kind);
            return;
        }
        if !self.pb.registry.override_active() {
            if self.frame_touched {
                self.pb.sink.zero_frame();
            }
            self.pb.sink.zero_leds(self.leds.iter().copied());
        }
        self.pb.sink.flush_essential_resync();
        if self.pb.registry.release(self.kind) {
            self.pb.sink.resync_essential_zone();
        }
        log::debug!("{} routine finished", self.kind);
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::playback;
    use super::*;
    use crate::registry::{StatusEvent, WaitPolicy};
    use crate::topology::PHONE1;
    use std::cell::Cell;

    #[test]
    fn sleep_unless_completes() {
        let start = Instant::now();
        assert!(sleep_unless(
            Duration::from_millis(20),
            Duration::from_millis(5),
            || false
        ));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn sleep_unless_stops_early() {
        let calls = Cell::new(0);
        let start = Instant::now();
        let done = sleep_unless(Duration::from_secs(5), Duration::from_millis(5), || {
            calls.set(calls.get() + 1);
            calls.get() > 2
        });
        assert!(!done);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn pacer_keeps_cadence() {
        let mut pacer = Pacer::new(Duration::from_millis(10));
        let start = Instant::now();
        for _ in 0..5 {
            std::thread::sleep(Duration::from_millis(3));
            pacer.wait();
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(150), "{elapsed:?}");
    }

    #[test]
    fn guard_zeroes_and_releases() {
        let (dev, pb) = playback(&PHONE1);
        pb.registry
            .admit(RoutineKind::Charging, WaitPolicy::DropIfBusy, pb.timing.admission_timeout)
            .unwrap();
        {
            let mut guard = RoutineGuard::new(&pb, RoutineKind::Charging);
            pb.sink.single(16, 4095.0);
            guard.touch_led(16);
            guard.touch_frame();
        }
        assert_eq!(dev.single_state()[&16], 0);
        assert_eq!(dev.last_frame(), Some(vec![0; 5]));
        assert!(!pb.registry.animation_active());
    }

    #[test]
    fn guard_skips_hardware_under_override() {
        let (dev, pb) = playback(&PHONE1);
        pb.registry
            .admit(RoutineKind::Csv, WaitPolicy::DropIfBusy, pb.timing.admission_timeout)
            .unwrap();
        {
            let mut guard = RoutineGuard::new(&pb, RoutineKind::Csv);
            guard.touch_frame();
            pb.registry.notify(StatusEvent::AllLedsOverride(true));
        }
        assert!(dev.history().is_empty());
        assert!(!pb.registry.animation_active());
    }

    #[test]
    fn guard_runs_on_panic() {
        let (dev, pb) = playback(&PHONE1);
        pb.registry
            .admit(RoutineKind::Csv, WaitPolicy::DropIfBusy, pb.timing.admission_timeout)
            .unwrap();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut guard = RoutineGuard::new(&pb, RoutineKind::Csv);
            guard.touch_frame();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(dev.last_frame(), Some(vec![0; 5]));
        assert!(!pb.registry.animation_active());
    }
}
