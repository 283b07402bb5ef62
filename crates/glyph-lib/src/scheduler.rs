//! Animation scheduler — admission on the caller's thread, playback on one
//! worker thread.
//!
//! Producers call the `play_*` methods. Admission runs immediately against the
//! [`StatusRegistry`] (blocking up to the admission timeout for `Wait`
//! requests), so at most one routine ever holds `AnimationActive`. Admitted
//! jobs go over a bounded channel to the worker, which plays them in order.
//! Music taps and the override skip the worker entirely.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::device::LedDevice;
use crate::playback::{self, Playback, Timing};
use crate::registry::{Admission, RoutineKind, StatusEvent, StatusRegistry, WaitPolicy};
use crate::script::{AnimationScript, Catalog};
use crate::sink::{Brightness, FrameSink};
use crate::topology::{LedTopology, MusicBand};
use crate::trigger::{OverrideAction, Trigger};

/// Capacity of the job channel.
const QUEUE_CAPACITY: usize = 4;

/// Everything the scheduler needs besides the device.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub topology: &'static LedTopology,
    pub brightness: Brightness,
    pub catalog: Catalog,
    pub timing: Timing,
}

enum Routine {
    Script(AnimationScript),
    Ladder(u32),
    EssentialRamp,
}

struct Job {
    admission: Admission,
    routine: Routine,
}

pub struct Scheduler {
    playback: Arc<Playback>,
    catalog: Catalog,
    tx: Option<SyncSender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Start the worker thread.
    pub fn start(device: Arc<dyn LedDevice>, config: SchedulerConfig) -> Self {
        let registry = Arc::new(StatusRegistry::new());
        let sink = Arc::new(FrameSink::new(
            device,
            config.topology,
            config.brightness,
            Arc::clone(&registry),
        ));
        let playback = Arc::new(Playback {
            sink,
            registry,
            timing: config.timing,
        });

        let (tx, rx) = mpsc::sync_channel(QUEUE_CAPACITY);
        let worker_pb = Arc::clone(&playback);
        let worker = thread::Builder::new()
            .name("glyph-playback".into())
            .spawn(move || run_worker(&worker_pb, rx));
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("failed to spawn playback worker: {e}");
                None
            }
        };

        Scheduler {
            playback,
            catalog: config.catalog,
            tx: Some(tx),
            worker,
        }
    }

    pub fn registry(&self) -> &StatusRegistry {
        &self.playback.registry
    }

    pub fn sink(&self) -> &FrameSink {
        &self.playback.sink
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn timeout(&self) -> Duration {
        self.playback.timing.admission_timeout
    }

    /// Admit and enqueue one job. Rejections are logged and dropped.
    fn submit(&self, kind: RoutineKind, policy: WaitPolicy, routine: Routine) -> bool {
        let admission = match self.playback.registry.admit(kind, policy, self.timeout()) {
            Ok(a) => a,
            Err(rejection) => {
                log::debug!("{kind} request dropped: {rejection}");
                return false;
            }
        };
        let Some(tx) = &self.tx else {
            self.abandon(admission);
            return false;
        };
        match tx.try_send(Job { admission, routine }) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) | Err(TrySendError::Disconnected(job)) => {
                log::warn!("{kind} request dropped: playback queue unavailable");
                self.abandon(job.admission);
                false
            }
        }
    }

    /// Undo an admission whose job never reached the worker.
    fn abandon(&self, admission: Admission) {
        if admission.carried_rungs > 0 {
            let ladder = self.playback.sink.topology().volume_ladder;
            let carried = admission.carried_rungs.min(ladder.len());
            self.playback.sink.zero_leds(ladder[..carried].iter().copied());
        }
        if self.playback.registry.release(admission.kind) {
            self.playback.sink.resync_essential_zone();
        }
    }

    fn load(&self, name: &str) -> Option<AnimationScript> {
        match self.catalog.load(name) {
            Ok(script) => Some(script),
            Err(e) => {
                log::warn!("{e}");
                None
            }
        }
    }

    // ── Inbound trigger API ──

    /// Play a named CSV animation once.
    pub fn play_csv(&self, name: &str, policy: WaitPolicy) {
        if let Some(script) = self.load(name) {
            self.submit(RoutineKind::Csv, policy, Routine::Script(script));
        }
    }

    /// Show the battery level on the charging ladder.
    pub fn play_charging(&self, percent: u32, policy: WaitPolicy) {
        self.submit(RoutineKind::Charging, policy, Routine::Ladder(percent));
    }

    /// Show the volume level, updating an in-flight volume ladder in place.
    pub fn play_volume(&self, percent: u32, policy: WaitPolicy) {
        self.submit(RoutineKind::Volume, policy, Routine::Ladder(percent));
    }

    /// Start the looping call animation. Any running routine yields within
    /// one frame.
    pub fn play_call(&self, name: &str) {
        let Some(script) = self.load(name) else {
            return;
        };
        self.playback
            .registry
            .notify(StatusEvent::CallEnabled(true));
        self.submit(RoutineKind::Call, WaitPolicy::Wait, Routine::Script(script));
    }

    pub fn stop_call(&self) {
        self.playback
            .registry
            .notify(StatusEvent::CallEnabled(false));
    }

    /// Ramp in and enable the essential-notification floor.
    pub fn play_essential(&self) {
        self.playback
            .registry
            .notify(StatusEvent::EssentialWanted(true));
        if !self.submit(RoutineKind::Essential, WaitPolicy::Wait, Routine::EssentialRamp) {
            playback::essential::enable(&self.playback);
        }
    }

    /// Disable the essential floor and darken its zone, now if nothing is
    /// playing or else when the running routine ends.
    pub fn stop_essential(&self) {
        let pb = &self.playback;
        pb.registry.notify(StatusEvent::EssentialWanted(false));
        pb.sink.resync_essential_zone();
    }

    /// Flash the band's zone on its own short-lived thread.
    pub fn play_music_tap(&self, band: MusicBand) {
        let pb = Arc::clone(&self.playback);
        let spawned = thread::Builder::new()
            .name("glyph-tap".into())
            .spawn(move || playback::tap::flash(&pb, band));
        if let Err(e) = spawned {
            log::warn!("music tap skipped: {e}");
        }
    }

    pub fn set_all_leds_override(&self, on: bool) {
        self.playback.sink.set_override(on);
    }

    /// Flip the override, returning the new state.
    pub fn toggle_all_leds(&self) -> bool {
        self.playback.sink.toggle_override()
    }

    /// Route a parsed trigger to the matching API call.
    pub fn dispatch(&self, trigger: Trigger) {
        log::debug!("trigger: {trigger}");
        match trigger {
            Trigger::Csv { name, policy } => self.play_csv(&name, policy),
            Trigger::Charging { percent, policy } => self.play_charging(percent, policy),
            Trigger::Volume { percent, policy } => self.play_volume(percent, policy),
            Trigger::Call { name } => self.play_call(&name),
            Trigger::StopCall => self.stop_call(),
            Trigger::Essential(true) => self.play_essential(),
            Trigger::Essential(false) => self.stop_essential(),
            Trigger::Tap(band) => self.play_music_tap(band),
            Trigger::Override(OverrideAction::On) => self.set_all_leds_override(true),
            Trigger::Override(OverrideAction::Off) => self.set_all_leds_override(false),
            Trigger::Override(OverrideAction::Toggle) => {
                self.toggle_all_leds();
            }
        }
    }

    /// Block until no routine is playing. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.playback.registry.wait_idle(timeout)
    }

    /// Interrupt the running routine, close the queue and join the worker.
    pub fn shutdown(&mut self) {
        if self.tx.is_none() && self.worker.is_none() {
            return;
        }
        self.playback.registry.notify(StatusEvent::ShuttingDown);
        self.tx = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("playback worker panicked");
            }
        }
        log::debug!("scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(pb: &Playback, rx: Receiver<Job>) {
    for job in rx {
        let kind = job.admission.kind;
        let result = panic::catch_unwind(AssertUnwindSafe(|| run_job(pb, job)));
        if result.is_err() {
            log::error!("{kind} routine panicked; LEDs cleaned up");
        }
    }
}

fn run_job(pb: &Playback, job: Job) {
    match job.routine {
        Routine::Script(script) => playback::csv::play(pb, job.admission, &script),
        Routine::Ladder(percent) => playback::ladder::play(pb, job.admission, percent),
        Routine::EssentialRamp => playback::essential::ramp(pb, job.admission),
    }
}
