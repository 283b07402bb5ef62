//! Shared status registry — the coordination surface between producers, the
//! playback worker and the frame sink.
//!
//! All flags live in one mutex-guarded struct. Compound transitions
//! (admission, release, volume hand-off) happen under the lock, and every
//! change wakes all condvar waiters so blocked admissions re-evaluate.

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Which routine a request or admission belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineKind {
    Csv,
    Charging,
    Volume,
    Call,
    Essential,
    MusicTap,
}

impl fmt::Display for RoutineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoutineKind::Csv => "csv",
            RoutineKind::Charging => "charging",
            RoutineKind::Volume => "volume",
            RoutineKind::Call => "call",
            RoutineKind::Essential => "essential",
            RoutineKind::MusicTap => "music-tap",
        };
        f.write_str(s)
    }
}

/// What a request does when another routine is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPolicy {
    /// Block (bounded) until the running routine finishes.
    Wait,
    /// Give up immediately.
    #[default]
    DropIfBusy,
}

/// Why a request was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    OverrideActive,
    CallActive,
    /// A call routine is already ringing.
    AlreadyRinging,
    /// A call request arrived after the call was ended.
    CallEnded,
    Busy,
    Timeout,
    /// A newer volume request took over the hand-off slot.
    Superseded,
    ShuttingDown,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rejection::OverrideActive => "all-LEDs override is active",
            Rejection::CallActive => "a call animation is playing",
            Rejection::AlreadyRinging => "call animation already ringing",
            Rejection::CallEnded => "call already ended",
            Rejection::Busy => "another animation is playing",
            Rejection::Timeout => "timed out waiting for the running animation",
            Rejection::Superseded => "superseded by a newer volume request",
            Rejection::ShuttingDown => "scheduler is shutting down",
        };
        f.write_str(s)
    }
}

/// A granted admission. The holder owns `AnimationActive` (and the kind's
/// own flag) until it calls [`StatusRegistry::release`] or hands off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub kind: RoutineKind,
    /// Volume rungs left lit by the previous volume routine.
    pub carried_rungs: usize,
}

/// Outcome of [`StatusRegistry::admit`].
pub type Decision = Result<Admission, Rejection>;

/// Producer-side flag changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    AllLedsOverride(bool),
    CallEnabled(bool),
    EssentialOverlay(bool),
    /// Request or withdraw the essential overlay. Withdrawing also turns
    /// the overlay off.
    EssentialWanted(bool),
    ShuttingDown,
}

/// Point-in-time copy of every flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub all_leds_override: bool,
    pub animation_active: bool,
    pub call_active: bool,
    pub call_enabled: bool,
    pub essential_overlay: bool,
    pub volume_active: bool,
    pub volume_update_pending: bool,
    pub volume_last_index: usize,
    pub shutting_down: bool,
}

#[derive(Debug, Default)]
struct State {
    flags: StatusSnapshot,
    next_ticket: u64,
    /// Ticket of the volume request waiting for a hand-off.
    pending_ticket: Option<u64>,
    /// Ticket the in-flight volume routine handed its rungs to.
    handoff_to: Option<u64>,
    essential_wanted: bool,
    /// The essential zone must be rewritten once the running routine ends.
    essential_resync: bool,
}

#[derive(Debug, Default)]
pub struct StatusRegistry {
    state: Mutex<State>,
    changed: Condvar,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.lock().flags
    }

    pub fn override_active(&self) -> bool {
        self.lock().flags.all_leds_override
    }

    pub fn animation_active(&self) -> bool {
        self.lock().flags.animation_active
    }

    pub fn call_enabled(&self) -> bool {
        self.lock().flags.call_enabled
    }

    pub fn essential_overlay(&self) -> bool {
        self.lock().flags.essential_overlay
    }

    pub fn essential_wanted(&self) -> bool {
        self.lock().essential_wanted
    }

    /// Turn the overlay on if it is still wanted. Returns the new overlay
    /// state.
    pub fn enable_essential_overlay(&self) -> bool {
        let mut state = self.lock();
        if state.essential_wanted {
            state.flags.essential_overlay = true;
        }
        let on = state.flags.essential_overlay;
        drop(state);
        self.changed.notify_all();
        on
    }

    /// Leave the essential zone to the running routine's cleanup. Returns
    /// `false` when nothing is playing and the caller must write it now.
    pub fn defer_essential_resync(&self) -> bool {
        let mut state = self.lock();
        if state.flags.animation_active {
            state.essential_resync = true;
        }
        state.flags.animation_active
    }

    /// Take a deferred essential-zone write, if one is pending.
    pub fn take_essential_resync(&self) -> bool {
        std::mem::take(&mut self.lock().essential_resync)
    }

    /// Apply a producer-side flag change and wake all waiters.
    pub fn notify(&self, event: StatusEvent) {
        let mut state = self.lock();
        match event {
            StatusEvent::AllLedsOverride(on) => state.flags.all_leds_override = on,
            StatusEvent::CallEnabled(on) => state.flags.call_enabled = on,
            StatusEvent::EssentialOverlay(on) => state.flags.essential_overlay = on,
            StatusEvent::EssentialWanted(on) => {
                state.essential_wanted = on;
                if !on {
                    state.flags.essential_overlay = false;
                }
            }
            StatusEvent::ShuttingDown => state.flags.shutting_down = true,
        }
        log::debug!("status: {event:?}");
        drop(state);
        self.changed.notify_all();
    }

    /// Flip the override flag, returning the new value.
    pub fn toggle_override(&self) -> bool {
        let mut state = self.lock();
        state.flags.all_leds_override = !state.flags.all_leds_override;
        let on = state.flags.all_leds_override;
        drop(state);
        self.changed.notify_all();
        on
    }

    /// Run the admission state machine for one request.
    ///
    /// Waiting requests block on the condvar for at most `timeout` in total
    /// and re-run every check after each wake. A volume request arriving
    /// while a volume routine plays takes a hand-off ticket; only the newest
    /// ticket can receive the in-flight routine's rungs.
    pub fn admit(&self, kind: RoutineKind, policy: WaitPolicy, timeout: Duration) -> Decision {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        let mut ticket: Option<u64> = None;

        let decision = loop {
            if let Some(rejection) = precheck(&state.flags, kind) {
                break Err(rejection);
            }

            if let Some(t) = ticket {
                if state.handoff_to == Some(t) {
                    state.handoff_to = None;
                    break Ok(Admission {
                        kind,
                        carried_rungs: state.flags.volume_last_index,
                    });
                }
                if state.pending_ticket != Some(t) {
                    break Err(Rejection::Superseded);
                }
            }

            if !state.flags.animation_active {
                if ticket.is_some() {
                    // Routine ended without handing over; start fresh.
                    state.pending_ticket = None;
                    state.flags.volume_update_pending = false;
                }
                state.flags.animation_active = true;
                match kind {
                    RoutineKind::Call => state.flags.call_active = true,
                    RoutineKind::Volume => {
                        state.flags.volume_active = true;
                        state.flags.volume_last_index = 0;
                    }
                    _ => {}
                }
                break Ok(Admission {
                    kind,
                    carried_rungs: 0,
                });
            }

            if ticket.is_none() {
                if kind == RoutineKind::Volume && state.flags.volume_active {
                    let t = state.next_ticket;
                    state.next_ticket += 1;
                    state.pending_ticket = Some(t);
                    state.flags.volume_update_pending = true;
                    ticket = Some(t);
                    // Wake any older ticket holder so it sees it was superseded.
                    self.changed.notify_all();
                } else if policy == WaitPolicy::DropIfBusy {
                    break Err(Rejection::Busy);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break Err(Rejection::Timeout);
            }
            state = match self.changed.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(e) => e.into_inner().0,
            };
        };

        if decision.is_err() && ticket.is_some() && state.pending_ticket == ticket {
            state.pending_ticket = None;
            state.flags.volume_update_pending = false;
        }
        drop(state);
        match &decision {
            Ok(a) => log::debug!("admitted {kind} (carried rungs: {})", a.carried_rungs),
            Err(r) => log::debug!("rejected {kind}: {r}"),
        }
        decision
    }

    /// Clear the flags held by a finished routine and wake waiters.
    ///
    /// Returns `true` if an essential-zone rewrite was deferred to this
    /// routine's end; the caller then owns that write.
    pub fn release(&self, kind: RoutineKind) -> bool {
        let mut state = self.lock();
        state.flags.animation_active = false;
        let resync = std::mem::take(&mut state.essential_resync);
        match kind {
            RoutineKind::Call => state.flags.call_active = false,
            RoutineKind::Volume => {
                state.flags.volume_active = false;
                state.flags.volume_last_index = 0;
            }
            _ => {}
        }
        drop(state);
        log::debug!("released {kind}");
        self.changed.notify_all();
        resync
    }

    /// Hand the in-flight volume routine's `lit` rungs to the newest waiting
    /// volume request. On success the flags stay held for the receiver and
    /// the caller must neither release nor unlight.
    pub fn try_volume_handoff(&self, lit: usize) -> bool {
        let mut state = self.lock();
        if state.flags.all_leds_override || state.flags.shutting_down {
            return false;
        }
        let Some(t) = state.pending_ticket.take() else {
            return false;
        };
        state.handoff_to = Some(t);
        state.flags.volume_update_pending = false;
        state.flags.volume_last_index = lit;
        drop(state);
        log::debug!("volume hand-off with {lit} rungs lit");
        self.changed.notify_all();
        true
    }

    /// Whether a routine of `kind` must stop at its next check.
    pub fn should_interrupt(&self, kind: RoutineKind) -> bool {
        let f = self.lock().flags;
        f.all_leds_override
            || f.shutting_down
            || (kind != RoutineKind::Call && f.call_enabled)
            || (kind == RoutineKind::Call && !f.call_enabled)
            || (kind == RoutineKind::Volume && f.volume_update_pending)
    }

    /// Block until no routine holds `AnimationActive`. Returns `false` on
    /// timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let result = self
            .changed
            .wait_timeout_while(state, timeout, |s| s.flags.animation_active);
        match result {
            Ok((_, t)) => !t.timed_out(),
            Err(e) => !e.into_inner().1.timed_out(),
        }
    }
}

/// Rejections that do not depend on waiting.
fn precheck(flags: &StatusSnapshot, kind: RoutineKind) -> Option<Rejection> {
    if flags.shutting_down {
        return Some(Rejection::ShuttingDown);
    }
    if flags.all_leds_override {
        return Some(Rejection::OverrideActive);
    }
    if kind == RoutineKind::Call {
        if flags.call_active {
            return Some(Rejection::AlreadyRinging);
        }
        if !flags.call_enabled {
            return Some(Rejection::CallEnded);
        }
    } else if flags.call_active {
        return Some(Rejection::CallActive);
    }
    None
}
