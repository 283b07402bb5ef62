//! Scripted playback of CSV animations, including the looping call routine.

use super::{Pacer, Playback, RoutineGuard};
use crate::registry::{Admission, RoutineKind};
use crate::script::AnimationScript;

/// Play `script` for an admitted request.
///
/// Each line is parsed right before it is written. A bad line aborts the
/// routine at that point. Call routines restart the script until
/// interrupted (normally by the call being ended).
pub(crate) fn play(pb: &Playback, admission: Admission, script: &AnimationScript) {
    let kind = admission.kind;
    let topology = pb.sink.topology();
    let mut guard = RoutineGuard::new(pb, kind);
    let mut pacer = Pacer::new(pb.timing.frame_interval);

    loop {
        let mut written = 0usize;
        for frame in script.frames(topology) {
            if pb.registry.should_interrupt(kind) {
                log::debug!("animation \"{}\" interrupted", script.name);
                return;
            }
            match frame {
                Ok(raw) => {
                    pb.sink.frame(&raw);
                    guard.touch_frame();
                    written += 1;
                    pacer.wait();
                }
                Err(e) => {
                    log::warn!("animation \"{}\" aborted: {e}", script.name);
                    return;
                }
            }
        }
        if kind != RoutineKind::Call || written == 0 || pb.registry.should_interrupt(kind) {
            return;
        }
    }
}
