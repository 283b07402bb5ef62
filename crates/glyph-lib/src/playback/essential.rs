//! Essential-notification overlay ramp.

use super::{Pacer, Playback, RoutineGuard};
use crate::registry::Admission;
use crate::sink::ESSENTIAL_FLOOR_RAW;

/// Ramp the essential zone from zero up to the floor, then enable the
/// overlay so the sink holds the zone there.
pub(crate) fn ramp(pb: &Playback, admission: Admission) {
    let topology = pb.sink.topology();
    let leds = topology.zones[topology.essential_zone].leds;
    let steps = pb.timing.essential_steps.max(1);
    let mut guard = RoutineGuard::new(pb, admission.kind);
    let mut pacer = Pacer::new(pb.timing.essential_step);

    for step in 1..=steps {
        if pb.registry.should_interrupt(admission.kind) || !pb.registry.essential_wanted() {
            break;
        }
        let raw = ESSENTIAL_FLOOR_RAW * f64::from(step) / f64::from(steps);
        for &led in leds {
            pb.sink.single(led, raw);
            guard.touch_led(led);
        }
        pacer.wait();
    }

    // The guard's cleanup below then lands on the floor instead of zero.
    enable(pb);
}

/// Enable the overlay without a ramp, unless it was withdrawn meanwhile.
pub(crate) fn enable(pb: &Playback) {
    pb.registry.enable_essential_overlay();
}
