//! Music beat taps.

use std::thread;

use super::Playback;
use crate::topology::{MAX_BRIGHTNESS, MusicBand};

/// Flash the band's zone at full brightness, then return it to zero.
///
/// Taps bypass admission: they may overlap a running routine and never touch
/// the registry. The sink drops both writes while the override is active and
/// keeps the essential floor.
pub(crate) fn flash(pb: &Playback, band: MusicBand) {
    let zone = pb.sink.topology().music_zone(band);
    pb.sink.zone(zone, f64::from(MAX_BRIGHTNESS));
    thread::sleep(pb.timing.tap_flash);
    pb.sink.zone(zone, 0.0);
}

#[cfg(test)]
mod tests {
    use super::super::testutil::playback;
    use super::*;
    use crate::registry::StatusEvent;
    use crate::topology::PHONE1;

    #[test]
    fn flash_lights_then_clears_band_zone() {
        let (dev, pb) = playback(&PHONE1);
        flash(&pb, MusicBand::MidLow);
        let bar = PHONE1.zones[PHONE1.music_zone(MusicBand::MidLow)].leds;
        let singles = dev.singles();
        assert_eq!(singles.len(), bar.len() * 2);
        assert!(singles[..bar.len()].iter().all(|&(_, v)| v == 4095));
        assert!(dev.single_state().values().all(|&v| v == 0));
        assert!(!pb.registry.animation_active());
    }

    #[test]
    fn flash_on_essential_zone_returns_to_floor() {
        let (dev, pb) = playback(&PHONE1);
        pb.registry.notify(StatusEvent::EssentialOverlay(true));
        flash(&pb, MusicBand::High);
        assert_eq!(dev.singles(), vec![(25, 4095), (25, 2048)]);
    }

    #[test]
    fn flash_is_silent_under_override() {
        let (dev, pb) = playback(&PHONE1);
        pb.registry.notify(StatusEvent::AllLedsOverride(true));
        flash(&pb, MusicBand::Low);
        assert!(dev.history().is_empty());
    }
}
