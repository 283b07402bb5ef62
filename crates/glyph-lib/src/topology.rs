//! LED topologies — zones, frame layouts and ladders per hardware variant.
//!
//! Each topology describes the addressable zones of one device variant in
//! frame order, the frame layouts a script line may use, and which LEDs the
//! procedural animations drive. Unknown models get `None` from
//! [`detect_topology`]; callers must then ask for an explicit topology.

use serde::Serialize;

/// Device max-brightness constant shared by every variant.
pub const MAX_BRIGHTNESS: u32 = 4095;

/// Field picks for a 5-field line on an 11-zone device.
const LEGACY5_TO_11: [usize; 11] = [0, 0, 1, 2, 2, 2, 2, 2, 2, 3, 4];

/// Field picks for a 33-field line on an 11-zone device.
const EXTENDED33_TO_11: [usize; 11] = [0, 1, 2, 3, 19, 20, 21, 22, 23, 25, 24];

/// A supported script line layout.
///
/// Resolved from the topology once; a line's field count selects the layout,
/// which then maps fields onto zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameLayout {
    /// One field per zone, in zone order.
    Native(usize),
    /// Five-zone scripts played on an eleven-zone device.
    Legacy5,
    /// Per-segment scripts (33 fields) played on an eleven-zone device.
    Extended33,
}

impl FrameLayout {
    /// Number of fields a line must have to use this layout.
    pub fn field_count(&self) -> usize {
        match self {
            FrameLayout::Native(n) => *n,
            FrameLayout::Legacy5 => 5,
            FrameLayout::Extended33 => 33,
        }
    }

    /// Map a line's fields onto zones. `fields.len()` must equal
    /// [`field_count`](Self::field_count).
    pub fn map_fields(&self, fields: &[f64]) -> Vec<f64> {
        match self {
            FrameLayout::Native(_) => fields.to_vec(),
            FrameLayout::Legacy5 => LEGACY5_TO_11.iter().map(|&i| fields[i]).collect(),
            FrameLayout::Extended33 => EXTENDED33_TO_11.iter().map(|&i| fields[i]).collect(),
        }
    }
}

/// A named group of LEDs written as one frame field.
#[derive(Debug, Serialize)]
pub struct Zone {
    pub slug: &'static str,
    /// Hardware indices for single-LED writes.
    pub leds: &'static [u32],
}

/// Frequency band of a detected music beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MusicBand {
    Low,
    MidLow,
    Mid,
    MidHigh,
    High,
}

impl MusicBand {
    pub const ALL: [MusicBand; 5] = [
        MusicBand::Low,
        MusicBand::MidLow,
        MusicBand::Mid,
        MusicBand::MidHigh,
        MusicBand::High,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for MusicBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MusicBand::Low => "low",
            MusicBand::MidLow => "mid_low",
            MusicBand::Mid => "mid",
            MusicBand::MidHigh => "mid_high",
            MusicBand::High => "high",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for MusicBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "low" => Ok(MusicBand::Low),
            "mid_low" => Ok(MusicBand::MidLow),
            "mid" => Ok(MusicBand::Mid),
            "mid_high" => Ok(MusicBand::MidHigh),
            "high" => Ok(MusicBand::High),
            other => Err(format!("unknown music band \"{other}\"")),
        }
    }
}

/// Static hardware description for one device variant.
#[derive(Debug, Serialize)]
pub struct LedTopology {
    pub name: &'static str,
    /// Substrings of the device model string that select this topology.
    pub model_aliases: &'static [&'static str],
    /// Zones in frame order.
    pub zones: &'static [Zone],
    pub layouts: &'static [FrameLayout],
    /// Single-LED indices of the charging ladder, lowest rung first.
    pub charging_ladder: &'static [u32],
    /// Single-LED indices of the volume ladder, lowest rung first.
    pub volume_ladder: &'static [u32],
    /// Zone held at the essential floor while the overlay is active.
    pub essential_zone: usize,
    /// Zone flashed per music band, indexed by [`MusicBand`].
    pub music_zones: [usize; 5],
}

impl LedTopology {
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Layout for a line with `field_count` fields, if supported.
    pub fn layout_for(&self, field_count: usize) -> Option<FrameLayout> {
        self.layouts
            .iter()
            .copied()
            .find(|l| l.field_count() == field_count)
    }

    /// Field counts accepted by this topology (for error messages).
    pub fn supported_field_counts(&self) -> Vec<usize> {
        self.layouts.iter().map(FrameLayout::field_count).collect()
    }

    pub fn zone_index(&self, slug: &str) -> Option<usize> {
        self.zones.iter().position(|z| z.slug == slug)
    }

    /// Zone owning the given hardware LED, if any.
    pub fn zone_of_led(&self, led: u32) -> Option<usize> {
        self.zones.iter().position(|z| z.leds.contains(&led))
    }

    pub fn music_zone(&self, band: MusicBand) -> usize {
        self.music_zones[band.index()]
    }
}

// ── Phone (1) ──

static PHONE1_ZONES: [Zone; 5] = [
    Zone {
        slug: "camera",
        leds: &[0, 1, 2, 3],
    },
    Zone {
        slug: "center_ring",
        leds: &[8, 9, 10, 11, 12, 13, 14, 15, 16],
    },
    Zone {
        slug: "exclamation_bar",
        leds: &[17, 18, 19, 20, 21, 22, 23, 24],
    },
    Zone {
        slug: "exclamation_dot",
        leds: &[25],
    },
    Zone {
        slug: "slant",
        leds: &[4, 5, 6, 7],
    },
];

pub static PHONE1: LedTopology = LedTopology {
    name: "phone1",
    model_aliases: &["Phone (1)", "Spacewar"],
    zones: &PHONE1_ZONES,
    layouts: &[FrameLayout::Native(5)],
    // Center ring, clockwise from the bottom.
    charging_ladder: &[16, 13, 11, 9, 12, 10, 14, 15],
    volume_ladder: &[24, 23, 22, 21, 20, 19, 18, 17],
    essential_zone: 3,
    music_zones: [1, 2, 0, 4, 3],
};

// ── Phone (2) ──

static PHONE2_ZONES: [Zone; 11] = [
    Zone {
        slug: "camera_top",
        leds: &[0],
    },
    Zone {
        slug: "camera_bottom",
        leds: &[1],
    },
    Zone {
        slug: "diagonal",
        leds: &[2],
    },
    Zone {
        slug: "c1",
        leds: &[3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18],
    },
    Zone {
        slug: "c2",
        leds: &[19],
    },
    Zone {
        slug: "c3",
        leds: &[20],
    },
    Zone {
        slug: "c4",
        leds: &[21],
    },
    Zone {
        slug: "c5",
        leds: &[22],
    },
    Zone {
        slug: "c6",
        leds: &[23],
    },
    Zone {
        slug: "line",
        leds: &[25, 26, 27, 28, 29, 30, 31, 32],
    },
    Zone {
        slug: "dot",
        leds: &[24],
    },
];

pub static PHONE2: LedTopology = LedTopology {
    name: "phone2",
    model_aliases: &["Phone (2)", "Pong"],
    zones: &PHONE2_ZONES,
    layouts: &[
        FrameLayout::Native(11),
        FrameLayout::Legacy5,
        FrameLayout::Extended33,
    ],
    // Vertical line, bottom LED first.
    charging_ladder: &[32, 31, 30, 29, 28, 27, 26, 25],
    volume_ladder: &[3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18],
    essential_zone: 10,
    music_zones: [3, 2, 0, 9, 10],
};

static ALL_TOPOLOGIES: [&LedTopology; 2] = [&PHONE1, &PHONE2];

/// Detect the topology from a device model string.
pub fn detect_topology(model: &str) -> Option<&'static LedTopology> {
    ALL_TOPOLOGIES
        .iter()
        .copied()
        .find(|t| t.model_aliases.iter().any(|a| model.contains(a)))
}

/// Look up a topology by its config name (case-insensitive).
pub fn by_name(name: &str) -> Option<&'static LedTopology> {
    ALL_TOPOLOGIES
        .iter()
        .copied()
        .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
}
