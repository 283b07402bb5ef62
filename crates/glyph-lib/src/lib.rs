//! Glyph — animation scheduler and frame sink for multi-zone LED arrays.

pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod playback;
pub mod registry;
pub mod scheduler;
pub mod script;
pub mod sink;
pub mod topology;
pub mod trigger;

pub use error::GlyphError;
pub use scheduler::{Scheduler, SchedulerConfig};
