//! Unified error type for the glyph-lib crate.
//!
//! [`GlyphError`] wraps module-specific errors (`DeviceError`, `ScriptError`)
//! and domain-specific error kinds (`Config`, `Topology`, `Trigger`).
//! `From` impls allow `?` to propagate across module boundaries.

use std::fmt;

use crate::device::DeviceError;
use crate::script::ScriptError;

/// Unified error type for glyph-lib operations.
#[derive(Debug)]
pub enum GlyphError {
    /// LED device error (open, attribute write).
    Device(DeviceError),
    /// Animation script error (lookup, malformed line).
    Script(ScriptError),
    /// Standard I/O error (catalog listing, config persistence).
    Io(std::io::Error),
    /// Configuration validation error.
    Config(String),
    /// Topology selection error.
    Topology(String),
    /// Malformed textual trigger.
    Trigger(String),
}

impl fmt::Display for GlyphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlyphError::Device(e) => write!(f, "{e}"),
            GlyphError::Script(e) => write!(f, "{e}"),
            GlyphError::Io(e) => write!(f, "I/O error: {e}"),
            GlyphError::Config(e) => write!(f, "Config error: {e}"),
            GlyphError::Topology(e) => write!(f, "Topology error: {e}"),
            GlyphError::Trigger(e) => write!(f, "Trigger error: {e}"),
        }
    }
}

impl std::error::Error for GlyphError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GlyphError::Device(e) => Some(e),
            GlyphError::Script(e) => Some(e),
            GlyphError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceError> for GlyphError {
    fn from(e: DeviceError) -> Self {
        GlyphError::Device(e)
    }
}

impl From<ScriptError> for GlyphError {
    fn from(e: ScriptError) -> Self {
        GlyphError::Script(e)
    }
}

impl From<std::io::Error> for GlyphError {
    fn from(e: std::io::Error) -> Self {
        GlyphError::Io(e)
    }
}

/// Crate-level Result alias using [`GlyphError`].
pub type Result<T> = std::result::Result<T, GlyphError>;
