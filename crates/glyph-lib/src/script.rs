//! Animation scripts and the on-disk script catalog.
//!
//! A script is plain text with one frame per line and comma-separated decimal
//! brightness values. Scripts are kept as raw lines; each line is parsed only
//! when it is about to be played, so a malformed line aborts playback at that
//! point rather than at load time.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::topology::LedTopology;

// ── Error type ──

#[derive(Debug)]
pub enum ScriptError {
    /// No script with this name in any catalog section.
    NotFound(String),
    /// Name contains a path separator or is empty.
    InvalidName(String),
    /// Reading the script file failed ("path: details").
    Io(String),
    /// A field is not a finite decimal number.
    BadField { line: usize, field: String },
    /// The line's field count matches no layout of the topology.
    UnsupportedLayout {
        line: usize,
        fields: usize,
        supported: Vec<usize>,
    },
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::NotFound(name) => write!(f, "Animation \"{name}\" not found"),
            ScriptError::InvalidName(name) => write!(f, "Invalid animation name \"{name}\""),
            ScriptError::Io(e) => write!(f, "Animation read failed: {e}"),
            ScriptError::BadField { line, field } => {
                write!(f, "line {line}: \"{field}\" is not a brightness value")
            }
            ScriptError::UnsupportedLayout {
                line,
                fields,
                supported,
            } => write!(
                f,
                "line {line}: {fields} fields does not match any layout (expected one of {supported:?})"
            ),
        }
    }
}

impl std::error::Error for ScriptError {}

// ── Scripts ──

/// A named animation, stored as raw lines.
#[derive(Debug, Clone)]
pub struct AnimationScript {
    pub name: String,
    lines: Vec<String>,
}

impl AnimationScript {
    pub fn from_text(name: &str, text: &str) -> Self {
        AnimationScript {
            name: name.to_string(),
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    /// Number of raw lines, blank ones included.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Lazily parsed frames in zone order for `topology`.
    ///
    /// Blank lines are skipped. The iterator yields an error for the first
    /// bad line; callers stop there.
    pub fn frames<'a>(
        &'a self,
        topology: &'a LedTopology,
    ) -> impl Iterator<Item = Result<Vec<f64>, ScriptError>> + 'a {
        self.lines
            .iter()
            .enumerate()
            .filter_map(move |(i, line)| parse_line(line, i + 1, topology).transpose())
    }
}

/// Parse one script line into zone-ordered raw values.
///
/// Returns `Ok(None)` for blank lines. A single trailing comma is tolerated.
pub fn parse_line(
    line: &str,
    line_no: usize,
    topology: &LedTopology,
) -> Result<Option<Vec<f64>>, ScriptError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let trimmed = trimmed.strip_suffix(',').unwrap_or(trimmed);

    let mut fields = Vec::new();
    for raw in trimmed.split(',') {
        let raw = raw.trim();
        let value: f64 = raw.parse().map_err(|_| ScriptError::BadField {
            line: line_no,
            field: raw.to_string(),
        })?;
        if !value.is_finite() {
            return Err(ScriptError::BadField {
                line: line_no,
                field: raw.to_string(),
            });
        }
        fields.push(value);
    }

    let layout = topology
        .layout_for(fields.len())
        .ok_or_else(|| ScriptError::UnsupportedLayout {
            line: line_no,
            fields: fields.len(),
            supported: topology.supported_field_counts(),
        })?;
    Ok(Some(layout.map_fields(&fields)))
}

// ── Catalog ──

/// Catalog section a script lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Call,
    Notification,
    Other,
}

impl Section {
    /// Lookup order for [`Catalog::load`].
    pub const SEARCH_ORDER: [Section; 3] = [Section::Call, Section::Notification, Section::Other];

    fn subdir(self) -> Option<&'static str> {
        match self {
            Section::Call => Some("call"),
            Section::Notification => Some("notification"),
            Section::Other => None,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Section::Call => "call",
            Section::Notification => "notification",
            Section::Other => "other",
        };
        f.write_str(s)
    }
}

const SCRIPT_EXT: &str = "csv";

/// Directory of animation scripts:
///
/// ```text
/// <root>/call/*.csv
/// <root>/notification/*.csv
/// <root>/*.csv
/// ```
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
}

impl Catalog {
    /// A catalog rooted at `root`. Missing directories list as empty.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Catalog { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn section_dir(&self, section: Section) -> PathBuf {
        match section.subdir() {
            Some(sub) => self.root.join(sub),
            None => self.root.clone(),
        }
    }

    /// Sorted script names (without extension) in one section.
    pub fn list(&self, section: Section) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.section_dir(section)) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|x| x == SCRIPT_EXT))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        names
    }

    /// Find a script by name, searching call, notification, then the root.
    pub fn load(&self, name: &str) -> Result<AnimationScript, ScriptError> {
        validate_name(name)?;
        let file = format!("{name}.{SCRIPT_EXT}");
        for section in Section::SEARCH_ORDER {
            let path = self.section_dir(section).join(&file);
            if path.is_file() {
                let text = fs::read_to_string(&path)
                    .map_err(|e| ScriptError::Io(format!("{}: {e}", path.display())))?;
                log::debug!("loaded animation \"{name}\" from {section} section");
                return Ok(AnimationScript::from_text(name, &text));
            }
        }
        Err(ScriptError::NotFound(name.to_string()))
    }
}

fn validate_name(name: &str) -> Result<(), ScriptError> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(ScriptError::InvalidName(name.to_string()));
    }
    Ok(())
}
