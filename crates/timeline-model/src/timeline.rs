//! The versioned timeline container and its persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::manifest::{ManifestEntry, TransitionMarker};
use crate::validate::validate;

/// The timeline wire-format version this build reads and writes.
pub const TIMELINE_VERSION: u32 = 1;

/// Captured viewport dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    /// Viewport centre point.
    pub fn center(&self) -> (i32, i32) {
        ((self.width / 2) as i32, (self.height / 2) as i32)
    }
}

/// Recording metadata carried alongside the event sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// The test entry point that produced the recording.
    pub test_file: String,

    /// The scenario definition file.
    pub scenario_file: String,

    /// Recording start time (RFC 3339).
    pub recorded_at: String,

    /// Captured viewport.
    pub viewport: ViewportSize,

    /// Capture frame rate.
    pub fps: u32,

    /// The captured frame sequence.
    pub frame_manifest: Vec<ManifestEntry>,

    /// Transition directives, sorted by `after_entry_index`.
    #[serde(default)]
    pub transition_markers: Vec<TransitionMarker>,
}

/// A complete recorded timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    /// Wire-format version tag.
    pub version: u32,

    /// Recording metadata.
    pub metadata: Metadata,

    /// Ordered event sequence (non-decreasing timestamps).
    pub events: Vec<Event>,
}

impl Timeline {
    /// Create an empty timeline for the given recording metadata.
    pub fn new(metadata: Metadata) -> Self {
        Self {
            version: TIMELINE_VERSION,
            metadata,
            events: Vec::new(),
        }
    }

    /// Validate, then persist as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TimelineIoError> {
        let path = path.as_ref();
        validate(self).map_err(|e| TimelineIoError::Invalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let json = serde_json::to_string_pretty(self).map_err(|e| TimelineIoError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| TimelineIoError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load from JSON and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TimelineIoError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| TimelineIoError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let timeline: Timeline =
            serde_json::from_str(&json).map_err(|e| TimelineIoError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;
        validate(&timeline).map_err(|e| TimelineIoError::Invalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(timeline)
    }
}

/// Errors loading or saving a timeline file.
#[derive(Debug, thiserror::Error)]
pub enum TimelineIoError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid timeline {path}: {message}")]
    Invalid {
        path: std::path::PathBuf,
        message: String,
    },
}
