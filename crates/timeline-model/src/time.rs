//! Time-base newtypes.
//!
//! The pipeline reasons about three distinct clocks:
//! - **Source time** — the scenario's own milliseconds, advanced by the
//!   capture interval and by explicit holds.
//! - **Output time** — source time shifted forward by inserted slides and
//!   transitions.
//! - **Expanded frames** — 0-based frame indices after expanding holds.
//!
//! Conversions between them are explicit functions; bare integers never
//! cross a component boundary.

use serde::{Deserialize, Serialize};

/// Milliseconds on the scenario source clock.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct SourceMs(pub i64);

/// Milliseconds on the final output clock.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct OutputMs(pub i64);

/// Absolute 0-based frame index in expanded-manifest space.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ExpandedFrame(pub u64);

/// Milliseconds corresponding to a frame index at `fps`, floored.
pub fn frame_to_ms(frame: u64, fps: u32) -> i64 {
    debug_assert!(fps > 0);
    ((frame as u128 * 1000) / fps as u128) as i64
}

/// Number of frames needed to cover at least `ms` milliseconds at `fps`.
pub fn ms_to_frames_ceil(ms: i64, fps: u32) -> u64 {
    debug_assert!(fps > 0);
    if ms <= 0 {
        return 0;
    }
    ((ms as u128 * fps as u128).div_ceil(1000)) as u64
}

/// Duration of one frame in milliseconds, floored.
pub fn frame_interval_ms(fps: u32) -> i64 {
    debug_assert!(fps > 0);
    (1000 / fps) as i64
}

impl ExpandedFrame {
    /// Source-clock milliseconds of this frame at `fps`.
    pub fn to_source_ms(self, fps: u32) -> SourceMs {
        SourceMs(frame_to_ms(self.0, fps))
    }
}
