//! Demoreel Render Engine
//!
//! Turns a validated timeline plus captured frames into an encoded video:
//! - **Remap:** translation between source, captured, and output time bases
//! - **Resolve:** per-output-frame base layer (source frame or transition)
//! - **Compose:** deterministic frame plans and CPU rasterisation of
//!   transitions, browser chrome, cursor, and click ripples
//! - **Encode:** ffmpeg raw-RGBA sink with one narration track
//! - **Render:** the parallel render driver
//!
//! The plan stage is pure: two runs over identical timelines produce
//! bit-identical frame plans.

pub mod chrome;
pub mod compose;
pub mod cursor;
pub mod ease;
pub mod encode;
pub mod remap;
pub mod render;
pub mod resolve;

pub use compose::{Compositor, CompositorOptions, FramePlan};
pub use encode::{AudioTrack, EncoderConfig, FfmpegEncoder};
pub use remap::{remap_events, source_time_ms, SlideWindow};
pub use render::{render_timeline, RenderOptions, RenderProgress};
pub use resolve::{FrameResolver, ResolvedFrame};
