//! Per-output-frame resolution.
//!
//! For each frame of the final video the resolver returns either a source
//! frame reference or a transition descriptor. It is pure over the frozen
//! manifest and marker list, so two runs over identical timelines produce
//! bit-identical frame plans, and the renderer can fan frames out across
//! workers freely.

use demoreel_timeline_model::manifest::{
    entry_first_expanded_frame, entry_last_expanded_frame, expanded_frame_count,
    file_at_expanded_frame, total_output_frames, ManifestEntry, TransitionKind, TransitionMarker,
};
use demoreel_timeline_model::time::ExpandedFrame;

/// The base layer of one output frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedFrame {
    /// A captured source frame.
    Source { file: String },

    /// A transition between two faces, `progress` in `[0, 1]`.
    Transition {
        before: String,
        after: String,
        progress: f64,
        kind: TransitionKind,
    },
}

/// Resolver over a frozen manifest and its transition markers.
pub struct FrameResolver<'a> {
    manifest: &'a [ManifestEntry],
    markers: &'a [TransitionMarker],
}

impl<'a> FrameResolver<'a> {
    pub fn new(manifest: &'a [ManifestEntry], markers: &'a [TransitionMarker]) -> Self {
        Self { manifest, markers }
    }

    /// Total frames of the final video.
    pub fn total_output_frames(&self) -> u64 {
        total_output_frames(self.manifest, self.markers)
    }

    /// Resolve output frame `f_out`.
    pub fn resolve(&self, f_out: u64) -> ResolvedFrame {
        let (resolved, _) = self.resolve_with_source(f_out);
        resolved
    }

    /// Resolve `f_out` and also report the source frame the overlays
    /// should sample event state at (for transitions, the outgoing frame).
    pub fn resolve_with_source(&self, f_out: u64) -> (ResolvedFrame, ExpandedFrame) {
        let mut offset = 0u64;

        for marker in self.markers {
            let anchor = entry_last_expanded_frame(self.manifest, marker.after_entry_index).0;
            let last_before = anchor + offset;

            if f_out <= last_before {
                break;
            }

            let window_end = last_before + marker.duration_frames;
            if f_out <= window_end {
                let progress = (f_out - last_before) as f64 / marker.duration_frames as f64;
                let before = marker
                    .before_file
                    .clone()
                    .or_else(|| {
                        file_at_expanded_frame(self.manifest, ExpandedFrame(anchor))
                            .map(str::to_string)
                    })
                    .unwrap_or_default();
                let after = marker
                    .after_file
                    .clone()
                    .or_else(|| self.first_file_after(marker.after_entry_index))
                    .unwrap_or_else(|| before.clone());
                return (
                    ResolvedFrame::Transition {
                        before,
                        after,
                        progress,
                        kind: marker.kind,
                    },
                    ExpandedFrame(anchor),
                );
            }

            offset += marker.duration_frames.saturating_sub(marker.consumed_frames);
        }

        let max_frame = expanded_frame_count(self.manifest).saturating_sub(1);
        let source = f_out.saturating_sub(offset).min(max_frame);
        let file = file_at_expanded_frame(self.manifest, ExpandedFrame(source))
            .unwrap_or_default()
            .to_string();
        (ResolvedFrame::Source { file }, ExpandedFrame(source))
    }

    fn first_file_after(&self, entry_index: usize) -> Option<String> {
        let next = entry_index + 1;
        if next >= self.manifest.len() {
            return None;
        }
        let first = entry_first_expanded_frame(self.manifest, next);
        file_at_expanded_frame(self.manifest, first).map(str::to_string)
    }
}
