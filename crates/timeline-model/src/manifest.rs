//! Frame manifest and transition markers.
//!
//! The manifest is the captured frame sequence. Long dwells are stored as
//! [`ManifestEntry::Hold`] so traversals stay O(entries) rather than
//! O(expanded frames); markers reference manifest positions by index, which
//! stays valid through the append-only capture lifecycle and serialises
//! cleanly.

use serde::{Deserialize, Serialize};

use crate::time::ExpandedFrame;

/// One unit of the captured frame sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ManifestEntry {
    /// One virtual frame backed by one image file.
    Frame { file: String },

    /// `count` consecutive virtual frames sharing one image (dedup or
    /// explicit hold).
    Hold { file: String, count: u64 },
}

impl ManifestEntry {
    /// The backing image file.
    pub fn file(&self) -> &str {
        match self {
            ManifestEntry::Frame { file } => file,
            ManifestEntry::Hold { file, .. } => file,
        }
    }

    /// Number of virtual frames this entry spans.
    pub fn frames(&self) -> u64 {
        match self {
            ManifestEntry::Frame { .. } => 1,
            ManifestEntry::Hold { count, .. } => *count,
        }
    }
}

/// Supported inter-scene transition animations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionKind {
    Fade,
    Wipe,
    SlideUp,
    SlideLeft,
    Zoom,
    Doorway,
    Swap,
    Cube,
}

impl Default for TransitionKind {
    fn default() -> Self {
        Self::Fade
    }
}

/// A directive to insert a transition animation after a manifest entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionMarker {
    /// Index of the manifest entry after which the transition plays.
    pub after_entry_index: usize,

    /// Animation kind.
    pub kind: TransitionKind,

    /// Output frames the transition occupies.
    pub duration_frames: u64,

    /// Source frames the transition consumes (default 1).
    #[serde(default = "default_consumed_frames")]
    pub consumed_frames: u64,

    /// Explicit outgoing face, overriding the last frame of the entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_file: Option<String>,

    /// Explicit incoming face, overriding the first frame after the entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_file: Option<String>,
}

fn default_consumed_frames() -> u64 {
    1
}

/// Total virtual frames across all manifest entries.
pub fn expanded_frame_count(manifest: &[ManifestEntry]) -> u64 {
    manifest.iter().map(ManifestEntry::frames).sum()
}

/// First expanded frame index of entry `i`.
pub fn entry_first_expanded_frame(manifest: &[ManifestEntry], i: usize) -> ExpandedFrame {
    ExpandedFrame(manifest[..i].iter().map(ManifestEntry::frames).sum())
}

/// Last expanded frame index of entry `i`.
pub fn entry_last_expanded_frame(manifest: &[ManifestEntry], i: usize) -> ExpandedFrame {
    ExpandedFrame(entry_first_expanded_frame(manifest, i).0 + manifest[i].frames() - 1)
}

/// The backing file of expanded frame `f`, clamping past-the-end lookups to
/// the final entry.
pub fn file_at_expanded_frame(manifest: &[ManifestEntry], f: ExpandedFrame) -> Option<&str> {
    let mut remaining = f.0;
    for entry in manifest {
        let span = entry.frames();
        if remaining < span {
            return Some(entry.file());
        }
        remaining -= span;
    }
    manifest.last().map(ManifestEntry::file)
}

/// Total output frames: expanded frames plus the net frames each transition
/// adds (`duration - consumed`).
pub fn total_output_frames(manifest: &[ManifestEntry], markers: &[TransitionMarker]) -> u64 {
    let added: u64 = markers
        .iter()
        .map(|m| m.duration_frames.saturating_sub(m.consumed_frames))
        .sum();
    expanded_frame_count(manifest) + added
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(file: &str) -> ManifestEntry {
        ManifestEntry::Frame {
            file: file.to_string(),
        }
    }

    fn hold(file: &str, count: u64) -> ManifestEntry {
        ManifestEntry::Hold {
            file: file.to_string(),
            count,
        }
    }

    #[test]
    fn expanded_count_sums_holds() {
        let manifest = vec![frame("a"), hold("b", 3), frame("c")];
        assert_eq!(expanded_frame_count(&manifest), 5);
    }

    #[test]
    fn entry_expanded_frame_bounds() {
        let manifest = vec![frame("a"), hold("b", 3), frame("c")];
        assert_eq!(entry_first_expanded_frame(&manifest, 0).0, 0);
        assert_eq!(entry_last_expanded_frame(&manifest, 0).0, 0);
        assert_eq!(entry_first_expanded_frame(&manifest, 1).0, 1);
        assert_eq!(entry_last_expanded_frame(&manifest, 1).0, 3);
        assert_eq!(entry_first_expanded_frame(&manifest, 2).0, 4);
    }

    #[test]
    fn file_lookup_walks_holds() {
        let manifest = vec![frame("a"), hold("b", 3), frame("c")];
        assert_eq!(file_at_expanded_frame(&manifest, ExpandedFrame(0)), Some("a"));
        assert_eq!(file_at_expanded_frame(&manifest, ExpandedFrame(2)), Some("b"));
        assert_eq!(file_at_expanded_frame(&manifest, ExpandedFrame(4)), Some("c"));
        // Past-the-end clamps to the final entry.
        assert_eq!(file_at_expanded_frame(&manifest, ExpandedFrame(9)), Some("c"));
    }

    #[test]
    fn total_output_frames_adds_net_transition_frames() {
        let manifest = vec![frame("a"), frame("b"), frame("c")];
        let markers = vec![TransitionMarker {
            after_entry_index: 0,
            kind: TransitionKind::Fade,
            duration_frames: 3,
            consumed_frames: 1,
            before_file: None,
            after_file: None,
        }];
        assert_eq!(total_output_frames(&manifest, &markers), 5);
        assert_eq!(total_output_frames(&manifest, &[]), 3);
    }

    #[test]
    fn marker_consumed_frames_defaults_to_one() {
        let json = r#"{"afterEntryIndex":0,"kind":"slide-up","durationFrames":12}"#;
        let marker: TransitionMarker = serde_json::from_str(json).unwrap();
        assert_eq!(marker.consumed_frames, 1);
        assert_eq!(marker.kind, TransitionKind::SlideUp);
    }

    #[test]
    fn manifest_entry_wire_format() {
        let entry = hold("frames/frame-000004.jpg", 12);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"type\":\"hold\""));
        assert!(json.contains("\"count\":12"));
        let back: ManifestEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn unknown_transition_kind_is_rejected_at_parse() {
        let json = r#"{"afterEntryIndex":0,"kind":"sparkle","durationFrames":3}"#;
        assert!(serde_json::from_str::<TransitionMarker>(json).is_err());
    }
}
