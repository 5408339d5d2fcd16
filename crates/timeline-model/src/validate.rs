//! Timeline schema validation.
//!
//! The validator is the single source of truth for wire-format invariants.
//! It runs before persistence (in the runner) and before rendering, and
//! collects every violation with a JSON-path-style address rather than
//! stopping at the first.

use std::fmt;

use crate::event::{Event, EventKind};
use crate::manifest::ManifestEntry;
use crate::timeline::{Timeline, TIMELINE_VERSION};

/// One schema violation with its JSON-path address.
#[derive(Debug, Clone)]
pub struct SchemaError {
    pub path: String,
    pub message: String,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// All violations found in one validation pass.
#[derive(Debug, Clone)]
pub struct SchemaErrors {
    pub errors: Vec<SchemaError>,
}

impl fmt::Display for SchemaErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaErrors {}

/// Validate a timeline against every wire-format invariant.
pub fn validate(timeline: &Timeline) -> Result<(), SchemaErrors> {
    let mut errors = Vec::new();
    let push = |errors: &mut Vec<SchemaError>, path: String, message: String| {
        errors.push(SchemaError { path, message });
    };

    if timeline.version != TIMELINE_VERSION {
        push(
            &mut errors,
            "$.version".to_string(),
            format!(
                "unsupported version {} (expected {})",
                timeline.version, TIMELINE_VERSION
            ),
        );
    }

    if timeline.metadata.fps == 0 {
        push(
            &mut errors,
            "$.metadata.fps".to_string(),
            "fps must be positive".to_string(),
        );
    }

    validate_manifest(timeline, &mut errors);
    validate_markers(timeline, &mut errors);
    validate_events(&timeline.events, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(SchemaErrors { errors })
    }
}

fn validate_manifest(timeline: &Timeline, errors: &mut Vec<SchemaError>) {
    let manifest = &timeline.metadata.frame_manifest;
    if manifest.is_empty() {
        errors.push(SchemaError {
            path: "$.metadata.frameManifest".to_string(),
            message: "manifest must be non-empty on a finalised timeline".to_string(),
        });
    }
    for (i, entry) in manifest.iter().enumerate() {
        let path = format!("$.metadata.frameManifest[{i}]");
        if entry.file().is_empty() {
            errors.push(SchemaError {
                path: format!("{path}.file"),
                message: "file must be non-empty".to_string(),
            });
        }
        if let ManifestEntry::Hold { count, .. } = entry {
            if *count == 0 {
                errors.push(SchemaError {
                    path: format!("{path}.count"),
                    message: "hold count must be >= 1".to_string(),
                });
            }
        }
    }
}

fn validate_markers(timeline: &Timeline, errors: &mut Vec<SchemaError>) {
    let manifest_len = timeline.metadata.frame_manifest.len();
    let mut prev_index: Option<usize> = None;
    for (i, marker) in timeline.metadata.transition_markers.iter().enumerate() {
        let path = format!("$.metadata.transitionMarkers[{i}]");
        if marker.after_entry_index >= manifest_len {
            errors.push(SchemaError {
                path: format!("{path}.afterEntryIndex"),
                message: format!(
                    "index {} out of range for manifest of {} entries",
                    marker.after_entry_index, manifest_len
                ),
            });
        }
        if marker.duration_frames == 0 {
            errors.push(SchemaError {
                path: format!("{path}.durationFrames"),
                message: "transition must occupy at least one output frame".to_string(),
            });
        }
        if marker.consumed_frames == 0 {
            errors.push(SchemaError {
                path: format!("{path}.consumedFrames"),
                message: "transition must consume at least one source frame".to_string(),
            });
        }
        if let Some(prev) = prev_index {
            if marker.after_entry_index < prev {
                errors.push(SchemaError {
                    path: format!("{path}.afterEntryIndex"),
                    message: "markers must be sorted by afterEntryIndex".to_string(),
                });
            }
        }
        prev_index = Some(marker.after_entry_index);
    }
}

fn validate_events(events: &[Event], errors: &mut Vec<SchemaError>) {
    let mut prev_ts: Option<i64> = None;
    for (i, event) in events.iter().enumerate() {
        let path = format!("$.events[{i}]");
        if event.id.is_empty() {
            errors.push(SchemaError {
                path: format!("{path}.id"),
                message: "id must be non-empty".to_string(),
            });
        }
        if event.timestamp_ms < 0 {
            errors.push(SchemaError {
                path: format!("{path}.timestampMs"),
                message: "timestamp must be >= 0".to_string(),
            });
        }
        if let Some(prev) = prev_ts {
            if event.timestamp_ms < prev {
                errors.push(SchemaError {
                    path: format!("{path}.timestampMs"),
                    message: format!(
                        "timestamps must be non-decreasing ({} < {})",
                        event.timestamp_ms, prev
                    ),
                });
            }
        }
        prev_ts = Some(event.timestamp_ms);

        validate_event_kind(event, &path, errors);
    }
}

fn validate_event_kind(event: &Event, path: &str, errors: &mut Vec<SchemaError>) {
    match &event.kind {
        EventKind::Scene { title, slide, .. } => {
            if title.is_empty() {
                errors.push(SchemaError {
                    path: format!("{path}.title"),
                    message: "scene title must be non-empty".to_string(),
                });
            }
            if let Some(slide) = slide {
                if let Some(duration) = slide.duration_ms {
                    if duration <= 0 {
                        errors.push(SchemaError {
                            path: format!("{path}.slide.durationMs"),
                            message: "slide duration must be positive".to_string(),
                        });
                    }
                }
                for (field, color) in [
                    ("brandColor", &slide.brand_color),
                    ("textColor", &slide.text_color),
                ] {
                    if let Some(color) = color {
                        if !is_valid_hex_color(color) {
                            errors.push(SchemaError {
                                path: format!("{path}.slide.{field}"),
                                message: format!("malformed hex colour '{color}'"),
                            });
                        }
                    }
                }
            }
        }
        EventKind::Action {
            selector,
            duration_ms,
            settled_at_ms,
            ..
        } => {
            if selector.is_empty() {
                errors.push(SchemaError {
                    path: format!("{path}.selector"),
                    message: "action selector must be non-empty".to_string(),
                });
            }
            if *duration_ms < 0 {
                errors.push(SchemaError {
                    path: format!("{path}.durationMs"),
                    message: "action duration must be >= 0".to_string(),
                });
            }
            if let Some(settled) = settled_at_ms {
                if *settled < event.timestamp_ms {
                    errors.push(SchemaError {
                        path: format!("{path}.settledAtMs"),
                        message: "settledAtMs must not precede timestampMs".to_string(),
                    });
                }
            }
        }
        EventKind::CursorTarget {
            move_duration_ms, ..
        } => {
            if *move_duration_ms <= 0 {
                errors.push(SchemaError {
                    path: format!("{path}.moveDurationMs"),
                    message: "cursor move duration must be positive".to_string(),
                });
            }
        }
        EventKind::Narration {
            text,
            audio_duration_ms,
            ..
        } => {
            if text.is_empty() {
                errors.push(SchemaError {
                    path: format!("{path}.text"),
                    message: "narration text must be non-empty".to_string(),
                });
            }
            if let Some(duration) = audio_duration_ms {
                if *duration < 0 {
                    errors.push(SchemaError {
                        path: format!("{path}.audioDurationMs"),
                        message: "audio duration must be >= 0".to_string(),
                    });
                }
            }
        }
        EventKind::Wait { duration_ms, .. } => {
            if *duration_ms <= 0 {
                errors.push(SchemaError {
                    path: format!("{path}.durationMs"),
                    message: "wait duration must be positive".to_string(),
                });
            }
        }
    }
}

/// Whether `s` is a `#`-prefixed hex colour of 3, 4, 6, or 8 digits.
pub fn is_valid_hex_color(s: &str) -> bool {
    let Some(digits) = s.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 4 | 6 | 8) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ActionKind, SlideConfig, WaitReason};
    use crate::manifest::{TransitionKind, TransitionMarker};
    use crate::timeline::{Metadata, ViewportSize};

    fn base_timeline() -> Timeline {
        Timeline::new(Metadata {
            test_file: "demo.spec.json".to_string(),
            scenario_file: "demo.scenario.json".to_string(),
            recorded_at: "2026-07-01T12:00:00Z".to_string(),
            viewport: ViewportSize {
                width: 1280,
                height: 720,
            },
            fps: 30,
            frame_manifest: vec![ManifestEntry::Frame {
                file: "frames/frame-000000.jpg".to_string(),
            }],
            transition_markers: vec![],
        })
    }

    fn event(id: &str, ts: i64, kind: EventKind) -> Event {
        Event {
            id: id.to_string(),
            timestamp_ms: ts,
            kind,
        }
    }

    #[test]
    fn accepts_well_formed_timeline() {
        let mut t = base_timeline();
        t.events.push(event(
            "ev-001",
            0,
            EventKind::Wait {
                duration_ms: 500,
                reason: WaitReason::Pacing,
            },
        ));
        assert!(validate(&t).is_ok());
    }

    #[test]
    fn rejects_wrong_version() {
        let mut t = base_timeline();
        t.version = 99;
        let errs = validate(&t).unwrap_err();
        assert!(errs.to_string().contains("$.version"));
    }

    #[test]
    fn rejects_empty_manifest() {
        let mut t = base_timeline();
        t.metadata.frame_manifest.clear();
        let errs = validate(&t).unwrap_err();
        assert!(errs.to_string().contains("frameManifest"));
    }

    #[test]
    fn rejects_zero_count_hold() {
        let mut t = base_timeline();
        t.metadata.frame_manifest.push(ManifestEntry::Hold {
            file: "frames/frame-000001.jpg".to_string(),
            count: 0,
        });
        let errs = validate(&t).unwrap_err();
        assert!(errs.to_string().contains("count"));
    }

    #[test]
    fn rejects_non_monotonic_timestamps() {
        let mut t = base_timeline();
        t.events.push(event(
            "ev-001",
            100,
            EventKind::Wait {
                duration_ms: 10,
                reason: WaitReason::Pacing,
            },
        ));
        t.events.push(event(
            "ev-002",
            50,
            EventKind::Wait {
                duration_ms: 10,
                reason: WaitReason::Pacing,
            },
        ));
        let errs = validate(&t).unwrap_err();
        assert!(errs.to_string().contains("non-decreasing"));
    }

    #[test]
    fn rejects_settled_before_timestamp() {
        let mut t = base_timeline();
        t.events.push(event(
            "ev-001",
            100,
            EventKind::Action {
                kind: ActionKind::Click,
                selector: "#go".to_string(),
                value: None,
                duration_ms: 50,
                bounding_box: None,
                settled_at_ms: Some(90),
            },
        ));
        let errs = validate(&t).unwrap_err();
        assert!(errs.to_string().contains("settledAtMs"));
    }

    #[test]
    fn rejects_malformed_slide_colour() {
        let mut t = base_timeline();
        t.events.push(event(
            "ev-001",
            0,
            EventKind::Scene {
                title: "Intro".to_string(),
                description: None,
                slide: Some(SlideConfig {
                    brand_color: Some("#12345".to_string()),
                    ..Default::default()
                }),
            },
        ));
        let errs = validate(&t).unwrap_err();
        assert!(errs.to_string().contains("brandColor"));
    }

    #[test]
    fn rejects_out_of_range_marker_and_zero_duration() {
        let mut t = base_timeline();
        t.metadata.transition_markers.push(TransitionMarker {
            after_entry_index: 5,
            kind: TransitionKind::Fade,
            duration_frames: 0,
            consumed_frames: 1,
            before_file: None,
            after_file: None,
        });
        let errs = validate(&t).unwrap_err();
        let msg = errs.to_string();
        assert!(msg.contains("afterEntryIndex"));
        assert!(msg.contains("durationFrames"));
    }

    #[test]
    fn rejects_unsorted_markers() {
        let mut t = base_timeline();
        t.metadata.frame_manifest.push(ManifestEntry::Frame {
            file: "frames/frame-000001.jpg".to_string(),
        });
        for idx in [1usize, 0usize] {
            t.metadata.transition_markers.push(TransitionMarker {
                after_entry_index: idx,
                kind: TransitionKind::Fade,
                duration_frames: 2,
                consumed_frames: 1,
                before_file: None,
                after_file: None,
            });
        }
        let errs = validate(&t).unwrap_err();
        assert!(errs.to_string().contains("sorted"));
    }

    #[test]
    fn hex_colours() {
        assert!(is_valid_hex_color("#fff"));
        assert!(is_valid_hex_color("#fffa"));
        assert!(is_valid_hex_color("#1E90FF"));
        assert!(is_valid_hex_color("#1E90FF80"));
        assert!(!is_valid_hex_color("1E90FF"));
        assert!(!is_valid_hex_color("#12345"));
        assert!(!is_valid_hex_color("#gggggg"));
    }

    #[test]
    fn rejects_zero_duration_wait_and_cursor_move() {
        let mut t = base_timeline();
        t.events.push(event(
            "ev-001",
            0,
            EventKind::Wait {
                duration_ms: 0,
                reason: WaitReason::PageLoad,
            },
        ));
        t.events.push(event(
            "ev-002",
            0,
            EventKind::CursorTarget {
                from_x: 0,
                from_y: 0,
                to_x: 10,
                to_y: 10,
                move_duration_ms: 0,
                easing: "bezier".to_string(),
            },
        ));
        let errs = validate(&t).unwrap_err();
        assert_eq!(errs.errors.len(), 2);
    }
}
