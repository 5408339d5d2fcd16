//! Time remapping between the three time bases.
//!
//! Slides insert output time while freezing source time at the scene
//! timestamp; transitions insert `duration - consumed` output frames after
//! their anchor entry. Events are never mutated in place; remapping
//! returns shifted copies.

use demoreel_timeline_model::event::Event;
use demoreel_timeline_model::manifest::{
    entry_last_expanded_frame, ManifestEntry, TransitionMarker,
};
use demoreel_timeline_model::time::{frame_to_ms, OutputMs, SourceMs};

/// One slide's contribution to the output timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideWindow {
    /// Source timestamp of the slide's scene event.
    pub scene_timestamp_ms: i64,

    /// Inserted output duration.
    pub duration_ms: i64,

    /// Source-time span immediately after the slide during which captured
    /// frames are stale (navigation still settling).
    pub dead_after_ms: i64,
}

/// Extract slide windows from a timeline's scene events, in source order.
pub fn slide_windows(events: &[Event]) -> Vec<SlideWindow> {
    events
        .iter()
        .filter_map(|e| {
            e.slide().map(|slide| SlideWindow {
                scene_timestamp_ms: e.timestamp_ms,
                duration_ms: slide.duration_or_default(),
                dead_after_ms: 0,
            })
        })
        .collect()
}

/// Map an output timestamp back to source time.
///
/// Inside a slide's output window source time freezes at the scene
/// timestamp; past it, the slide's duration is subtracted. Source times
/// landing in a dead zone clamp to its end.
pub fn source_time_ms(output: OutputMs, slides: &[SlideWindow]) -> SourceMs {
    let mut accumulated = 0i64;
    let mut source = None;

    for slide in slides {
        let slide_start = slide.scene_timestamp_ms + accumulated;
        if output.0 < slide_start {
            source = Some(output.0 - accumulated);
            break;
        }
        if output.0 < slide_start + slide.duration_ms {
            source = Some(slide.scene_timestamp_ms);
            break;
        }
        accumulated += slide.duration_ms;
    }
    let source = source.unwrap_or(output.0 - accumulated);

    // Dead-zone clamp: stale frames right after a slide resolve to the
    // first settled source time.
    for slide in slides {
        let dead_end = slide.scene_timestamp_ms + slide.dead_after_ms;
        if slide.dead_after_ms > 0
            && source >= slide.scene_timestamp_ms
            && source < dead_end
        {
            return SourceMs(dead_end);
        }
    }
    SourceMs(source)
}

/// Shift every event forward by the total duration of slides at or before
/// its timestamp. Returns a new sequence; the input is untouched.
pub fn remap_events(events: &[Event], slides: &[SlideWindow]) -> Vec<Event> {
    events
        .iter()
        .map(|event| {
            let shift: i64 = slides
                .iter()
                .filter(|s| s.scene_timestamp_ms <= event.timestamp_ms)
                .map(|s| s.duration_ms)
                .sum();
            let mut shifted = event.clone();
            shifted.timestamp_ms += shift;
            shifted
        })
        .collect()
}

/// Map a source timestamp to output time, accounting for the output frames
/// transitions insert before it. Used to place the narration track.
pub fn output_ms_for_source_ms(
    source: SourceMs,
    manifest: &[ManifestEntry],
    markers: &[TransitionMarker],
    fps: u32,
) -> OutputMs {
    let source_frame = (source.0.max(0) as u128 * fps as u128 / 1000) as u64;
    let mut offset = 0u64;
    for marker in markers {
        let anchor = entry_last_expanded_frame(manifest, marker.after_entry_index).0;
        if anchor < source_frame {
            offset += marker.duration_frames.saturating_sub(marker.consumed_frames);
        }
    }
    OutputMs(frame_to_ms(source_frame + offset, fps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use demoreel_timeline_model::event::{EventKind, SlideConfig, WaitReason};
    use demoreel_timeline_model::manifest::TransitionKind;

    fn slide(at_ms: i64, duration_ms: i64) -> SlideWindow {
        SlideWindow {
            scene_timestamp_ms: at_ms,
            duration_ms,
            dead_after_ms: 0,
        }
    }

    fn wait_event(id: &str, ts: i64) -> Event {
        Event {
            id: id.to_string(),
            timestamp_ms: ts,
            kind: EventKind::Wait {
                duration_ms: 100,
                reason: WaitReason::Pacing,
            },
        }
    }

    #[test]
    fn empty_slide_list_is_identity() {
        for t in [0i64, 33, 1000, 99_999] {
            assert_eq!(source_time_ms(OutputMs(t), &[]).0, t);
        }
        let events = vec![wait_event("ev-001", 0), wait_event("ev-002", 450)];
        assert_eq!(remap_events(&events, &[]), events);
    }

    #[test]
    fn slide_window_freezes_source_time() {
        // Slide at t=0 for 2000 ms: outputs [0, 2000) freeze at source 0.
        let slides = vec![slide(0, 2000)];
        for t in [0i64, 1, 1000, 1999] {
            assert_eq!(source_time_ms(OutputMs(t), &slides).0, 0);
        }
        // The end boundary maps to the first post-slide source time.
        assert_eq!(source_time_ms(OutputMs(2000), &slides).0, 0);
        assert_eq!(source_time_ms(OutputMs(2033), &slides).0, 33);
    }

    #[test]
    fn output_before_a_later_slide_shifts_by_earlier_slides_only() {
        let slides = vec![slide(1000, 2000), slide(5000, 1000)];
        // Before the first slide: identity.
        assert_eq!(source_time_ms(OutputMs(500), &slides).0, 500);
        // Between slides: shifted by the first slide's duration.
        assert_eq!(source_time_ms(OutputMs(4000), &slides).0, 2000);
        // Inside the second slide's output window [7000, 8000).
        assert_eq!(source_time_ms(OutputMs(7500), &slides).0, 5000);
        // After both.
        assert_eq!(source_time_ms(OutputMs(8100), &slides).0, 5100);
    }

    #[test]
    fn dead_zone_clamps_to_its_end() {
        let slides = vec![SlideWindow {
            scene_timestamp_ms: 1000,
            duration_ms: 2000,
            dead_after_ms: 400,
        }];
        // Outputs mapping into [1000, 1400) clamp to 1400.
        assert_eq!(source_time_ms(OutputMs(3000), &slides).0, 1400);
        assert_eq!(source_time_ms(OutputMs(3399), &slides).0, 1400);
        assert_eq!(source_time_ms(OutputMs(3400), &slides).0, 1400);
        assert_eq!(source_time_ms(OutputMs(3500), &slides).0, 1500);
    }

    #[test]
    fn remap_shifts_events_at_or_after_each_slide() {
        let slides = vec![slide(1000, 2000)];
        let events = vec![
            wait_event("ev-001", 0),
            wait_event("ev-002", 1000),
            wait_event("ev-003", 4000),
        ];
        let shifted = remap_events(&events, &slides);
        assert_eq!(shifted[0].timestamp_ms, 0);
        assert_eq!(shifted[1].timestamp_ms, 3000);
        assert_eq!(shifted[2].timestamp_ms, 6000);
        // Input untouched.
        assert_eq!(events[1].timestamp_ms, 1000);
    }

    #[test]
    fn slide_windows_come_from_slide_bearing_scenes() {
        let events = vec![
            Event {
                id: "ev-001".to_string(),
                timestamp_ms: 0,
                kind: EventKind::Scene {
                    title: "Plain".to_string(),
                    description: None,
                    slide: None,
                },
            },
            Event {
                id: "ev-002".to_string(),
                timestamp_ms: 500,
                kind: EventKind::Scene {
                    title: "Slide".to_string(),
                    description: None,
                    slide: Some(SlideConfig {
                        duration_ms: Some(1500),
                        ..Default::default()
                    }),
                },
            },
        ];
        let slides = slide_windows(&events);
        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].scene_timestamp_ms, 500);
        assert_eq!(slides[0].duration_ms, 1500);
    }

    #[test]
    fn narration_offset_accounts_for_transition_insertions() {
        let manifest = vec![
            ManifestEntry::Frame {
                file: "frames/frame-000000.jpg".to_string(),
            },
            ManifestEntry::Frame {
                file: "frames/frame-000001.jpg".to_string(),
            },
            ManifestEntry::Frame {
                file: "frames/frame-000002.jpg".to_string(),
            },
        ];
        let markers = vec![TransitionMarker {
            after_entry_index: 0,
            kind: TransitionKind::Fade,
            duration_frames: 3,
            consumed_frames: 1,
            before_file: None,
            after_file: None,
        }];

        // Source frame 0 precedes the transition: unshifted.
        assert_eq!(
            output_ms_for_source_ms(SourceMs(0), &manifest, &markers, 30).0,
            0
        );
        // Source frame 2 (66 ms at 30 fps) gains the two inserted frames.
        assert_eq!(
            output_ms_for_source_ms(SourceMs(66), &manifest, &markers, 30).0,
            frame_to_ms(4, 30)
        );
    }
}
