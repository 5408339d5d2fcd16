//! Cursor trajectory sampling and click ripples.
//!
//! The recording never captures a real cursor; the compositor draws a
//! synthetic one from the recorded cursor-target events, interpolated with
//! an eased curve and clamped outside each movement window.

use demoreel_timeline_model::event::{ActionKind, Event, EventKind};
use demoreel_timeline_model::timeline::ViewportSize;

use crate::ease::ease_in_out_cubic;

/// How long a click ripple stays visible after the click.
pub const RIPPLE_DURATION_MS: i64 = 450;

/// A click ripple at some stage of its animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ripple {
    pub x: i32,
    pub y: i32,
    /// Animation progress in `[0, 1]`.
    pub progress: f64,
}

/// Cursor position at source time `t_ms`.
///
/// Finds the cursor-target movement active at `t_ms` and interpolates with
/// the eased curve; before the first movement the cursor sits at the
/// viewport centre, and outside a movement window it clamps to the nearer
/// endpoint.
pub fn cursor_at(events: &[Event], t_ms: i64, viewport: ViewportSize) -> (f64, f64) {
    let mut active: Option<&Event> = None;
    for event in events {
        if let EventKind::CursorTarget { .. } = event.kind {
            if event.timestamp_ms <= t_ms {
                active = Some(event);
            } else if active.is_none() {
                // Before the first movement starts: rest at its origin.
                active = Some(event);
                break;
            } else {
                break;
            }
        }
    }

    let Some(event) = active else {
        let (cx, cy) = viewport.center();
        return (cx as f64, cy as f64);
    };

    let EventKind::CursorTarget {
        from_x,
        from_y,
        to_x,
        to_y,
        move_duration_ms,
        ..
    } = &event.kind
    else {
        unreachable!("active event is always a cursor target");
    };

    if t_ms <= event.timestamp_ms {
        return (*from_x as f64, *from_y as f64);
    }
    let end = event.timestamp_ms + move_duration_ms;
    if t_ms >= end {
        return (*to_x as f64, *to_y as f64);
    }

    let linear = (t_ms - event.timestamp_ms) as f64 / *move_duration_ms as f64;
    let eased = ease_in_out_cubic(linear);
    (
        *from_x as f64 + (*to_x - *from_x) as f64 * eased,
        *from_y as f64 + (*to_y - *from_y) as f64 * eased,
    )
}

/// Ripples visible at source time `t_ms`: one per click action whose event
/// time is within the ripple window and which carries a bounding box.
pub fn ripples_at(events: &[Event], t_ms: i64) -> Vec<Ripple> {
    events
        .iter()
        .filter_map(|event| {
            let EventKind::Action {
                kind,
                bounding_box: Some(bounding_box),
                ..
            } = &event.kind
            else {
                return None;
            };
            if !matches!(kind, ActionKind::Click | ActionKind::Dblclick) {
                return None;
            }
            let age = t_ms - event.timestamp_ms;
            if !(0..RIPPLE_DURATION_MS).contains(&age) {
                return None;
            }
            let (x, y) = bounding_box.center();
            Some(Ripple {
                x,
                y,
                progress: age as f64 / RIPPLE_DURATION_MS as f64,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use demoreel_timeline_model::event::BoundingBox;

    fn viewport() -> ViewportSize {
        ViewportSize {
            width: 1280,
            height: 720,
        }
    }

    fn cursor_target(id: &str, ts: i64, from: (i32, i32), to: (i32, i32), ms: i64) -> Event {
        Event {
            id: id.to_string(),
            timestamp_ms: ts,
            kind: EventKind::CursorTarget {
                from_x: from.0,
                from_y: from.1,
                to_x: to.0,
                to_y: to.1,
                move_duration_ms: ms,
                easing: "bezier".to_string(),
            },
        }
    }

    fn click(id: &str, ts: i64, center: (i32, i32)) -> Event {
        Event {
            id: id.to_string(),
            timestamp_ms: ts,
            kind: EventKind::Action {
                kind: ActionKind::Click,
                selector: "#target".to_string(),
                value: None,
                duration_ms: 50,
                bounding_box: Some(BoundingBox {
                    x: center.0 - 10,
                    y: center.1 - 10,
                    width: 20,
                    height: 20,
                }),
                settled_at_ms: Some(ts + 50),
            },
        }
    }

    #[test]
    fn rests_at_viewport_centre_without_movements() {
        assert_eq!(cursor_at(&[], 1000, viewport()), (640.0, 360.0));
    }

    #[test]
    fn clamps_to_endpoints_outside_the_window() {
        let events = vec![cursor_target("ev-001", 1000, (0, 0), (100, 200), 400)];
        assert_eq!(cursor_at(&events, 0, viewport()), (0.0, 0.0));
        assert_eq!(cursor_at(&events, 1000, viewport()), (0.0, 0.0));
        assert_eq!(cursor_at(&events, 1400, viewport()), (100.0, 200.0));
        assert_eq!(cursor_at(&events, 9999, viewport()), (100.0, 200.0));
    }

    #[test]
    fn interpolates_with_easing_midpoint() {
        let events = vec![cursor_target("ev-001", 0, (0, 0), (100, 100), 400)];
        let (x, y) = cursor_at(&events, 200, viewport());
        assert!((x - 50.0).abs() < 1e-9);
        assert!((y - 50.0).abs() < 1e-9);
        // Quarter-way in time is less than quarter-way in space (ease-in).
        let (x_q, _) = cursor_at(&events, 100, viewport());
        assert!(x_q < 25.0);
    }

    #[test]
    fn later_movement_takes_over() {
        let events = vec![
            cursor_target("ev-001", 0, (0, 0), (100, 100), 200),
            cursor_target("ev-002", 1000, (100, 100), (500, 500), 200),
        ];
        assert_eq!(cursor_at(&events, 500, viewport()), (100.0, 100.0));
        assert_eq!(cursor_at(&events, 1300, viewport()), (500.0, 500.0));
    }

    #[test]
    fn ripples_appear_only_inside_their_window() {
        let events = vec![click("ev-001", 1000, (400, 300))];
        assert!(ripples_at(&events, 999).is_empty());
        let mid = ripples_at(&events, 1200);
        assert_eq!(mid.len(), 1);
        assert_eq!((mid[0].x, mid[0].y), (400, 300));
        assert!(mid[0].progress > 0.4 && mid[0].progress < 0.5);
        assert!(ripples_at(&events, 1000 + RIPPLE_DURATION_MS).is_empty());
    }

    #[test]
    fn overlapping_clicks_yield_multiple_ripples() {
        let events = vec![click("ev-001", 1000, (100, 100)), click("ev-002", 1200, (200, 200))];
        let ripples = ripples_at(&events, 1300);
        assert_eq!(ripples.len(), 2);
    }
}
