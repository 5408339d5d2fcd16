//! Timeline event types.
//!
//! Events are appended by the scenario runner during capture and never
//! mutated afterwards; the time remapper returns new, shifted copies. The
//! wire format uses camelCase field names and a `type` discriminator.

use serde::{Deserialize, Serialize};

/// A single timeline event with timestamp and opaque id (`ev-NNN`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique id within the timeline, format `ev-NNN`.
    pub id: String,

    /// Source-time milliseconds since recording start.
    pub timestamp_ms: i64,

    /// The event payload.
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Discriminated union of event payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventKind {
    /// A scene boundary, optionally carrying a title-slide configuration.
    #[serde(rename_all = "camelCase")]
    Scene {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slide: Option<SlideConfig>,
    },

    /// A browser interaction performed by the runner.
    #[serde(rename_all = "camelCase")]
    Action {
        kind: ActionKind,
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        duration_ms: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bounding_box: Option<BoundingBox>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        settled_at_ms: Option<i64>,
    },

    /// A cursor trajectory from one viewport point to another.
    #[serde(rename_all = "camelCase")]
    CursorTarget {
        from_x: i32,
        from_y: i32,
        to_x: i32,
        to_y: i32,
        move_duration_ms: i64,
        easing: String,
    },

    /// A narration segment window.
    #[serde(rename_all = "camelCase")]
    Narration {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio_duration_ms: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio_file: Option<String>,
    },

    /// An explicit pause.
    #[serde(rename_all = "camelCase")]
    Wait { duration_ms: i64, reason: WaitReason },
}

/// Browser action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Click,
    Fill,
    Hover,
    Press,
    Navigate,
    Dblclick,
}

/// Why a wait was inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WaitReason {
    Pacing,
    NarrationSync,
    PageLoad,
}

/// Title-slide configuration attached to a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SlideConfig {
    /// How long the slide holds, in milliseconds (default 2000).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,

    /// Background colour, hex (`#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_color: Option<String>,

    /// Title text colour, hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,

    /// CSS font family used by the injected overlay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,

    /// Title font size in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_font_size: Option<u32>,

    /// Narration text spoken over the slide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrate: Option<String>,
}

/// Default slide hold duration in milliseconds.
pub const DEFAULT_SLIDE_DURATION_MS: i64 = 2000;

impl SlideConfig {
    /// Hold duration, applying the default.
    pub fn duration_or_default(&self) -> i64 {
        self.duration_ms.unwrap_or(DEFAULT_SLIDE_DURATION_MS)
    }
}

/// Element bounding box in captured-viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    /// Centre point of the box.
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

impl Event {
    /// Extract the slide config if this is a slide-bearing scene.
    pub fn slide(&self) -> Option<&SlideConfig> {
        match &self.kind {
            EventKind::Scene { slide, .. } => slide.as_ref(),
            _ => None,
        }
    }

    /// Whether this event is a narration segment.
    pub fn is_narration(&self) -> bool {
        matches!(self.kind, EventKind::Narration { .. })
    }
}
