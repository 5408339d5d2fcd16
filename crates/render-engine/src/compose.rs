//! The compositor.
//!
//! Planning is split from rasterisation: `plan` computes a pure,
//! deterministic [`FramePlan`] for every output frame (base layer, overlay
//! visibility, cursor position, ripples), and `render` turns a plan into
//! RGBA pixels. Only `plan` consults the timeline, so the renderer can
//! distribute frames across workers without coordination.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use ab_glyph::FontArc;
use demoreel_common::error::{DemoreelError, DemoreelResult};
use demoreel_timeline_model::event::{ActionKind, Event, EventKind};
use demoreel_timeline_model::manifest::TransitionKind;
use demoreel_timeline_model::time::frame_to_ms;
use demoreel_timeline_model::timeline::Timeline;
use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_polygon_mut};
use imageproc::point::Point;

use crate::chrome::{draw_chrome, find_system_font};
use crate::cursor::{cursor_at, ripples_at, Ripple};
use crate::ease::ease_in_out_cubic;
use crate::remap::{slide_windows, SlideWindow};
use crate::resolve::{FrameResolver, ResolvedFrame};

/// Compositor feature toggles.
#[derive(Debug, Clone)]
pub struct CompositorOptions {
    /// Draw the synthetic cursor and click ripples.
    pub draw_cursor: bool,

    /// Draw the browser-chrome overlay.
    pub draw_chrome: bool,
}

impl Default for CompositorOptions {
    fn default() -> Self {
        Self {
            draw_cursor: true,
            draw_chrome: true,
        }
    }
}

/// Everything needed to rasterise one output frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    pub output_frame: u64,
    pub base: ResolvedFrame,
    /// Source time the overlays sample event state at.
    pub source_ms: i64,
    pub in_slide: bool,
    /// Address-bar URL; `None` suppresses the chrome overlay.
    pub chrome_url: Option<String>,
    pub cursor: Option<(f64, f64)>,
    pub ripples: Vec<Ripple>,
}

/// Plans and rasterises output frames for one timeline.
pub struct Compositor<'a> {
    timeline: &'a Timeline,
    resolver: FrameResolver<'a>,
    slides: Vec<SlideWindow>,
    options: CompositorOptions,
    font: Option<FontArc>,
}

impl<'a> Compositor<'a> {
    pub fn new(timeline: &'a Timeline, options: CompositorOptions) -> Self {
        let resolver = FrameResolver::new(
            &timeline.metadata.frame_manifest,
            &timeline.metadata.transition_markers,
        );
        let font = options.draw_chrome.then(find_system_font).flatten();
        Self {
            timeline,
            resolver,
            slides: slide_windows(&timeline.events),
            options,
            font,
        }
    }

    /// Total output frames of the final video.
    pub fn total_output_frames(&self) -> u64 {
        self.resolver.total_output_frames()
    }

    /// Compute the deterministic plan for output frame `f_out`.
    pub fn plan(&self, f_out: u64) -> FramePlan {
        let (base, source_frame) = self.resolver.resolve_with_source(f_out);
        let source_ms = frame_to_ms(source_frame.0, self.timeline.metadata.fps);

        let in_transition = matches!(base, ResolvedFrame::Transition { .. });
        let in_slide = self.slides.iter().any(|s| {
            source_ms >= s.scene_timestamp_ms
                && source_ms <= s.scene_timestamp_ms + s.duration_ms
        });

        // Chrome and cursor are suppressed over slides and transitions.
        let overlays_visible = !in_transition && !in_slide;

        let chrome_url = (overlays_visible && self.options.draw_chrome)
            .then(|| latest_navigation(&self.timeline.events, source_ms))
            .flatten();
        let cursor = (overlays_visible && self.options.draw_cursor).then(|| {
            cursor_at(
                &self.timeline.events,
                source_ms,
                self.timeline.metadata.viewport,
            )
        });
        let ripples = if overlays_visible && self.options.draw_cursor {
            ripples_at(&self.timeline.events, source_ms)
        } else {
            Vec::new()
        };

        FramePlan {
            output_frame: f_out,
            base,
            source_ms,
            in_slide,
            chrome_url,
            cursor,
            ripples,
        }
    }

    /// Rasterise a plan into RGBA pixels.
    pub fn render(&self, plan: &FramePlan, cache: &mut ImageCache) -> DemoreelResult<RgbaImage> {
        let mut frame = match &plan.base {
            ResolvedFrame::Source { file } => cache.get(file)?.as_ref().clone(),
            ResolvedFrame::Transition {
                before,
                after,
                progress,
                kind,
            } => {
                let before = cache.get(before)?;
                let after = cache.get(after)?;
                let eased = ease_in_out_cubic(*progress);
                draw_transition(&before, &after, eased, *kind)
            }
        };

        if let Some(url) = &plan.chrome_url {
            draw_chrome(&mut frame, url, self.font.as_ref());
        }
        for ripple in &plan.ripples {
            draw_ripple(&mut frame, ripple);
        }
        if let Some((x, y)) = plan.cursor {
            draw_cursor_pointer(&mut frame, x, y);
        }
        Ok(frame)
    }
}

fn latest_navigation(events: &[Event], t_ms: i64) -> Option<String> {
    events
        .iter()
        .filter(|e| e.timestamp_ms <= t_ms)
        .filter_map(|e| match &e.kind {
            EventKind::Action {
                kind: ActionKind::Navigate,
                selector,
                ..
            } => Some(selector.clone()),
            _ => None,
        })
        .last()
}

/// Decoded-frame cache keyed by manifest file path.
pub struct ImageCache {
    root: PathBuf,
    map: HashMap<String, Arc<RgbaImage>>,
}

impl ImageCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            map: HashMap::new(),
        }
    }

    /// Load and cache the image backing `file` (relative to the root).
    pub fn get(&mut self, file: &str) -> DemoreelResult<Arc<RgbaImage>> {
        if let Some(image) = self.map.get(file) {
            return Ok(image.clone());
        }
        let path = self.root.join(file);
        let image = image::open(&path)
            .map_err(|e| {
                DemoreelError::render(format!("failed to load frame {}: {e}", path.display()))
            })?
            .to_rgba8();
        let image = Arc::new(image);
        self.map.insert(file.to_string(), image.clone());
        Ok(image)
    }
}

/// Composite two transition faces at eased progress `p`.
fn draw_transition(before: &RgbaImage, after: &RgbaImage, p: f64, kind: TransitionKind) -> RgbaImage {
    let (w, h) = (before.width(), before.height());
    let after = conform(after, w, h);
    let before = before.clone();

    match kind {
        TransitionKind::Fade => blend_images(&before, &after, p),
        TransitionKind::Wipe => {
            let mut canvas = before;
            let reveal = ((w as f64) * p).round() as u32;
            if reveal > 0 {
                let strip = imageops::crop_imm(after.as_ref(), 0, 0, reveal.min(w), h).to_image();
                imageops::overlay(&mut canvas, &strip, 0, 0);
            }
            canvas
        }
        TransitionKind::SlideUp => {
            let mut canvas = RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255]));
            let shift = ((h as f64) * p).round() as i64;
            imageops::overlay(&mut canvas, &before, 0, -shift);
            imageops::overlay(&mut canvas, after.as_ref(), 0, h as i64 - shift);
            canvas
        }
        TransitionKind::SlideLeft => {
            let mut canvas = RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255]));
            let shift = ((w as f64) * p).round() as i64;
            imageops::overlay(&mut canvas, &before, -shift, 0);
            imageops::overlay(&mut canvas, after.as_ref(), w as i64 - shift, 0);
            canvas
        }
        TransitionKind::Zoom => {
            let zoomed = scale_center(&before, 1.0 + 0.25 * p);
            blend_images(&zoomed, &after, p)
        }
        TransitionKind::Doorway => {
            let mut canvas = scale_center(&after, 0.92 + 0.08 * p);
            let half = w / 2;
            let shift = ((half as f64) * p).round() as i64;
            let left = imageops::crop_imm(&before, 0, 0, half, h).to_image();
            let right = imageops::crop_imm(&before, half, 0, w - half, h).to_image();
            imageops::overlay(&mut canvas, &left, -shift, 0);
            imageops::overlay(&mut canvas, &right, half as i64 + shift, 0);
            canvas
        }
        TransitionKind::Swap => {
            let out = scale_center(&before, 1.0 - 0.15 * p);
            let incoming = scale_center(&after, 0.85 + 0.15 * p);
            blend_images(&out, &incoming, p)
        }
        TransitionKind::Cube => {
            let mut canvas = RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255]));
            let split = ((w as f64) * (1.0 - p)).round().max(1.0) as u32;
            let darken_amount = (p * std::f64::consts::PI).sin() * 0.35;

            let mut out_face =
                imageops::resize(&before, split.max(1), h, imageops::FilterType::Triangle);
            darken(&mut out_face, darken_amount);
            imageops::overlay(&mut canvas, &out_face, 0, 0);

            let in_width = w - split;
            if in_width > 0 {
                let mut in_face =
                    imageops::resize(after.as_ref(), in_width, h, imageops::FilterType::Triangle);
                darken(&mut in_face, darken_amount);
                imageops::overlay(&mut canvas, &in_face, split as i64, 0);
            }
            canvas
        }
    }
}

/// Resize `img` to the canvas dimensions when a face has drifted.
fn conform(img: &RgbaImage, w: u32, h: u32) -> std::borrow::Cow<'_, RgbaImage> {
    if img.width() == w && img.height() == h {
        std::borrow::Cow::Borrowed(img)
    } else {
        std::borrow::Cow::Owned(imageops::resize(img, w, h, imageops::FilterType::Triangle))
    }
}

/// Per-pixel linear blend, `alpha` toward `b`.
fn blend_images(a: &RgbaImage, b: &RgbaImage, alpha: f64) -> RgbaImage {
    let alpha = alpha.clamp(0.0, 1.0);
    let mut out = a.clone();
    for (dst, src) in out.pixels_mut().zip(b.pixels()) {
        for c in 0..4 {
            let av = dst.0[c] as f64;
            let bv = src.0[c] as f64;
            dst.0[c] = (av + (bv - av) * alpha).round() as u8;
        }
    }
    out
}

/// Scale about the image centre: factors above 1 zoom and crop, factors
/// below 1 shrink onto a black canvas.
fn scale_center(img: &RgbaImage, factor: f64) -> RgbaImage {
    let (w, h) = (img.width(), img.height());
    let sw = ((w as f64) * factor).round().max(1.0) as u32;
    let sh = ((h as f64) * factor).round().max(1.0) as u32;
    let scaled = imageops::resize(img, sw, sh, imageops::FilterType::Triangle);

    if factor >= 1.0 {
        let x = (sw - w) / 2;
        let y = (sh - h) / 2;
        imageops::crop_imm(&scaled, x, y, w, h).to_image()
    } else {
        let mut canvas = RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255]));
        let x = ((w - sw) / 2) as i64;
        let y = ((h - sh) / 2) as i64;
        imageops::overlay(&mut canvas, &scaled, x, y);
        canvas
    }
}

/// Multiply pixel values toward black by `amount` in `[0, 1]`.
fn darken(img: &mut RgbaImage, amount: f64) {
    let keep = (1.0 - amount.clamp(0.0, 1.0)) as f32;
    for pixel in img.pixels_mut() {
        for c in 0..3 {
            pixel.0[c] = (pixel.0[c] as f32 * keep) as u8;
        }
    }
}

/// Draw an expanding click ripple.
fn draw_ripple(frame: &mut RgbaImage, ripple: &Ripple) {
    let radius = (6.0 + ripple.progress * 22.0) as i32;
    let fade = (255.0 * (1.0 - ripple.progress)) as u8;
    let color = Rgba([255, 255, 255, 255]);
    let inner = Rgba([fade, fade, fade, 255]);
    draw_hollow_circle_mut(frame, (ripple.x, ripple.y), radius, color);
    draw_hollow_circle_mut(frame, (ripple.x, ripple.y), (radius - 1).max(1), inner);
}

/// Draw the synthetic pointer with its tip at `(x, y)`.
fn draw_cursor_pointer(frame: &mut RgbaImage, x: f64, y: f64) {
    let (x, y) = (x.round() as i32, y.round() as i32);
    let shape = [
        (0, 0),
        (0, 17),
        (4, 13),
        (7, 20),
        (10, 18),
        (7, 12),
        (12, 12),
    ];

    let outline: Vec<Point<i32>> = shape
        .iter()
        .map(|(dx, dy)| Point::new(x + dx + 1, y + dy + 1))
        .collect();
    let body: Vec<Point<i32>> = shape
        .iter()
        .map(|(dx, dy)| Point::new(x + dx, y + dy))
        .collect();

    if in_bounds(frame, &outline) {
        draw_polygon_mut(frame, &outline, Rgba([255, 255, 255, 255]));
    }
    if in_bounds(frame, &body) {
        draw_polygon_mut(frame, &body, Rgba([20, 20, 20, 255]));
    }
}

fn in_bounds(frame: &RgbaImage, points: &[Point<i32>]) -> bool {
    points.iter().all(|p| {
        p.x >= 0 && p.y >= 0 && (p.x as u32) < frame.width() && (p.y as u32) < frame.height()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use demoreel_timeline_model::event::SlideConfig;
    use demoreel_timeline_model::manifest::{ManifestEntry, TransitionMarker};
    use demoreel_timeline_model::timeline::{Metadata, ViewportSize};

    fn solid_jpeg(dir: &std::path::Path, name: &str, rgb: [u8; 3]) -> String {
        let rel = format!("frames/{name}");
        let path = dir.join(&rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let img = image::RgbImage::from_pixel(64, 64, image::Rgb(rgb));
        img.save(&path).unwrap();
        rel
    }

    fn timeline_with(
        manifest: Vec<ManifestEntry>,
        markers: Vec<TransitionMarker>,
        events: Vec<Event>,
    ) -> Timeline {
        Timeline {
            version: demoreel_timeline_model::timeline::TIMELINE_VERSION,
            metadata: Metadata {
                test_file: "t.json".to_string(),
                scenario_file: "s.json".to_string(),
                recorded_at: "2026-07-01T00:00:00Z".to_string(),
                viewport: ViewportSize {
                    width: 64,
                    height: 64,
                },
                fps: 30,
                frame_manifest: manifest,
                transition_markers: markers,
            },
            events,
        }
    }

    #[test]
    fn plans_are_deterministic() {
        let manifest = vec![
            ManifestEntry::Frame {
                file: "frames/a.jpg".to_string(),
            },
            ManifestEntry::Frame {
                file: "frames/b.jpg".to_string(),
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
        let timeline = timeline_with(manifest, markers, vec![]);
        let compositor = Compositor::new(&timeline, CompositorOptions::default());

        let first: Vec<FramePlan> = (0..compositor.total_output_frames())
            .map(|f| compositor.plan(f))
            .collect();
        let second: Vec<FramePlan> = (0..compositor.total_output_frames())
            .map(|f| compositor.plan(f))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn overlays_are_suppressed_during_slides_and_transitions() {
        let slide_scene = Event {
            id: "ev-001".to_string(),
            timestamp_ms: 0,
            kind: EventKind::Scene {
                title: "Intro".to_string(),
                description: None,
                slide: Some(SlideConfig {
                    duration_ms: Some(100),
                    ..Default::default()
                }),
            },
        };
        let navigate = Event {
            id: "ev-002".to_string(),
            timestamp_ms: 0,
            kind: EventKind::Action {
                kind: ActionKind::Navigate,
                selector: "http://localhost:3000/app".to_string(),
                value: None,
                duration_ms: 0,
                bounding_box: None,
                settled_at_ms: Some(0),
            },
        };
        // 10 slide frames (t in [0, 333ms)) then plain frames.
        let manifest = vec![
            ManifestEntry::Hold {
                file: "frames/slide.jpg".to_string(),
                count: 4,
            },
            ManifestEntry::Hold {
                file: "frames/app.jpg".to_string(),
                count: 30,
            },
        ];
        let timeline = timeline_with(manifest, vec![], vec![slide_scene, navigate]);
        let compositor = Compositor::new(&timeline, CompositorOptions::default());

        // Frame 0 is inside the slide window: no chrome, no cursor.
        let slide_plan = compositor.plan(0);
        assert!(slide_plan.in_slide);
        assert!(slide_plan.chrome_url.is_none());
        assert!(slide_plan.cursor.is_none());

        // Frame 20 (666 ms) is past the slide: overlays return.
        let app_plan = compositor.plan(20);
        assert!(!app_plan.in_slide);
        assert_eq!(app_plan.chrome_url.as_deref(), Some("http://localhost:3000/app"));
        assert!(app_plan.cursor.is_some());
    }

    #[test]
    fn no_cursor_option_disables_cursor_and_ripples() {
        let manifest = vec![ManifestEntry::Frame {
            file: "frames/a.jpg".to_string(),
        }];
        let timeline = timeline_with(manifest, vec![], vec![]);
        let compositor = Compositor::new(
            &timeline,
            CompositorOptions {
                draw_cursor: false,
                draw_chrome: true,
            },
        );
        let plan = compositor.plan(0);
        assert!(plan.cursor.is_none());
        assert!(plan.ripples.is_empty());
    }

    #[test]
    fn renders_source_and_blended_transition_frames() {
        let dir = tempfile::tempdir().unwrap();
        let a = solid_jpeg(dir.path(), "a.jpg", [250, 0, 0]);
        let b = solid_jpeg(dir.path(), "b.jpg", [0, 0, 250]);

        let manifest = vec![
            ManifestEntry::Frame { file: a },
            ManifestEntry::Frame { file: b },
        ];
        let markers = vec![TransitionMarker {
            after_entry_index: 0,
            kind: TransitionKind::Fade,
            duration_frames: 2,
            consumed_frames: 1,
            before_file: None,
            after_file: None,
        }];
        let timeline = timeline_with(manifest, markers, vec![]);
        let compositor = Compositor::new(
            &timeline,
            CompositorOptions {
                draw_cursor: false,
                draw_chrome: false,
            },
        );
        let mut cache = ImageCache::new(dir.path());

        let source = compositor
            .render(&compositor.plan(0), &mut cache)
            .unwrap();
        assert_eq!(source.dimensions(), (64, 64));
        let red = source.get_pixel(32, 32).0;
        assert!(red[0] > 200 && red[2] < 60);

        // Midway through the fade both faces contribute.
        let mid = compositor.render(&compositor.plan(1), &mut cache).unwrap();
        let px = mid.get_pixel(32, 32).0;
        assert!(px[0] > 40 && px[0] < 220);
        assert!(px[2] > 40 && px[2] < 220);
    }

    #[test]
    fn every_transition_kind_produces_a_full_size_frame() {
        let before = RgbaImage::from_pixel(64, 64, Rgba([200, 10, 10, 255]));
        let after = RgbaImage::from_pixel(64, 64, Rgba([10, 10, 200, 255]));
        for kind in [
            TransitionKind::Fade,
            TransitionKind::Wipe,
            TransitionKind::SlideUp,
            TransitionKind::SlideLeft,
            TransitionKind::Zoom,
            TransitionKind::Doorway,
            TransitionKind::Swap,
            TransitionKind::Cube,
        ] {
            for p in [0.0, 0.33, 0.5, 0.9, 1.0] {
                let out = draw_transition(&before, &after, p, kind);
                assert_eq!(out.dimensions(), (64, 64), "{kind:?} at {p}");
            }
        }
    }

    #[test]
    fn wipe_reveals_after_from_the_left() {
        let before = RgbaImage::from_pixel(64, 64, Rgba([255, 0, 0, 255]));
        let after = RgbaImage::from_pixel(64, 64, Rgba([0, 255, 0, 255]));
        let out = draw_transition(&before, &after, 0.5, TransitionKind::Wipe);
        assert_eq!(out.get_pixel(10, 32).0[1], 255);
        assert_eq!(out.get_pixel(60, 32).0[0], 255);
    }

    #[test]
    fn missing_frame_file_is_a_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ImageCache::new(dir.path());
        let err = cache.get("frames/nope.jpg").unwrap_err();
        assert!(matches!(err, DemoreelError::Render { .. }));
    }
}
