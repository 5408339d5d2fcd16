//! The scenario runner.
//!
//! `Stage` is the instrumentation API a scenario is written against. One
//! production configuration drives a browser and records events; the
//! dry-run configuration uses the no-op driver and only collects narration
//! texts, so the narration preprocessor can execute a scenario without a
//! browser.
//!
//! The stage owns all mutable recording state: the event sequence, the last
//! cursor position (seeded to viewport centre), the narration queue, and
//! the pending-transition flag.

use std::collections::VecDeque;

use demoreel_common::error::{DemoreelError, DemoreelResult};
use demoreel_timeline_model::event::{
    ActionKind, BoundingBox, Event, EventKind, SlideConfig, WaitReason,
};
use demoreel_timeline_model::manifest::{TransitionKind, TransitionMarker};
use demoreel_timeline_model::time::ms_to_frames_ceil;
use demoreel_timeline_model::timeline::{Metadata, Timeline, ViewportSize};
use demoreel_timeline_model::validate::{is_valid_hex_color, validate};

use crate::capture::{CaptureHandle, CaptureStats, FrameLabel};
use crate::driver::{share_driver, NullDriver, SharedDriver};

/// One pre-generated narration segment queued for the recording pass.
///
/// Only the first segment of a compose carries an audio file reference; the
/// compositor plays one continuous track and the remaining segments exist
/// to drive per-segment holds.
#[derive(Debug, Clone)]
pub struct QueuedNarration {
    pub text: String,
    pub duration_ms: i64,
    pub audio_file: Option<String>,
}

/// How the stage executes a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageMode {
    /// Drive the browser, capture frames, record events.
    Record,
    /// No browser, no capture; collect narration texts in order.
    DryRun,
}

/// Options for [`Stage::scene`].
#[derive(Debug, Clone, Default)]
pub struct SceneOptions {
    pub description: Option<String>,
    pub slide: Option<SlideConfig>,
}

/// Options for browser actions.
#[derive(Debug, Clone, Default)]
pub struct ActionOptions {
    /// Narration emitted before the action executes.
    pub narration: Option<String>,
}

/// Options for [`Stage::transition`].
#[derive(Debug, Clone, Default)]
pub struct TransitionOptions {
    pub kind: Option<TransitionKind>,
    pub duration_ms: Option<f64>,
}

/// Default transition duration when the scenario gives none.
const DEFAULT_TRANSITION_MS: f64 = 600.0;

/// Per-character delay while `fill` types.
const FILL_CHAR_DELAY_MS: u64 = 30;

/// The instrumentation API exposed to scenarios.
pub struct Stage {
    mode: StageMode,
    driver: SharedDriver,
    capture: Option<CaptureHandle>,
    viewport: ViewportSize,
    fps: u32,
    voiceover: bool,

    events: Vec<Event>,
    next_event_number: u64,
    cursor: (i32, i32),
    narration_queue: VecDeque<QueuedNarration>,
    narrations_expected: usize,
    narrations_recorded: usize,
    collected_texts: Vec<String>,
    transition_pending: bool,
    markers: Vec<TransitionMarker>,
    last_url: Option<String>,
    scenario_file: String,
    test_file: String,
}

impl Stage {
    /// Create a recording stage.
    #[allow(clippy::too_many_arguments)]
    pub fn recording(
        driver: SharedDriver,
        capture: CaptureHandle,
        viewport: ViewportSize,
        narrations: Vec<QueuedNarration>,
        voiceover: bool,
        scenario_file: impl Into<String>,
        test_file: impl Into<String>,
    ) -> Self {
        let fps = capture.fps();
        let narrations_expected = narrations.len();
        Self {
            mode: StageMode::Record,
            driver,
            capture: Some(capture),
            viewport,
            fps,
            voiceover,
            events: Vec::new(),
            next_event_number: 0,
            cursor: viewport.center(),
            narration_queue: narrations.into(),
            narrations_expected,
            narrations_recorded: 0,
            collected_texts: Vec::new(),
            transition_pending: false,
            markers: Vec::new(),
            last_url: None,
            scenario_file: scenario_file.into(),
            test_file: test_file.into(),
        }
    }

    /// Create a dry-run stage that records narration texts only.
    pub fn dry_run(viewport: ViewportSize) -> Self {
        Self {
            mode: StageMode::DryRun,
            driver: share_driver(Box::new(NullDriver::new())),
            capture: None,
            viewport,
            fps: 30,
            voiceover: true,
            events: Vec::new(),
            next_event_number: 0,
            cursor: viewport.center(),
            narration_queue: VecDeque::new(),
            narrations_expected: 0,
            narrations_recorded: 0,
            collected_texts: Vec::new(),
            transition_pending: false,
            markers: Vec::new(),
            last_url: None,
            scenario_file: String::new(),
            test_file: String::new(),
        }
    }

    /// Narration texts collected by a dry run, in scenario order.
    pub fn collected_narrations(&self) -> &[String] {
        &self.collected_texts
    }

    /// Current source time from the virtual clock.
    pub fn current_time_ms(&self) -> i64 {
        self.capture
            .as_ref()
            .map(CaptureHandle::current_time_ms)
            .unwrap_or(0)
    }

    fn next_id(&mut self) -> String {
        self.next_event_number += 1;
        format!("ev-{:03}", self.next_event_number)
    }

    fn emit_at(&mut self, timestamp_ms: i64, kind: EventKind) {
        let id = self.next_id();
        self.events.push(Event {
            id,
            timestamp_ms,
            kind,
        });
    }

    fn emit(&mut self, kind: EventKind) {
        let ts = self.current_time_ms();
        self.emit_at(ts, kind);
    }

    fn capture_handle(&self) -> DemoreelResult<&CaptureHandle> {
        self.capture
            .as_ref()
            .ok_or_else(|| DemoreelError::capture("stage has no capture loop (dry run)"))
    }

    /// Best-effort capture restore used on error paths: the loop must never
    /// be left paused because an action failed mid-flight.
    fn restore_capture(&self) {
        if let Some(capture) = &self.capture {
            capture.resume();
        }
    }

    fn wrap_driver_err(
        &self,
        action: &str,
        selector: Option<&str>,
        err: DemoreelError,
    ) -> DemoreelError {
        self.restore_capture();
        match err {
            already @ DemoreelError::Driver { .. } => already,
            other => DemoreelError::driver(
                action,
                self.last_url.clone(),
                selector.map(str::to_string),
                other.to_string(),
            ),
        }
    }

    /// Mark a scene boundary, optionally showing a title slide.
    pub async fn scene(&mut self, title: &str, opts: SceneOptions) -> DemoreelResult<()> {
        if let Some(slide) = &opts.slide {
            for color in [&slide.brand_color, &slide.text_color].into_iter().flatten() {
                if !is_valid_hex_color(color) {
                    return Err(DemoreelError::invalid_argument(format!(
                        "malformed hex colour '{color}'"
                    )));
                }
            }
        }

        if self.mode == StageMode::DryRun {
            if let Some(narrate) = opts.slide.as_ref().and_then(|s| s.narrate.clone()) {
                self.collected_texts.push(narrate);
            }
            return Ok(());
        }

        self.emit(EventKind::Scene {
            title: title.to_string(),
            description: opts.description.clone(),
            slide: opts.slide.clone(),
        });

        let Some(slide) = opts.slide else {
            return Ok(());
        };

        // A narrated slide consumes the next pre-generated segment, spoken
        // over the slide itself.
        let narration = if self.voiceover && slide.narrate.is_some() {
            self.narrations_recorded += 1;
            match self.narration_queue.pop_front() {
                Some(segment) => Some(segment),
                None => {
                    return Err(DemoreelError::NarrationMismatch {
                        expected: self.narrations_expected,
                        recorded: self.narrations_recorded,
                    })
                }
            }
        } else {
            None
        };

        let capture = self.capture_handle()?;
        capture.pause().await;

        let (html, css) = build_slide_overlay(title, opts.description.as_deref(), &slide);
        let inject = { self.driver.lock().await.inject_overlay(&html, &css).await };
        if let Err(e) = inject {
            return Err(self.wrap_driver_err("scene", None, e));
        }

        let capture = self.capture_handle()?;
        let ts = capture.current_time_ms();
        let file = match capture.capture_one_frame(FrameLabel::Sequence).await {
            Ok(file) => file,
            Err(e) => return Err(self.wrap_driver_err("scene", None, e)),
        };

        // The slide dwells for its configured duration, stretched to cover
        // its narration when the audio runs longer.
        let slide_frames = ms_to_frames_ceil(slide.duration_or_default(), self.fps);
        let audio_frames = narration
            .as_ref()
            .map(|s| ms_to_frames_ceil(s.duration_ms, self.fps))
            .unwrap_or(0);
        let hold = slide_frames.max(audio_frames);
        if let Err(e) = capture.add_hold(&file, hold) {
            self.restore_capture();
            return Err(e);
        }

        if let Some(segment) = narration {
            self.emit_at(
                ts,
                EventKind::Narration {
                    text: segment.text.clone(),
                    audio_duration_ms: Some(segment.duration_ms),
                    audio_file: segment.audio_file.clone(),
                },
            );
        }

        let remove = { self.driver.lock().await.remove_overlay().await };
        if let Err(e) = remove {
            return Err(self.wrap_driver_err("scene", None, e));
        }

        // Capture stays paused; the next action resumes it.
        tracing::debug!(title, hold_frames = hold, "Slide scene recorded");
        Ok(())
    }

    /// Navigate the browser.
    pub async fn navigate(&mut self, url: &str, opts: ActionOptions) -> DemoreelResult<()> {
        if self.mode == StageMode::DryRun {
            if let Some(n) = opts.narration {
                self.collected_texts.push(n);
            }
            return Ok(());
        }

        if let Some(narration) = &opts.narration {
            self.narrate(narration).await?;
        }

        self.resume_unless_transition();
        let started = self.current_time_ms();

        let result = { self.driver.lock().await.goto(url).await };
        if let Err(e) = result {
            self.last_url = Some(url.to_string());
            return Err(self.wrap_driver_err("navigate", None, e));
        }
        self.last_url = Some(url.to_string());

        self.finish_pending_transition().await?;

        let settled = self.current_time_ms();
        self.emit_at(
            started,
            EventKind::Action {
                kind: ActionKind::Navigate,
                selector: url.to_string(),
                value: None,
                duration_ms: settled - started,
                bounding_box: None,
                settled_at_ms: Some(settled),
            },
        );
        Ok(())
    }

    /// Click an element.
    pub async fn click(&mut self, selector: &str, opts: ActionOptions) -> DemoreelResult<()> {
        self.pointer_action(ActionKind::Click, selector, None, opts)
            .await
    }

    /// Double-click an element.
    pub async fn dblclick(&mut self, selector: &str, opts: ActionOptions) -> DemoreelResult<()> {
        self.pointer_action(ActionKind::Dblclick, selector, None, opts)
            .await
    }

    /// Hover an element.
    pub async fn hover(&mut self, selector: &str, opts: ActionOptions) -> DemoreelResult<()> {
        self.pointer_action(ActionKind::Hover, selector, None, opts)
            .await
    }

    /// Fill an input, typing one character every 30 ms.
    pub async fn fill(
        &mut self,
        selector: &str,
        value: &str,
        opts: ActionOptions,
    ) -> DemoreelResult<()> {
        self.pointer_action(ActionKind::Fill, selector, Some(value.to_string()), opts)
            .await
    }

    /// Send a key press to an element.
    pub async fn press(
        &mut self,
        selector: &str,
        key: &str,
        opts: ActionOptions,
    ) -> DemoreelResult<()> {
        self.pointer_action(ActionKind::Press, selector, Some(key.to_string()), opts)
            .await
    }

    async fn pointer_action(
        &mut self,
        kind: ActionKind,
        selector: &str,
        value: Option<String>,
        opts: ActionOptions,
    ) -> DemoreelResult<()> {
        if self.mode == StageMode::DryRun {
            if let Some(n) = opts.narration {
                self.collected_texts.push(n);
            }
            return Ok(());
        }

        if let Some(narration) = &opts.narration {
            self.narrate(narration).await?;
        }

        self.resume_unless_transition();

        let action_name = action_name(kind);
        let bounding_box = {
            let result = self.driver.lock().await.bounding_box(selector).await;
            match result {
                Ok(b) => b,
                Err(e) => return Err(self.wrap_driver_err(action_name, Some(selector), e)),
            }
        };
        let target = bounding_box
            .as_ref()
            .map(BoundingBox::center)
            .unwrap_or_else(|| self.viewport.center());

        let move_duration = cursor_move_duration_ms(self.cursor, target);
        self.emit(EventKind::CursorTarget {
            from_x: self.cursor.0,
            from_y: self.cursor.1,
            to_x: target.0,
            to_y: target.1,
            move_duration_ms: move_duration,
            easing: "bezier".to_string(),
        });
        self.cursor = target;

        // Pace the recording so the action lands after the cursor arrives.
        if let Some(capture) = &self.capture {
            if !capture.is_paused() {
                capture.wait_for_duration(move_duration).await;
            }
        }

        let started = self.current_time_ms();
        let perform = async {
            let mut driver = self.driver.lock().await;
            match kind {
                ActionKind::Click => driver.click(selector).await,
                ActionKind::Dblclick => driver.dblclick(selector).await,
                ActionKind::Hover => driver.hover(selector).await,
                ActionKind::Press => {
                    driver
                        .press(selector, value.as_deref().unwrap_or("Enter"))
                        .await
                }
                ActionKind::Fill => {
                    for ch in value.as_deref().unwrap_or_default().chars() {
                        driver.type_char(selector, ch).await?;
                        tokio::time::sleep(std::time::Duration::from_millis(FILL_CHAR_DELAY_MS))
                            .await;
                    }
                    Ok(())
                }
                ActionKind::Navigate => unreachable!("navigate has its own path"),
            }
        };
        if let Err(e) = perform.await {
            return Err(self.wrap_driver_err(action_name, Some(selector), e));
        }

        self.finish_pending_transition().await?;

        let settled = self.current_time_ms();
        self.emit_at(
            started,
            EventKind::Action {
                kind,
                selector: selector.to_string(),
                value,
                duration_ms: settled - started,
                bounding_box,
                settled_at_ms: Some(settled),
            },
        );
        Ok(())
    }

    /// Insert an explicit pacing pause.
    pub async fn wait(&mut self, ms: i64) -> DemoreelResult<()> {
        if ms <= 0 {
            return Err(DemoreelError::invalid_argument(
                "wait duration must be positive",
            ));
        }
        if self.mode == StageMode::DryRun {
            return Ok(());
        }

        self.emit(EventKind::Wait {
            duration_ms: ms,
            reason: WaitReason::Pacing,
        });

        let capture = self.capture_handle()?;
        if capture.is_paused() {
            let file = match capture.last_file() {
                Some(file) => file,
                None => capture.capture_one_frame(FrameLabel::Sequence).await?,
            };
            capture.add_hold(&file, ms_to_frames_ceil(ms, self.fps))?;
        } else {
            capture.wait_for_duration(ms).await;
        }
        Ok(())
    }

    /// Speak one narration segment.
    ///
    /// In the recording pass the text has already been synthesised; the
    /// stage pops the next pre-generated segment and dwells for its audio
    /// duration. In a dry run the text is collected instead.
    pub async fn narrate(&mut self, text: &str) -> DemoreelResult<()> {
        if self.mode == StageMode::DryRun {
            self.collected_texts.push(text.to_string());
            return Ok(());
        }

        if !self.voiceover {
            self.emit(EventKind::Narration {
                text: text.to_string(),
                audio_duration_ms: None,
                audio_file: None,
            });
            return Ok(());
        }

        let Some(segment) = self.narration_queue.pop_front() else {
            self.narrations_recorded += 1;
            return Err(DemoreelError::NarrationMismatch {
                expected: self.narrations_expected,
                recorded: self.narrations_recorded,
            });
        };

        let capture = self.capture_handle()?;
        capture.pause().await;

        let ts = capture.current_time_ms();
        let file = match capture.capture_one_frame(FrameLabel::Sequence).await {
            Ok(file) => file,
            Err(e) => return Err(self.wrap_driver_err("narrate", None, e)),
        };
        if let Err(e) = capture.add_hold(&file, ms_to_frames_ceil(segment.duration_ms, self.fps)) {
            self.restore_capture();
            return Err(e);
        }

        self.emit_at(
            ts,
            EventKind::Narration {
                text: segment.text.clone(),
                audio_duration_ms: Some(segment.duration_ms),
                audio_file: segment.audio_file.clone(),
            },
        );
        self.narrations_recorded += 1;

        // An armed transition keeps the capture paused until its resolving
        // action completes it.
        if !self.transition_pending {
            self.capture_handle()?.resume();
        }
        Ok(())
    }

    /// Arm a transition; the next resolving action completes it.
    pub async fn transition(&mut self, opts: TransitionOptions) -> DemoreelResult<()> {
        let duration_ms = opts.duration_ms.unwrap_or(DEFAULT_TRANSITION_MS);
        if !duration_ms.is_finite() || duration_ms <= 0.0 {
            return Err(DemoreelError::invalid_argument(format!(
                "transition duration must be a positive finite number of ms, got {duration_ms}"
            )));
        }
        let kind = opts.kind.unwrap_or_default();

        if self.mode == StageMode::DryRun {
            return Ok(());
        }

        let capture = self.capture_handle()?;
        capture.pause().await;

        if self.transition_pending {
            tracing::warn!("transition() called twice without an intervening action; replacing the previous transition");
            self.markers.pop();
        }

        let capture = self.capture_handle()?;
        let before = match capture.capture_one_frame(FrameLabel::Transition).await {
            Ok(file) => file,
            Err(e) => return Err(self.wrap_driver_err("transition", None, e)),
        };

        let duration_frames = ms_to_frames_ceil(duration_ms.round() as i64, self.fps).max(1);
        let after_entry_index = self.capture_handle()?.manifest_len() - 1;
        self.markers.push(TransitionMarker {
            after_entry_index,
            kind,
            duration_frames,
            consumed_frames: 1,
            before_file: Some(before),
            after_file: None,
        });
        self.transition_pending = true;
        Ok(())
    }

    fn resume_unless_transition(&self) {
        if self.transition_pending {
            return;
        }
        if let Some(capture) = &self.capture {
            if capture.is_paused() {
                capture.resume();
            }
        }
    }

    async fn finish_pending_transition(&mut self) -> DemoreelResult<()> {
        if !self.transition_pending {
            return Ok(());
        }
        let capture = self.capture_handle()?;
        let after = match capture.capture_one_frame(FrameLabel::Transition).await {
            Ok(file) => file,
            Err(e) => return Err(self.wrap_driver_err("transition", None, e)),
        };
        if let Some(marker) = self.markers.last_mut() {
            marker.after_file = Some(after);
        }
        self.transition_pending = false;
        self.capture_handle()?.resume();
        Ok(())
    }

    /// Finish the recording: freeze the manifest, run the narration
    /// divergence check, validate, and return the timeline.
    pub async fn finalize(mut self) -> DemoreelResult<(Timeline, CaptureStats)> {
        if self.transition_pending {
            tracing::warn!("Discarding transition left pending at end of scenario");
            self.markers.pop();
            self.transition_pending = false;
        }

        if self.voiceover && self.narrations_recorded != self.narrations_expected {
            return Err(DemoreelError::NarrationMismatch {
                expected: self.narrations_expected,
                recorded: self.narrations_recorded,
            });
        }

        let capture = self
            .capture
            .take()
            .ok_or_else(|| DemoreelError::capture("dry-run stage cannot be finalized"))?;
        let stats = capture.stop().await;

        let metadata = Metadata {
            test_file: self.test_file.clone(),
            scenario_file: self.scenario_file.clone(),
            recorded_at: chrono::Utc::now().to_rfc3339(),
            viewport: self.viewport,
            fps: self.fps,
            frame_manifest: stats.manifest.clone(),
            transition_markers: self.markers.clone(),
        };
        let timeline = Timeline {
            version: demoreel_timeline_model::timeline::TIMELINE_VERSION,
            metadata,
            events: self.events.clone(),
        };

        validate(&timeline).map_err(|e| DemoreelError::schema(e.to_string()))?;
        Ok((timeline, stats))
    }
}

fn action_name(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Click => "click",
        ActionKind::Fill => "fill",
        ActionKind::Hover => "hover",
        ActionKind::Press => "press",
        ActionKind::Navigate => "navigate",
        ActionKind::Dblclick => "dblclick",
    }
}

/// Cursor travel time as a monotone function of Euclidean distance,
/// clamped to [200, 800] ms.
pub fn cursor_move_duration_ms(from: (i32, i32), to: (i32, i32)) -> i64 {
    let dx = (to.0 - from.0) as f64;
    let dy = (to.1 - from.1) as f64;
    let distance = (dx * dx + dy * dy).sqrt();
    (200.0 + distance * 0.75).round().clamp(200.0, 800.0) as i64
}

/// Build the injected title-slide overlay.
fn build_slide_overlay(
    title: &str,
    description: Option<&str>,
    slide: &SlideConfig,
) -> (String, String) {
    let brand = slide.brand_color.as_deref().unwrap_or("#111827");
    let text = slide.text_color.as_deref().unwrap_or("#F9FAFB");
    let font = slide
        .font_family
        .as_deref()
        .unwrap_or("system-ui, -apple-system, sans-serif");
    let size = slide.title_font_size.unwrap_or(56);

    let css = format!(
        "#demoreel-slide{{position:fixed;inset:0;z-index:2147483647;\
         display:flex;flex-direction:column;align-items:center;justify-content:center;\
         background:{brand};color:{text};font-family:{font};text-align:center;}}\
         #demoreel-slide h1{{font-size:{size}px;margin:0;font-weight:700;}}\
         #demoreel-slide p{{font-size:{sub}px;margin:16px 0 0;opacity:0.8;}}",
        sub = size / 2
    );

    let description_html = description
        .map(|d| format!("<p>{}</p>", escape_html(d)))
        .unwrap_or_default();
    let html = format!(
        "<div id=\"demoreel-slide\"><h1>{}</h1>{}</div>",
        escape_html(title),
        description_html
    );
    (html, css)
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
