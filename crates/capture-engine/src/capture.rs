//! The cooperative capture loop.
//!
//! One tokio task screenshots the browser at the frame interval,
//! deduplicates identical consecutive frames into holds, and writes new
//! frames to disk with at most one outstanding write (the next screenshot
//! overlaps the previous frame's write). The scenario runner cooperates
//! through pause/resume: `pause` returns only after the loop has observed
//! the flag and flushed its pending write, so explicit single-frame
//! captures and holds can safely interleave.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use demoreel_common::error::{DemoreelError, DemoreelResult};
use demoreel_timeline_model::manifest::ManifestEntry;
use demoreel_timeline_model::time::ms_to_frames_ceil;
use tokio::sync::Notify;
use xxhash_rust::xxh3::xxh3_64;

use crate::clock::VirtualClock;
use crate::driver::SharedDriver;

/// Capture loop configuration.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Capture frame rate.
    pub fps: u32,

    /// Version directory; frame files land under `frames/` inside it and
    /// manifest entries store paths relative to it.
    pub version_root: PathBuf,
}

/// Purpose of an explicitly captured frame, which decides its filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLabel {
    /// Ordinary sequence frame (`frames/frame-NNNNNN.jpg`).
    Sequence,
    /// Transition boundary face (`frames/transition-NNNN.jpg`).
    Transition,
}

/// Final state of a finished capture.
#[derive(Debug)]
pub struct CaptureStats {
    /// The append-only frame manifest, frozen.
    pub manifest: Vec<ManifestEntry>,

    /// Expanded frames appended over the run.
    pub frames_total: u64,

    /// Screenshot failures skipped by the loop.
    pub screenshot_failures: u64,
}

struct CaptureState {
    clock: VirtualClock,
    manifest: Vec<ManifestEntry>,
    next_file_number: u64,
    next_transition_number: u64,
    last_hash: Option<u64>,
    screenshot_failures: u64,
}

/// Handle owned by the scenario runner; the loop runs until `stop`.
pub struct CaptureHandle {
    driver: SharedDriver,
    state: Arc<Mutex<CaptureState>>,
    paused: Arc<AtomicBool>,
    quiet: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    advanced: Arc<Notify>,
    quiesced: Arc<Notify>,
    version_root: PathBuf,
    fps: u32,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl CaptureHandle {
    /// Create the frames directory and start the capture loop (running).
    pub fn start(driver: SharedDriver, config: CaptureConfig) -> DemoreelResult<Self> {
        std::fs::create_dir_all(config.version_root.join("frames"))?;

        let state = Arc::new(Mutex::new(CaptureState {
            clock: VirtualClock::new(config.fps),
            manifest: Vec::new(),
            next_file_number: 0,
            next_transition_number: 0,
            last_hash: None,
            screenshot_failures: 0,
        }));
        let paused = Arc::new(AtomicBool::new(false));
        let quiet = Arc::new(AtomicBool::new(false));
        let stopped = Arc::new(AtomicBool::new(false));
        let advanced = Arc::new(Notify::new());
        let quiesced = Arc::new(Notify::new());

        let task = tokio::spawn(run_loop(LoopContext {
            driver: driver.clone(),
            state: state.clone(),
            paused: paused.clone(),
            quiet: quiet.clone(),
            stopped: stopped.clone(),
            advanced: advanced.clone(),
            quiesced: quiesced.clone(),
            version_root: config.version_root.clone(),
            fps: config.fps,
        }));

        Ok(Self {
            driver,
            state,
            paused,
            quiet,
            stopped,
            advanced,
            quiesced,
            version_root: config.version_root,
            fps: config.fps,
            task: Some(task),
        })
    }

    /// Capture frame rate.
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Current source time in milliseconds.
    pub fn current_time_ms(&self) -> i64 {
        self.state.lock().unwrap().clock.current_time_ms()
    }

    /// Current expanded frame index.
    pub fn frame_index(&self) -> u64 {
        self.state.lock().unwrap().clock.frame_index()
    }

    /// Number of manifest entries appended so far.
    pub fn manifest_len(&self) -> usize {
        self.state.lock().unwrap().manifest.len()
    }

    /// Backing file of the tail manifest entry.
    pub fn last_file(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .manifest
            .last()
            .map(|e| e.file().to_string())
    }

    /// Pause the loop; returns after it has quiesced and flushed.
    pub async fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        loop {
            if self.quiet.load(Ordering::SeqCst) {
                return;
            }
            let notified = self.quiesced.notified();
            if self.quiet.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    /// Resume the loop. Idempotent if already running.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.quiet.store(false, Ordering::SeqCst);
    }

    /// Whether the loop is currently paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Capture one frame immediately, bypassing dedup.
    ///
    /// Always writes a new file and advances the virtual clock by one frame.
    /// Used for sharp before/after boundaries around slides and transitions.
    pub async fn capture_one_frame(&self, label: FrameLabel) -> DemoreelResult<String> {
        let bytes = { self.driver.lock().await.screenshot().await? };
        let hash = xxh3_64(&bytes);

        let file = {
            let mut st = self.state.lock().unwrap();
            let file = match label {
                FrameLabel::Sequence => {
                    let f = sequence_file_name(st.next_file_number);
                    st.next_file_number += 1;
                    f
                }
                FrameLabel::Transition => {
                    let f = format!("frames/transition-{:04}.jpg", st.next_transition_number);
                    st.next_transition_number += 1;
                    f
                }
            };
            st.manifest.push(ManifestEntry::Frame { file: file.clone() });
            st.last_hash = Some(hash);
            st.clock.advance(1);
            file
        };

        tokio::fs::write(self.version_root.join(&file), &bytes).await?;
        self.advanced.notify_waiters();
        Ok(file)
    }

    /// Extend the tail by `count` virtual frames backed by `file`, without
    /// new I/O. Used for explicit dwell: slides, narration playback, waits
    /// while paused.
    pub fn add_hold(&self, file: &str, count: u64) -> DemoreelResult<()> {
        if count == 0 {
            return Ok(());
        }
        let mut st = self.state.lock().unwrap();
        if st.manifest.is_empty() {
            return Err(DemoreelError::capture(
                "cannot extend an empty manifest with a hold",
            ));
        }
        match st.manifest.last_mut() {
            Some(ManifestEntry::Hold {
                file: tail_file,
                count: tail_count,
            }) if tail_file == file => *tail_count += count,
            _ => st.manifest.push(ManifestEntry::Hold {
                file: file.to_string(),
                count,
            }),
        }
        st.clock.advance(count);
        drop(st);
        self.advanced.notify_waiters();
        Ok(())
    }

    /// Block until the virtual clock has advanced by at least
    /// `ceil(ms * fps / 1000)` frames from now.
    ///
    /// This couples real waits to captured frames: a loop running behind
    /// its target rate stretches the wait rather than desynchronising time.
    pub async fn wait_for_duration(&self, ms: i64) {
        let target = self.frame_index() + ms_to_frames_ceil(ms, self.fps);
        loop {
            if self.frame_index() >= target {
                return;
            }
            let notified = self.advanced.notified();
            if self.frame_index() >= target {
                return;
            }
            notified.await;
        }
    }

    /// Stop the loop and freeze the manifest.
    pub async fn stop(mut self) -> CaptureStats {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        let state = self.state.clone();
        drop(self);
        let st = Arc::try_unwrap(state)
            .map(|m| m.into_inner().unwrap())
            .unwrap_or_else(|arc| {
                let guard = arc.lock().unwrap();
                CaptureState {
                    clock: VirtualClock::new(guard.clock.fps()),
                    manifest: guard.manifest.clone(),
                    next_file_number: guard.next_file_number,
                    next_transition_number: guard.next_transition_number,
                    last_hash: guard.last_hash,
                    screenshot_failures: guard.screenshot_failures,
                }
            });
        st.clock.warn_if_drifted();
        let frames_total = demoreel_timeline_model::manifest::expanded_frame_count(&st.manifest);
        tracing::info!(
            frames = frames_total,
            entries = st.manifest.len(),
            screenshot_failures = st.screenshot_failures,
            "Capture stopped"
        );
        CaptureStats {
            manifest: st.manifest,
            frames_total,
            screenshot_failures: st.screenshot_failures,
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        // A handle dropped without `stop` (error paths) must not leave the
        // loop task screenshotting forever.
        self.stopped.store(true, Ordering::SeqCst);
    }
}

fn sequence_file_name(n: u64) -> String {
    format!("frames/frame-{n:06}.jpg")
}

struct LoopContext {
    driver: SharedDriver,
    state: Arc<Mutex<CaptureState>>,
    paused: Arc<AtomicBool>,
    quiet: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    advanced: Arc<Notify>,
    quiesced: Arc<Notify>,
    version_root: PathBuf,
    fps: u32,
}

async fn run_loop(ctx: LoopContext) {
    let interval = Duration::from_millis((1000 / ctx.fps.max(1)) as u64);
    let mut pending_write: Option<tokio::task::JoinHandle<std::io::Result<()>>> = None;

    loop {
        if ctx.stopped.load(Ordering::SeqCst) {
            flush_pending(&mut pending_write).await;
            ctx.quiet.store(true, Ordering::SeqCst);
            ctx.quiesced.notify_waiters();
            return;
        }

        if ctx.paused.load(Ordering::SeqCst) {
            flush_pending(&mut pending_write).await;
            ctx.quiet.store(true, Ordering::SeqCst);
            ctx.quiesced.notify_waiters();
            tokio::time::sleep(Duration::from_millis(5)).await;
            continue;
        }

        let tick = Instant::now();
        let shot = { ctx.driver.lock().await.screenshot().await };

        match shot {
            Err(e) => {
                let mut st = ctx.state.lock().unwrap();
                st.screenshot_failures += 1;
                st.clock.record_idle_tick(tick.elapsed());
                let failures = st.screenshot_failures;
                drop(st);
                tracing::warn!(error = %e, failures, "Screenshot failed; skipping tick");
            }
            Ok(bytes) => {
                let hash = xxh3_64(&bytes);
                let duplicate = { ctx.state.lock().unwrap().last_hash == Some(hash) };

                if duplicate {
                    let mut st = ctx.state.lock().unwrap();
                    match st.manifest.last_mut() {
                        Some(ManifestEntry::Hold { count, .. }) => *count += 1,
                        Some(ManifestEntry::Frame { file }) => {
                            let file = file.clone();
                            st.manifest.push(ManifestEntry::Hold { file, count: 1 });
                        }
                        None => {}
                    }
                    st.clock.advance(1);
                    st.clock.record_loop_tick(tick.elapsed());
                    drop(st);
                    ctx.advanced.notify_waiters();
                } else {
                    // One write may be in flight; wait for it before
                    // issuing the next so ordering on disk is simple.
                    flush_pending(&mut pending_write).await;

                    let file = {
                        let mut st = ctx.state.lock().unwrap();
                        let file = sequence_file_name(st.next_file_number);
                        st.next_file_number += 1;
                        st.manifest.push(ManifestEntry::Frame { file: file.clone() });
                        st.last_hash = Some(hash);
                        st.clock.advance(1);
                        st.clock.record_loop_tick(tick.elapsed());
                        file
                    };

                    let path = ctx.version_root.join(&file);
                    pending_write =
                        Some(tokio::task::spawn_blocking(move || std::fs::write(path, bytes)));
                    ctx.advanced.notify_waiters();
                }
            }
        }

        let elapsed = tick.elapsed();
        if elapsed < interval {
            tokio::time::sleep(interval - elapsed).await;
        }
    }
}

async fn flush_pending(pending: &mut Option<tokio::task::JoinHandle<std::io::Result<()>>>) {
    if let Some(handle) = pending.take() {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Frame write failed"),
            Err(e) => tracing::error!(error = %e, "Frame write task panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{share_driver, BrowserDriver, NullDriver};
    use async_trait::async_trait;
    use demoreel_common::error::DemoreelResult;
    use demoreel_timeline_model::event::BoundingBox;

    /// Driver whose screenshots change every `change_every` calls, to
    /// exercise dedup.
    struct SteppingDriver {
        calls: u64,
        change_every: u64,
    }

    #[async_trait]
    impl BrowserDriver for SteppingDriver {
        async fn goto(&mut self, _url: &str) -> DemoreelResult<()> {
            Ok(())
        }
        async fn screenshot(&mut self) -> DemoreelResult<Vec<u8>> {
            self.calls += 1;
            let generation = (self.calls - 1) / self.change_every;
            Ok(generation.to_le_bytes().to_vec())
        }
        async fn click(&mut self, _selector: &str) -> DemoreelResult<()> {
            Ok(())
        }
        async fn dblclick(&mut self, _selector: &str) -> DemoreelResult<()> {
            Ok(())
        }
        async fn hover(&mut self, _selector: &str) -> DemoreelResult<()> {
            Ok(())
        }
        async fn press(&mut self, _selector: &str, _key: &str) -> DemoreelResult<()> {
            Ok(())
        }
        async fn type_char(&mut self, _selector: &str, _ch: char) -> DemoreelResult<()> {
            Ok(())
        }
        async fn bounding_box(&mut self, _s: &str) -> DemoreelResult<Option<BoundingBox>> {
            Ok(None)
        }
        async fn inject_overlay(&mut self, _html: &str, _css: &str) -> DemoreelResult<()> {
            Ok(())
        }
        async fn remove_overlay(&mut self) -> DemoreelResult<()> {
            Ok(())
        }
        async fn close(&mut self) -> DemoreelResult<()> {
            Ok(())
        }
    }

    fn test_config(dir: &tempfile::TempDir, fps: u32) -> CaptureConfig {
        CaptureConfig {
            fps,
            version_root: dir.path().to_path_buf(),
        }
    }

    #[tokio::test]
    async fn identical_frames_dedup_into_holds() {
        let dir = tempfile::tempdir().unwrap();
        let driver = share_driver(Box::new(NullDriver::new()));
        let capture = CaptureHandle::start(driver, test_config(&dir, 100)).unwrap();

        capture.wait_for_duration(60).await;
        capture.pause().await;

        let stats = capture.stop().await;
        // Fixed screenshot bytes: exactly one distinct frame, rest held.
        let distinct = stats
            .manifest
            .iter()
            .filter(|e| matches!(e, ManifestEntry::Frame { .. }))
            .count();
        assert_eq!(distinct, 1);
        assert!(stats.frames_total >= 2);
    }

    #[tokio::test]
    async fn changing_frames_write_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let driver = share_driver(Box::new(SteppingDriver {
            calls: 0,
            change_every: 1,
        }));
        let capture = CaptureHandle::start(driver, test_config(&dir, 100)).unwrap();

        capture.wait_for_duration(50).await;
        let stats = capture.stop().await;

        let frames: Vec<_> = stats
            .manifest
            .iter()
            .filter(|e| matches!(e, ManifestEntry::Frame { .. }))
            .collect();
        assert!(frames.len() >= 2);
        for entry in frames {
            assert!(dir.path().join(entry.file()).exists());
        }
    }

    #[tokio::test]
    async fn pause_quiesces_and_holds_extend_clock() {
        let dir = tempfile::tempdir().unwrap();
        let driver = share_driver(Box::new(NullDriver::new()));
        let capture = CaptureHandle::start(driver, test_config(&dir, 100)).unwrap();

        capture.wait_for_duration(30).await;
        capture.pause().await;
        let frozen = capture.frame_index();

        // The paused loop appends nothing.
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(capture.frame_index(), frozen);

        let file = capture.last_file().unwrap();
        capture.add_hold(&file, 10).unwrap();
        assert_eq!(capture.frame_index(), frozen + 10);

        // wait_for_duration returns instantly once holds cover the span.
        capture.wait_for_duration(0).await;

        capture.resume();
        capture.wait_for_duration(20).await;
        assert!(capture.frame_index() > frozen + 10);
        capture.stop().await;
    }

    #[tokio::test]
    async fn explicit_capture_bypasses_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let driver = share_driver(Box::new(NullDriver::new()));
        let capture = CaptureHandle::start(driver, test_config(&dir, 100)).unwrap();

        capture.pause().await;
        let a = capture.capture_one_frame(FrameLabel::Sequence).await.unwrap();
        let b = capture.capture_one_frame(FrameLabel::Sequence).await.unwrap();
        let t = capture
            .capture_one_frame(FrameLabel::Transition)
            .await
            .unwrap();

        assert_ne!(a, b);
        assert!(t.contains("transition-0000"));
        assert!(dir.path().join(&a).exists());
        assert!(dir.path().join(&t).exists());

        let stats = capture.stop().await;
        assert!(stats.frames_total >= 3);
    }

    #[tokio::test]
    async fn resume_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let driver = share_driver(Box::new(NullDriver::new()));
        let capture = CaptureHandle::start(driver, test_config(&dir, 100)).unwrap();

        capture.resume();
        capture.resume();
        capture.wait_for_duration(20).await;
        assert!(capture.frame_index() > 0);
        capture.stop().await;
    }
}
