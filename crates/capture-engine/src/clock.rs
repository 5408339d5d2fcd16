//! The virtual frame clock.
//!
//! Source time is defined as `frame_index * 1000 / fps`: the clock advances
//! only when a virtual frame is appended to the manifest, whether by the
//! capture loop or by an explicit hold. Wall-clock time never leaks into
//! event timestamps, so a capture loop that falls behind its target rate
//! cannot desynchronise the timeline.

use std::time::{Duration, Instant};

use demoreel_timeline_model::time::frame_to_ms;

/// Monotonic virtual clock backed by the appended-frame count.
#[derive(Debug)]
pub struct VirtualClock {
    fps: u32,
    frame_index: u64,
    started: Instant,
    /// Wall time spent with the capture loop running (drift accounting).
    active: Duration,
    /// Frames appended by the periodic loop (excludes explicit holds).
    loop_frames: u64,
}

impl VirtualClock {
    /// Create a clock at frame 0.
    pub fn new(fps: u32) -> Self {
        debug_assert!(fps > 0);
        Self {
            fps,
            frame_index: 0,
            started: Instant::now(),
            active: Duration::ZERO,
            loop_frames: 0,
        }
    }

    /// Capture frame rate.
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Current expanded frame index.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Current source time in milliseconds.
    pub fn current_time_ms(&self) -> i64 {
        frame_to_ms(self.frame_index, self.fps)
    }

    /// Advance by `frames` virtual frames.
    pub fn advance(&mut self, frames: u64) {
        self.frame_index += frames;
    }

    /// Record one frame appended by the periodic loop along with the wall
    /// time its tick consumed.
    pub fn record_loop_tick(&mut self, wall: Duration) {
        self.loop_frames += 1;
        self.active += wall;
    }

    /// Record wall time for a tick that appended nothing (failed screenshot).
    pub fn record_idle_tick(&mut self, wall: Duration) {
        self.active += wall;
    }

    /// Achieved capture rate of the periodic loop, if it ran at all.
    pub fn achieved_fps(&self) -> Option<f64> {
        let secs = self.active.as_secs_f64();
        if secs <= 0.0 || self.loop_frames == 0 {
            return None;
        }
        Some(self.loop_frames as f64 / secs)
    }

    /// Warn when the achieved rate fell below 85% of target over the run.
    pub fn warn_if_drifted(&self) {
        if let Some(achieved) = self.achieved_fps() {
            let floor = self.fps as f64 * 0.85;
            if achieved < floor {
                tracing::warn!(
                    target_fps = self.fps,
                    achieved_fps = format!("{achieved:.1}").as_str(),
                    "Capture rate fell below 85% of target; timing derived from the \
                     virtual clock remains consistent"
                );
            }
        }
    }

    /// Wall time since the clock was created.
    pub fn wall_elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_advances_by_frames_not_wall_time() {
        let mut clock = VirtualClock::new(30);
        assert_eq!(clock.current_time_ms(), 0);
        clock.advance(1);
        assert_eq!(clock.current_time_ms(), 33);
        clock.advance(29);
        assert_eq!(clock.current_time_ms(), 1000);
    }

    #[test]
    fn achieved_fps_reflects_loop_ticks() {
        let mut clock = VirtualClock::new(30);
        assert!(clock.achieved_fps().is_none());
        for _ in 0..30 {
            clock.record_loop_tick(Duration::from_millis(50));
        }
        // 30 frames over 1.5s of active wall time = 20 fps.
        let achieved = clock.achieved_fps().unwrap();
        assert!((achieved - 20.0).abs() < 0.1);
    }

    #[test]
    fn explicit_holds_do_not_count_toward_loop_rate() {
        let mut clock = VirtualClock::new(30);
        clock.advance(60);
        assert!(clock.achieved_fps().is_none());
        assert_eq!(clock.frame_index(), 60);
    }
}
