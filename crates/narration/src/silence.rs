//! Silence detection over synthesised narration audio.
//!
//! The production detector shells out to ffmpeg's `silencedetect` filter
//! and parses its stderr report. Detection sits behind a small trait so
//! alignment tests can inject silence lists directly.

use std::path::Path;
use std::process::Command;

use demoreel_common::error::{DemoreelError, DemoreelResult};
use serde::{Deserialize, Serialize};

/// One detected silence interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SilenceSpan {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl SilenceSpan {
    /// Length of the silence.
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    /// Midpoint, used as a segment boundary.
    pub fn midpoint_ms(&self) -> i64 {
        self.start_ms + self.duration_ms() / 2
    }
}

/// Detects silences in an audio file.
pub trait SilenceDetector: Send + Sync {
    fn detect(
        &self,
        audio: &Path,
        threshold_db: f64,
        min_duration_secs: f64,
    ) -> DemoreelResult<Vec<SilenceSpan>>;
}

/// ffmpeg `silencedetect` backed detector.
#[derive(Debug, Default)]
pub struct FfmpegSilenceDetector;

impl SilenceDetector for FfmpegSilenceDetector {
    fn detect(
        &self,
        audio: &Path,
        threshold_db: f64,
        min_duration_secs: f64,
    ) -> DemoreelResult<Vec<SilenceSpan>> {
        let filter = format!("silencedetect=noise={threshold_db}dB:d={min_duration_secs}");
        let output = Command::new("ffmpeg")
            .args(["-hide_banner", "-nostats", "-i"])
            .arg(audio)
            .args(["-af", &filter, "-f", "null", "-"])
            .output()
            .map_err(|e| DemoreelError::tts(format!("failed to run ffmpeg silencedetect: {e}")))?;

        if !output.status.success() {
            return Err(DemoreelError::tts(format!(
                "ffmpeg silencedetect failed (status {}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        // silencedetect reports on stderr.
        let stderr = String::from_utf8_lossy(&output.stderr);
        let spans = parse_silencedetect_output(&stderr);
        tracing::debug!(
            audio = %audio.display(),
            threshold_db,
            min_duration_secs,
            silences = spans.len(),
            "Silence detection complete"
        );
        Ok(spans)
    }
}

/// Parse ffmpeg `silencedetect` stderr lines into spans.
///
/// The filter emits pairs of lines:
/// `[silencedetect @ 0x...] silence_start: 1.8` and
/// `[silencedetect @ 0x...] silence_end: 2.1 | silence_duration: 0.3`.
pub fn parse_silencedetect_output(stderr: &str) -> Vec<SilenceSpan> {
    let mut spans = Vec::new();
    let mut pending_start: Option<i64> = None;

    for line in stderr.lines() {
        if let Some(value) = extract_field(line, "silence_start:") {
            pending_start = Some((value * 1000.0).round() as i64);
        } else if let Some(value) = extract_field(line, "silence_end:") {
            if let Some(start_ms) = pending_start.take() {
                let end_ms = (value * 1000.0).round() as i64;
                if end_ms > start_ms {
                    spans.push(SilenceSpan { start_ms, end_ms });
                }
            }
        }
    }

    spans
}

fn extract_field(line: &str, key: &str) -> Option<f64> {
    let idx = line.find(key)?;
    let rest = &line[idx + key.len()..];
    let token = rest.split_whitespace().next()?;
    token.parse::<f64>().ok()
}
