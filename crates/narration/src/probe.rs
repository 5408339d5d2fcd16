//! Audio duration probing.
//!
//! ffprobe is authoritative; when it is unavailable or fails, WAV files
//! from a provider with known PCM parameters fall back to a size-based
//! estimate.

use std::path::Path;
use std::process::Command;

use demoreel_common::error::{DemoreelError, DemoreelResult};

use crate::tts::PcmParams;

/// WAV header bytes skipped by the size-based estimate.
const WAV_HEADER_BYTES: u64 = 44;

/// Probe a media file's duration via ffprobe.
pub fn probe_duration_ms(path: &Path) -> Option<i64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let raw = String::from_utf8(output.stdout).ok()?;
    let secs = raw.lines().next()?.trim().parse::<f64>().ok()?;
    if !secs.is_finite() || secs <= 0.0 {
        return None;
    }

    Some((secs * 1000.0).round() as i64)
}

/// Estimate duration from file size and PCM parameters.
pub fn estimate_duration_ms_from_pcm(path: &Path, params: &PcmParams) -> Option<i64> {
    let size = std::fs::metadata(path).ok()?.len();
    let payload = size.saturating_sub(WAV_HEADER_BYTES);
    let bytes_per_sec =
        params.sample_rate as u64 * params.channels as u64 * (params.bits_per_sample as u64 / 8);
    if bytes_per_sec == 0 {
        return None;
    }
    Some(((payload * 1000) / bytes_per_sec) as i64)
}

/// Duration of `path` in milliseconds: ffprobe first, PCM estimate second.
pub fn duration_ms(path: &Path, pcm: Option<&PcmParams>) -> DemoreelResult<i64> {
    if let Some(ms) = probe_duration_ms(path) {
        return Ok(ms);
    }
    if let Some(params) = pcm {
        if let Some(ms) = estimate_duration_ms_from_pcm(path, params) {
            tracing::warn!(
                path = %path.display(),
                ms,
                "ffprobe unavailable; using PCM size estimate for audio duration"
            );
            return Ok(ms);
        }
    }
    Err(DemoreelError::tts(format!(
        "could not determine duration of {}",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_estimate_matches_known_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        // 1 second of 24 kHz mono 16-bit PCM plus a 44-byte header.
        let bytes = vec![0u8; 44 + 24_000 * 2];
        std::fs::write(&path, bytes).unwrap();

        let params = PcmParams {
            sample_rate: 24_000,
            channels: 1,
            bits_per_sample: 16,
        };
        assert_eq!(estimate_duration_ms_from_pcm(&path, &params), Some(1000));
    }

    #[test]
    fn pcm_estimate_rejects_zero_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        std::fs::write(&path, vec![0u8; 100]).unwrap();
        let params = PcmParams {
            sample_rate: 0,
            channels: 1,
            bits_per_sample: 16,
        };
        assert_eq!(estimate_duration_ms_from_pcm(&path, &params), None);
    }
}
