//! ffmpeg encoder sink.
//!
//! Spawns the system `ffmpeg` and streams raw RGBA frames to its stdin.
//! One optional narration track is muxed in with a millisecond offset.
//! stderr is drained on a separate thread and surfaced when encoding
//! fails.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use demoreel_common::error::{DemoreelError, DemoreelResult};

/// The narration audio muxed into the container.
#[derive(Debug, Clone)]
pub struct AudioTrack {
    pub path: PathBuf,

    /// Placement of the track on the output timeline.
    pub offset_ms: i64,
}

/// Encoder configuration.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Input frame dimensions (the captured viewport).
    pub width: u32,
    pub height: u32,

    /// Output frame rate.
    pub fps: u32,

    /// x264 constant rate factor.
    pub crf: u32,

    /// Output pixel format.
    pub pix_fmt: String,

    /// Video codec.
    pub codec: String,

    /// Optional output scaling (width, height).
    pub scale: Option<(u32, u32)>,

    /// Optional narration track.
    pub audio: Option<AudioTrack>,
}

impl EncoderConfig {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps,
            crf: 18,
            pix_fmt: "yuv420p".to_string(),
            codec: "libx264".to_string(),
            scale: None,
            audio: None,
        }
    }
}

/// Streaming encoder around an ffmpeg child process.
#[derive(Debug)]
pub struct FfmpegEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    frame_bytes: usize,
    frames_pushed: u64,
}

impl FfmpegEncoder {
    /// Spawn ffmpeg writing to `out_path`.
    pub fn start(out_path: &Path, config: &EncoderConfig) -> DemoreelResult<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(DemoreelError::render("encoder dimensions must be non-zero"));
        }
        let (out_w, out_h) = config.scale.unwrap_or((config.width, config.height));
        if out_w % 2 != 0 || out_h % 2 != 0 {
            return Err(DemoreelError::render(format!(
                "output dimensions must be even for {} ({}x{})",
                config.pix_fmt, out_w, out_h
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(DemoreelError::render(
                "ffmpeg is required for encoding but was not found on PATH",
            ));
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.args(["-y", "-loglevel", "error"]);

        // Video input: raw RGBA frames on stdin.
        cmd.args([
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", config.width, config.height),
            "-r",
            &config.fps.to_string(),
            "-i",
            "pipe:0",
        ]);

        if let Some(audio) = &config.audio {
            cmd.args(["-itsoffset", &format!("{:.3}", audio.offset_ms as f64 / 1000.0)]);
            cmd.arg("-i").arg(&audio.path);
        }

        if let Some((w, h)) = config.scale {
            cmd.args(["-vf", &format!("scale={w}:{h}:flags=lanczos")]);
        }

        cmd.args([
            "-c:v",
            &config.codec,
            "-crf",
            &config.crf.to_string(),
            "-pix_fmt",
            &config.pix_fmt,
        ]);

        if config.audio.is_some() {
            cmd.args(["-map", "0:v", "-map", "1:a", "-c:a", "aac"]);
        } else {
            cmd.arg("-an");
        }

        cmd.args(["-movflags", "+faststart"]);
        cmd.arg(out_path);

        let mut child = cmd.spawn().map_err(|e| {
            DemoreelError::render(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DemoreelError::render("failed to open ffmpeg stdin"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| DemoreelError::render("failed to open ffmpeg stderr"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        tracing::info!(
            out = %out_path.display(),
            size = format!("{}x{}", config.width, config.height).as_str(),
            fps = config.fps,
            crf = config.crf,
            audio = config.audio.is_some(),
            "Encoder started"
        );

        Ok(Self {
            child,
            stdin: Some(stdin),
            stderr_drain: Some(stderr_drain),
            frame_bytes: (config.width * config.height * 4) as usize,
            frames_pushed: 0,
        })
    }

    /// Push one RGBA frame. Frames must arrive in output order.
    pub fn push_frame(&mut self, rgba: &[u8]) -> DemoreelResult<()> {
        if rgba.len() != self.frame_bytes {
            return Err(DemoreelError::render(format!(
                "frame byte size mismatch: got {}, expected {}",
                rgba.len(),
                self.frame_bytes
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| DemoreelError::render("encoder already finished"))?;

        use std::io::Write as _;
        stdin
            .write_all(rgba)
            .map_err(|e| DemoreelError::render(format!("failed writing frame to ffmpeg: {e}")))?;
        self.frames_pushed += 1;
        Ok(())
    }

    /// Number of frames pushed so far.
    pub fn frames_pushed(&self) -> u64 {
        self.frames_pushed
    }

    /// Close stdin, wait for ffmpeg, and surface any encode failure.
    pub fn finish(mut self) -> DemoreelResult<()> {
        drop(self.stdin.take());

        let status = self
            .child
            .wait()
            .map_err(|e| DemoreelError::render(format!("failed waiting for ffmpeg: {e}")))?;

        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| DemoreelError::render("ffmpeg stderr drain thread panicked"))?
                .unwrap_or_default(),
            None => Vec::new(),
        };

        if !status.success() {
            return Err(DemoreelError::render(format!(
                "ffmpeg exited with {}: {}",
                status,
                String::from_utf8_lossy(&stderr_bytes).trim()
            )));
        }

        tracing::info!(frames = self.frames_pushed, "Encoder finished");
        Ok(())
    }
}

/// Whether `ffmpeg` can be invoked from PATH.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
