//! The render driver.
//!
//! Validates the timeline, plans every output frame, rasterises them on a
//! rayon worker pool (the resolver and planner are pure, so frames are
//! embarrassingly parallel), and streams them in order into the encoder.
//! Partial outputs are left on disk when a render fails.

use std::path::{Path, PathBuf};

use demoreel_common::error::{DemoreelError, DemoreelResult};
use demoreel_timeline_model::event::EventKind;
use demoreel_timeline_model::time::SourceMs;
use demoreel_timeline_model::timeline::Timeline;
use demoreel_timeline_model::validate::validate;
use rayon::prelude::*;

use crate::compose::{Compositor, CompositorOptions, ImageCache};
use crate::encode::{AudioTrack, EncoderConfig, FfmpegEncoder};
use crate::remap::output_ms_for_source_ms;

/// Frames rasterised per scheduling chunk.
const CHUNK_FRAMES: u64 = 32;

/// Render configuration.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Output container path.
    pub output: PathBuf,

    /// Output resolution; defaults to the captured viewport.
    pub resolution: Option<(u32, u32)>,

    /// x264 constant rate factor.
    pub crf: u32,

    /// Draw the synthetic cursor and click ripples.
    pub draw_cursor: bool,

    /// Worker count; defaults to ~75% of available cores, minimum 2.
    pub workers: Option<usize>,
}

/// Progress report for the render stage.
#[derive(Debug, Clone, Copy)]
pub struct RenderProgress {
    pub frames_done: u64,
    pub total_frames: u64,
}

/// Progress callback.
pub type ProgressCallback = Box<dyn Fn(RenderProgress) + Send>;

/// Worker count for the render pool.
pub fn default_worker_count() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    (cores * 3 / 4).max(2)
}

/// Locate the narration track and its output-timeline offset.
///
/// Exactly one narration event carries the audio file reference; the track
/// is placed at that event's output timestamp.
pub fn narration_audio_track(timeline: &Timeline, version_root: &Path) -> Option<AudioTrack> {
    timeline.events.iter().find_map(|event| {
        let EventKind::Narration {
            audio_file: Some(audio_file),
            ..
        } = &event.kind
        else {
            return None;
        };
        let offset = output_ms_for_source_ms(
            SourceMs(event.timestamp_ms),
            &timeline.metadata.frame_manifest,
            &timeline.metadata.transition_markers,
            timeline.metadata.fps,
        );
        Some(AudioTrack {
            path: version_root.join(audio_file),
            offset_ms: offset.0,
        })
    })
}

/// Render a validated timeline into an encoded video file.
pub fn render_timeline(
    timeline: &Timeline,
    version_root: &Path,
    options: &RenderOptions,
    progress: Option<ProgressCallback>,
) -> DemoreelResult<PathBuf> {
    validate(timeline).map_err(|e| DemoreelError::schema(e.to_string()))?;

    let compositor = Compositor::new(
        timeline,
        CompositorOptions {
            draw_cursor: options.draw_cursor,
            draw_chrome: true,
        },
    );
    let total_frames = compositor.total_output_frames();
    let viewport = timeline.metadata.viewport;

    let audio = narration_audio_track(timeline, version_root);
    let mut encoder_config = EncoderConfig::new(viewport.width, viewport.height, timeline.metadata.fps);
    encoder_config.crf = options.crf;
    encoder_config.audio = audio;
    if let Some((w, h)) = options.resolution {
        if (w, h) != (viewport.width, viewport.height) {
            encoder_config.scale = Some((w, h));
        }
    }

    let workers = options.workers.unwrap_or_else(default_worker_count);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| DemoreelError::render(format!("failed to build render pool: {e}")))?;

    tracing::info!(
        total_frames,
        workers,
        out = %options.output.display(),
        "Render started"
    );

    let mut encoder = FfmpegEncoder::start(&options.output, &encoder_config)?;
    let started = std::time::Instant::now();

    let mut frame = 0u64;
    while frame < total_frames {
        let end = (frame + CHUNK_FRAMES).min(total_frames);
        let rendered: Vec<DemoreelResult<image::RgbaImage>> = pool.install(|| {
            (frame..end)
                .into_par_iter()
                .map_init(
                    || ImageCache::new(version_root),
                    |cache, f| compositor.render(&compositor.plan(f), cache),
                )
                .collect()
        });

        for result in rendered {
            let image = result?;
            encoder.push_frame(image.as_raw())?;
        }

        frame = end;
        if let Some(cb) = &progress {
            cb(RenderProgress {
                frames_done: frame,
                total_frames,
            });
        }
    }

    encoder.finish()?;
    tracing::info!(
        total_frames,
        elapsed_secs = started.elapsed().as_secs_f64(),
        "Render finished"
    );
    Ok(options.output.clone())
}
