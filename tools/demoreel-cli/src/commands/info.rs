//! Show a recorded version's summary.

use std::path::PathBuf;

use anyhow::anyhow;
use demoreel_timeline_model::manifest::{expanded_frame_count, total_output_frames};
use demoreel_timeline_model::timeline::Timeline;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let timeline_path = path.join("timeline.json");
    let timeline = Timeline::load(&timeline_path)
        .map_err(|e| anyhow!("info failed: {e}"))?;

    let meta = &timeline.metadata;
    let source_frames = expanded_frame_count(&meta.frame_manifest);
    let output_frames = total_output_frames(&meta.frame_manifest, &meta.transition_markers);

    println!("Recording: {}", meta.scenario_file);
    println!("  Recorded at: {}", meta.recorded_at);
    println!(
        "  Viewport: {}x{} @ {} fps",
        meta.viewport.width, meta.viewport.height, meta.fps
    );
    println!(
        "  Source frames: {source_frames} ({} manifest entries)",
        meta.frame_manifest.len()
    );
    println!(
        "  Output frames: {output_frames} ({:.1}s)",
        output_frames as f64 / meta.fps.max(1) as f64
    );
    println!("  Events: {}", timeline.events.len());
    println!("  Transitions: {}", meta.transition_markers.len());

    for artifact in ["render.mp4", "audio/narration-manifest.json", "script.md"] {
        let exists = path.join(artifact).exists();
        println!("  {artifact}: {}", if exists { "present" } else { "missing" });
    }
    Ok(())
}
