//! Validate a timeline file.

use std::path::PathBuf;

use anyhow::anyhow;
use demoreel_timeline_model::timeline::Timeline;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    match Timeline::load(&path) {
        Ok(timeline) => {
            println!("OK: {}", path.display());
            println!("  Events: {}", timeline.events.len());
            println!(
                "  Manifest entries: {} ({} frames)",
                timeline.metadata.frame_manifest.len(),
                demoreel_timeline_model::manifest::expanded_frame_count(
                    &timeline.metadata.frame_manifest
                )
            );
            println!(
                "  Transitions: {}",
                timeline.metadata.transition_markers.len()
            );
            Ok(())
        }
        Err(e) => Err(anyhow!("validate failed: {e}")),
    }
}
