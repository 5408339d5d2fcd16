//! The compose pipeline: preprocess narration, record, render.

use std::path::{Path, PathBuf};

use anyhow::anyhow;
use demoreel_capture_engine::bridge::{BridgeConfig, BridgeDriver};
use demoreel_capture_engine::capture::{CaptureConfig, CaptureHandle};
use demoreel_capture_engine::driver::{share_driver, LaunchOptions};
use demoreel_capture_engine::scenario::{collect_narrations, Scenario, ScriptScenario};
use demoreel_capture_engine::stage::{QueuedNarration, Stage};
use demoreel_common::config::AppConfig;
use demoreel_narration::preprocess::{prepare_narration, NarrationPlan};
use demoreel_narration::silence::FfmpegSilenceDetector;
use demoreel_narration::tts::provider_from_config;
use demoreel_render_engine::render::{render_timeline, RenderOptions, RenderProgress};
use demoreel_timeline_model::timeline::ViewportSize;

pub struct ComposeArgs {
    pub scenario: PathBuf,
    pub out: Option<PathBuf>,
    pub resolution: Option<String>,
    pub no_voiceover: bool,
    pub no_cursor: bool,
    pub reuse_audio: Option<String>,
    pub config: AppConfig,
}

/// One pipeline step; failures are reported as `step: reason`.
fn step_err(step: &str, e: impl std::fmt::Display) -> anyhow::Error {
    let reason = e.to_string();
    let line = reason.lines().next().unwrap_or("unknown error").to_string();
    anyhow!("compose failed at {step}: {line}")
}

pub async fn run(args: ComposeArgs) -> anyhow::Result<()> {
    let resolution = args
        .resolution
        .as_deref()
        .map(parse_resolution)
        .transpose()
        .map_err(|e| step_err("arguments", e))?;

    let scenario =
        ScriptScenario::load(&args.scenario).map_err(|e| step_err("load-scenario", e))?;
    println!("Composing scenario: {}", scenario.name());

    let viewport = ViewportSize {
        width: args.config.recording.viewport_width,
        height: args.config.recording.viewport_height,
    };
    let fps = args.config.recording.fps;

    let (version_root, prev_version) =
        next_version_dir(&args.config.output_root, scenario.name())
            .map_err(|e| step_err("version-dir", e))?;
    std::fs::create_dir_all(&version_root).map_err(|e| step_err("version-dir", e))?;
    println!("  Version dir: {}", version_root.display());

    // Narration preprocessing: dry-run the scenario, synthesise one
    // continuous voice-over, align segments by silence.
    let narration_plan = if args.no_voiceover {
        None
    } else {
        let texts = collect_narrations(&scenario, viewport)
            .await
            .map_err(|e| step_err("narration-dry-run", e))?;
        if texts.is_empty() {
            None
        } else {
            let provider = provider_from_config(&args.config.narration)
                .map_err(|e| step_err("narration", e))?;
            let reuse_dir = resolve_reuse_dir(args.reuse_audio.as_deref(), prev_version.as_deref());
            let plan = prepare_narration(
                &texts,
                provider.as_ref(),
                &FfmpegSilenceDetector,
                &args.config.narration,
                &version_root.join("audio"),
                reuse_dir.as_deref(),
            )
            .await
            .map_err(|e| step_err("narration", e))?;
            write_script_md(&version_root, scenario.name(), &plan)
                .map_err(|e| step_err("narration", e))?;
            Some(plan)
        }
    };

    let queued: Vec<QueuedNarration> = narration_plan
        .as_ref()
        .map(|plan| {
            plan.segments
                .iter()
                .map(|s| QueuedNarration {
                    text: s.text.clone(),
                    duration_ms: s.duration_ms,
                    audio_file: s.audio_file.clone(),
                })
                .collect()
        })
        .unwrap_or_default();
    if !queued.is_empty() {
        println!("  Narration: {} segments", queued.len());
    }

    // Recording pass.
    let timeline = {
        let launch = LaunchOptions {
            viewport,
            device_pixel_ratio: 1.0,
            locale: args.config.recording.locale.clone(),
            timezone: args.config.recording.timezone.clone(),
            color_scheme: args.config.recording.color_scheme.clone(),
        };
        let bridge_config = bridge_config_from_env();
        let driver = BridgeDriver::launch(&bridge_config, &launch)
            .await
            .map_err(|e| step_err("record", e))?;
        let driver = share_driver(Box::new(driver));

        let capture = CaptureHandle::start(
            driver.clone(),
            CaptureConfig {
                fps,
                version_root: version_root.clone(),
            },
        )
        .map_err(|e| step_err("record", e))?;

        let mut stage = Stage::recording(
            driver.clone(),
            capture,
            viewport,
            queued,
            !args.no_voiceover,
            args.scenario.display().to_string(),
            scenario.name().to_string(),
        );

        let run_result = scenario.run(&mut stage).await;

        // Release the browser on every exit path.
        let close_driver = || async {
            let mut driver = driver.lock().await;
            if let Err(e) = driver.close().await {
                tracing::warn!(error = %e, "Browser close failed");
            }
        };

        match run_result {
            Ok(()) => {}
            Err(e) => {
                close_driver().await;
                return Err(step_err("record", e));
            }
        }

        let finalized = stage.finalize().await;
        close_driver().await;
        let (timeline, stats) = finalized.map_err(|e| step_err("record", e))?;
        println!(
            "  Recorded {} events, {} frames ({} screenshot failures)",
            timeline.events.len(),
            stats.frames_total,
            stats.screenshot_failures
        );
        timeline
    };

    let timeline_path = version_root.join("timeline.json");
    timeline
        .save(&timeline_path)
        .map_err(|e| step_err("persist", e))?;

    // Render pass.
    let output = args
        .out
        .clone()
        .unwrap_or_else(|| version_root.join("render.mp4"));
    let render_options = RenderOptions {
        output: output.clone(),
        resolution,
        crf: 18,
        draw_cursor: !args.no_cursor,
        workers: None,
    };

    let progress: demoreel_render_engine::render::ProgressCallback =
        Box::new(|p: RenderProgress| {
            print!(
                "\r  Rendering: {}/{} frames ({:.0}%)  ",
                p.frames_done,
                p.total_frames,
                p.frames_done as f64 / p.total_frames.max(1) as f64 * 100.0
            );
            use std::io::Write as _;
            std::io::stdout().flush().ok();
        });

    let out_path = tokio::task::spawn_blocking({
        let version_root = version_root.clone();
        move || render_timeline(&timeline, &version_root, &render_options, Some(progress))
    })
    .await
    .map_err(|e| step_err("render", e))?
    .map_err(|e| step_err("render", e))?;

    println!("\nDone: {}", out_path.display());
    Ok(())
}

fn bridge_config_from_env() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    if let Ok(command) = std::env::var("DEMOREEL_BRIDGE_COMMAND") {
        if !command.trim().is_empty() {
            config.command = command;
        }
    }
    config
}

/// Parse `WxH` into a resolution pair.
fn parse_resolution(raw: &str) -> Result<(u32, u32), String> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid resolution '{raw}' (expected WxH)"))?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width in '{raw}'"))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height in '{raw}'"))?;
    if width == 0 || height == 0 {
        return Err(format!("resolution must be non-zero, got '{raw}'"));
    }
    Ok((width, height))
}

/// Next version directory for a scenario, plus the latest existing one.
fn next_version_dir(
    output_root: &Path,
    scenario: &str,
) -> std::io::Result<(PathBuf, Option<PathBuf>)> {
    let scenario_root = output_root.join(scenario);
    let mut max_version = 0u32;

    if scenario_root.exists() {
        for entry in std::fs::read_dir(&scenario_root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(n) = name
                .to_str()
                .and_then(|s| s.strip_prefix('v'))
                .and_then(|s| s.parse::<u32>().ok())
            {
                max_version = max_version.max(n);
            }
        }
    }

    let next = scenario_root.join(format!("v{}", max_version + 1));
    let prev = (max_version > 0).then(|| scenario_root.join(format!("v{max_version}")));
    Ok((next, prev))
}

/// Resolve the `--reuse-audio` argument into a prior audio directory.
fn resolve_reuse_dir(reuse: Option<&str>, prev_version: Option<&Path>) -> Option<PathBuf> {
    match reuse {
        None => None,
        Some("") => prev_version.map(|p| p.join("audio")),
        Some(dir) => Some(PathBuf::from(dir)),
    }
}

/// Write the human-readable narration script next to the timeline.
fn write_script_md(
    version_root: &Path,
    scenario: &str,
    plan: &NarrationPlan,
) -> std::io::Result<()> {
    let Some(manifest) = &plan.manifest else {
        return Ok(());
    };
    let mut doc = format!("# Narration script: {scenario}\n\n");
    for segment in &manifest.segments {
        doc.push_str(&format!(
            "{}. [{} – {} ms] {}\n",
            segment.index + 1,
            segment.start_ms,
            segment.end_ms,
            segment.text
        ));
    }
    doc.push_str(&format!(
        "\nVoice: {} ({})\nTotal: {} ms, {} silences detected\n",
        manifest.voice,
        manifest.provider,
        manifest.total_duration_ms,
        manifest.silences_detected
    ));
    std::fs::write(version_root.join("script.md"), doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_parses_wxh() {
        assert_eq!(parse_resolution("1920x1080").unwrap(), (1920, 1080));
        assert_eq!(parse_resolution("1280X720").unwrap(), (1280, 720));
        assert!(parse_resolution("1920").is_err());
        assert!(parse_resolution("0x720").is_err());
        assert!(parse_resolution("wide x tall").is_err());
    }

    #[test]
    fn version_dirs_auto_increment() {
        let dir = tempfile::tempdir().unwrap();
        let (v1, prev) = next_version_dir(dir.path(), "tour").unwrap();
        assert!(v1.ends_with("tour/v1"));
        assert!(prev.is_none());

        std::fs::create_dir_all(dir.path().join("tour/v1")).unwrap();
        std::fs::create_dir_all(dir.path().join("tour/v3")).unwrap();
        std::fs::create_dir_all(dir.path().join("tour/not-a-version")).unwrap();

        let (next, prev) = next_version_dir(dir.path(), "tour").unwrap();
        assert!(next.ends_with("tour/v4"));
        assert!(prev.unwrap().ends_with("tour/v3"));
    }

    #[test]
    fn reuse_dir_resolution() {
        let prev = PathBuf::from("/demos/tour/v3");
        assert_eq!(resolve_reuse_dir(None, Some(&prev)), None);
        assert_eq!(
            resolve_reuse_dir(Some(""), Some(&prev)),
            Some(PathBuf::from("/demos/tour/v3/audio"))
        );
        assert_eq!(resolve_reuse_dir(Some(""), None), None);
        assert_eq!(
            resolve_reuse_dir(Some("/elsewhere/audio"), Some(&prev)),
            Some(PathBuf::from("/elsewhere/audio"))
        );
    }
}
