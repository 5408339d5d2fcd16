//! Narration preprocessing orchestration.
//!
//! Runs before the recording pass: concatenate the dry-run narration texts
//! into one script, synthesise (or reuse) a single audio file, detect
//! silences, align segment windows, and persist the manifest. The
//! recording pass consumes the returned segments in order.

use std::path::{Path, PathBuf};

use demoreel_common::config::NarrationConfig;
use demoreel_common::error::DemoreelResult;

use crate::align::{align_segments, AlignmentMethod};
use crate::manifest::{build_full_script, script_hash, ManifestSegment, NarrationManifest};
use crate::probe::duration_ms;
use crate::silence::SilenceDetector;
use crate::tts::TtsProvider;

/// One segment ready for the recording pass.
///
/// Only the first segment carries the audio file reference; the compositor
/// plays one continuous track and later segments exist to drive holds.
#[derive(Debug, Clone)]
pub struct PreparedSegment {
    pub text: String,
    pub duration_ms: i64,
    pub audio_file: Option<String>,
}

/// The full narration plan for one compose.
#[derive(Debug)]
pub struct NarrationPlan {
    /// Persisted manifest, absent when the scenario has no narration.
    pub manifest: Option<NarrationManifest>,

    /// Segments in scenario order.
    pub segments: Vec<PreparedSegment>,

    /// Absolute path to the synthesised audio.
    pub audio_path: Option<PathBuf>,

    /// Audio path relative to the version root (`audio/narration-full.*`).
    pub audio_rel: Option<String>,
}

impl NarrationPlan {
    fn empty() -> Self {
        Self {
            manifest: None,
            segments: Vec::new(),
            audio_path: None,
            audio_rel: None,
        }
    }
}

/// Prepare the narration audio and segment windows for `texts`.
///
/// `audio_dir` is the version's `audio/` directory. `reuse_dir` names a
/// prior version's `audio/` directory whose audio may be copied when the
/// script hash matches.
pub async fn prepare_narration(
    texts: &[String],
    provider: &dyn TtsProvider,
    detector: &dyn SilenceDetector,
    config: &NarrationConfig,
    audio_dir: &Path,
    reuse_dir: Option<&Path>,
) -> DemoreelResult<NarrationPlan> {
    if texts.is_empty() {
        return Ok(NarrationPlan::empty());
    }

    std::fs::create_dir_all(audio_dir)?;

    let audio_name = format!("narration-full.{}", provider.file_extension());
    let audio_path = audio_dir.join(&audio_name);
    let manifest_path = audio_dir.join("narration-manifest.json");
    let audio_rel = format!("audio/{audio_name}");

    let full_script = build_full_script(texts);
    let hash = script_hash(&full_script);

    // Cache hit in the target directory itself (idempotent re-runs).
    if let Some(manifest) = load_matching_manifest(&manifest_path, &audio_path, &hash) {
        tracing::info!(hash = %hash, "Reusing cached narration audio");
        return Ok(plan_from_manifest(manifest, audio_path, audio_rel));
    }

    // Opt-in reuse from a prior version directory.
    if let Some(reuse_dir) = reuse_dir {
        let prior_manifest = reuse_dir.join("narration-manifest.json");
        let prior_audio = reuse_dir.join(&audio_name);
        if let Some(manifest) = load_matching_manifest(&prior_manifest, &prior_audio, &hash) {
            std::fs::copy(&prior_audio, &audio_path)?;
            manifest.save(&manifest_path)?;
            tracing::info!(
                from = %reuse_dir.display(),
                hash = %hash,
                "Reused narration audio from prior version"
            );
            return Ok(plan_from_manifest(manifest, audio_path, audio_rel));
        }
        tracing::warn!(
            from = %reuse_dir.display(),
            "Requested audio reuse, but the prior script does not match; resynthesising"
        );
    }

    provider.preflight().await?;
    let synthesis = provider.synthesize(&full_script, &audio_path).await?;
    let total_ms = match synthesis.duration_ms {
        Some(ms) => ms,
        None => duration_ms(&audio_path, provider.pcm_hint().as_ref())?,
    };

    let silences = detector.detect(
        &audio_path,
        config.silence_threshold_db,
        config.silence_min_duration_secs,
    )?;

    let (windows, method) = align_segments(texts, total_ms, &silences);
    if method == AlignmentMethod::Proportional {
        tracing::warn!(
            texts = texts.len(),
            silences = silences.len(),
            "Too few silences detected; falling back to proportional split by text length"
        );
    }

    let manifest = NarrationManifest {
        provider: provider.name().to_string(),
        voice: provider.voice().to_string(),
        full_script,
        total_duration_ms: total_ms,
        silences_detected: silences.len(),
        segments: windows
            .iter()
            .map(|w| ManifestSegment {
                index: w.index,
                text: w.text.clone(),
                start_ms: w.start_ms,
                end_ms: w.end_ms,
                duration_ms: w.duration_ms(),
            })
            .collect(),
    };
    manifest.save(&manifest_path)?;

    tracing::info!(
        total_ms,
        segments = manifest.segments.len(),
        silences = manifest.silences_detected,
        "Narration prepared"
    );
    Ok(plan_from_manifest(manifest, audio_path, audio_rel))
}

fn load_matching_manifest(
    manifest_path: &Path,
    audio_path: &Path,
    hash: &str,
) -> Option<NarrationManifest> {
    if !manifest_path.exists() || !audio_path.exists() {
        return None;
    }
    let manifest = NarrationManifest::load(manifest_path).ok()?;
    (manifest.script_hash() == hash).then_some(manifest)
}

fn plan_from_manifest(
    manifest: NarrationManifest,
    audio_path: PathBuf,
    audio_rel: String,
) -> NarrationPlan {
    let segments = manifest
        .segments
        .iter()
        .map(|s| PreparedSegment {
            text: s.text.clone(),
            duration_ms: s.duration_ms,
            audio_file: (s.index == 0).then(|| audio_rel.clone()),
        })
        .collect();
    NarrationPlan {
        manifest: Some(manifest),
        segments,
        audio_path: Some(audio_path),
        audio_rel: Some(audio_rel),
    }
}
