//! The persisted narration manifest.
//!
//! `narration-manifest.json` records the synthesis provenance and the
//! aligned segment windows; its `fullScript` hash keys audio caching and
//! `--reuse-audio` across versions.

use std::path::Path;

use demoreel_common::error::DemoreelResult;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

/// Pause-inducing separator between concatenated narration texts.
pub const SCRIPT_SEPARATOR: &str = "\n\n...\n\n";

/// Build the single concatenated TTS script from ordered texts.
pub fn build_full_script(texts: &[String]) -> String {
    texts.join(SCRIPT_SEPARATOR)
}

/// Stable hash of a full script, hex-encoded.
pub fn script_hash(script: &str) -> String {
    format!("{:016x}", xxh3_64(script.as_bytes()))
}

/// One aligned segment as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestSegment {
    pub index: usize,
    pub text: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub duration_ms: i64,
}

/// The narration manifest persisted next to the audio file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrationManifest {
    pub provider: String,
    pub voice: String,
    pub full_script: String,
    pub total_duration_ms: i64,
    pub silences_detected: usize,
    pub segments: Vec<ManifestSegment>,
}

impl NarrationManifest {
    /// Hash of this manifest's script.
    pub fn script_hash(&self) -> String {
        script_hash(&self.full_script)
    }

    /// Persist as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> DemoreelResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from JSON.
    pub fn load(path: &Path) -> DemoreelResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_script_uses_pause_separator() {
        let script = build_full_script(&[
            "Alpha".to_string(),
            "Bravo".to_string(),
            "Charlie".to_string(),
        ]);
        assert_eq!(script, "Alpha\n\n...\n\nBravo\n\n...\n\nCharlie");
    }

    #[test]
    fn script_hash_is_stable_and_content_sensitive() {
        let a = script_hash("Alpha");
        assert_eq!(a, script_hash("Alpha"));
        assert_ne!(a, script_hash("Alpha "));
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn manifest_roundtrips_with_camel_case_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("narration-manifest.json");

        let manifest = NarrationManifest {
            provider: "openai".to_string(),
            voice: "onyx".to_string(),
            full_script: "Alpha\n\n...\n\nBravo".to_string(),
            total_duration_ms: 4000,
            silences_detected: 1,
            segments: vec![ManifestSegment {
                index: 0,
                text: "Alpha".to_string(),
                start_ms: 0,
                end_ms: 1900,
                duration_ms: 1900,
            }],
        };
        manifest.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"fullScript\""));
        assert!(raw.contains("\"totalDurationMs\""));
        assert!(raw.contains("\"silencesDetected\""));
        assert!(raw.contains("\"startMs\""));

        let loaded = NarrationManifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
    }
}
