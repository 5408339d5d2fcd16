//! TTS provider contract and backends.
//!
//! Three backends cover the provider matrix: a cloud API (OpenAI speech),
//! a local offline bridge (pocket-tts, a Python helper that prints a JSON
//! result line), and an alternative cloud API (ElevenLabs). Credentials
//! are validated by `preflight` before any synthesis starts.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use demoreel_common::config::NarrationConfig;
use demoreel_common::error::{DemoreelError, DemoreelResult};
use serde::Deserialize;
use serde_json::json;

/// PCM parameters for size-based duration estimation.
#[derive(Debug, Clone, Copy)]
pub struct PcmParams {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

/// Outcome of one synthesis call.
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    /// Duration reported by the provider, when it reports one; otherwise
    /// the caller probes the produced file.
    pub duration_ms: Option<i64>,
}

/// A text-to-speech backend.
#[async_trait]
pub trait TtsProvider: Send + Sync + std::fmt::Debug {
    /// Provider name as recorded in the narration manifest.
    fn name(&self) -> &str;

    /// Voice name.
    fn voice(&self) -> &str;

    /// File extension of produced audio (no dot).
    fn file_extension(&self) -> &str;

    /// Known PCM parameters of produced audio, for duration fallback.
    fn pcm_hint(&self) -> Option<PcmParams> {
        None
    }

    /// Validate credentials and tooling before synthesis starts.
    async fn preflight(&self) -> DemoreelResult<()>;

    /// Synthesise `text` into `output`.
    async fn synthesize(&self, text: &str, output: &Path) -> DemoreelResult<SynthesisResult>;
}

/// Select a provider from configuration.
pub fn provider_from_config(config: &NarrationConfig) -> DemoreelResult<Box<dyn TtsProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiTts::from_env(&config.voice))),
        "pocket-tts" => Ok(Box::new(PocketTts::from_env(&config.voice))),
        "elevenlabs" => Ok(Box::new(ElevenLabsTts::from_env(&config.voice))),
        other => Err(DemoreelError::config(format!(
            "unknown TTS provider '{other}' (expected openai, pocket-tts, or elevenlabs)"
        ))),
    }
}

/// OpenAI speech API backend.
#[derive(Debug)]
pub struct OpenAiTts {
    api_key: Option<String>,
    voice: String,
    client: reqwest::Client,
}

impl OpenAiTts {
    pub fn from_env(voice: &str) -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            voice: voice.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TtsProvider for OpenAiTts {
    fn name(&self) -> &str {
        "openai"
    }

    fn voice(&self) -> &str {
        &self.voice
    }

    fn file_extension(&self) -> &str {
        "wav"
    }

    fn pcm_hint(&self) -> Option<PcmParams> {
        // OpenAI wav output is 24 kHz mono 16-bit PCM.
        Some(PcmParams {
            sample_rate: 24_000,
            channels: 1,
            bits_per_sample: 16,
        })
    }

    async fn preflight(&self) -> DemoreelResult<()> {
        if self.api_key.is_none() {
            return Err(DemoreelError::tts(
                "OPENAI_API_KEY is not set; required for the openai TTS provider",
            ));
        }
        Ok(())
    }

    async fn synthesize(&self, text: &str, output: &Path) -> DemoreelResult<SynthesisResult> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| DemoreelError::tts("OPENAI_API_KEY is not set"))?;

        tracing::info!(voice = %self.voice, chars = text.len(), "Synthesising narration via OpenAI");
        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .bearer_auth(api_key)
            .json(&json!({
                "model": "tts-1",
                "input": text,
                "voice": self.voice,
                "response_format": "wav",
            }))
            .send()
            .await
            .map_err(|e| DemoreelError::tts(format!("OpenAI request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DemoreelError::tts(format!(
                "OpenAI speech API returned {status}: {}",
                body.trim()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DemoreelError::tts(format!("OpenAI response read failed: {e}")))?;
        std::fs::write(output, &bytes)?;
        Ok(SynthesisResult { duration_ms: None })
    }
}

/// Result line printed by the pocket-tts bridge.
#[derive(Debug, Deserialize)]
struct PocketTtsResult {
    duration_ms: i64,
    #[allow(dead_code)]
    sample_rate: u32,
}

/// Local offline backend: a Python bridge around pocket-tts.
///
/// The helper reads the script from a file, writes a WAV, and prints one
/// JSON line with the produced duration on stdout.
#[derive(Debug)]
pub struct PocketTts {
    python: String,
    script: PathBuf,
    voice: String,
}

impl PocketTts {
    pub fn from_env(voice: &str) -> Self {
        let dir = std::env::var("DEMOREEL_POCKET_TTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("tools/pocket-tts"));
        Self {
            python: std::env::var("DEMOREEL_PYTHON").unwrap_or_else(|_| "python3".to_string()),
            script: dir.join("main.py"),
            voice: voice.to_string(),
        }
    }
}

#[async_trait]
impl TtsProvider for PocketTts {
    fn name(&self) -> &str {
        "pocket-tts"
    }

    fn voice(&self) -> &str {
        &self.voice
    }

    fn file_extension(&self) -> &str {
        "wav"
    }

    async fn preflight(&self) -> DemoreelResult<()> {
        if !self.script.exists() {
            return Err(DemoreelError::tts(format!(
                "pocket-tts bridge not found at {} (set DEMOREEL_POCKET_TTS_DIR)",
                self.script.display()
            )));
        }
        Ok(())
    }

    async fn synthesize(&self, text: &str, output: &Path) -> DemoreelResult<SynthesisResult> {
        let script_file = output.with_extension("txt");
        std::fs::write(&script_file, text)?;

        tracing::info!(voice = %self.voice, chars = text.len(), "Synthesising narration via pocket-tts");
        let result = tokio::process::Command::new(&self.python)
            .arg(&self.script)
            .arg("--text-file")
            .arg(&script_file)
            .arg("--output")
            .arg(output)
            .arg("--voice")
            .arg(&self.voice)
            .output()
            .await
            .map_err(|e| DemoreelError::tts(format!("failed to run pocket-tts bridge: {e}")));
        std::fs::remove_file(&script_file).ok();
        let result = result?;

        if !result.status.success() {
            return Err(DemoreelError::tts(format!(
                "pocket-tts bridge failed (status {}): {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&result.stdout);
        let line = stdout
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| DemoreelError::tts("pocket-tts bridge printed no result"))?;
        let parsed: PocketTtsResult = serde_json::from_str(line.trim())
            .map_err(|e| DemoreelError::tts(format!("invalid pocket-tts result line: {e}")))?;

        Ok(SynthesisResult {
            duration_ms: Some(parsed.duration_ms),
        })
    }
}

/// Alternative cloud backend: ElevenLabs.
#[derive(Debug)]
pub struct ElevenLabsTts {
    api_key: Option<String>,
    voice: String,
    client: reqwest::Client,
}

impl ElevenLabsTts {
    pub fn from_env(voice: &str) -> Self {
        Self {
            api_key: std::env::var("ELEVENLABS_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            voice: voice.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TtsProvider for ElevenLabsTts {
    fn name(&self) -> &str {
        "elevenlabs"
    }

    fn voice(&self) -> &str {
        &self.voice
    }

    fn file_extension(&self) -> &str {
        "mp3"
    }

    async fn preflight(&self) -> DemoreelResult<()> {
        if self.api_key.is_none() {
            return Err(DemoreelError::tts(
                "ELEVENLABS_API_KEY is not set; required for the elevenlabs TTS provider",
            ));
        }
        Ok(())
    }

    async fn synthesize(&self, text: &str, output: &Path) -> DemoreelResult<SynthesisResult> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| DemoreelError::tts("ELEVENLABS_API_KEY is not set"))?;

        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}?output_format=mp3_44100_128",
            self.voice
        );
        tracing::info!(voice = %self.voice, chars = text.len(), "Synthesising narration via ElevenLabs");
        let response = self
            .client
            .post(url)
            .header("xi-api-key", api_key)
            .json(&json!({
                "text": text,
                "model_id": "eleven_multilingual_v2",
            }))
            .send()
            .await
            .map_err(|e| DemoreelError::tts(format!("ElevenLabs request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DemoreelError::tts(format!(
                "ElevenLabs API returned {status}: {}",
                body.trim()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DemoreelError::tts(format!("ElevenLabs response read failed: {e}")))?;
        std::fs::write(output, &bytes)?;
        Ok(SynthesisResult { duration_ms: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_rejects_unknown_provider() {
        let config = NarrationConfig {
            provider: "shoutcloud".to_string(),
            ..Default::default()
        };
        let err = provider_from_config(&config).unwrap_err();
        assert!(err.to_string().contains("shoutcloud"));
    }

    #[test]
    fn factory_builds_known_providers() {
        for name in ["openai", "pocket-tts", "elevenlabs"] {
            let config = NarrationConfig {
                provider: name.to_string(),
                ..Default::default()
            };
            let provider = provider_from_config(&config).unwrap();
            assert_eq!(provider.name(), name);
        }
    }

    #[test]
    fn pocket_result_line_parses() {
        let line = r#"{"output":"a.wav","voice":"alba","sample_rate":24000,"duration_ms":6125,"samples":147000,"timing":{"total_s":9.2}}"#;
        let parsed: PocketTtsResult = serde_json::from_str(line).unwrap();
        assert_eq!(parsed.duration_ms, 6125);
    }

    #[tokio::test]
    async fn openai_preflight_requires_key() {
        let provider = OpenAiTts {
            api_key: None,
            voice: "onyx".to_string(),
            client: reqwest::Client::new(),
        };
        let err = provider.preflight().await.unwrap_err();
        assert!(err.is_tts());
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
