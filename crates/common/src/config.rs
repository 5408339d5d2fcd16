//! Application configuration.
//!
//! Configuration is layered: built-in defaults, then the JSON config file,
//! then process-environment overrides for the keys that vary per machine
//! (TTS provider selection and credentials).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root directory where render version directories are created.
    pub output_root: PathBuf,

    /// Default recording settings.
    pub recording: RecordingDefaults,

    /// Narration / voice-over settings.
    pub narration: NarrationConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default recording parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingDefaults {
    /// Capture frame rate.
    pub fps: u32,

    /// Captured viewport width in pixels.
    pub viewport_width: u32,

    /// Captured viewport height in pixels.
    pub viewport_height: u32,

    /// Browser locale passed to the driver.
    pub locale: String,

    /// Browser timezone passed to the driver.
    pub timezone: String,

    /// Browser color scheme ("light" or "dark").
    pub color_scheme: String,
}

/// Narration synthesis and alignment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationConfig {
    /// TTS provider name ("openai", "pocket-tts", "elevenlabs").
    pub provider: String,

    /// Voice name passed to the provider.
    pub voice: String,

    /// Silence detection threshold in dBFS.
    pub silence_threshold_db: f64,

    /// Minimum silence duration in seconds.
    pub silence_min_duration_secs: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "demoreel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("demos"),
            recording: RecordingDefaults::default(),
            narration: NarrationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RecordingDefaults {
    fn default() -> Self {
        Self {
            fps: 30,
            viewport_width: 1280,
            viewport_height: 720,
            locale: "en-US".to_string(),
            timezone: "UTC".to_string(),
            color_scheme: "light".to_string(),
        }
    }
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            voice: "onyx".to_string(),
            silence_threshold_db: -30.0,
            silence_min_duration_secs: 0.3,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults,
    /// then apply environment overrides.
    pub fn load() -> Self {
        let mut config = Self::load_file().unwrap_or_default();
        config.apply_env_overrides();
        config
    }

    fn load_file() -> Option<Self> {
        let config_path = config_file_path();
        if !config_path.exists() {
            return None;
        }
        match std::fs::read_to_string(&config_path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                None
            }
        }
    }

    /// Apply `DEMOREEL_*` process-environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(provider) = std::env::var("DEMOREEL_TTS_PROVIDER") {
            if !provider.trim().is_empty() {
                self.narration.provider = provider.trim().to_string();
            }
        }
        if let Ok(voice) = std::env::var("DEMOREEL_TTS_VOICE") {
            if !voice.trim().is_empty() {
                self.narration.voice = voice.trim().to_string();
            }
        }
        if let Ok(root) = std::env::var("DEMOREEL_OUTPUT_ROOT") {
            if !root.trim().is_empty() {
                self.output_root = PathBuf::from(root);
            }
        }
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("demoreel").join("config.json")
}
