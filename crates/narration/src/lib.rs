//! Demoreel Narration Preprocessor
//!
//! Turns the ordered narration texts of a scenario into one continuous
//! voice-over and per-segment timing windows:
//! - **TTS:** provider contract with cloud (OpenAI, ElevenLabs) and local
//!   offline (pocket-tts bridge) backends
//! - **Probe:** audio duration via ffprobe with a PCM size fallback
//! - **Silence:** silence detection over the synthesised audio
//! - **Align:** mapping the N-1 longest silences to segment boundaries
//! - **Manifest:** the persisted `narration-manifest.json` plus script-hash
//!   caching and cross-version reuse

pub mod align;
pub mod manifest;
pub mod preprocess;
pub mod probe;
pub mod silence;
pub mod tts;

pub use align::*;
pub use manifest::*;
pub use preprocess::*;
pub use silence::{FfmpegSilenceDetector, SilenceDetector, SilenceSpan};
pub use tts::{PcmParams, SynthesisResult, TtsProvider};
