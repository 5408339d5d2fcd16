//! Error types shared across demoreel crates.

/// Top-level error type for demoreel operations.
#[derive(Debug, thiserror::Error)]
pub enum DemoreelError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Timeline schema violation: {message}")]
    Schema { message: String },

    #[error(
        "Driver failure during {action} (url: {url}, selector: {selector}): {message}. \
         Likely causes: selector mismatch, dev server not reachable, browser not installed",
        url = .url.as_deref().unwrap_or("-"),
        selector = .selector.as_deref().unwrap_or("-")
    )]
    Driver {
        action: String,
        url: Option<String>,
        selector: Option<String>,
        message: String,
    },

    #[error("Narration mismatch: preprocessed {expected} segments but recorded {recorded}")]
    NarrationMismatch { expected: usize, recorded: usize },

    #[error("TTS error: {message}")]
    Tts { message: String },

    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using DemoreelError.
pub type DemoreelResult<T> = Result<T, DemoreelError>;

impl DemoreelError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: msg.into(),
        }
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema {
            message: msg.into(),
        }
    }

    pub fn driver(
        action: impl Into<String>,
        url: Option<String>,
        selector: Option<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Driver {
            action: action.into(),
            url,
            selector,
            message: msg.into(),
        }
    }

    pub fn tts(msg: impl Into<String>) -> Self {
        Self::Tts {
            message: msg.into(),
        }
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether this error may be downgraded to a warning when voice-over is
    /// optional for the current compose.
    pub fn is_tts(&self) -> bool {
        matches!(self, Self::Tts { .. })
    }
}
