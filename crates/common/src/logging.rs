//! Tracing subscriber setup.
//!
//! Diagnostics always go to stderr: the CLI reserves stdout for progress
//! lines and summaries, and mixing the two garbles both. The filter
//! honours `RUST_LOG` when present so operators can override the
//! configured level without touching the config file.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the process-wide subscriber from the logging config.
///
/// Calling this more than once is harmless; only the first install wins.
pub fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.json {
        tracing::subscriber::set_global_default(builder.json().finish()).ok();
    } else {
        tracing::subscriber::set_global_default(builder.with_target(true).finish()).ok();
    }
}

/// Subscriber with default settings, for tests and one-off tools.
pub fn init_default_logging() {
    init_logging(&LoggingConfig::default());
}
