//! Demoreel CLI — compose product-demo videos from scripted scenarios.
//!
//! Usage:
//!   demoreel compose <SCENARIO>   Record and render a scenario script
//!   demoreel validate <PATH>      Validate a timeline file
//!   demoreel info <PATH>          Show a recorded version's summary
//!   demoreel check                Check external tooling

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "demoreel",
    about = "Turn scripted browser walkthroughs into polished demo videos",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a scenario and render the final video
    Compose {
        /// Path to the scenario script (JSON step list)
        scenario: PathBuf,

        /// Output video path (defaults to render.mp4 in the version dir)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Output resolution as WxH (defaults to the captured viewport)
        #[arg(long)]
        resolution: Option<String>,

        /// Skip narration synthesis and the voice-over track
        #[arg(long)]
        no_voiceover: bool,

        /// Do not draw the synthetic cursor
        #[arg(long)]
        no_cursor: bool,

        /// Reuse narration audio from a prior version (optionally from a
        /// specific audio directory) when the script is unchanged
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        reuse_audio: Option<String>,
    },

    /// Validate a timeline file
    Validate {
        /// Path to timeline.json
        path: PathBuf,
    },

    /// Show a recorded version's summary
    Info {
        /// Path to a version directory (containing timeline.json)
        path: PathBuf,
    },

    /// Check external tooling (ffmpeg, ffprobe, browser bridge)
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = demoreel_common::config::AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    demoreel_common::logging::init_logging(&config.logging);

    let result = match cli.command {
        Commands::Compose {
            scenario,
            out,
            resolution,
            no_voiceover,
            no_cursor,
            reuse_audio,
        } => {
            commands::compose::run(commands::compose::ComposeArgs {
                scenario,
                out,
                resolution,
                no_voiceover,
                no_cursor,
                reuse_audio,
                config,
            })
            .await
        }
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Info { path } => commands::info::run(path),
        Commands::Check => commands::check::run(),
    };

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
