//! Storyreel CLI: render narrated episodes from JSON scripts.
//!
//! Usage:
//!   storyreel render <SCRIPT> [-o DIR]   Render an episode to MP4 + SRT
//!   storyreel validate <SCRIPT>          Check a script without rendering
//!   storyreel voices [-l PREFIX]         List synthesizer voices
//!   storyreel preview <SCRIPT>           Live preview via the renderer dev server

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use storyreel_common::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "storyreel",
    about = "Narrated 2D episode renderer",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Asset root (defaults to the script's project directory)
    #[arg(long, global = true)]
    assets_dir: Option<PathBuf>,

    /// Renderer bridge command
    #[arg(long, global = true)]
    renderer_cmd: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render an episode from a JSON script
    Render {
        /// Path to the episode script
        script: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,
    },

    /// Validate an episode script
    Validate {
        /// Path to the episode script
        script: PathBuf,

        /// Print the parsed script as JSON
        #[arg(long)]
        json: bool,
    },

    /// List available synthesizer voices
    Voices {
        /// Locale prefix filter
        #[arg(short, long, default_value = "en")]
        language: String,
    },

    /// Live preview in the renderer dev server (no recording)
    Preview {
        /// Path to the episode script
        script: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if let Some(dir) = cli.assets_dir {
        config.assets_dir = Some(dir);
    }
    if let Some(command) = cli.renderer_cmd {
        config.renderer.command = command;
    }
    storyreel_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Render { script, output } => commands::render::run(config, script, output).await,
        Commands::Validate { script, json } => commands::validate::run(script, json),
        Commands::Voices { language } => commands::voices::run(&config, language).await,
        Commands::Preview { script } => commands::preview::run(script),
    }
}
