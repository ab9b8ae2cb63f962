//! Render an episode.

use std::path::PathBuf;

use storyreel_common::{AppConfig, StoryreelError};
use storyreel_pipeline::RenderPipeline;
use storyreel_transcoder::command_exists;

pub async fn run(config: AppConfig, script: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    for binary in [&config.transcoder.ffmpeg, &config.transcoder.ffprobe] {
        if !command_exists(binary) {
            tracing::warn!(binary = %binary, "Transcoder binary not found in PATH");
        }
    }

    println!("Rendering: {}", script.display());
    println!("  Output: {}", output.display());

    let pipeline = RenderPipeline::from_config(config);

    // Dropping the render future kills child processes and removes the
    // working directory.
    let result = tokio::select! {
        result = pipeline.render(&script, &output) => result,
        _ = tokio::signal::ctrl_c() => Err(StoryreelError::Cancelled),
    };

    match result {
        Ok(outcome) => {
            println!("\nEpisode rendered!");
            println!("  MP4: {}", outcome.video_path.display());
            println!("  SRT: {}", outcome.subtitle_path.display());
            println!("  Report: {}", outcome.report_path.display());
            println!(
                "  Size: {:.1} MB",
                outcome.size_bytes as f64 / (1024.0 * 1024.0)
            );
            Ok(())
        }
        Err(err) => {
            println!("\nRender failed ({}): {err}", err.kind());
            Err(err.into())
        }
    }
}
