//! Validate an episode script.

use std::path::PathBuf;

use storyreel_script_model::{load_episode, BeatAction};

pub fn run(script: PathBuf, json: bool) -> anyhow::Result<()> {
    println!("Validating script: {}", script.display());

    let episode =
        load_episode(&script).map_err(|e| anyhow::anyhow!("Failed to load script: {e}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&episode)?);
        return Ok(());
    }

    let beats = episode.all_beats();
    let opaque: Vec<&str> = beats
        .iter()
        .flat_map(|beat| beat.actions.iter())
        .filter_map(|action| match action {
            BeatAction::Opaque(opaque) => Some(opaque.kind.as_str()),
            BeatAction::Known(_) => None,
        })
        .collect();

    println!("  Episode: {} ({})", episode.episode.title, episode.episode.id);
    println!(
        "  Resolution: {}x{}",
        episode.episode.resolution.width, episode.episode.resolution.height
    );
    println!(
        "  Voice: {} ({})",
        episode.episode.narration.voice, episode.episode.narration.rate
    );
    println!("  Scenes: {}", episode.scenes.len());
    println!(
        "  Beats: {} ({} narrated)",
        beats.len(),
        episode.narrated_beat_count()
    );

    if !opaque.is_empty() {
        println!("\nUnrecognized action kinds (passed through to the renderer):");
        for kind in &opaque {
            println!("  - {kind}");
        }
    }
    println!("\nScript is valid.");

    Ok(())
}
