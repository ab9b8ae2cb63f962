//! List synthesizer voices.

use storyreel_common::AppConfig;
use storyreel_narration::{EdgeTtsSynthesizer, SpeechSynthesizer};

pub async fn run(config: &AppConfig, language: String) -> anyhow::Result<()> {
    println!("Voices for '{language}':\n");

    let synthesizer = EdgeTtsSynthesizer::new(config.narration.synthesizer_command.clone());
    let voices = synthesizer.list_voices(&language).await?;

    if voices.is_empty() {
        println!("No voices found for '{language}'");
        return Ok(());
    }

    let width = voices.iter().map(|v| v.name.len()).max().unwrap_or(0);
    println!("{:<width$}  {:<8}  Locale", "Voice", "Gender");
    println!("{}", "-".repeat(width + 20));
    for voice in &voices {
        println!("{:<width$}  {:<8}  {}", voice.name, voice.gender, voice.locale);
    }
    println!("\nTotal: {} voices", voices.len());

    Ok(())
}
