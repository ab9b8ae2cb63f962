//! Live preview (no recording).

use std::path::PathBuf;

pub fn run(script: PathBuf) -> anyhow::Result<()> {
    if !script.is_file() {
        return Err(anyhow::anyhow!("Script not found: {}", script.display()));
    }

    println!("Starting preview server...");
    println!("Script: {}", script.display());
    println!("Run 'npm run dev' in the project root to start the renderer dev server.");

    Ok(())
}
