//! Audio asset lookup.

use std::path::{Component, Path, PathBuf};

/// Resolves clip names from the cue log to files under the assets root.
///
/// ```text
/// <root>/audio/music/<clip>.mp3
/// <root>/audio/sfx/<clip>.wav
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLocator {
    root: PathBuf,
}

impl AssetLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default root for a script: two levels above the script file
    /// (`<root>/scripts/ep01.json` -> `<root>`).
    pub fn for_script(script_path: &Path) -> Self {
        let root = script_path
            .parent()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Music file for `clip`, if the name is a plain file stem.
    pub fn music_path(&self, clip: &str) -> Option<PathBuf> {
        self.resolve("music", clip, "mp3")
    }

    /// SFX file for `clip`, if the name is a plain file stem.
    pub fn sfx_path(&self, clip: &str) -> Option<PathBuf> {
        self.resolve("sfx", clip, "wav")
    }

    /// Existing music file for `clip`.
    pub fn existing_music(&self, clip: &str) -> Option<PathBuf> {
        self.music_path(clip).filter(|p| p.is_file())
    }

    /// Existing SFX file for `clip`.
    pub fn existing_sfx(&self, clip: &str) -> Option<PathBuf> {
        self.sfx_path(clip).filter(|p| p.is_file())
    }

    fn resolve(&self, kind: &str, clip: &str, extension: &str) -> Option<PathBuf> {
        if !is_plain_name(clip) {
            return None;
        }
        Some(
            self.root
                .join("audio")
                .join(kind)
                .join(format!("{clip}.{extension}")),
        )
    }
}

/// A single normal path component: no separators, no `..`.
fn is_plain_name(clip: &str) -> bool {
    let mut components = Path::new(clip).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
