//! Speech synthesizer contract and the `edge-tts` backend.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use storyreel_common::{tail_chars, StoryreelError, StoryreelResult, DIAGNOSTIC_TAIL_CHARS};
use tokio::process::Command;

use crate::subtitles::normalize_fragment;

/// One synthesis job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    /// Relative speaking rate, e.g. `+0%` or `-10%`.
    pub rate: String,
    /// Where the audio clip is written.
    pub audio_path: PathBuf,
    /// Where the synthesizer writes its subtitle file.
    pub subtitle_path: PathBuf,
}

/// A synthesizer voice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub name: String,
    pub gender: String,
    pub locale: String,
}

/// Text-to-speech collaborator.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Write the clip to `request.audio_path` and return its subtitle
    /// fragment (SRT).
    async fn synthesize(&self, request: &SpeechRequest) -> StoryreelResult<String>;

    /// Voices whose locale starts with `language_prefix`, sorted by name.
    async fn list_voices(&self, language_prefix: &str) -> StoryreelResult<Vec<VoiceInfo>>;

    fn name(&self) -> &str;
}

/// Synthesizer backed by the `edge-tts` command line tool.
#[derive(Debug, Clone)]
pub struct EdgeTtsSynthesizer {
    command: String,
}

impl Default for EdgeTtsSynthesizer {
    fn default() -> Self {
        Self::new("edge-tts")
    }
}

impl EdgeTtsSynthesizer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Argument vector for one request.
    ///
    /// Values are attached with `=` so rates like `-10%` and text starting
    /// with a dash are never read as flags.
    pub fn synthesis_args(request: &SpeechRequest) -> Vec<String> {
        vec![
            format!("--voice={}", request.voice),
            format!("--rate={}", request.rate),
            format!("--text={}", request.text),
            format!("--write-media={}", request.audio_path.display()),
            format!("--write-subtitles={}", request.subtitle_path.display()),
        ]
    }

    async fn read_fragment(path: &Path) -> String {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => normalize_fragment(&raw),
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Synthesizer wrote no subtitles; using empty fragment"
                );
                String::new()
            }
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for EdgeTtsSynthesizer {
    async fn synthesize(&self, request: &SpeechRequest) -> StoryreelResult<String> {
        let output = Command::new(&self.command)
            .args(Self::synthesis_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                StoryreelError::synthesis(format!("Failed to start {}: {e}", self.command))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StoryreelError::synthesis(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                tail_chars(stderr.trim(), DIAGNOSTIC_TAIL_CHARS)
            )));
        }

        if !request.audio_path.is_file() {
            return Err(StoryreelError::synthesis(format!(
                "{} produced no audio at {}",
                self.command,
                request.audio_path.display()
            )));
        }

        Ok(Self::read_fragment(&request.subtitle_path).await)
    }

    async fn list_voices(&self, language_prefix: &str) -> StoryreelResult<Vec<VoiceInfo>> {
        let output = Command::new(&self.command)
            .arg("--list-voices")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                StoryreelError::synthesis(format!("Failed to start {}: {e}", self.command))
            })?;

        if !output.status.success() {
            return Err(StoryreelError::synthesis(format!(
                "{} --list-voices exited with {}",
                self.command, output.status
            )));
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        Ok(filter_voices(parse_voice_list(&raw), language_prefix))
    }

    fn name(&self) -> &str {
        "edge-tts"
    }
}

/// Parse `edge-tts --list-voices` output.
///
/// Newer releases print a table (`Name  Gender  ...` header, dashed rule,
/// one voice per row). Older releases print `Key: value` blocks separated
/// by blank lines.
pub fn parse_voice_list(raw: &str) -> Vec<VoiceInfo> {
    let is_table = raw
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| !line.contains(':'))
        .unwrap_or(false);

    if is_table {
        parse_voice_table(raw)
    } else {
        parse_voice_blocks(raw)
    }
}

fn parse_voice_table(raw: &str) -> Vec<VoiceInfo> {
    raw.lines()
        .skip_while(|line| !line.trim_start().starts_with('-'))
        .skip(1)
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let name = columns.next()?;
            let gender = columns.next().unwrap_or_default();
            Some(VoiceInfo {
                name: name.to_string(),
                gender: gender.to_string(),
                locale: locale_from_short_name(name),
            })
        })
        .collect()
}

fn parse_voice_blocks(raw: &str) -> Vec<VoiceInfo> {
    let mut voices = Vec::new();
    for block in raw.replace("\r\n", "\n").split("\n\n") {
        let mut name = None;
        let mut short_name = None;
        let mut gender = String::new();
        let mut locale = None;
        for line in block.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim().to_string();
            match key.trim() {
                "Name" => name = Some(value),
                "ShortName" => short_name = Some(value),
                "Gender" => gender = value,
                "Locale" => locale = Some(value),
                _ => {}
            }
        }
        let Some(name) = short_name.or(name) else {
            continue;
        };
        let locale = locale.unwrap_or_else(|| locale_from_short_name(&name));
        voices.push(VoiceInfo {
            name,
            gender,
            locale,
        });
    }
    voices
}

/// `en-US-GuyNeural` -> `en-US`.
fn locale_from_short_name(name: &str) -> String {
    let mut parts = name.splitn(3, '-');
    match (parts.next(), parts.next()) {
        (Some(lang), Some(region)) => format!("{lang}-{region}"),
        _ => name.to_string(),
    }
}

/// Keep voices whose locale starts with `language_prefix`, sorted by name.
pub fn filter_voices(voices: Vec<VoiceInfo>, language_prefix: &str) -> Vec<VoiceInfo> {
    let mut filtered: Vec<VoiceInfo> = voices
        .into_iter()
        .filter(|voice| voice.locale.starts_with(language_prefix))
        .collect();
    filtered.sort_by(|a, b| a.name.cmp(&b.name));
    filtered
}
