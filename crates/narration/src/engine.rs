//! Narration Timing Engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use storyreel_common::{NarrationDefaults, StoryreelError, StoryreelResult};
use storyreel_transcoder::DurationProbe;
use tracing::Span;

use crate::synthesizer::{SpeechRequest, SpeechSynthesizer};

/// Narration output for one beat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationResult {
    /// Position of the beat in the flattened beat list.
    pub beat_index: usize,
    /// Synthesized clip; `None` for beats with nothing to speak.
    pub audio_path: Option<PathBuf>,
    /// Measured clip length; 0 when silent or when measurement failed.
    pub duration_ms: u64,
    /// SRT fragment timed from the start of the clip; empty when silent.
    pub subtitle: String,
}

impl NarrationResult {
    pub fn silent(beat_index: usize) -> Self {
        Self {
            beat_index,
            audio_path: None,
            duration_ms: 0,
            subtitle: String::new(),
        }
    }

    /// Whether the clip takes part in downstream timing.
    pub fn is_audible(&self) -> bool {
        self.duration_ms > 0 && self.audio_path.is_some()
    }

    pub fn has_subtitle(&self) -> bool {
        !self.subtitle.trim().is_empty()
    }
}

/// Voice, rate and worker pool size for one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationOptions {
    pub voice: String,
    pub rate: String,
    /// Upper bound on concurrent synthesis jobs (at least 1).
    pub max_concurrency: usize,
}

impl Default for NarrationOptions {
    fn default() -> Self {
        Self::from(&NarrationDefaults::default())
    }
}

impl From<&NarrationDefaults> for NarrationOptions {
    fn from(defaults: &NarrationDefaults) -> Self {
        Self {
            voice: defaults.voice.clone(),
            rate: defaults.rate.clone(),
            max_concurrency: defaults.max_concurrency,
        }
    }
}

/// Synthesizes and times narration for every beat.
pub struct NarrationEngine {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    probe: Arc<dyn DurationProbe>,
    audio_dir: PathBuf,
    options: NarrationOptions,
    span: Span,
}

impl NarrationEngine {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        probe: Arc<dyn DurationProbe>,
        audio_dir: impl Into<PathBuf>,
        options: NarrationOptions,
    ) -> Self {
        Self {
            synthesizer,
            probe,
            audio_dir: audio_dir.into(),
            options,
            span: Span::none(),
        }
    }

    /// Attach the logging span of the owning render.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn options(&self) -> &NarrationOptions {
        &self.options
    }

    /// Clip path for a beat: `beat_000.mp3`, `beat_001.mp3`, ...
    pub fn clip_path(&self, index: usize) -> PathBuf {
        self.audio_dir.join(format!("beat_{index:03}.mp3"))
    }

    fn subtitle_path(&self, index: usize) -> PathBuf {
        self.audio_dir.join(format!("beat_{index:03}.srt"))
    }

    /// Synthesize and time one beat.
    ///
    /// Empty or whitespace-only text returns a silent result without
    /// touching the synthesizer. A failed duration probe is not fatal: the
    /// beat keeps its clip but is timed as 0 ms.
    pub async fn synthesize(&self, index: usize, text: &str) -> StoryreelResult<NarrationResult> {
        if text.trim().is_empty() {
            return Ok(NarrationResult::silent(index));
        }

        let request = SpeechRequest {
            text: text.to_string(),
            voice: self.options.voice.clone(),
            rate: self.options.rate.clone(),
            audio_path: self.clip_path(index),
            subtitle_path: self.subtitle_path(index),
        };

        let subtitle = self
            .synthesizer
            .synthesize(&request)
            .await
            .map_err(|err| match err {
                StoryreelError::Synthesis { message } => {
                    StoryreelError::synthesis(format!("beat {index}: {message}"))
                }
                other => other,
            })?;

        let duration_ms = self.measure(index, &request.audio_path).await;

        tracing::debug!(
            parent: &self.span,
            beat = index,
            chars = text.chars().count(),
            duration_ms,
            "Narration synthesized"
        );

        Ok(NarrationResult {
            beat_index: index,
            audio_path: Some(request.audio_path),
            duration_ms,
            subtitle,
        })
    }

    async fn measure(&self, index: usize, path: &Path) -> u64 {
        match self.probe.probe_duration_ms(path).await {
            Ok(ms) => ms,
            Err(err) => {
                tracing::warn!(
                    parent: &self.span,
                    beat = index,
                    path = %path.display(),
                    error = %err,
                    "Duration measurement failed; treating beat as silent"
                );
                0
            }
        }
    }

    /// Synthesize every beat with a bounded worker pool.
    ///
    /// Results are gathered into slots keyed by beat index, so the output
    /// order always matches `texts` whatever order the jobs finish in.
    pub async fn synthesize_all(&self, texts: &[String]) -> StoryreelResult<Vec<NarrationResult>> {
        let limit = self.options.max_concurrency.max(1);
        let mut slots: Vec<Option<NarrationResult>> = (0..texts.len()).map(|_| None).collect();

        let mut jobs = stream::iter(texts.iter().enumerate())
            .map(|(index, text)| async move { (index, self.synthesize(index, text).await) })
            .buffer_unordered(limit);

        while let Some((index, result)) = jobs.next().await {
            slots[index] = Some(result?);
        }

        let results = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| {
                    StoryreelError::synthesis(format!("beat {index} produced no result"))
                })
            })
            .collect::<StoryreelResult<Vec<_>>>()?;

        let audible = results.iter().filter(|r| r.is_audible()).count();
        let total_ms: u64 = results.iter().map(|r| r.duration_ms).sum();
        tracing::info!(
            parent: &self.span,
            beats = results.len(),
            audible,
            total_secs = total_ms as f64 / 1000.0,
            workers = limit,
            "Narration complete"
        );

        Ok(results)
    }
}

/// Duration list handed to the renderer, index-aligned with `results`.
pub fn beat_durations(results: &[NarrationResult]) -> Vec<u64> {
    results.iter().map(|r| r.duration_ms).collect()
}
