//! Layer realization and mixdown.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::Span;

use storyreel_common::StoryreelResult;
use storyreel_transcoder::{FfmpegArgs, Transcoder};

use crate::plan::{TrackKind, TrackPlan};
use crate::timeline::TimelinePlan;

/// File name of the final mixed track.
pub const MIXED_TRACK_FILE: &str = "mixed.m4a";

/// Merges three layer files into one stream.
///
/// The output runs as long as the longest layer and the layers are
/// summed as-is (`normalize=0`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixPlan {
    pub narration: PathBuf,
    pub music: PathBuf,
    pub sfx: PathBuf,
}

impl MixPlan {
    pub const FILTER: &'static str = "[0][1][2]amix=inputs=3:duration=longest:normalize=0[mix]";

    pub fn to_ffmpeg_args(&self, output: &Path) -> FfmpegArgs {
        FfmpegArgs::new()
            .input(&self.narration)
            .input(&self.music)
            .input(&self.sfx)
            .filter_complex(Self::FILTER)
            .map("[mix]")
            .flag("-c:a", "aac")
            .output(output)
    }
}

/// Layer files written for one episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLayers {
    pub narration: PathBuf,
    pub music: PathBuf,
    pub sfx: PathBuf,
}

impl From<RenderedLayers> for MixPlan {
    fn from(layers: RenderedLayers) -> Self {
        Self {
            narration: layers.narration,
            music: layers.music,
            sfx: layers.sfx,
        }
    }
}

/// The single audio stream handed to assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixedTrack {
    pub path: PathBuf,
    /// Length of the longest layer, as planned.
    pub duration_ms: u64,
}

/// Realizes track plans through the transcoder.
pub struct AudioMixer {
    transcoder: Arc<dyn Transcoder>,
    work_dir: PathBuf,
    span: Span,
}

impl AudioMixer {
    /// Layer files are written into `work_dir`.
    pub fn new(transcoder: Arc<dyn Transcoder>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            transcoder,
            work_dir: work_dir.into(),
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn layer_path(&self, kind: TrackKind) -> PathBuf {
        self.work_dir.join(format!("{}.m4a", kind.label()))
    }

    /// Write one layer to `output`.
    pub async fn realize(&self, plan: &TrackPlan, output: &Path) -> StoryreelResult<PathBuf> {
        let args = plan.to_ffmpeg_args(output);
        tracing::debug!(
            parent: &self.span,
            output = %output.display(),
            clips = plan.clip_count(),
            "Rendering audio layer"
        );
        self.transcoder.run_checked(&args).await?;
        Ok(output.to_path_buf())
    }

    /// Render the three layers concurrently.
    pub async fn render_layers(&self, timeline: &TimelinePlan) -> StoryreelResult<RenderedLayers> {
        let narration_path = self.layer_path(TrackKind::Narration);
        let music_path = self.layer_path(TrackKind::Music);
        let sfx_path = self.layer_path(TrackKind::Sfx);

        let (narration, music, sfx) = tokio::try_join!(
            self.realize(&timeline.narration, &narration_path),
            self.realize(&timeline.music, &music_path),
            self.realize(&timeline.sfx, &sfx_path),
        )?;
        Ok(RenderedLayers {
            narration,
            music,
            sfx,
        })
    }

    /// Render all layers and merge them into [`MIXED_TRACK_FILE`].
    pub async fn mixdown(&self, timeline: &TimelinePlan) -> StoryreelResult<MixedTrack> {
        let layers = self.render_layers(timeline).await?;
        let output = self.work_dir.join(MIXED_TRACK_FILE);
        let mix = MixPlan::from(layers);
        self.transcoder
            .run_checked(&mix.to_ffmpeg_args(&output))
            .await?;

        let duration_ms = timeline
            .layers()
            .iter()
            .map(|(_, plan)| plan.estimated_duration_ms())
            .max()
            .unwrap_or(0);

        tracing::info!(
            parent: &self.span,
            output = %output.display(),
            duration_ms,
            "Audio mixdown complete"
        );
        Ok(MixedTrack {
            path: output,
            duration_ms,
        })
    }
}
