//! Audio timeline builder.
//!
//! Splits the cue log by kind and plans the narration, music and SFX
//! layers independently. Missing assets are substituted, never fatal.

use tracing::Span;

use storyreel_narration::NarrationResult;
use storyreel_script_model::{CueLog, CueLogEntry};

use crate::assets::AssetLocator;
use crate::plan::{Leg, LoopedClip, TrackKind, TrackPlan};
use crate::timing::{narration_end_ms, pair_narration_marks, total_from_end, PairingMode};

/// Narration layer length when nothing is audible.
pub const SILENT_NARRATION_MS: u64 = 1_000;

/// Music volume when the cue does not set one.
pub const DEFAULT_MUSIC_VOLUME: f64 = 0.3;

/// Music fade-in when the cue does not set one.
pub const DEFAULT_MUSIC_FADE_IN_MS: u64 = 2_000;

/// SFX volume when the cue does not set one.
pub const DEFAULT_SFX_VOLUME: f64 = 1.0;

/// Planned layers for one episode.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelinePlan {
    pub total_duration_ms: u64,
    pub pairing: PairingMode,
    pub narration: TrackPlan,
    pub music: TrackPlan,
    pub sfx: TrackPlan,
    pub cue_counts: CueCounts,
}

/// Cue log entries per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CueCounts {
    pub narration_marks: usize,
    pub music: usize,
    pub sfx: usize,
}

impl TimelinePlan {
    pub fn layers(&self) -> [(TrackKind, &TrackPlan); 3] {
        [
            (TrackKind::Narration, &self.narration),
            (TrackKind::Music, &self.music),
            (TrackKind::Sfx, &self.sfx),
        ]
    }
}

/// Plans the three audio layers from a cue log.
#[derive(Debug, Clone)]
pub struct TimelineBuilder {
    assets: AssetLocator,
    span: Span,
}

impl TimelineBuilder {
    pub fn new(assets: AssetLocator) -> Self {
        Self {
            assets,
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn assets(&self) -> &AssetLocator {
        &self.assets
    }

    /// Plan every layer. `narrations` must be indexed by beat.
    pub fn plan(&self, cue_log: CueLog, narrations: &[NarrationResult]) -> TimelinePlan {
        let cues = cue_log.partition();
        let cue_counts = CueCounts {
            narration_marks: cues.narration_marks.len(),
            music: cues.music.len(),
            sfx: cues.sfx.len(),
        };

        let (pairing, narration, total_duration_ms) =
            self.build_narration_plan(&cues.narration_marks, narrations);
        let music = self.build_music_plan(&cues.music, total_duration_ms);
        let sfx = self.build_sfx_plan(&cues.sfx, total_duration_ms);

        for (kind, plan) in [(TrackKind::Narration, &narration), (TrackKind::Sfx, &sfx)] {
            let peak = plan.peak_stacked_gain();
            if peak > 1.0 {
                tracing::warn!(
                    parent: &self.span,
                    track = kind.label(),
                    peak_gain = peak,
                    "Overlapping clips sum above unity gain, output may clip"
                );
            }
        }

        tracing::info!(
            parent: &self.span,
            total_duration_ms,
            pairing = ?pairing,
            narration_clips = narration.clip_count(),
            music_clips = music.clip_count(),
            sfx_clips = sfx.clip_count(),
            "Audio timeline planned"
        );

        TimelinePlan {
            total_duration_ms,
            pairing,
            narration,
            music,
            sfx,
            cue_counts,
        }
    }

    /// Narration layer plus the total duration it implies.
    ///
    /// Only clips with a file and a nonzero duration are placed.
    pub fn build_narration_plan(
        &self,
        marks: &[CueLogEntry],
        narrations: &[NarrationResult],
    ) -> (PairingMode, TrackPlan, u64) {
        let (pairing, paired) = pair_narration_marks(marks, narrations);
        let total = total_from_end(narration_end_ms(&paired));

        if paired.len() < marks.len() {
            tracing::warn!(
                parent: &self.span,
                marks = marks.len(),
                paired = paired.len(),
                "Some narration marks have no matching narration"
            );
        }

        let legs: Vec<Leg> = paired
            .iter()
            .filter(|marked| marked.narration.duration_ms > 0)
            .filter_map(|marked| {
                let source = marked.narration.audio_path.clone()?;
                Some(Leg {
                    source,
                    delay_ms: marked.wall_clock_ms,
                    gain: None,
                    duration_ms: Some(marked.narration.duration_ms),
                })
            })
            .collect();

        let plan = if legs.is_empty() {
            TrackPlan::Silence {
                duration_ms: SILENT_NARRATION_MS,
            }
        } else {
            TrackPlan::Layered {
                kind: TrackKind::Narration,
                legs,
            }
        };
        (pairing, plan, total)
    }

    /// Music layer from the first music cue only.
    pub fn build_music_plan(&self, cues: &[CueLogEntry], total_duration_ms: u64) -> TrackPlan {
        let silence = TrackPlan::Silence {
            duration_ms: total_duration_ms,
        };
        let Some(cue) = cues.first() else {
            return silence;
        };
        if cues.len() > 1 {
            tracing::debug!(
                parent: &self.span,
                ignored = cues.len() - 1,
                "Only the first music cue is used"
            );
        }

        let clip = cue.clip.as_deref().unwrap_or_default();
        let Some(source) = self.assets.existing_music(clip) else {
            tracing::warn!(
                parent: &self.span,
                clip = clip,
                root = %self.assets.root().display(),
                "Music asset missing, using silence"
            );
            return silence;
        };

        TrackPlan::Looped(LoopedClip {
            source,
            duration_ms: total_duration_ms,
            fade_in_ms: cue.fade_in.unwrap_or(DEFAULT_MUSIC_FADE_IN_MS),
            volume: cue.volume.unwrap_or(DEFAULT_MUSIC_VOLUME),
        })
    }

    /// SFX layer: every cue whose asset exists, at its own delay and volume.
    pub fn build_sfx_plan(&self, cues: &[CueLogEntry], total_duration_ms: u64) -> TrackPlan {
        let legs: Vec<Leg> = cues
            .iter()
            .filter_map(|cue| {
                let clip = cue.clip.as_deref().unwrap_or_default();
                match self.assets.existing_sfx(clip) {
                    Some(source) => Some(Leg {
                        source,
                        delay_ms: cue.wall_clock_ms,
                        gain: Some(cue.volume.unwrap_or(DEFAULT_SFX_VOLUME)),
                        duration_ms: None,
                    }),
                    None => {
                        tracing::warn!(
                            parent: &self.span,
                            clip = clip,
                            wall_clock_ms = cue.wall_clock_ms,
                            "SFX asset missing, skipping cue"
                        );
                        None
                    }
                }
            })
            .collect();

        if legs.is_empty() {
            TrackPlan::Silence {
                duration_ms: total_duration_ms,
            }
        } else {
            TrackPlan::Layered {
                kind: TrackKind::Sfx,
                legs,
            }
        }
    }
}
