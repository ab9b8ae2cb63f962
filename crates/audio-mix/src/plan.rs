//! Track plans and their ffmpeg rendition.
//!
//! A plan is a plain value describing one audio layer. Compiling a plan
//! to ffmpeg arguments is deterministic: no clocks, no randomness, and
//! legs are emitted in plan order.

use std::path::{Path, PathBuf};

use storyreel_transcoder::{format_secs, FfmpegArgs};

/// Generated silence source.
pub const SILENCE_SOURCE: &str = "anullsrc=r=44100:cl=stereo";

/// Fixed fade-out at the end of the music layer.
pub const MUSIC_FADE_OUT_MS: u64 = 2_000;

/// Codec for intermediate layers.
const LAYER_CODEC: &str = "aac";

/// Which layer a plan belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Narration,
    Music,
    Sfx,
}

impl TrackKind {
    /// Output filter label and file stem.
    pub fn label(self) -> &'static str {
        match self {
            TrackKind::Narration => "narration",
            TrackKind::Music => "music",
            TrackKind::Sfx => "sfx",
        }
    }

    fn leg_prefix(self) -> &'static str {
        match self {
            TrackKind::Narration => "a",
            TrackKind::Music => "m",
            TrackKind::Sfx => "s",
        }
    }
}

/// One clip placed on a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub source: PathBuf,
    pub delay_ms: u64,
    /// `None` leaves the clip level untouched.
    pub gain: Option<f64>,
    /// Clip length when known; unknown clips are assumed to run to the end.
    pub duration_ms: Option<u64>,
}

impl Leg {
    fn effective_gain(&self) -> f64 {
        self.gain.unwrap_or(1.0)
    }

    fn is_active_at(&self, t_ms: u64) -> bool {
        t_ms >= self.delay_ms
            && self
                .duration_ms
                .map(|d| t_ms < self.delay_ms.saturating_add(d))
                .unwrap_or(true)
    }
}

/// A music clip looped to cover the whole episode.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopedClip {
    pub source: PathBuf,
    pub duration_ms: u64,
    pub fade_in_ms: u64,
    pub volume: f64,
}

impl LoopedClip {
    /// Fade-out start: `MUSIC_FADE_OUT_MS` before the end, never negative.
    pub fn fade_out_start_ms(&self) -> u64 {
        self.duration_ms.saturating_sub(MUSIC_FADE_OUT_MS)
    }

    fn filter_chain(&self) -> String {
        let mut filters = Vec::with_capacity(3);
        if self.fade_in_ms > 0 {
            filters.push(format!("afade=t=in:d={}", format_secs(self.fade_in_ms)));
        }
        filters.push(format!(
            "afade=t=out:st={}:d={}",
            format_secs(self.fade_out_start_ms()),
            format_secs(self.duration_ms.min(MUSIC_FADE_OUT_MS))
        ));
        filters.push(format!("volume={}", self.volume));
        filters.join(",")
    }
}

/// How one audio layer is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackPlan {
    /// Stereo silence of a fixed length.
    Silence { duration_ms: u64 },
    /// Clips delayed into place and summed (`amix normalize=0`).
    Layered { kind: TrackKind, legs: Vec<Leg> },
    /// One looped clip trimmed to length with fades.
    Looped(LoopedClip),
}

impl TrackPlan {
    pub fn is_silent(&self) -> bool {
        matches!(self, TrackPlan::Silence { .. })
    }

    /// Number of source clips.
    pub fn clip_count(&self) -> usize {
        match self {
            TrackPlan::Silence { .. } => 0,
            TrackPlan::Layered { legs, .. } => legs.len(),
            TrackPlan::Looped(_) => 1,
        }
    }

    /// Fixed length, when the plan has one.
    pub fn fixed_duration_ms(&self) -> Option<u64> {
        match self {
            TrackPlan::Silence { duration_ms } => Some(*duration_ms),
            TrackPlan::Looped(clip) => Some(clip.duration_ms),
            TrackPlan::Layered { .. } => None,
        }
    }

    /// Expected output length. Legs of unknown length count from their delay.
    pub fn estimated_duration_ms(&self) -> u64 {
        match self {
            TrackPlan::Layered { legs, .. } => legs
                .iter()
                .map(|leg| leg.delay_ms.saturating_add(leg.duration_ms.unwrap_or(0)))
                .max()
                .unwrap_or(0),
            other => other.fixed_duration_ms().unwrap_or(0),
        }
    }

    /// Worst-case summed gain of simultaneously playing clips.
    ///
    /// Summation is never normalized, so anything above 1.0 may clip.
    pub fn peak_stacked_gain(&self) -> f64 {
        match self {
            TrackPlan::Silence { .. } => 0.0,
            TrackPlan::Looped(clip) => clip.volume,
            TrackPlan::Layered { legs, .. } => legs
                .iter()
                .map(|onset| {
                    legs.iter()
                        .filter(|leg| leg.is_active_at(onset.delay_ms))
                        .map(Leg::effective_gain)
                        .sum::<f64>()
                })
                .fold(0.0, f64::max),
        }
    }

    /// Filter graph for a layered plan.
    pub fn filter_graph(&self) -> Option<String> {
        let TrackPlan::Layered { kind, legs } = self else {
            return None;
        };
        let prefix = kind.leg_prefix();
        let mut parts: Vec<String> = legs
            .iter()
            .enumerate()
            .map(|(i, leg)| {
                let delay = leg.delay_ms;
                match leg.gain {
                    Some(gain) => format!("[{i}]adelay={delay}|{delay},volume={gain}[{prefix}{i}]"),
                    None => format!("[{i}]adelay={delay}|{delay}[{prefix}{i}]"),
                }
            })
            .collect();
        let mix_inputs: String = (0..legs.len()).map(|i| format!("[{prefix}{i}]")).collect();
        parts.push(format!(
            "{mix_inputs}amix=inputs={}:normalize=0[{}]",
            legs.len(),
            kind.label()
        ));
        Some(parts.join(";"))
    }

    /// ffmpeg invocation that writes this layer to `output`.
    pub fn to_ffmpeg_args(&self, output: &Path) -> FfmpegArgs {
        match self {
            TrackPlan::Silence { duration_ms } => silence_args(*duration_ms, output),
            TrackPlan::Layered { kind, legs } if !legs.is_empty() => {
                let mut args = FfmpegArgs::new();
                for leg in legs {
                    args = args.input(&leg.source);
                }
                let graph = self.filter_graph().unwrap_or_default();
                args.filter_complex(graph)
                    .map(format!("[{}]", kind.label()))
                    .flag("-c:a", LAYER_CODEC)
                    .output(output)
            }
            TrackPlan::Layered { .. } => silence_args(0, output),
            TrackPlan::Looped(clip) => FfmpegArgs::new()
                .looped_input(&clip.source)
                .duration_ms(clip.duration_ms)
                .audio_filter(clip.filter_chain())
                .map("0:a")
                .flag("-c:a", LAYER_CODEC)
                .output(output),
        }
    }
}

fn silence_args(duration_ms: u64, output: &Path) -> FfmpegArgs {
    FfmpegArgs::new()
        .lavfi_input(SILENCE_SOURCE)
        .duration_ms(duration_ms)
        .map("0:a")
        .flag("-c:a", LAYER_CODEC)
        .output(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sfx_leg(name: &str, delay_ms: u64, gain: f64) -> Leg {
        Leg {
            source: PathBuf::from(format!("/assets/audio/sfx/{name}.wav")),
            delay_ms,
            gain: Some(gain),
            duration_ms: None,
        }
    }

    #[test]
    fn test_sfx_legs_are_summed_not_averaged() {
        let plan = TrackPlan::Layered {
            kind: TrackKind::Sfx,
            legs: vec![sfx_leg("a", 1_000, 1.0), sfx_leg("b", 1_000, 0.5)],
        };
        assert_eq!(
            plan.filter_graph().unwrap(),
            "[0]adelay=1000|1000,volume=1[s0];\
             [1]adelay=1000|1000,volume=0.5[s1];\
             [s0][s1]amix=inputs=2:normalize=0[sfx]"
        );
        assert!((plan.peak_stacked_gain() - 1.5).abs() < 1e-9);

        let args = plan.to_ffmpeg_args(Path::new("/tmp/sfx.m4a"));
        assert_eq!(args.input_count(), 2);
        assert_eq!(args.mappings(), vec!["[sfx]"]);
        assert_eq!(args.as_slice()[0], "-y");
    }

    #[test]
    fn test_narration_legs_have_no_volume_filter() {
        let plan = TrackPlan::Layered {
            kind: TrackKind::Narration,
            legs: vec![Leg {
                source: PathBuf::from("beat_000.mp3"),
                delay_ms: 250,
                gain: None,
                duration_ms: Some(3_000),
            }],
        };
        assert_eq!(
            plan.filter_graph().unwrap(),
            "[0]adelay=250|250[a0];[a0]amix=inputs=1:normalize=0[narration]"
        );
    }

    #[test]
    fn test_peak_gain_ignores_non_overlapping_legs() {
        let leg = |delay_ms, duration_ms| Leg {
            source: PathBuf::from("x.mp3"),
            delay_ms,
            gain: None,
            duration_ms: Some(duration_ms),
        };
        let plan = TrackPlan::Layered {
            kind: TrackKind::Narration,
            legs: vec![leg(0, 1_000), leg(1_000, 1_000), leg(1_500, 200)],
        };
        assert!((plan.peak_stacked_gain() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_leg_end_saturates() {
        let plan = TrackPlan::Layered {
            kind: TrackKind::Narration,
            legs: vec![Leg {
                source: PathBuf::from("beat_000.mp3"),
                delay_ms: u64::MAX - 10,
                gain: None,
                duration_ms: Some(1_000),
            }],
        };
        assert_eq!(plan.estimated_duration_ms(), u64::MAX);
        assert!((plan.peak_stacked_gain() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_silence_args() {
        let plan = TrackPlan::Silence {
            duration_ms: 12_000,
        };
        let args = plan.to_ffmpeg_args(Path::new("music.m4a"));
        assert_eq!(args.value_of("-i"), Some(SILENCE_SOURCE));
        assert_eq!(args.value_of("-t"), Some("12.000"));
        assert_eq!(args.mappings(), vec!["0:a"]);
        assert_eq!(plan.fixed_duration_ms(), Some(12_000));
        assert_eq!(plan.peak_stacked_gain(), 0.0);
    }

    #[test]
    fn test_looped_music_args() {
        let plan = TrackPlan::Looped(LoopedClip {
            source: PathBuf::from("/assets/audio/music/theme.mp3"),
            duration_ms: 15_500,
            fade_in_ms: 2_000,
            volume: 0.3,
        });
        let args = plan.to_ffmpeg_args(Path::new("music.m4a"));
        assert_eq!(args.value_of("-stream_loop"), Some("-1"));
        assert_eq!(args.value_of("-t"), Some("15.500"));
        assert_eq!(
            args.value_of("-af"),
            Some("afade=t=in:d=2.000,afade=t=out:st=13.500:d=2.000,volume=0.3")
        );
    }

    #[test]
    fn test_looped_music_without_fade_in() {
        let clip = LoopedClip {
            source: PathBuf::from("theme.mp3"),
            duration_ms: 1_500,
            fade_in_ms: 0,
            volume: 1.0,
        };
        assert_eq!(clip.fade_out_start_ms(), 0);
        assert_eq!(
            clip.filter_chain(),
            "afade=t=out:st=0.000:d=1.500,volume=1"
        );
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let plan = TrackPlan::Layered {
            kind: TrackKind::Sfx,
            legs: vec![sfx_leg("gong", 800, 0.8), sfx_leg("bow", 4_300, 1.0)],
        };
        let out = Path::new("/tmp/sfx.m4a");
        assert_eq!(plan.to_ffmpeg_args(out), plan.clone().to_ffmpeg_args(out));
    }
}
