//! Render orchestrator.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use storyreel_assembly::{AssemblyEngine, AssemblyRequest};
use storyreel_audio_mix::{AssetLocator, AudioMixer, TimelineBuilder};
use storyreel_common::{AppConfig, RenderScope, RunClock, StoryreelError, StoryreelResult};
use storyreel_narration::{
    beat_durations, count_cues, save_subtitle_file, EdgeTtsSynthesizer, NarrationEngine,
    NarrationOptions, SpeechSynthesizer,
};
use storyreel_renderer_sync::{
    ProcessRendererLauncher, RenderSession, RendererLauncher, SyncDriver, SyncTimeouts,
};
use storyreel_script_model::{load_episode, EpisodeScript};
use storyreel_transcoder::{DurationProbe, FfmpegTranscoder, Transcoder};

use crate::report::RenderReport;

/// Prefix of the per-invocation working directory.
pub const WORK_DIR_PREFIX: &str = "storyreel_";

/// External collaborators used by a render.
#[derive(Clone)]
pub struct Collaborators {
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub probe: Arc<dyn DurationProbe>,
    pub transcoder: Arc<dyn Transcoder>,
    pub launcher: Arc<dyn RendererLauncher>,
}

impl Collaborators {
    /// edge-tts, ffmpeg/ffprobe and the process bridge renderer.
    pub fn from_config(config: &AppConfig) -> Self {
        let ffmpeg = Arc::new(FfmpegTranscoder::new(&config.transcoder));
        Self {
            synthesizer: Arc::new(EdgeTtsSynthesizer::new(
                config.narration.synthesizer_command.clone(),
            )),
            probe: ffmpeg.clone(),
            transcoder: ffmpeg,
            launcher: Arc::new(ProcessRendererLauncher::new(config.renderer.clone())),
        }
    }
}

/// Artifacts of a successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    pub video_path: PathBuf,
    pub subtitle_path: PathBuf,
    pub report_path: PathBuf,
    pub size_bytes: u64,
}

/// Renders episode scripts into narrated videos.
pub struct RenderPipeline {
    collaborators: Collaborators,
    config: AppConfig,
}

impl RenderPipeline {
    pub fn new(collaborators: Collaborators, config: AppConfig) -> Self {
        Self {
            collaborators,
            config,
        }
    }

    /// Pipeline with the production collaborators.
    pub fn from_config(config: AppConfig) -> Self {
        Self::new(Collaborators::from_config(&config), config)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Render `script_path` into `output_dir`.
    ///
    /// Phases run in order and the first fatal error aborts the render.
    /// Artifacts are built in the working directory and only moved into
    /// `output_dir` once assembly has succeeded. Dropping the returned
    /// future cancels in-flight external processes and removes the
    /// working directory.
    pub async fn render(
        &self,
        script_path: &Path,
        output_dir: &Path,
    ) -> StoryreelResult<RenderOutcome> {
        let script = load_episode(script_path).map_err(|e| StoryreelError::input(e.to_string()))?;
        self.config.validate()?;
        let episode_id = script.episode.id.clone();

        let scope = RenderScope::new(&episode_id);
        let clock = RunClock::start();
        let mut phases_ms = BTreeMap::new();

        std::fs::create_dir_all(output_dir)?;
        let work_dir = tempfile::Builder::new()
            .prefix(WORK_DIR_PREFIX)
            .tempdir()?;
        let audio_dir = work_dir.path().join("audio");
        let video_dir = work_dir.path().join("video");
        std::fs::create_dir_all(&audio_dir)?;
        std::fs::create_dir_all(&video_dir)?;

        tracing::info!(
            parent: scope.span(),
            script = %script_path.display(),
            output_dir = %output_dir.display(),
            work_dir = %work_dir.path().display(),
            "Render started"
        );

        // Timing.
        let phase = clock.phase("timing");
        let texts = script.narration_texts();
        let narrations = NarrationEngine::new(
            self.collaborators.synthesizer.clone(),
            self.collaborators.probe.clone(),
            &audio_dir,
            self.narration_options(&script),
        )
        .with_span(scope.component("narration"))
        .synthesize_all(&texts)
        .await?;
        let durations = beat_durations(&narrations);
        debug_assert_eq!(durations.len(), texts.len());

        let staged_subtitles = work_dir.path().join(format!("{episode_id}.srt"));
        save_subtitle_file(&narrations, &staged_subtitles)?;
        let subtitle_entries = count_cues(&std::fs::read_to_string(&staged_subtitles)?);
        finish_phase(&scope, &mut phases_ms, phase);

        // Recording.
        let phase = clock.phase("recording");
        let session = RenderSession {
            script_path: script_path.to_path_buf(),
            video_dir: video_dir.clone(),
            resolution: script.episode.resolution,
        };
        let recording = SyncDriver::new(
            self.collaborators.launcher.clone(),
            SyncTimeouts::from(&self.config.renderer),
        )
        .with_span(scope.component("renderer"))
        .record(&session, &durations)
        .await?;
        finish_phase(&scope, &mut phases_ms, phase);

        // Mixing.
        let phase = clock.phase("mixing");
        let timeline = TimelineBuilder::new(self.asset_locator(script_path))
            .with_span(scope.component("timeline"))
            .plan(recording.cue_log.clone(), &narrations);
        let mixed = AudioMixer::new(self.collaborators.transcoder.clone(), &audio_dir)
            .with_span(scope.component("mixdown"))
            .mixdown(&timeline)
            .await?;
        finish_phase(&scope, &mut phases_ms, phase);

        // Assembly.
        let phase = clock.phase("assembly");
        let assembled = AssemblyEngine::new(self.collaborators.transcoder.clone())
            .with_span(scope.component("assembly"))
            .assemble(&AssemblyRequest {
                video_path: recording.video_path.clone(),
                audio_path: mixed.path.clone(),
                subtitle_path: (subtitle_entries > 0).then(|| staged_subtitles.clone()),
                output_path: work_dir.path().join(format!("{episode_id}.mp4")),
            })
            .await?;
        finish_phase(&scope, &mut phases_ms, phase);

        let video_path = output_dir.join(format!("{episode_id}.mp4"));
        let subtitle_path = output_dir.join(format!("{episode_id}.srt"));
        publish(&assembled.output_path, &video_path)?;
        publish(&staged_subtitles, &subtitle_path)?;

        let report = RenderReport {
            run_id: scope.run_id().to_string(),
            episode_id: episode_id.clone(),
            title: script.episode.title.clone(),
            started_at: clock.started_at(),
            finished_at: chrono::Utc::now(),
            beats: texts.len(),
            narrated_beats: script.narrated_beat_count(),
            subtitle_entries,
            narration_marks: timeline.cue_counts.narration_marks,
            music_cues: timeline.cue_counts.music,
            sfx_cues: timeline.cue_counts.sfx,
            total_duration_ms: timeline.total_duration_ms,
            mixed_duration_ms: mixed.duration_ms,
            pairing: format!("{:?}", timeline.pairing),
            subtitles_burned: assembled.subtitles_burned,
            video_path: video_path.clone(),
            subtitle_path: subtitle_path.clone(),
            size_bytes: assembled.size_bytes,
            phases_ms,
        };
        let report_path = output_dir.join(RenderReport::file_name(&episode_id));
        report.save(&report_path)?;

        tracing::info!(
            parent: scope.span(),
            video = %video_path.display(),
            size_mb = %format!("{:.1}", assembled.size_mb()),
            elapsed_secs = clock.elapsed_secs(),
            "Render complete"
        );

        Ok(RenderOutcome {
            video_path,
            subtitle_path,
            report_path,
            size_bytes: assembled.size_bytes,
        })
    }

    /// Config defaults, with the script's voice and rate taking precedence.
    fn narration_options(&self, script: &EpisodeScript) -> NarrationOptions {
        let mut options = NarrationOptions::from(&self.config.narration);
        let settings = &script.episode.narration;
        if !settings.voice.trim().is_empty() {
            options.voice = settings.voice.clone();
        }
        if !settings.rate.trim().is_empty() {
            options.rate = settings.rate.clone();
        }
        options
    }

    fn asset_locator(&self, script_path: &Path) -> AssetLocator {
        match &self.config.assets_dir {
            Some(dir) => AssetLocator::new(dir),
            None => AssetLocator::for_script(script_path),
        }
    }
}

/// Move a finished artifact out of the working directory.
fn publish(staged: &Path, destination: &Path) -> StoryreelResult<()> {
    // The working directory may sit on another filesystem.
    if std::fs::rename(staged, destination).is_err() {
        std::fs::copy(staged, destination)?;
    }
    Ok(())
}

fn finish_phase(
    scope: &RenderScope,
    phases_ms: &mut BTreeMap<String, u64>,
    phase: storyreel_common::PhaseTimer,
) {
    let name = phase.name();
    let elapsed_ms = phase.finish();
    tracing::info!(parent: scope.span(), phase = name, elapsed_ms, "Phase finished");
    phases_ms.insert(name.to_string(), elapsed_ms);
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyreel_common::NarrationDefaults;

    #[test]
    fn test_script_voice_overrides_config() {
        let script = EpisodeScript::from_json(
            r#"{
                "episode": {
                    "id": "ep01",
                    "title": "The Bow",
                    "narration": { "voice": "en-IN-PrabhatNeural", "rate": "-10%" }
                },
                "scenes": [{ "id": "s1", "background": "court", "beats": [] }]
            }"#,
            Path::new("ep01.json"),
        )
        .unwrap();

        let config = AppConfig {
            narration: NarrationDefaults {
                max_concurrency: 2,
                ..NarrationDefaults::default()
            },
            ..AppConfig::default()
        };
        let pipeline = RenderPipeline::from_config(config);
        let options = pipeline.narration_options(&script);
        assert_eq!(options.voice, "en-IN-PrabhatNeural");
        assert_eq!(options.rate, "-10%");
        assert_eq!(options.max_concurrency, 2);
    }

    #[test]
    fn test_publish_moves_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("ep01.srt");
        std::fs::write(&staged, "1\n00:00:00,000 --> 00:00:01,000\nHi\n").unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();

        publish(&staged, &out.join("ep01.srt")).unwrap();
        assert!(!staged.exists());
        assert!(std::fs::read_to_string(out.join("ep01.srt")).unwrap().contains("Hi"));
    }

    #[test]
    fn test_assets_dir_override() {
        let config = AppConfig {
            assets_dir: Some(PathBuf::from("/srv/assets")),
            ..AppConfig::default()
        };
        let pipeline = RenderPipeline::from_config(config);
        let locator = pipeline.asset_locator(Path::new("/work/show/scripts/ep01.json"));
        assert_eq!(locator.root(), Path::new("/srv/assets"));

        let pipeline = RenderPipeline::from_config(AppConfig::default());
        let locator = pipeline.asset_locator(Path::new("/work/show/scripts/ep01.json"));
        assert_eq!(locator.root(), Path::new("/work/show"));
    }
}
