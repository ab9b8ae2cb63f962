//! Full render with fake collaborators: 3 scenes, 5 beats (2 silent),
//! one music cue and one SFX cue.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use storyreel_common::{AppConfig, StoryreelError, StoryreelResult};
use storyreel_narration::{count_cues, SpeechRequest, SpeechSynthesizer, VoiceInfo};
use storyreel_pipeline::{Collaborators, RenderPipeline, RenderReport};
use storyreel_renderer_sync::{
    completion_channel, CompletionNotifier, CompletionSignal, RenderSession, Renderer,
    RendererLauncher,
};
use storyreel_script_model::{CueLog, CueLogEntry};
use storyreel_transcoder::{DurationProbe, FfmpegArgs, TranscodeOutput, Transcoder};

const SCRIPT: &str = r#"{
    "episode": { "id": "ep01", "title": "The Bow" },
    "assets": {},
    "scenes": [
        {
            "id": "court",
            "background": "court_hall",
            "music": { "track": "court_theme" },
            "beats": [
                { "narration": "In the court of Mithila" },
                { "narration": "", "actions": [{ "type": "camera_pan", "to": { "x": 0.4, "y": 0.5 } }] }
            ]
        },
        {
            "id": "forest",
            "background": "forest",
            "beats": [{ "narration": "The forest grew quiet" }]
        },
        {
            "id": "bow",
            "background": "court_hall",
            "beats": [
                { "narration": "   " },
                { "narration": "Rama lifted the bow", "actions": [{ "type": "sfx", "clip": "gong" }] }
            ]
        }
    ]
}"#;

/// One second of audio per word; the clip file holds its own duration.
struct WordClockSynthesizer;

#[async_trait]
impl SpeechSynthesizer for WordClockSynthesizer {
    async fn synthesize(&self, request: &SpeechRequest) -> StoryreelResult<String> {
        let words = request.text.split_whitespace().count() as u64;
        let duration_ms = words * 1_000;
        std::fs::write(&request.audio_path, duration_ms.to_string())?;
        Ok(format!(
            "1\n00:00:00,000 --> 00:00:0{},000\n{}\n",
            words, request.text
        ))
    }

    async fn list_voices(&self, _language_prefix: &str) -> StoryreelResult<Vec<VoiceInfo>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "word-clock"
    }
}

struct FileProbe;

#[async_trait]
impl DurationProbe for FileProbe {
    async fn probe_duration_ms(&self, path: &Path) -> StoryreelResult<u64> {
        let raw = std::fs::read_to_string(path)?;
        raw.trim()
            .parse()
            .map_err(|e| StoryreelError::duration_probe(format!("{e}")))
    }
}

/// Writes a few bytes to every output it is asked for.
#[derive(Default)]
struct TouchTranscoder {
    calls: Mutex<Vec<FfmpegArgs>>,
}

#[async_trait]
impl Transcoder for TouchTranscoder {
    async fn run(&self, args: &FfmpegArgs) -> StoryreelResult<TranscodeOutput> {
        self.calls.lock().unwrap().push(args.clone());
        if let Some(output) = args.output_path() {
            std::fs::write(output, b"media")?;
        }
        Ok(TranscodeOutput::ok())
    }

    fn name(&self) -> &str {
        "touch"
    }
}

#[derive(Debug, Default)]
struct Observed {
    durations: Vec<u64>,
    video_dir: Option<PathBuf>,
    started: bool,
    shutdowns: usize,
    dropped: bool,
}

/// How the fake renderer plays the episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Playback {
    /// Completes and leaves a video in the video dir.
    Finish,
    /// Completes without recording anything.
    NoVideo,
    /// Never signals completion.
    Hang,
}

struct FakeLauncher {
    observed: Arc<Mutex<Observed>>,
    playback: Playback,
}

#[async_trait]
impl RendererLauncher for FakeLauncher {
    async fn launch(&self, session: &RenderSession) -> StoryreelResult<Box<dyn Renderer>> {
        self.observed.lock().unwrap().video_dir = Some(session.video_dir.clone());
        Ok(Box::new(FakeRenderer {
            observed: self.observed.clone(),
            video_dir: session.video_dir.clone(),
            playback: self.playback,
            cue_log: CueLog::default(),
            pending: None,
        }))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct FakeRenderer {
    observed: Arc<Mutex<Observed>>,
    video_dir: PathBuf,
    playback: Playback,
    cue_log: CueLog,
    pending: Option<CompletionNotifier>,
}

impl Drop for FakeRenderer {
    fn drop(&mut self) {
        self.observed.lock().unwrap().dropped = true;
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn wait_ready(&mut self) -> StoryreelResult<()> {
        Ok(())
    }

    async fn set_durations(&mut self, durations_ms: &[u64]) -> StoryreelResult<()> {
        self.observed.lock().unwrap().durations = durations_ms.to_vec();
        Ok(())
    }

    async fn start(&mut self) -> StoryreelResult<CompletionSignal> {
        let durations = {
            let mut observed = self.observed.lock().unwrap();
            observed.started = true;
            observed.durations.clone()
        };
        let mut entries = vec![CueLogEntry::music("court_theme", 0, Some(0.4), None)];
        let mut clock = 0;
        for (beat, duration) in durations.iter().enumerate() {
            if *duration > 0 {
                entries.push(CueLogEntry::narration_mark(beat, clock));
                clock += duration + 500;
            }
        }
        entries.push(CueLogEntry::sfx("gong", 800, Some(0.8)));
        self.cue_log = CueLog::new(entries);

        let (notifier, signal) = completion_channel();
        match self.playback {
            Playback::Finish => {
                std::fs::write(self.video_dir.join("page-1.webm"), b"webm-bytes")?;
                notifier.complete();
            }
            Playback::NoVideo => notifier.complete(),
            Playback::Hang => {
                std::fs::write(self.video_dir.join("page-1.webm"), b"partial")?;
                self.pending = Some(notifier);
            }
        }
        Ok(signal)
    }

    async fn cue_log(&mut self) -> StoryreelResult<CueLog> {
        Ok(self.cue_log.clone())
    }

    async fn shutdown(&mut self) -> StoryreelResult<()> {
        self.observed.lock().unwrap().shutdowns += 1;
        Ok(())
    }

    async fn video_artifact(&mut self) -> StoryreelResult<Option<PathBuf>> {
        let path = self.video_dir.join("page-1.webm");
        Ok(path.is_file().then_some(path))
    }
}

struct Fixture {
    _root: tempfile::TempDir,
    script_path: PathBuf,
    output_dir: PathBuf,
}

/// `<root>/scripts/ep01.json` with music and SFX assets under `<root>/audio`.
fn fixture() -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let scripts = root.path().join("scripts");
    let music = root.path().join("audio").join("music");
    let sfx = root.path().join("audio").join("sfx");
    for dir in [&scripts, &music, &sfx] {
        std::fs::create_dir_all(dir).unwrap();
    }
    std::fs::write(music.join("court_theme.mp3"), b"ID3").unwrap();
    std::fs::write(sfx.join("gong.wav"), b"RIFF").unwrap();

    let script_path = scripts.join("ep01.json");
    std::fs::write(&script_path, SCRIPT).unwrap();
    let output_dir = root.path().join("out");
    Fixture {
        _root: root,
        script_path,
        output_dir,
    }
}

fn pipeline(playback: Playback) -> (RenderPipeline, Arc<Mutex<Observed>>, Arc<TouchTranscoder>) {
    let observed = Arc::new(Mutex::new(Observed::default()));
    let transcoder = Arc::new(TouchTranscoder::default());
    let collaborators = Collaborators {
        synthesizer: Arc::new(WordClockSynthesizer),
        probe: Arc::new(FileProbe),
        transcoder: transcoder.clone(),
        launcher: Arc::new(FakeLauncher {
            observed: observed.clone(),
            playback,
        }),
    };
    (
        RenderPipeline::new(collaborators, AppConfig::default()),
        observed,
        transcoder,
    )
}

#[tokio::test]
async fn test_render_three_scenes_five_beats() {
    let fx = fixture();
    let (pipeline, observed, transcoder) = pipeline(Playback::Finish);

    let outcome = pipeline
        .render(&fx.script_path, &fx.output_dir)
        .await
        .unwrap();

    assert_eq!(outcome.video_path, fx.output_dir.join("ep01.mp4"));
    assert!(outcome.video_path.is_file());
    assert_eq!(outcome.size_bytes, 5);

    let srt = std::fs::read_to_string(&outcome.subtitle_path).unwrap();
    assert_eq!(outcome.subtitle_path, fx.output_dir.join("ep01.srt"));
    assert_eq!(count_cues(&srt), 3);
    assert!(srt.find("Mithila").unwrap() < srt.find("forest").unwrap());

    let observed = observed.lock().unwrap();
    assert_eq!(observed.durations, vec![5_000, 0, 4_000, 0, 4_000]);
    assert_eq!(observed.shutdowns, 1);
    let video_dir = observed.video_dir.clone().unwrap();
    assert!(!video_dir.exists());
    assert!(!video_dir.parent().unwrap().exists());

    // Marks at 0, 5500 and 10000; the last narration ends at 14000.
    let report = RenderReport::load(&outcome.report_path).unwrap();
    assert_eq!(report.beats, 5);
    assert_eq!(report.narrated_beats, 3);
    assert_eq!(report.subtitle_entries, 3);
    assert_eq!(report.narration_marks, 3);
    assert_eq!(report.music_cues, 1);
    assert_eq!(report.sfx_cues, 1);
    assert_eq!(report.total_duration_ms, 16_000);
    assert_eq!(report.mixed_duration_ms, 16_000);
    assert!(report.subtitles_burned);
    assert_eq!(report.phases_ms.len(), 4);

    let calls = transcoder.calls.lock().unwrap();
    assert_eq!(calls.len(), 5);
    let assembly = calls.last().unwrap();
    assert_eq!(assembly.mappings(), vec!["0:v:0", "1:a:0"]);
    assert!(assembly.value_of("-vf").unwrap().starts_with("subtitles="));
    let narration_layer = calls
        .iter()
        .find(|c| c.output_path().is_some_and(|p| p.ends_with("narration.m4a")))
        .unwrap();
    assert_eq!(narration_layer.input_count(), 3);
    assert!(narration_layer
        .value_of("-filter_complex")
        .unwrap()
        .contains("[2]adelay=10000|10000[a2]"));
}

#[tokio::test]
async fn test_missing_recording_aborts_before_mixing() {
    let fx = fixture();
    let (pipeline, observed, transcoder) = pipeline(Playback::NoVideo);

    let err = pipeline
        .render(&fx.script_path, &fx.output_dir)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "recording_failed");

    assert!(transcoder.calls.lock().unwrap().is_empty());
    assert!(!fx.output_dir.join("ep01.mp4").exists());
    assert!(!fx.output_dir.join("ep01.srt").exists());
    assert_eq!(std::fs::read_dir(&fx.output_dir).unwrap().count(), 0);
    let observed = observed.lock().unwrap();
    assert_eq!(observed.shutdowns, 1);
    assert!(!observed.video_dir.clone().unwrap().exists());
}

#[tokio::test]
async fn test_bad_script_fails_before_any_external_call() {
    let fx = fixture();
    let (pipeline, observed, _) = pipeline(Playback::Finish);

    let err = pipeline
        .render(&fx.script_path.with_extension("yaml"), &fx.output_dir)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "input");
    assert!(observed.lock().unwrap().video_dir.is_none());

    let err = pipeline
        .render(Path::new("/nonexistent/ep01.json"), &fx.output_dir)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "input");
}

#[tokio::test]
async fn test_dropping_render_releases_work_dir_and_renderer() {
    let fx = fixture();
    let (pipeline, observed, transcoder) = pipeline(Playback::Hang);

    let mut render = Box::pin(pipeline.render(&fx.script_path, &fx.output_dir));
    let playing = async {
        loop {
            if observed.lock().unwrap().started {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::select! {
        result = &mut render => panic!("render should still be waiting: {result:?}"),
        _ = playing => {}
    }
    let video_dir = observed.lock().unwrap().video_dir.clone().unwrap();
    assert!(video_dir.join("page-1.webm").is_file());

    drop(render);

    let observed = observed.lock().unwrap();
    assert!(observed.dropped);
    assert!(!video_dir.exists());
    assert!(!video_dir.parent().unwrap().exists());
    assert!(transcoder.calls.lock().unwrap().is_empty());
    assert_eq!(std::fs::read_dir(&fx.output_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn test_unusable_config_fails_before_any_external_call() {
    let fx = fixture();
    let observed = Arc::new(Mutex::new(Observed::default()));
    let collaborators = Collaborators {
        synthesizer: Arc::new(WordClockSynthesizer),
        probe: Arc::new(FileProbe),
        transcoder: Arc::new(TouchTranscoder::default()),
        launcher: Arc::new(FakeLauncher {
            observed: observed.clone(),
            playback: Playback::Finish,
        }),
    };
    let mut config = AppConfig::default();
    config.renderer.video_extensions.clear();

    let err = RenderPipeline::new(collaborators, config)
        .render(&fx.script_path, &fx.output_dir)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "config");
    assert!(observed.lock().unwrap().video_dir.is_none());
}
