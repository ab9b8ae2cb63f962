//! ffmpeg argument builder.

use std::path::{Path, PathBuf};

/// Flags every invocation starts with: overwrite output, quiet banner.
pub const BASE_FLAGS: &[&str] = &["-y", "-hide_banner", "-loglevel", "error"];

/// Explicit ffmpeg argument vector.
///
/// `-y` is always the first argument. Inputs, filters and mappings are
/// appended in call order; [`FfmpegArgs::output`] appends the output path
/// last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegArgs {
    args: Vec<String>,
    inputs: usize,
    output: Option<PathBuf>,
}

impl Default for FfmpegArgs {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegArgs {
    pub fn new() -> Self {
        Self {
            args: BASE_FLAGS.iter().map(|flag| flag.to_string()).collect(),
            inputs: 0,
            output: None,
        }
    }

    /// Add a file input (`-i <path>`).
    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.args.push("-i".to_string());
        self.args.push(path_arg(path.as_ref()));
        self.inputs += 1;
        self
    }

    /// Add a file input that repeats forever (`-stream_loop -1 -i <path>`).
    pub fn looped_input(mut self, path: impl AsRef<Path>) -> Self {
        self.args.push("-stream_loop".to_string());
        self.args.push("-1".to_string());
        self.input(path)
    }

    /// Add a generated input (`-f lavfi -i <graph>`).
    pub fn lavfi_input(mut self, graph: impl Into<String>) -> Self {
        self.args.push("-f".to_string());
        self.args.push("lavfi".to_string());
        self.args.push("-i".to_string());
        self.args.push(graph.into());
        self.inputs += 1;
        self
    }

    /// Limit output length (`-t <seconds>`).
    pub fn duration_ms(self, ms: u64) -> Self {
        self.flag("-t", format_secs(ms))
    }

    pub fn filter_complex(self, graph: impl Into<String>) -> Self {
        self.flag("-filter_complex", graph)
    }

    pub fn audio_filter(self, chain: impl Into<String>) -> Self {
        self.flag("-af", chain)
    }

    pub fn video_filter(self, chain: impl Into<String>) -> Self {
        self.flag("-vf", chain)
    }

    /// Map a stream or filter label into the output.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.flag("-map", spec)
    }

    /// Append a flag with its value.
    pub fn flag(mut self, name: &str, value: impl Into<String>) -> Self {
        self.args.push(name.to_string());
        self.args.push(value.into());
        self
    }

    /// Append a bare argument.
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set the output file. Must be the last call.
    pub fn output(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        self.args.push(path_arg(path));
        self.output = Some(path.to_path_buf());
        self
    }

    pub fn as_slice(&self) -> &[String] {
        &self.args
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    pub fn input_count(&self) -> usize {
        self.inputs
    }

    /// Value following the first occurrence of `name`.
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == name)
            .and_then(|idx| self.args.get(idx + 1))
            .map(String::as_str)
    }

    pub fn contains(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// Every value passed with `-map`, in order.
    pub fn mappings(&self) -> Vec<&str> {
        self.args
            .windows(2)
            .filter(|pair| pair[0] == "-map")
            .map(|pair| pair[1].as_str())
            .collect()
    }
}

impl AsRef<[String]> for FfmpegArgs {
    fn as_ref(&self) -> &[String] {
        &self.args
    }
}

/// Format milliseconds as ffmpeg seconds with millisecond precision.
pub fn format_secs(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_overwrite_flag_comes_first() {
        let args = FfmpegArgs::new().input("a.wav").map("0:a").output("out.m4a");
        assert_eq!(args.as_slice()[0], "-y");
        assert!(args.contains("-hide_banner"));
        assert_eq!(args.as_slice().last().map(String::as_str), Some("out.m4a"));
        assert_eq!(args.output_path(), Some(Path::new("out.m4a")));
    }

    #[test]
    fn test_looped_input_precedes_its_path() {
        let args = FfmpegArgs::new().looped_input("/assets/audio/music/theme.mp3");
        let slice = args.as_slice();
        let loop_idx = slice.iter().position(|a| a == "-stream_loop").unwrap();
        assert_eq!(slice[loop_idx + 1], "-1");
        assert_eq!(slice[loop_idx + 2], "-i");
        assert_eq!(slice[loop_idx + 3], "/assets/audio/music/theme.mp3");
        assert_eq!(args.input_count(), 1);
    }

    #[test]
    fn test_lavfi_input_and_duration() {
        let args = FfmpegArgs::new()
            .lavfi_input("anullsrc=r=44100:cl=stereo")
            .duration_ms(12_500);
        assert_eq!(args.value_of("-f"), Some("lavfi"));
        assert_eq!(args.value_of("-i"), Some("anullsrc=r=44100:cl=stereo"));
        assert_eq!(args.value_of("-t"), Some("12.500"));
    }

    #[test]
    fn test_mappings_in_order() {
        let args = FfmpegArgs::new()
            .input("v.webm")
            .input("a.m4a")
            .map("0:v:0")
            .map("1:a:0");
        assert_eq!(args.mappings(), vec!["0:v:0", "1:a:0"]);
    }

    #[test]
    fn test_paths_with_spaces_stay_single_arguments() {
        let args = FfmpegArgs::new().input("my clips/beat 001.mp3");
        assert!(args.contains("my clips/beat 001.mp3"));
    }

    #[test]
    fn test_format_secs() {
        assert_eq!(format_secs(0), "0.000");
        assert_eq!(format_secs(1_005), "1.005");
        assert_eq!(format_secs(10_000), "10.000");
    }

    proptest! {
        #[test]
        fn prop_format_secs_parses_back(ms in 0u64..100_000_000) {
            let secs: f64 = format_secs(ms).parse().unwrap();
            prop_assert_eq!((secs * 1000.0).round() as u64, ms);
        }
    }
}
