pub mod process;
pub mod snippets;

pub use process::{ConversionProgress, ProgressCallback};

use crate::config::FfmpegConfig;
use crate::error::{Error, Result};
use crate::probe::MediaInfo;
use crate::streams::Stream;
use crate::utils::time::format_timestamp;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tracing::info;

/// Where a free-form parameter lands in the rendered argument string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterPosition {
    /// Before any input reference.
    PreInput,
    /// After the stream mappings.
    PostInput,
    /// Directly before the destination path.
    Output,
    /// Directly before the n-th input reference.
    Input(usize),
}

#[derive(Debug, Clone)]
struct Parameter {
    value: String,
    position: ParameterPosition,
}

/// Lifecycle of a conversion value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversionState {
    /// Built up, not yet started.
    #[default]
    Configured,
    /// Child process in flight.
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// One fully specified external-tool invocation, assembled from streams and
/// free-form parameters.
///
/// Built incrementally, rendered once at execution time. A value that has
/// been started does not go back to `Configured` unless explicitly
/// [`reset`](Conversion::reset).
#[derive(Debug, Clone, Default)]
pub struct Conversion {
    streams: Vec<Stream>,
    parameters: Vec<Parameter>,
    output: Option<PathBuf>,
    overwrite: bool,
    input_time: Option<Duration>,
    skip_result_probe: bool,
    state: ConversionState,
}

/// Outcome of a finished conversion.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    /// Always true for results returned on the success path; failures
    /// surface as [`Error::Conversion`] instead.
    pub success: bool,
    /// The exact rendered argument string that was executed.
    pub arguments: String,
    /// Combined stdout and stderr of the tool.
    pub log: String,
    /// Probe of the produced output, when requested.
    pub media_info: Option<MediaInfo>,
}

impl Conversion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stream; insertion order determines input and map ordering.
    pub fn add_stream(mut self, stream: impl Into<Stream>) -> Self {
        self.streams.push(stream.into());
        self
    }

    /// Append several streams at once.
    pub fn add_streams(mut self, streams: impl IntoIterator<Item = Stream>) -> Self {
        self.streams.extend(streams);
        self
    }

    /// Append a free-form parameter after the stream mappings.
    pub fn add_parameter(self, parameter: impl Into<String>) -> Self {
        self.add_parameter_at(parameter, ParameterPosition::PostInput)
    }

    /// Append a free-form parameter at an explicit position.
    pub fn add_parameter_at(
        mut self,
        parameter: impl Into<String>,
        position: ParameterPosition,
    ) -> Self {
        self.parameters.push(Parameter {
            value: parameter.into().trim().to_string(),
            position,
        });
        self
    }

    /// Set the destination path.
    pub fn set_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Overwrite an existing destination instead of refusing to.
    pub fn set_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Limit how much input time is consumed; also the progress total for
    /// live sources without a duration of their own.
    pub fn set_input_time(mut self, time: Duration) -> Self {
        self.input_time = Some(time);
        self
    }

    /// Encoder preset applied conversion-wide.
    pub fn set_preset(self, preset: crate::codec::ConversionPreset) -> Self {
        self.add_parameter(format!("-preset {}", preset))
    }

    /// Force the output container format.
    pub fn set_format(self, format: crate::codec::ContainerFormat) -> Self {
        self.add_parameter_at(format!("-f {}", format), ParameterPosition::Output)
    }

    /// Skip probing the produced output into the result.
    pub fn without_result_probe(mut self) -> Self {
        self.skip_result_probe = true;
        self
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    pub fn state(&self) -> ConversionState {
        self.state
    }

    /// Make a finished (or failed) conversion startable again.
    pub fn reset(&mut self) {
        self.state = ConversionState::Configured;
    }

    /// Total media time this conversion covers, used as the progress
    /// denominator.
    pub fn total_duration(&self) -> Option<Duration> {
        if let Some(time) = self.input_time {
            return Some(time);
        }
        let max = self
            .streams
            .iter()
            .map(Stream::duration_secs)
            .fold(0.0_f64, f64::max);
        (max > 0.0).then(|| Duration::from_secs_f64(max))
    }

    /// Distinct input sources in first-appearance order.
    fn inputs(&self) -> Vec<&Path> {
        let mut inputs: Vec<&Path> = Vec::new();
        for stream in &self.streams {
            if !inputs.contains(&stream.source()) {
                inputs.push(stream.source());
            }
        }
        inputs
    }

    /// Render the full argument string.
    ///
    /// The string is inspectable on its own and is what `execute` hands to
    /// the tool, token for token.
    pub fn build(&self) -> Result<String> {
        let output = self
            .output
            .as_ref()
            .ok_or_else(|| Error::argument("conversion has no output path"))?;
        if self.streams.is_empty() && self.parameters.is_empty() {
            return Err(Error::argument("conversion has no streams or parameters"));
        }

        let mut args = String::new();

        // Exactly one of the two overwrite markers, never both.
        args.push_str(if self.overwrite { "-y " } else { "-n " });

        if let Some(time) = self.input_time {
            args.push_str(&format!("-t {} ", format_timestamp(time)));
        }
        self.push_parameters(&mut args, ParameterPosition::PreInput);

        let inputs = self.inputs();
        for (input_index, input) in inputs.iter().enumerate() {
            for stream in self.streams.iter().filter(|s| s.source() == *input) {
                args.push_str(&stream.build_input_args());
            }
            self.push_parameters(&mut args, ParameterPosition::Input(input_index));
            args.push_str(&format!("-i {} ", escape_argument(&input.to_string_lossy())));
        }

        for stream in &self.streams {
            let input_index = inputs
                .iter()
                .position(|p| *p == stream.source())
                .unwrap_or(0);
            args.push_str(&format!("-map {}:{} ", input_index, stream.index()));
            args.push_str(&stream.build());
        }

        self.push_parameters(&mut args, ParameterPosition::PostInput);
        self.push_parameters(&mut args, ParameterPosition::Output);

        args.push_str(&escape_argument(&output.to_string_lossy()));
        Ok(args)
    }

    fn push_parameters(&self, args: &mut String, position: ParameterPosition) {
        for parameter in self.parameters.iter().filter(|p| p.position == position) {
            args.push_str(&parameter.value);
            args.push(' ');
        }
    }

    /// Execute without progress reporting or cancellation.
    pub fn execute(&mut self, config: &FfmpegConfig) -> Result<ConversionResult> {
        self.execute_with(config, None, None)
    }

    /// Render the arguments, spawn the tool, stream progress, and report a
    /// structured result.
    ///
    /// A cancellation flag flip kills the child before this returns; a
    /// non-zero exit becomes [`Error::Conversion`] carrying the rendered
    /// arguments and the full diagnostic text.
    pub fn execute_with(
        &mut self,
        config: &FfmpegConfig,
        progress: Option<ProgressCallback>,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<ConversionResult> {
        if self.state() != ConversionState::Configured {
            return Err(Error::argument(
                "conversion was already started; reset() it to run again",
            ));
        }
        let arguments = self.build()?;
        self.state = ConversionState::Running;

        let outcome = process::run_tool(
            &config.ffmpeg_path,
            &arguments,
            self.total_duration(),
            progress,
            cancel,
        );

        match outcome {
            Ok(output) if output.success() => {
                self.state = ConversionState::Succeeded;
                info!("Conversion finished: {}", arguments);
                let media_info = if self.skip_result_probe {
                    None
                } else {
                    self.output
                        .as_ref()
                        .and_then(|path| crate::probe::probe(config, path).ok())
                };
                Ok(ConversionResult {
                    success: true,
                    arguments,
                    log: output.log,
                    media_info,
                })
            }
            Ok(output) => {
                self.state = ConversionState::Failed;
                Err(Error::Conversion {
                    arguments,
                    log: output.log,
                })
            }
            Err(Error::Cancelled) => {
                self.state = ConversionState::Cancelled;
                Err(Error::Cancelled)
            }
            Err(e) => {
                self.state = ConversionState::Failed;
                Err(e)
            }
        }
    }
}

/// Quote a rendered path argument when it carries whitespace, quotes or
/// non-ASCII characters.
pub(crate) fn escape_argument(value: &str) -> String {
    let needs_quoting = value
        .chars()
        .any(|c| c.is_whitespace() || c == '"' || !c.is_ascii());
    if needs_quoting {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::{AudioStream, VideoStream};

    fn video(source: &str, index: usize) -> VideoStream {
        VideoStream::new(source, index)
    }

    fn audio(source: &str, index: usize) -> AudioStream {
        AudioStream::new(source, index)
    }

    #[test]
    fn overwrite_flag_renders_exactly_one_marker() {
        let refuse = Conversion::new()
            .add_stream(video("in.mkv", 0))
            .set_output("out.mp4")
            .build()
            .unwrap();
        assert!(refuse.starts_with("-n "), "{}", refuse);
        assert!(!refuse.contains("-y "), "{}", refuse);

        let overwrite = Conversion::new()
            .add_stream(video("in.mkv", 0))
            .set_overwrite(true)
            .set_output("out.mp4")
            .build()
            .unwrap();
        assert!(overwrite.starts_with("-y "), "{}", overwrite);
        assert!(!overwrite.contains("-n "), "{}", overwrite);
    }

    #[test]
    fn shared_sources_appear_as_one_input() {
        let args = Conversion::new()
            .add_stream(video("movie.mkv", 0))
            .add_stream(audio("movie.mkv", 1))
            .set_output("out.mp4")
            .build()
            .unwrap();
        assert_eq!(args.matches("-i movie.mkv").count(), 1, "{}", args);
        assert!(args.contains("-map 0:0 "), "{}", args);
        assert!(args.contains("-map 0:1 "), "{}", args);
    }

    #[test]
    fn maps_follow_stream_insertion_order_across_inputs() {
        let args = Conversion::new()
            .add_stream(audio("sound.wav", 0))
            .add_stream(video("picture.mkv", 0))
            .set_output("out.mp4")
            .build()
            .unwrap();
        let sound = args.find("-i sound.wav").unwrap();
        let picture = args.find("-i picture.mkv").unwrap();
        assert!(sound < picture, "{}", args);
        // First map belongs to the first-added stream.
        let first_map = args.find("-map 0:0").unwrap();
        let second_map = args.find("-map 1:0").unwrap();
        assert!(first_map < second_map, "{}", args);
    }

    #[test]
    fn audio_seek_precedes_its_input_reference() {
        let args = Conversion::new()
            .add_stream(audio("in.mkv", 1).set_seek(Duration::from_secs(3)))
            .set_output("out.mp4")
            .build()
            .unwrap();
        let seek = args.find("-ss 00:00:03.000").unwrap();
        let input = args.find("-i in.mkv").unwrap();
        assert!(seek < input, "{}", args);
    }

    #[test]
    fn parameters_land_at_their_positions() {
        let args = Conversion::new()
            .add_stream(video("in.mkv", 0))
            .add_parameter_at("-hwaccel auto", ParameterPosition::PreInput)
            .add_parameter("-movflags +faststart")
            .add_parameter_at("-f mp4", ParameterPosition::Output)
            .set_output("out.mp4")
            .build()
            .unwrap();
        let pre = args.find("-hwaccel auto").unwrap();
        let input = args.find("-i in.mkv").unwrap();
        let post = args.find("-movflags +faststart").unwrap();
        let output_param = args.find("-f mp4").unwrap();
        assert!(pre < input && input < post && post < output_param, "{}", args);
        assert!(args.ends_with("out.mp4"), "{}", args);
    }

    #[test]
    fn destination_with_whitespace_is_quoted() {
        let args = Conversion::new()
            .add_stream(video("in.mkv", 0))
            .set_output("my output.mp4")
            .build()
            .unwrap();
        assert!(args.ends_with("\"my output.mp4\""), "{}", args);
    }

    #[test]
    fn missing_output_is_an_argument_error() {
        let result = Conversion::new().add_stream(video("in.mkv", 0)).build();
        assert!(matches!(result, Err(Error::Argument(_))));
    }

    #[test]
    fn input_time_limits_the_progress_total() {
        let conversion = Conversion::new()
            .add_stream(video("in.mkv", 0))
            .set_input_time(Duration::from_secs(300));
        assert_eq!(conversion.total_duration(), Some(Duration::from_secs(300)));
        let args = conversion.set_output("out.mp4").build().unwrap();
        assert!(args.contains("-t 00:05:00.000 "), "{}", args);
    }

    #[test]
    fn running_twice_requires_a_reset() {
        let config = FfmpegConfig::with_paths(
            "/nonexistent/mediaconverter-test/ffmpeg",
            "/nonexistent/mediaconverter-test/ffprobe",
        );
        let mut conversion = Conversion::new()
            .add_stream(video("in.mkv", 0))
            .set_output("out.mp4");

        assert_eq!(conversion.state(), ConversionState::Configured);
        let first = conversion.execute(&config);
        assert!(matches!(first, Err(Error::ProcessStart { .. })));
        assert_eq!(conversion.state(), ConversionState::Failed);

        let second = conversion.execute(&config);
        assert!(matches!(second, Err(Error::Argument(_))));

        conversion.reset();
        assert_eq!(conversion.state(), ConversionState::Configured);
        assert!(matches!(
            conversion.execute(&config),
            Err(Error::ProcessStart { .. })
        ));
    }

    #[test]
    fn escape_argument_quotes_only_when_needed() {
        assert_eq!(escape_argument("plain.mp4"), "plain.mp4");
        assert_eq!(escape_argument("with space.mp4"), "\"with space.mp4\"");
        assert_eq!(escape_argument("naïve.mp4"), "\"naïve.mp4\"");
        assert_eq!(escape_argument("has\"quote.mp4"), "\"has\\\"quote.mp4\"");
    }
}
