use super::escape_filter_path;
use crate::codec::{BitstreamFilter, ConversionPreset, Position, RotateDegrees, VideoCodec, VideoSize};
use crate::error::{Error, Result};
use crate::utils::time::format_timestamp;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A video track and its staged argument fragments.
///
/// Mutators stage text only; nothing touches the outside world until the
/// owning conversion renders and executes. Each fragment kind is
/// write-once: staging it again replaces the previous value.
#[derive(Debug, Clone, Default)]
pub struct VideoStream {
    pub(crate) index: usize,
    pub(crate) format: String,
    pub(crate) duration_secs: f64,
    pub(crate) source: PathBuf,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) framerate: f64,
    pub(crate) ratio: String,
    pub(crate) bitrate: u64,

    pub(crate) scale: Option<String>,
    pub(crate) codec: Option<String>,
    pub(crate) bitrate_arg: Option<String>,
    pub(crate) framerate_arg: Option<String>,
    pub(crate) preset: Option<String>,
    pub(crate) bitstream_filter: Option<String>,
    pub(crate) seek: Option<String>,
    pub(crate) frame_count: Option<String>,
    pub(crate) loop_count: Option<String>,
    pub(crate) split: Option<String>,
    pub(crate) reverse: Option<String>,
    pub(crate) rotate: Option<String>,
    pub(crate) size: Option<String>,
    pub(crate) burn_subtitles: Option<String>,
    pub(crate) watermark: Option<String>,
    pub(crate) speed: Option<String>,
}

impl VideoStream {
    /// Create a bare video stream for the given source; metadata stays at
    /// its zero values until a probe fills it in.
    pub fn new(source: impl Into<PathBuf>, index: usize) -> Self {
        Self {
            index,
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Frames per second, rounded to three decimals at probe time.
    pub fn framerate(&self) -> f64 {
        self.framerate
    }

    /// Display aspect ratio reduced through the GCD, e.g. "16:9".
    pub fn ratio(&self) -> &str {
        &self.ratio
    }

    pub fn bitrate(&self) -> u64 {
        self.bitrate
    }

    /// Duration truncated to whole seconds.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs as u64)
    }

    /// Duration at full probe precision, in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    /// Select the output codec.
    pub fn set_codec(mut self, codec: VideoCodec) -> Self {
        self.codec = Some(format!("-c:v {} ", codec));
        self
    }

    /// Pass the track through without re-encoding.
    pub fn copy_stream(mut self) -> Self {
        self.codec = Some("-c:v copy ".to_string());
        self
    }

    /// Target bitrate in kilobits per second.
    pub fn set_bitrate(mut self, kilobits: u64) -> Self {
        self.bitrate_arg = Some(format!("-b:v {}k ", kilobits));
        self
    }

    /// Force the output frame rate.
    pub fn set_framerate(mut self, framerate: f64) -> Self {
        self.framerate_arg = Some(format!("-r {} ", framerate));
        self
    }

    /// Scale the track through the scale filter.
    pub fn set_scale(mut self, size: VideoSize) -> Self {
        self.scale = Some(format!("-vf scale={}:{} ", size.width, size.height));
        self
    }

    /// Set the output frame size.
    pub fn set_size(mut self, size: VideoSize) -> Self {
        self.size = Some(format!("-s {} ", size));
        self
    }

    /// Encoder speed/compression preset.
    pub fn set_preset(mut self, preset: ConversionPreset) -> Self {
        self.preset = Some(format!("-preset {} ", preset));
        self
    }

    pub fn set_bitstream_filter(mut self, filter: BitstreamFilter) -> Self {
        self.bitstream_filter = Some(format!("-bsf:v {} ", filter));
        self
    }

    /// Seek before decoding starts.
    ///
    /// Rejected when the requested position lies beyond the track itself.
    pub fn set_seek(mut self, seek: Duration) -> Result<Self> {
        if seek.as_secs_f64() > self.duration_secs {
            return Err(Error::argument(
                "seek can not be greater than video duration",
            ));
        }
        self.seek = Some(format!("-ss {} ", format_timestamp(seek)));
        Ok(self)
    }

    /// Emit only the first `count` frames.
    pub fn set_output_frames_count(mut self, count: u32) -> Self {
        self.frame_count = Some(format!("-frames:v {} ", count));
        self
    }

    /// Loop the output `count` times, with an optional delay appended after
    /// the final loop.
    pub fn set_loop(mut self, count: u32, final_delay: Option<Duration>) -> Self {
        let mut fragment = format!("-loop {} ", count);
        if let Some(delay) = final_delay {
            fragment.push_str(&format!("-final_delay {} ", delay.as_secs()));
        }
        self.loop_count = Some(fragment);
        self
    }

    /// Keep only `duration` of output starting at `start`, trimmed at
    /// output-mapping time.
    pub fn split(mut self, start: Duration, duration: Duration) -> Self {
        self.split = Some(format!(
            "-ss {} -t {} ",
            format_timestamp(start),
            format_timestamp(duration)
        ));
        self
    }

    /// Reverse playback.
    pub fn reverse(mut self) -> Self {
        self.reverse = Some("-vf reverse ".to_string());
        self
    }

    /// Rotate via the transpose filter; a 180 degree turn needs two passes.
    pub fn rotate(mut self, degrees: RotateDegrees) -> Self {
        self.rotate = Some(match degrees.transpose_code() {
            Some(code) => format!("-vf \"transpose={}\" ", code),
            None => "-vf \"transpose=2,transpose=2\" ".to_string(),
        });
        self
    }

    /// Change playback speed. Multipliers outside 0.5..=2.0 are rejected,
    /// matching what the audio tempo filter can follow.
    pub fn change_speed(mut self, multiplier: f64) -> Result<Self> {
        if !(0.5..=2.0).contains(&multiplier) {
            return Err(Error::argument(
                "speed multiplier must be between 0.5 and 2.0",
            ));
        }
        self.speed = Some(format!("setpts={:.3}*PTS", 1.0 / multiplier));
        Ok(self)
    }

    /// Burn a subtitle file into the picture.
    pub fn burn_subtitles(
        mut self,
        subtitle_path: impl AsRef<Path>,
        encoding: Option<&str>,
        style: Option<&str>,
        original_size: Option<VideoSize>,
    ) -> Self {
        let mut filter = format!(
            "subtitles='{}'",
            escape_filter_path(&subtitle_path.as_ref().to_string_lossy())
        );
        if let Some(encoding) = encoding {
            filter.push_str(&format!(":charenc={}", encoding));
        }
        if let Some(style) = style {
            filter.push_str(&format!(":force_style='{}'", style));
        }
        if let Some(size) = original_size {
            filter.push_str(&format!(":original_size={}", size));
        }
        self.burn_subtitles = Some(filter);
        self
    }

    /// Overlay a watermark image at the given anchor.
    pub fn set_watermark(mut self, image_path: impl AsRef<Path>, position: Position) -> Self {
        self.watermark = Some(format!(
            "movie={}[wm];[in][wm]overlay={}[out]",
            escape_filter_path(&image_path.as_ref().to_string_lossy()),
            position.overlay_expression()
        ));
        self
    }

    /// Concatenate the staged fragments in the fixed render order.
    ///
    /// The order is independent of the order mutators were called; ffmpeg
    /// applies options in textual sequence, so it must not drift.
    pub fn build(&self) -> String {
        let mut args = String::new();
        for fragment in [
            &self.scale,
            &self.codec,
            &self.bitrate_arg,
            &self.framerate_arg,
            &self.preset,
            &self.bitstream_filter,
            &self.seek,
            &self.frame_count,
            &self.loop_count,
            &self.split,
            &self.reverse,
            &self.rotate,
            &self.size,
        ]
        .into_iter()
        .flatten()
        {
            args.push_str(fragment);
        }
        args.push_str(&self.build_filter_graph());
        args
    }

    /// Render the filter-graph slot: burned subtitles, watermark and speed
    /// chained in one -filter:v argument.
    fn build_filter_graph(&self) -> String {
        let filters: Vec<&str> = [&self.burn_subtitles, &self.watermark, &self.speed]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect();
        if filters.is_empty() {
            return String::new();
        }
        format!("-filter:v \"{}\" ", filters.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probed_stream() -> VideoStream {
        VideoStream {
            index: 0,
            format: "h264".to_string(),
            duration_secs: 13.0,
            source: PathBuf::from("input.mkv"),
            width: 1280,
            height: 720,
            framerate: 25.0,
            ratio: "16:9".to_string(),
            bitrate: 860_233,
            ..VideoStream::default()
        }
    }

    #[test]
    fn fragments_render_in_fixed_order_regardless_of_call_order() {
        let built = probed_stream()
            .split(Duration::from_secs(2), Duration::from_secs(4))
            .set_codec(VideoCodec::H264)
            .set_seek(Duration::from_secs(1))
            .unwrap()
            .set_scale(VideoSize::HD720)
            .build();

        let scale = built.find("-vf scale=").unwrap();
        let codec = built.find("-c:v").unwrap();
        let seek = built.find("-ss 00:00:01").unwrap();
        let split = built.find("-ss 00:00:02.000 -t 00:00:04.000").unwrap();
        assert!(scale < codec && codec < seek && seek < split, "{}", built);
    }

    #[test]
    fn seek_and_split_are_reproducible_independently() {
        let seek_only = probed_stream().set_seek(Duration::from_secs(3)).unwrap();
        assert_eq!(seek_only.build(), "-ss 00:00:03.000 ");

        let split_only = probed_stream().split(Duration::from_secs(3), Duration::from_secs(2));
        assert_eq!(split_only.build(), "-ss 00:00:03.000 -t 00:00:02.000 ");
    }

    #[test]
    fn seek_beyond_duration_is_rejected() {
        let result = probed_stream().set_seek(Duration::from_secs(14));
        assert!(matches!(result, Err(Error::Argument(_))));
    }

    #[test]
    fn last_write_wins_per_fragment_kind() {
        let built = probed_stream()
            .set_codec(VideoCodec::MPEG4)
            .set_codec(VideoCodec::H264)
            .build();
        assert_eq!(built, "-c:v h264 ");
    }

    #[test]
    fn invert_rotation_emits_double_transpose() {
        let built = probed_stream().rotate(RotateDegrees::Invert).build();
        assert_eq!(built, "-vf \"transpose=2,transpose=2\" ");

        let clockwise = probed_stream().rotate(RotateDegrees::Clockwise).build();
        assert_eq!(clockwise, "-vf \"transpose=1\" ");
    }

    #[test]
    fn burned_subtitles_escape_filter_separators() {
        let built = probed_stream()
            .burn_subtitles(r"C:\subs\movie.srt", None, None, None)
            .build();
        assert_eq!(
            built,
            "-filter:v \"subtitles='C\\:\\\\subs\\\\movie.srt'\" "
        );
    }

    #[test]
    fn watermark_renders_overlay_with_image_path() {
        let built = probed_stream()
            .set_watermark("logo.png", Position::BottomRight)
            .build();
        assert!(built.contains("overlay="), "{}", built);
        assert!(built.contains("logo.png"), "{}", built);
    }

    #[test]
    fn copy_stream_replaces_codec_selection() {
        let built = probed_stream()
            .set_codec(VideoCodec::HEVC)
            .copy_stream()
            .build();
        assert_eq!(built, "-c:v copy ");
    }

    #[test]
    fn speed_outside_supported_range_is_rejected() {
        assert!(probed_stream().change_speed(4.0).is_err());
        assert!(probed_stream().change_speed(1.5).is_ok());
    }
}
