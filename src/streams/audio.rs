use crate::codec::{AudioCodec, BitstreamFilter};
use crate::error::{Error, Result};
use crate::utils::time::format_timestamp;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// An audio track and its staged argument fragments.
///
/// Seek is an input-side fragment here: it is emitted ahead of the source's
/// input reference so ffmpeg can seek before demuxing.
#[derive(Debug, Clone, Default)]
pub struct AudioStream {
    pub(crate) index: usize,
    pub(crate) format: String,
    pub(crate) duration_secs: f64,
    pub(crate) source: PathBuf,
    pub(crate) channels: u32,
    pub(crate) sample_rate: u32,
    pub(crate) bitrate: u64,

    pub(crate) codec: Option<String>,
    pub(crate) bitstream_filter: Option<String>,
    pub(crate) sample_rate_arg: Option<String>,
    pub(crate) channels_arg: Option<String>,
    pub(crate) bitrate_arg: Option<String>,
    pub(crate) reverse: Option<String>,
    pub(crate) split: Option<String>,
    pub(crate) seek: Option<String>,
    pub(crate) speed: Option<String>,
}

impl AudioStream {
    /// Create a bare audio stream for the given source.
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

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
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
    pub fn set_codec(mut self, codec: AudioCodec) -> Self {
        self.codec = Some(format!("-c:a {} ", codec));
        self
    }

    /// Pass the track through without re-encoding.
    pub fn copy_stream(mut self) -> Self {
        self.codec = Some("-c:a copy ".to_string());
        self
    }

    pub fn set_bitstream_filter(mut self, filter: BitstreamFilter) -> Self {
        self.bitstream_filter = Some(format!("-bsf:a {} ", filter));
        self
    }

    /// Output sample rate in Hz.
    pub fn set_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate_arg = Some(format!("-ar:{} {} ", self.index, sample_rate));
        self
    }

    /// Output channel count.
    pub fn set_channels(mut self, channels: u32) -> Self {
        self.channels_arg = Some(format!("-ac:{} {} ", self.index, channels));
        self
    }

    /// Target bitrate in kilobits per second.
    pub fn change_bitrate(mut self, kilobits: u64) -> Self {
        self.bitrate_arg = Some(format!("-b:a:{} {}k ", self.index, kilobits));
        self
    }

    /// Seek before the input is demuxed.
    pub fn set_seek(mut self, seek: Duration) -> Self {
        self.seek = Some(format!("-ss {} ", format_timestamp(seek)));
        self
    }

    /// Keep only `duration` of output starting at `start`.
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
        self.reverse = Some("-af areverse ".to_string());
        self
    }

    /// Change playback tempo. atempo only follows multipliers in 0.5..=2.0.
    pub fn change_speed(mut self, multiplier: f64) -> Result<Self> {
        if !(0.5..=2.0).contains(&multiplier) {
            return Err(Error::argument(
                "speed multiplier must be between 0.5 and 2.0",
            ));
        }
        self.speed = Some(format!("-filter:a \"atempo={}\" ", multiplier));
        Ok(self)
    }

    /// Concatenate the staged output-side fragments in the fixed order.
    pub fn build(&self) -> String {
        let mut args = String::new();
        for fragment in [
            &self.codec,
            &self.bitstream_filter,
            &self.sample_rate_arg,
            &self.channels_arg,
            &self.bitrate_arg,
            &self.reverse,
            &self.split,
            &self.speed,
        ]
        .into_iter()
        .flatten()
        {
            args.push_str(fragment);
        }
        args
    }

    /// Render the input-side fragments (seek) for this stream's source.
    pub fn build_input_args(&self) -> String {
        self.seek.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probed_stream() -> AudioStream {
        AudioStream {
            index: 1,
            format: "aac".to_string(),
            duration_secs: 13.0,
            source: PathBuf::from("input.mkv"),
            channels: 2,
            sample_rate: 48_000,
            bitrate: 128_000,
            ..AudioStream::default()
        }
    }

    #[test]
    fn fragments_render_in_fixed_order() {
        let built = probed_stream()
            .split(Duration::from_secs(0), Duration::from_secs(5))
            .set_channels(2)
            .set_sample_rate(44_100)
            .set_codec(AudioCodec::AAC)
            .build();
        assert_eq!(
            built,
            "-c:a aac -ar:1 44100 -ac:1 2 -ss 00:00:00.000 -t 00:00:05.000 "
        );
    }

    #[test]
    fn seek_is_input_side_not_output_side() {
        let stream = probed_stream().set_seek(Duration::from_secs(3));
        assert_eq!(stream.build_input_args(), "-ss 00:00:03.000 ");
        assert_eq!(stream.build(), "");
    }

    #[test]
    fn reverse_uses_audio_filter() {
        assert_eq!(probed_stream().reverse().build(), "-af areverse ");
    }

    #[test]
    fn tempo_outside_supported_range_is_rejected() {
        assert!(probed_stream().change_speed(0.1).is_err());
        let built = probed_stream().change_speed(1.5).unwrap().build();
        assert_eq!(built, "-filter:a \"atempo=1.5\" ");
    }
}
