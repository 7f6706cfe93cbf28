use crate::error::{Error, Result};
use crate::streams::{AudioStream, Stream, SubtitleStream, VideoStream};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Stream-level durations and bitrates below this are treated as absent and
/// fall back to the container-level value.
const EPSILON: f64 = 0.01;

/// Immutable description of a probed media file.
///
/// Stream order is probe order; conversions rely on it for positional
/// mapping.
#[derive(Debug, Clone)]
pub struct MediaInfo {
    path: PathBuf,
    size: u64,
    duration_secs: f64,
    streams: Vec<Stream>,
}

impl MediaInfo {
    /// Source path or URI this description was probed from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Container size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Longest stream duration, truncated to whole seconds.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs as u64)
    }

    /// Longest stream duration at full probe precision, in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    /// All streams in probe order.
    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    pub fn video_streams(&self) -> impl Iterator<Item = &VideoStream> {
        self.streams.iter().filter_map(|s| match s {
            Stream::Video(v) => Some(v),
            _ => None,
        })
    }

    pub fn audio_streams(&self) -> impl Iterator<Item = &AudioStream> {
        self.streams.iter().filter_map(|s| match s {
            Stream::Audio(a) => Some(a),
            _ => None,
        })
    }

    pub fn subtitle_streams(&self) -> impl Iterator<Item = &SubtitleStream> {
        self.streams.iter().filter_map(|s| match s {
            Stream::Subtitle(t) => Some(t),
            _ => None,
        })
    }
}

/// Normalize the two ffprobe payloads into a MediaInfo.
pub(crate) fn parse_media_info(
    path: &Path,
    streams_json: &str,
    format_json: &str,
) -> Result<MediaInfo> {
    let payload: ProbePayload = serde_json::from_str(streams_json)
        .map_err(|e| Error::parse("ffprobe", format!("stream listing: {}", e)))?;
    if payload.streams.is_empty() {
        return Err(Error::invalid_media(path));
    }

    let format = serde_json::from_str::<FormatPayload>(format_json)
        .map_err(|e| Error::parse("ffprobe", format!("format listing: {}", e)))?
        .format
        .unwrap_or_default();
    let format_duration = parse_number(format.duration.as_deref());
    let format_bitrate = parse_number(format.bit_rate.as_deref());
    let size = format
        .size
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let mut streams = Vec::new();
    for model in payload.streams {
        let index = model.index.unwrap_or(streams.len());
        let format_name = model.codec_name.clone().unwrap_or_else(|| "unknown".into());
        let duration_secs =
            with_fallback(parse_number(model.duration.as_deref()), format_duration);
        match model.codec_type.as_deref() {
            Some("video") => {
                let width = model.width.unwrap_or(0);
                let height = model.height.unwrap_or(0);
                streams.push(Stream::Video(VideoStream {
                    index,
                    format: format_name,
                    duration_secs,
                    source: path.to_path_buf(),
                    width,
                    height,
                    framerate: parse_framerate(model.r_frame_rate.as_deref()),
                    ratio: aspect_ratio(width, height),
                    bitrate: with_fallback(parse_number(model.bit_rate.as_deref()), format_bitrate)
                        as u64,
                    ..VideoStream::default()
                }));
            }
            Some("audio") => {
                streams.push(Stream::Audio(AudioStream {
                    index,
                    format: format_name,
                    duration_secs,
                    source: path.to_path_buf(),
                    channels: model.channels.unwrap_or(0),
                    sample_rate: model
                        .sample_rate
                        .as_deref()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(0),
                    bitrate: with_fallback(parse_number(model.bit_rate.as_deref()), format_bitrate)
                        as u64,
                    ..AudioStream::default()
                }));
            }
            Some("subtitle") => {
                streams.push(Stream::Subtitle(SubtitleStream {
                    index,
                    format: format_name,
                    source: path.to_path_buf(),
                    language: model.tags.and_then(|t| t.language),
                    ..SubtitleStream::default()
                }));
            }
            // Attachment/data tracks carry nothing a conversion can map.
            _ => {}
        }
    }

    let duration_secs = streams
        .iter()
        .map(Stream::duration_secs)
        .fold(0.0_f64, f64::max);

    Ok(MediaInfo {
        path: path.to_path_buf(),
        size,
        duration_secs,
        streams,
    })
}

/// Parse an ffprobe rational like "25/1" into frames per second, rounded to
/// three decimals.
pub(crate) fn parse_framerate(rate: Option<&str>) -> f64 {
    let Some(rate) = rate else { return 0.0 };
    let parts: Vec<&str> = rate.split('/').collect();
    if parts.len() != 2 {
        return 0.0;
    }
    match (parts[0].parse::<f64>(), parts[1].parse::<f64>()) {
        (Ok(n), Ok(d)) if d > 0.0 => (n / d * 1000.0).round() / 1000.0,
        _ => 0.0,
    }
}

/// Reduce width:height through their greatest common divisor.
pub(crate) fn aspect_ratio(width: u32, height: u32) -> String {
    let divisor = gcd(width, height);
    if divisor == 0 {
        return "0:0".to_string();
    }
    format!("{}:{}", width / divisor, height / divisor)
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn parse_number(value: Option<&str>) -> f64 {
    value.and_then(|v| v.parse::<f64>().ok()).unwrap_or(0.0)
}

fn with_fallback(stream_value: f64, format_value: f64) -> f64 {
    if stream_value > EPSILON {
        stream_value
    } else {
        format_value
    }
}

// JSON deserialization structures

#[derive(Debug, Deserialize)]
struct ProbePayload {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    index: Option<usize>,
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
    tags: Option<StreamTags>,
}

#[derive(Debug, Deserialize)]
struct StreamTags {
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FormatPayload {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
    size: Option<String>,
}
