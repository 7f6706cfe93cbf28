pub mod audio;
pub mod subtitle;
pub mod video;

pub use audio::AudioStream;
pub use subtitle::SubtitleStream;
pub use video::VideoStream;

use std::path::Path;
use std::time::Duration;

/// Kind of an elementary track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
}

/// One elementary track of a container, with its staged argument fragments.
///
/// Streams come out of a probe (or are built from scratch), get mutated
/// through their kind-specific builders, and are then consumed read-only by
/// a [`Conversion`](crate::Conversion).
#[derive(Debug, Clone)]
pub enum Stream {
    Video(VideoStream),
    Audio(AudioStream),
    Subtitle(SubtitleStream),
}

impl Stream {
    pub fn kind(&self) -> StreamKind {
        match self {
            Stream::Video(_) => StreamKind::Video,
            Stream::Audio(_) => StreamKind::Audio,
            Stream::Subtitle(_) => StreamKind::Subtitle,
        }
    }

    /// Position of the track within its source container.
    pub fn index(&self) -> usize {
        match self {
            Stream::Video(s) => s.index(),
            Stream::Audio(s) => s.index(),
            Stream::Subtitle(s) => s.index(),
        }
    }

    /// The source file (or remote URI) this track comes from.
    pub fn source(&self) -> &Path {
        match self {
            Stream::Video(s) => s.source(),
            Stream::Audio(s) => s.source(),
            Stream::Subtitle(s) => s.source(),
        }
    }

    /// Track duration truncated to whole seconds.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs() as u64)
    }

    /// Track duration at full probe precision, in seconds.
    pub fn duration_secs(&self) -> f64 {
        match self {
            Stream::Video(s) => s.duration_secs(),
            Stream::Audio(s) => s.duration_secs(),
            Stream::Subtitle(_) => 0.0,
        }
    }

    /// Codec/format name reported by the probe.
    pub fn format(&self) -> &str {
        match self {
            Stream::Video(s) => s.format(),
            Stream::Audio(s) => s.format(),
            Stream::Subtitle(s) => s.format(),
        }
    }

    /// Render the staged output-side fragments in the kind's fixed order.
    pub fn build(&self) -> String {
        match self {
            Stream::Video(s) => s.build(),
            Stream::Audio(s) => s.build(),
            Stream::Subtitle(s) => s.build(),
        }
    }

    /// Render the fragments that must precede this stream's input reference.
    pub fn build_input_args(&self) -> String {
        match self {
            Stream::Video(_) => String::new(),
            Stream::Audio(s) => s.build_input_args(),
            Stream::Subtitle(_) => String::new(),
        }
    }
}

impl From<VideoStream> for Stream {
    fn from(stream: VideoStream) -> Self {
        Stream::Video(stream)
    }
}

impl From<AudioStream> for Stream {
    fn from(stream: AudioStream) -> Self {
        Stream::Audio(stream)
    }
}

impl From<SubtitleStream> for Stream {
    fn from(stream: SubtitleStream) -> Self {
        Stream::Subtitle(stream)
    }
}

/// Escape a path for use inside a filter graph: `\` and `:` are filter
/// syntax and must be backslash-escaped.
pub(crate) fn escape_filter_path(path: &str) -> String {
    path.replace('\\', "\\\\").replace(':', "\\:")
}
