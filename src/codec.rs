//! Catalogs of well-known codec, format and filter names.
//!
//! ffmpeg accepts an open set of names (`ffmpeg -codecs`, `ffmpeg -formats`),
//! so each catalog is a thin wrapper around a string with constants for the
//! common values and a constructor for anything else the installed build
//! supports.

use std::borrow::Cow;
use std::fmt;

macro_rules! string_catalog {
    ($(#[$meta:meta])* $name:ident { $($(#[$cmeta:meta])* $konst:ident => $value:literal,)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(Cow<'static, str>);

        impl $name {
            $($(#[$cmeta])* pub const $konst: $name = $name(Cow::Borrowed($value));)*

            /// Wrap an arbitrary name supported by the installed tool.
            pub fn new(name: impl Into<String>) -> Self {
                Self(Cow::Owned(name.into()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_catalog! {
    /// Video codec ("ffmpeg -codecs").
    VideoCodec {
        H264 => "h264",
        HEVC => "hevc",
        MPEG4 => "mpeg4",
        MPEG2VIDEO => "mpeg2video",
        VP8 => "vp8",
        VP9 => "vp9",
        AV1 => "av1",
        LIBX264 => "libx264",
        LIBX265 => "libx265",
        LIBVPX => "libvpx",
        LIBSVTAV1 => "libsvtav1",
        MJPEG => "mjpeg",
        PNG => "png",
    }
}

string_catalog! {
    /// Audio codec ("ffmpeg -codecs").
    AudioCodec {
        AAC => "aac",
        AC3 => "ac3",
        EAC3 => "eac3",
        MP3 => "mp3",
        FLAC => "flac",
        OPUS => "opus",
        VORBIS => "vorbis",
        LIBVORBIS => "libvorbis",
        PCM_S16LE => "pcm_s16le",
        TRUEHD => "truehd",
        DTS => "dts",
    }
}

string_catalog! {
    /// Subtitle codec.
    SubtitleCodec {
        SRT => "srt",
        ASS => "ass",
        SSA => "ssa",
        WEBVTT => "webvtt",
        /// MP4 timed text, the text-based codec used when retaining
        /// subtitles in MP4 output.
        MOV_TEXT => "mov_text",
    }
}

string_catalog! {
    /// Container format ("ffmpeg -formats").
    ContainerFormat {
        AVI => "avi",
        FLV => "flv",
        MATROSKA => "matroska",
        MOV => "mov",
        MP4 => "mp4",
        MPEG => "mpeg",
        MPEGTS => "mpegts",
        OGG => "ogg",
        WEBM => "webm",
        RAWVIDEO => "rawvideo",
    }
}

string_catalog! {
    /// Bitstream filter ("ffmpeg -bsfs").
    BitstreamFilter {
        H264_MP4TOANNEXB => "h264_mp4toannexb",
        HEVC_MP4TOANNEXB => "hevc_mp4toannexb",
        AAC_ADTSTOASC => "aac_adtstoasc",
    }
}

/// Encoder preset, the speed/compression trade-off knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionPreset {
    UltraFast,
    SuperFast,
    VeryFast,
    Faster,
    Fast,
    Medium,
    Slow,
    Slower,
    VerySlow,
}

impl ConversionPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionPreset::UltraFast => "ultrafast",
            ConversionPreset::SuperFast => "superfast",
            ConversionPreset::VeryFast => "veryfast",
            ConversionPreset::Faster => "faster",
            ConversionPreset::Fast => "fast",
            ConversionPreset::Medium => "medium",
            ConversionPreset::Slow => "slow",
            ConversionPreset::Slower => "slower",
            ConversionPreset::VerySlow => "veryslow",
        }
    }
}

impl fmt::Display for ConversionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rotation request mapped onto ffmpeg transpose codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateDegrees {
    /// 90 degrees clockwise (transpose=1).
    Clockwise,
    /// 90 degrees counterclockwise (transpose=2).
    CounterClockwise,
    /// 180 degrees, rendered as a double transpose.
    Invert,
}

impl RotateDegrees {
    /// The numeric code of the transpose filter, if a single transpose
    /// expresses the rotation.
    pub fn transpose_code(&self) -> Option<u8> {
        match self {
            RotateDegrees::Clockwise => Some(1),
            RotateDegrees::CounterClockwise => Some(2),
            RotateDegrees::Invert => None,
        }
    }
}

/// Frame size, either one of the broadcast presets or custom dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSize {
    pub width: u32,
    pub height: u32,
}

impl VideoSize {
    pub const SD480: VideoSize = VideoSize::new(720, 480);
    pub const HD720: VideoSize = VideoSize::new(1280, 720);
    pub const HD1080: VideoSize = VideoSize::new(1920, 1080);
    pub const UHD2160: VideoSize = VideoSize::new(3840, 2160);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for VideoSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Overlay anchor for watermarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    UpperLeft,
    UpperRight,
    Up,
    Left,
    Center,
    Right,
    BottomLeft,
    BottomRight,
    Bottom,
}

impl Position {
    /// The x:y expression for the overlay filter.
    pub fn overlay_expression(&self) -> &'static str {
        match self {
            Position::UpperLeft => "5:5",
            Position::UpperRight => "(main_w-overlay_w):5",
            Position::Up => "(main_w-overlay_w)/2:5",
            Position::Left => "5:(main_h-overlay_h)/2",
            Position::Center => "x=(main_w-overlay_w)/2:y=(main_h-overlay_h)/2",
            Position::Right => "(main_w-overlay_w):(main_h-overlay_h)/2",
            Position::BottomLeft => "5:main_h-overlay_h",
            Position::BottomRight => "(main_w-overlay_w):main_h-overlay_h",
            Position::Bottom => "(main_w-overlay_w)/2:main_h-overlay_h",
        }
    }
}
