//! Orchestration for the external ffmpeg/ffprobe tools.
//!
//! Probes media into a structured model, stages per-stream argument
//! fragments, synthesizes complete tool invocations and executes them with
//! progress and cancellation, and schedules many of them through a pausable
//! worker queue. All actual encoding and decoding stays in the external
//! tools; this crate only needs a path to each binary.
//!
//! ```no_run
//! use mediaconverter::{FfmpegConfig, snippets};
//!
//! fn main() -> mediaconverter::Result<()> {
//!     let config = FfmpegConfig::load();
//!     let info = mediaconverter::probe(&config, "movie.mkv")?;
//!     println!("{} streams, {:?}", info.streams().len(), info.duration());
//!
//!     let mut conversion = snippets::convert(&config, "movie.mkv", "movie.mp4", true)?;
//!     let result = conversion.execute(&config)?;
//!     println!("ran: ffmpeg {}", result.arguments);
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod conversion;
pub mod error;
pub mod probe;
pub mod queue;
pub mod streams;
pub mod utils;

pub use codec::{
    AudioCodec, BitstreamFilter, ContainerFormat, ConversionPreset, Position, RotateDegrees,
    SubtitleCodec, VideoCodec, VideoSize,
};
pub use config::FfmpegConfig;
pub use conversion::{
    Conversion, ConversionProgress, ConversionResult, ConversionState, ParameterPosition,
    ProgressCallback, snippets,
};
pub use error::{Error, Result};
pub use probe::{MediaInfo, probe};
pub use queue::{ConversionQueue, QueueEvent, QueueMode};
pub use streams::{AudioStream, Stream, StreamKind, SubtitleStream, VideoStream};
