//! Prebuilt conversions for the common one-call jobs.
//!
//! Each helper probes its input, stages the right streams and parameters,
//! and hands back a configured [`Conversion`] ready to execute.

use super::{Conversion, ParameterPosition, escape_argument};
use crate::codec::{AudioCodec, Position, SubtitleCodec, VideoCodec, VideoSize};
use crate::config::FfmpegConfig;
use crate::error::{Error, Result};
use crate::probe::{self, MediaInfo};
use crate::streams::Stream;
use std::path::Path;
use std::time::Duration;

/// Convert a file to another container, re-encoding every stream with its
/// detected codec.
pub fn convert(
    config: &FfmpegConfig,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    keep_subtitles: bool,
) -> Result<Conversion> {
    let info = probe::probe(config, input)?;
    Ok(restage_streams(&info, None, keep_subtitles).set_output(output.as_ref()))
}

/// Convert a file re-encoding to explicit codecs.
pub fn transcode(
    config: &FfmpegConfig,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    video_codec: VideoCodec,
    audio_codec: AudioCodec,
    subtitle_codec: SubtitleCodec,
    keep_subtitles: bool,
) -> Result<Conversion> {
    let info = probe::probe(config, input)?;
    Ok(
        restage_streams(&info, Some((video_codec, audio_codec, subtitle_codec)), keep_subtitles)
            .set_output(output.as_ref()),
    )
}

fn restage_streams(
    info: &MediaInfo,
    codecs: Option<(VideoCodec, AudioCodec, SubtitleCodec)>,
    keep_subtitles: bool,
) -> Conversion {
    let mut conversion = Conversion::new();
    for stream in info.streams() {
        match stream {
            Stream::Video(video) => {
                let mut video = video.clone();
                if let Some((video_codec, _, _)) = &codecs {
                    video = video.set_codec(video_codec.clone());
                }
                // Force the detected frame rate; ffmpeg mishandles sources
                // above 100 fps without it.
                let framerate = video.framerate();
                conversion = conversion.add_stream(video.set_framerate(framerate));
            }
            Stream::Audio(audio) => {
                let mut audio = audio.clone();
                if let Some((_, audio_codec, _)) = &codecs {
                    audio = audio.set_codec(audio_codec.clone());
                }
                conversion = conversion.add_stream(audio);
            }
            Stream::Subtitle(subtitle) if keep_subtitles => {
                let codec = codecs
                    .as_ref()
                    .map(|(_, _, subtitle_codec)| subtitle_codec.clone())
                    .unwrap_or(SubtitleCodec::MOV_TEXT);
                conversion = conversion.add_stream(subtitle.clone().set_codec(codec));
            }
            Stream::Subtitle(_) => {}
        }
    }
    conversion
}

/// Concatenate two or more inputs into one output.
///
/// The widest video stream across all inputs sets the target resolution;
/// every input is scaled and timestamp-aligned to it, and inputs without
/// audio borrow a silent bed so the concat filter always sees pairs.
pub fn concatenate(
    config: &FfmpegConfig,
    output: impl AsRef<Path>,
    inputs: &[impl AsRef<Path>],
) -> Result<Conversion> {
    if inputs.len() <= 1 {
        return Err(Error::argument(
            "you must provide at least 2 files for concatenation",
        ));
    }

    let mut sources = Vec::new();
    for input in inputs {
        let info = probe::probe(config, input)?;
        sources.push((input.as_ref().to_string_lossy().into_owned(), info));
    }

    assemble_concatenation(output.as_ref(), &sources)
}

pub(crate) fn assemble_concatenation(
    output: &Path,
    sources: &[(String, MediaInfo)],
) -> Result<Conversion> {
    let target = sources
        .iter()
        .flat_map(|(_, info)| info.video_streams())
        .max_by_key(|stream| stream.width())
        .ok_or_else(|| Error::argument("concatenation inputs carry no video stream"))?;
    let (width, height, ratio) = (target.width(), target.height(), target.ratio().to_string());

    let mut conversion = Conversion::new();
    for (path, _) in sources {
        conversion = conversion
            .add_parameter_at(format!("-i {}", escape_argument(path)), ParameterPosition::PreInput);
    }
    // The silent bed is the input after all real ones.
    let silent_input = sources.len();
    conversion = conversion.add_parameter_at(
        "-t 1 -f lavfi -i anullsrc=r=48000:cl=stereo",
        ParameterPosition::PreInput,
    );

    let mut filter = String::from("-filter_complex \"");
    for (i, _) in sources.iter().enumerate() {
        filter.push_str(&format!(
            "[{i}:v]scale={width}:{height},setdar=dar={ratio},setpts=PTS-STARTPTS[v{i}]; "
        ));
    }
    for (i, (_, info)) in sources.iter().enumerate() {
        if info.audio_streams().next().is_some() {
            filter.push_str(&format!("[v{i}][{i}:a]"));
        } else {
            filter.push_str(&format!("[v{i}][{silent_input}:a]"));
        }
    }
    filter.push_str(&format!(
        "concat=n={}:v=1:a=1 [v] [a]\" -map \"[v]\" -map \"[a]\"",
        sources.len()
    ));

    Ok(conversion
        .add_parameter(filter)
        .add_parameter(format!("-aspect {}", ratio))
        .set_output(output))
}

/// Cut out `duration` of media starting at `start`.
pub fn split(
    config: &FfmpegConfig,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    start: Duration,
    duration: Duration,
) -> Result<Conversion> {
    let info = probe::probe(config, input)?;
    let mut conversion = Conversion::new();
    for stream in info.streams() {
        match stream {
            Stream::Video(video) => {
                conversion = conversion.add_stream(video.clone().split(start, duration));
            }
            Stream::Audio(audio) => {
                conversion = conversion.add_stream(audio.clone().split(start, duration));
            }
            Stream::Subtitle(_) => {}
        }
    }
    Ok(conversion.set_output(output.as_ref()))
}

/// Save a single frame at the given position.
pub fn snapshot(
    config: &FfmpegConfig,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    capture_time: Duration,
) -> Result<Conversion> {
    let info = probe::probe(config, input)?;
    let video = first_video(&info)?
        .set_output_frames_count(1)
        .set_seek(capture_time)?;
    Ok(Conversion::new().add_stream(video).set_output(output.as_ref()))
}

/// Keep only the video track.
pub fn extract_video(
    config: &FfmpegConfig,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> Result<Conversion> {
    let info = probe::probe(config, input)?;
    Ok(Conversion::new()
        .add_stream(first_video(&info)?)
        .set_output(output.as_ref()))
}

/// Keep only the audio tracks.
pub fn extract_audio(
    config: &FfmpegConfig,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> Result<Conversion> {
    let info = probe::probe(config, input)?;
    let audio: Vec<Stream> = info
        .audio_streams()
        .map(|a| Stream::Audio(a.clone()))
        .collect();
    if audio.is_empty() {
        return Err(Error::argument("input has no audio stream"));
    }
    Ok(Conversion::new().add_streams(audio).set_output(output.as_ref()))
}

/// Resize the picture, carrying audio and subtitles over.
pub fn change_size(
    config: &FfmpegConfig,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    size: VideoSize,
) -> Result<Conversion> {
    let info = probe::probe(config, input)?;
    let mut conversion = Conversion::new().add_stream(first_video(&info)?.set_size(size));
    for stream in info.streams() {
        match stream {
            Stream::Audio(_) | Stream::Subtitle(_) => {
                conversion = conversion.add_stream(stream.clone());
            }
            Stream::Video(_) => {}
        }
    }
    Ok(conversion.set_output(output.as_ref()))
}

/// Melt a watermark image into the picture.
pub fn watermark(
    config: &FfmpegConfig,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    image: impl AsRef<Path>,
    position: Position,
) -> Result<Conversion> {
    let info = probe::probe(config, input)?;
    let mut conversion =
        Conversion::new().add_stream(first_video(&info)?.set_watermark(image, position));
    for audio in info.audio_streams() {
        conversion = conversion.add_stream(audio.clone());
    }
    Ok(conversion.set_output(output.as_ref()))
}

/// Record a remote stream URI to a local file, bounded by `duration`.
pub fn save_stream(
    config: &FfmpegConfig,
    uri: &str,
    output: impl AsRef<Path>,
    duration: Option<Duration>,
) -> Result<Conversion> {
    if !uri.contains("://") {
        return Err(Error::argument(format!("malformed source URI: {}", uri)));
    }
    let info = probe::probe(config, uri)?;
    let mut conversion = Conversion::new().add_streams(info.streams().to_vec());
    if let Some(duration) = duration {
        conversion = conversion.set_input_time(duration);
    }
    Ok(conversion.set_output(output.as_ref()))
}

fn first_video(info: &MediaInfo) -> Result<crate::streams::VideoStream> {
    info.video_streams()
        .next()
        .cloned()
        .ok_or_else(|| Error::argument("input has no video stream"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::media_info::parse_media_info;

    fn info(path: &str, with_audio: bool, width: u32, height: u32) -> (String, MediaInfo) {
        let audio = if with_audio {
            r#",{"index": 1, "codec_type": "audio", "codec_name": "aac", "duration": "10.0"}"#
        } else {
            ""
        };
        let streams = format!(
            r#"{{"streams": [
                {{"index": 0, "codec_type": "video", "codec_name": "h264",
                  "width": {width}, "height": {height}, "r_frame_rate": "25/1", "duration": "10.0"}}{audio}
            ]}}"#
        );
        (
            path.to_string(),
            parse_media_info(Path::new(path), &streams, "{}").unwrap(),
        )
    }

    #[test]
    fn concatenation_needs_at_least_two_inputs() {
        let config = FfmpegConfig::default();
        let none: [&str; 0] = [];
        assert!(matches!(
            concatenate(&config, "out.mp4", &none),
            Err(Error::Argument(_))
        ));
        assert!(matches!(
            concatenate(&config, "out.mp4", &["only.mkv"]),
            Err(Error::Argument(_))
        ));
    }

    #[test]
    fn concatenation_scales_everything_to_the_widest_stream() {
        let sources = vec![
            info("small.mkv", true, 640, 360),
            info("large.mkv", true, 1920, 1080),
        ];
        let args = assemble_concatenation(Path::new("out.mp4"), &sources)
            .unwrap()
            .build()
            .unwrap();

        assert!(args.contains("[0:v]scale=1920:1080,setdar=dar=16:9,setpts=PTS-STARTPTS[v0]"));
        assert!(args.contains("[1:v]scale=1920:1080"));
        assert!(args.contains("concat=n=2:v=1:a=1 [v] [a]"));
        assert!(args.contains("-map \"[v]\" -map \"[a]\""), "{}", args);
        assert!(args.contains("-aspect 16:9"), "{}", args);
        let first_input = args.find("-i small.mkv").unwrap();
        let second_input = args.find("-i large.mkv").unwrap();
        assert!(first_input < second_input);
    }

    #[test]
    fn silent_bed_backs_inputs_without_audio() {
        let sources = vec![
            info("mute.mkv", false, 1280, 720),
            info("loud.mkv", true, 1280, 720),
        ];
        let args = assemble_concatenation(Path::new("out.mp4"), &sources)
            .unwrap()
            .build()
            .unwrap();

        assert!(args.contains("anullsrc=r=48000:cl=stereo"), "{}", args);
        // The mute input borrows audio from the lavfi input (index 2).
        assert!(args.contains("[v0][2:a]"), "{}", args);
        assert!(args.contains("[v1][1:a]"), "{}", args);
    }

    #[test]
    fn malformed_uri_is_rejected_before_probing() {
        let config = FfmpegConfig::default();
        let result = save_stream(&config, "not-a-uri", "out.mp4", None);
        assert!(matches!(result, Err(Error::Argument(_))));
    }
}
