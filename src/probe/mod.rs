pub mod media_info;

pub use media_info::MediaInfo;

use crate::config::FfmpegConfig;
use crate::error::{Error, Result};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Probe a media file (or remote URI) and normalize the result.
///
/// Spawns the probe binary twice, once for the stream listing and once for
/// the format listing. Unreadable or unsupported inputs surface as
/// [`Error::InvalidMedia`]; nothing is retried.
pub fn probe(config: &FfmpegConfig, path: impl AsRef<Path>) -> Result<MediaInfo> {
    let path = path.as_ref();
    let path_arg = path.to_string_lossy();
    let path_arg: &str = path_arg.as_ref();

    let streams_json = run_ffprobe(
        config,
        &["-v", "quiet", "-print_format", "json", "-show_streams", path_arg],
    )?;
    if streams_json.trim().is_empty() {
        return Err(Error::invalid_media(path));
    }

    let format_json = run_ffprobe(
        config,
        &["-v", "quiet", "-print_format", "json", "-show_format", path_arg],
    )?;

    media_info::parse_media_info(path, &streams_json, &format_json)
}

/// Run ffprobe and collect stdout. A non-zero exit with empty output is the
/// tool's way of saying the file is unreadable, so only spawn failures are
/// errors here.
fn run_ffprobe(config: &FfmpegConfig, args: &[&str]) -> Result<String> {
    debug!("ffprobe {}", args.join(" "));
    let output = Command::new(&config.ffprobe_path)
        .args(args)
        .output()
        .map_err(|e| Error::ProcessStart {
            tool: config.ffprobe_path.display().to_string(),
            source: e,
        })?;

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_probe_binary_is_a_process_start_error() {
        let config = FfmpegConfig::with_paths(
            "/nonexistent/mediaconverter-test/ffmpeg",
            "/nonexistent/mediaconverter-test/ffprobe",
        );
        let result = probe(&config, "whatever.mkv");
        assert!(matches!(result, Err(Error::ProcessStart { .. })));
    }
}
