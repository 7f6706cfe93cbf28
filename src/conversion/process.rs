use crate::error::{Error, Result};
use regex::Regex;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{ChildStderr, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Progress callback type
pub type ProgressCallback = Box<dyn FnMut(ConversionProgress) + Send>;

/// One parsed progress tick of a running conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionProgress {
    /// Media time processed so far.
    pub position: Duration,
    /// Total media time of the conversion.
    pub total: Duration,
    /// Completion percentage, 0..=100.
    pub percent: u32,
}

impl ConversionProgress {
    pub(crate) fn new(position: Duration, total: Duration) -> Self {
        let percent = ((position.as_secs_f64() / total.as_secs_f64() * 100.0).round() as u32)
            .min(100);
        Self {
            position,
            total,
            percent,
        }
    }
}

/// Structured outcome of one tool invocation.
///
/// A non-zero exit is data, not an error; callers decide what it means.
#[derive(Debug)]
pub(crate) struct ProcessOutput {
    /// Exit code, when the process exited normally.
    pub code: Option<i32>,
    /// Combined stdout and stderr text.
    pub log: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Spawn the tool with the rendered argument string and drive it to exit.
///
/// The diagnostic stream is scanned incrementally for `time=` tokens to
/// raise progress ticks. When the cancel flag flips, the child is killed and
/// reaped before returning, so no external-tool process outlives the call.
pub(crate) fn run_tool(
    binary: &Path,
    arguments: &str,
    total: Option<Duration>,
    progress: Option<ProgressCallback>,
    cancel: Option<Arc<AtomicBool>>,
) -> Result<ProcessOutput> {
    let time_re = Regex::new(r"time=(\d+:\d{2}:\d{2}(?:\.\d+)?)")
        .map_err(|e| Error::parse("ffmpeg", e.to_string()))?;

    info!("{} {}", binary.display(), arguments);
    let mut child = Command::new(binary)
        .args(split_arguments(arguments))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::ProcessStart {
            tool: binary.display().to_string(),
            source: e,
        })?;

    let stdout_reader = child.stdout.take().map(|mut out| {
        thread::spawn(move || {
            let mut buf = String::new();
            let _ = out.read_to_string(&mut buf);
            buf
        })
    });
    let stderr_reader = child
        .stderr
        .take()
        .map(|err| thread::spawn(move || read_diagnostics(err, time_re, total, progress)));

    let mut cancelled = false;
    loop {
        if let Some(flag) = &cancel
            && flag.load(Ordering::Relaxed)
        {
            debug!("cancellation requested, killing {}", binary.display());
            let _ = child.kill();
            cancelled = true;
            break;
        }
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) => thread::sleep(Duration::from_millis(100)),
            Err(_) => break,
        }
    }

    // Reap the child; after this no process is left behind.
    let status = child.wait()?;

    let mut log = String::new();
    if let Some(handle) = stdout_reader {
        log.push_str(&handle.join().unwrap_or_default());
    }
    if let Some(handle) = stderr_reader {
        log.push_str(&handle.join().unwrap_or_default());
    }

    if cancelled {
        return Err(Error::Cancelled);
    }

    Ok(ProcessOutput {
        code: status.code(),
        log,
    })
}

/// Collect the diagnostic stream, raising a progress tick for each chunk
/// that carries a `time=` token. ffmpeg terminates its status updates with
/// `\r`, so chunks are split on that.
fn read_diagnostics(
    stderr: ChildStderr,
    time_re: Regex,
    total: Option<Duration>,
    mut progress: Option<ProgressCallback>,
) -> String {
    let mut reader = BufReader::new(stderr);
    let mut log = String::new();
    let mut chunk = Vec::new();
    loop {
        chunk.clear();
        match reader.read_until(b'\r', &mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&chunk);
                log.push_str(&text);
                if let (Some(callback), Some(total)) = (progress.as_mut(), total)
                    && total > Duration::ZERO
                    && let Some(position) = last_time_token(&time_re, &text)
                {
                    callback(ConversionProgress::new(position, total));
                }
            }
        }
    }
    log
}

/// Extract the last elapsed-time token of a diagnostic chunk.
fn last_time_token(time_re: &Regex, text: &str) -> Option<Duration> {
    let capture = time_re.captures_iter(text).last()?;
    crate::utils::time::parse_timestamp(capture.get(1)?.as_str())
}

/// Tokenize a rendered argument string for Command::args.
///
/// Double quotes group; a backslash escapes a quote inside a quoted region.
/// Single quotes are filter-level syntax and pass through untouched.
pub(crate) fn split_arguments(arguments: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut started = false;
    let mut in_quotes = false;
    let mut chars = arguments.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if in_quotes && chars.peek() == Some(&'"') => {
                current.push(chars.next().unwrap_or('"'));
            }
            '"' => {
                in_quotes = !in_quotes;
                started = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if started {
                    args.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }
    if started {
        args.push(current);
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn splits_plain_and_quoted_arguments() {
        assert_eq!(
            split_arguments("-y -i input.mkv out.mp4"),
            vec!["-y", "-i", "input.mkv", "out.mp4"]
        );
        assert_eq!(
            split_arguments("-i \"my file.mkv\" -vf \"transpose=2,transpose=2\" out.mp4"),
            vec!["-i", "my file.mkv", "-vf", "transpose=2,transpose=2", "out.mp4"]
        );
        assert_eq!(
            split_arguments("-filter:v \"subtitles='a.srt'\""),
            vec!["-filter:v", "subtitles='a.srt'"]
        );
    }

    #[test]
    fn progress_percent_rounds_the_ratio() {
        let tick = ConversionProgress::new(Duration::from_secs_f64(6.5), Duration::from_secs(13));
        assert_eq!(tick.percent, 50);
        let done = ConversionProgress::new(Duration::from_secs(13), Duration::from_secs(13));
        assert_eq!(done.percent, 100);
    }

    #[test]
    fn finds_the_last_time_token() {
        let re = Regex::new(r"time=(\d+:\d{2}:\d{2}(?:\.\d+)?)").unwrap();
        let chunk = "frame=1 time=00:00:01.00 bitrate=1k\rframe=2 time=00:00:02.50 bitrate=1k";
        assert_eq!(
            last_time_token(&re, chunk),
            Some(Duration::from_secs_f64(2.5))
        );
        assert_eq!(last_time_token(&re, "no tokens here"), None);
    }

    #[test]
    fn missing_binary_is_a_process_start_error() {
        let result = run_tool(
            Path::new("/nonexistent/mediaconverter-test/ffmpeg"),
            "-y -i in.mkv out.mp4",
            None,
            None,
            None,
        );
        assert!(matches!(result, Err(Error::ProcessStart { .. })));
    }

    #[test]
    fn cancellation_kills_the_child_and_reports_cancelled() {
        let cancel = Arc::new(AtomicBool::new(true));
        let result = run_tool(Path::new("sleep"), "30", None, None, Some(cancel));
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
