use humansize::{DECIMAL, format_size};
use std::time::Duration;

/// Format a byte count for display ("1.06 MB").
pub fn format_file_size(bytes: u64) -> String {
    format_size(bytes, DECIMAL)
}

/// Format a duration for display ("1:02:03" or "2:03").
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
