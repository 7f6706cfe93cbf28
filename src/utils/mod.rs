pub mod humanize;
pub mod logger;
pub mod time;

pub use humanize::{format_duration, format_file_size};
pub use logger::init_logging;
pub use time::{format_timestamp, parse_timestamp};
