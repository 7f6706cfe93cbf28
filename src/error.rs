use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while probing or converting media.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The probe produced no output or no streams for the given path.
    #[error("invalid media: {}", path.display())]
    InvalidMedia { path: PathBuf },

    /// The conversion tool exited with a non-zero status.
    ///
    /// Carries the exact rendered argument string and the full combined
    /// diagnostic output so the failure can be reproduced outside the crate.
    #[error("conversion failed (ffmpeg {arguments}): {log}")]
    Conversion { arguments: String, log: String },

    /// Invalid caller input (seek beyond duration, too few inputs, ...).
    #[error("invalid argument: {0}")]
    Argument(String),

    /// A cooperative cancellation was requested and honored.
    #[error("conversion was cancelled")]
    Cancelled,

    /// The external binary could not be started at all.
    #[error("failed to start {tool}: {source}")]
    ProcessStart {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse tool output.
    #[error("failed to parse {tool} output: {message}")]
    Parse { tool: String, message: String },

    /// Configuration file error.
    #[error("config error: {0}")]
    Config(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid-media error.
    pub fn invalid_media(path: impl Into<PathBuf>) -> Self {
        Self::InvalidMedia { path: path.into() }
    }

    /// Create an invalid-argument error.
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument(message.into())
    }

    /// Create a parse error.
    pub fn parse(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}
