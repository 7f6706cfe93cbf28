use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{info, warn};

/// Locations of the two external binaries.
///
/// Finding or installing the tools is the caller's problem; this only
/// carries the paths every probe and conversion spawns from. Paths may be
/// bare command names, in which case the OS resolves them via PATH.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FfmpegConfig {
    /// Path to the conversion binary.
    pub ffmpeg_path: PathBuf,
    /// Path to the metadata probe binary.
    pub ffprobe_path: PathBuf,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

impl FfmpegConfig {
    /// Load configuration from the TOML file, then apply environment
    /// overrides; falls back to defaults when no file exists.
    pub fn load() -> Self {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            match Self::load_from_file(&config_path) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    warn!("Failed to load config: {}. Using defaults.", e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config
    }

    /// Save configuration to the TOML file.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, toml_string)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        info!("Saved config to {}", config_path.display());
        Ok(())
    }

    /// Build a config pointing at explicit binary locations.
    pub fn with_paths(ffmpeg_path: impl Into<PathBuf>, ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
        let config: FfmpegConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// FFMPEG_PATH / FFPROBE_PATH take precedence over the file.
    fn apply_env_overrides(&mut self) {
        if let Some(path) = std::env::var_os("FFMPEG_PATH") {
            self.ffmpeg_path = PathBuf::from(path);
        }
        if let Some(path) = std::env::var_os("FFPROBE_PATH") {
            self.ffprobe_path = PathBuf::from(path);
        }
    }

    /// Get the default configuration file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mediaconverter")
            .join("config.toml")
    }

    /// Check that both binaries answer `-version`.
    pub fn is_available(&self) -> bool {
        check_command(&self.ffmpeg_path) && check_command(&self.ffprobe_path)
    }
}

/// Check if a command is available
fn check_command(cmd: &Path) -> bool {
    Command::new(cmd)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}
