use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Directory name used under the platform config and download directories
pub const APP_DIR_NAME: &str = "youtube-bulk-downloader";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Where downloaded media is written
    pub output_dir: PathBuf,
    /// Explicit yt-dlp binary; searched for when unset
    pub ytdlp_bin: Option<PathBuf>,
    /// Explicit ffmpeg binary; searched for when unset
    pub ffmpeg_bin: Option<PathBuf>,
    pub socket_timeout_secs: u32,
    // e.g. socks5://127.0.0.1:1080
    pub proxy: Option<String>,
    /// Capacity of the worker -> presentation event channel
    pub event_channel_capacity: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AppConfigFile {
    output_dir: Option<String>,
    ytdlp_bin: Option<String>,
    ffmpeg_bin: Option<String>,
    socket_timeout_secs: Option<u32>,
    proxy: Option<String>,
    event_channel_capacity: Option<usize>,
}

fn default_output_dir() -> PathBuf {
    dirs::download_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("YouTube Bulk Downloader")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let s = s.trim().to_string();
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    })
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            ytdlp_bin: None,
            ffmpeg_bin: None,
            socket_timeout_secs: 30,
            proxy: None,
            event_channel_capacity: 64,
        }
    }
}

impl AppConfig {
    /// Default config file location, if the platform has a config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join("config.toml"))
    }

    /// Load from `path`, or from the default location when it exists, or
    /// fall back to built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(default) if default.is_file() => Self::from_file(&default),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::from_toml_str(&raw).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        tracing::debug!("[Config] loaded {}", path.display());
        Ok(cfg)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: AppConfigFile = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        let defaults = Self::default();

        let cfg = Self {
            output_dir: non_empty(file.output_dir)
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            ytdlp_bin: non_empty(file.ytdlp_bin).map(PathBuf::from),
            ffmpeg_bin: non_empty(file.ffmpeg_bin).map(PathBuf::from),
            socket_timeout_secs: file
                .socket_timeout_secs
                .unwrap_or(defaults.socket_timeout_secs),
            proxy: non_empty(file.proxy),
            event_channel_capacity: file
                .event_channel_capacity
                .unwrap_or(defaults.event_channel_capacity),
        };

        if cfg.socket_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "socket_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if cfg.event_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event_channel_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(cfg)
    }
}
