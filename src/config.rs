// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON at `<config dir>/depthview/config.json`. Missing fields
//! take their defaults, so a partial file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::backends::BackendType;
use crate::constants::{
    APP_NAME, DEFAULT_MAX_DEPTH_M, DEFAULT_QUEUE_CAPACITY, DEFAULT_STREAM_FPS,
    DEFAULT_STREAM_HEIGHT, DEFAULT_STREAM_WIDTH, DEFAULT_WAIT_TIMEOUT, DEFAULT_WINDOW_HEIGHT,
    DEFAULT_WINDOW_TITLE, DEFAULT_WINDOW_WIDTH, MAX_QUEUE_CAPACITY,
};
use crate::errors::ConfigError;
use crate::media::{PixelFormat, StreamConfig, StreamKind};
use crate::pipeline::OverflowPolicy;

/// Frame queue settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Maximum number of pending frames
    pub capacity: usize,
    /// What a push does when the queue is full
    pub overflow: OverflowPolicy,
    /// How long the display loop waits for a frame before re-rendering
    pub wait_timeout_ms: u64,
}

impl QueueSettings {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            overflow: OverflowPolicy::default(),
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT.as_millis() as u64,
        }
    }
}

/// Window settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            width: DEFAULT_WINDOW_WIDTH,
            height: DEFAULT_WINDOW_HEIGHT,
            title: DEFAULT_WINDOW_TITLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frame source backend
    pub backend: BackendType,
    /// Index into the enumerated device list
    pub device_index: usize,
    /// Streams to open, at most one per stream kind
    pub streams: Vec<StreamConfig>,
    pub queue: QueueSettings,
    pub window: WindowSettings,
    /// Depth shown at full red intensity, in meters
    pub max_depth_m: f32,
    /// Where snapshots go (default: Pictures/depthview)
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let (w, h, fps) = (DEFAULT_STREAM_WIDTH, DEFAULT_STREAM_HEIGHT, DEFAULT_STREAM_FPS);
        Self {
            backend: BackendType::default(),
            device_index: 0,
            streams: vec![
                StreamConfig::new(StreamKind::Depth, w, h, fps, PixelFormat::Z16),
                StreamConfig::new(StreamKind::Infrared, w, h, fps, PixelFormat::Y8),
                StreamConfig::new(StreamKind::Color, w, h, fps, PixelFormat::Rgb8),
            ],
            queue: QueueSettings::default(),
            window: WindowSettings::default(),
            max_depth_m: DEFAULT_MAX_DEPTH_M,
            snapshot_dir: None,
        }
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_NAME).join("config.json"))
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load a config file, or the defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Write the config as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(format!("cannot serialize config: {}", e)))?;
        std::fs::write(path, json + "\n").map_err(io_err)?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Check value ranges and stream consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.capacity == 0 || self.queue.capacity > MAX_QUEUE_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "queue capacity {} outside 1..={}",
                self.queue.capacity, MAX_QUEUE_CAPACITY
            )));
        }
        if self.queue.wait_timeout_ms == 0 {
            return Err(ConfigError::Invalid("wait timeout must be positive".into()));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size {}x{} is empty",
                self.window.width, self.window.height
            )));
        }
        if !self.max_depth_m.is_finite() || self.max_depth_m <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "max depth {} m must be positive",
                self.max_depth_m
            )));
        }

        for (i, stream) in self.streams.iter().enumerate() {
            if self.streams[..i].iter().any(|s| s.stream == stream.stream) {
                return Err(ConfigError::Invalid(format!(
                    "{} stream configured twice",
                    stream.stream
                )));
            }
            if stream.width == 0 || stream.height == 0 || stream.fps == 0 {
                return Err(ConfigError::Invalid(format!("{} has an empty mode", stream)));
            }
            if !stream.format.carries(stream.stream) {
                return Err(ConfigError::Invalid(format!(
                    "{} cannot carry {}",
                    stream.format, stream.stream
                )));
            }
        }
        Ok(())
    }

    /// Configured stream of a kind, if any
    pub fn stream(&self, kind: StreamKind) -> Option<&StreamConfig> {
        self.streams.iter().find(|s| s.stream == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.streams.len(), 3);
        assert_eq!(config.queue.wait_timeout(), DEFAULT_WAIT_TIMEOUT);
        assert_eq!(config.queue.overflow, OverflowPolicy::DropOldest);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: Config = serde_json::from_str(r#"{ "queue": { "capacity": 4 } }"#).unwrap();
        assert_eq!(config.queue.capacity, 4);
        assert_eq!(config.queue.wait_timeout_ms, 500);
        assert_eq!(config.window, WindowSettings::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.queue.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.max_depth_m = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.streams.push(config.streams[0]);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.streams[2].format = PixelFormat::Z16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stream_lookup() {
        let config = Config::default();
        assert_eq!(config.stream(StreamKind::Color).map(|s| s.format), Some(PixelFormat::Rgb8));
    }
}
