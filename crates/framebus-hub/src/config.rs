//! Hub configuration.
//!
//! Defaults are usable as-is; a TOML file may override any subset:
//!
//! ```toml
//! socket_path = "/run/user/1000/framebus.sock"
//! max_frames = 64
//! max_sessions = 128
//! max_message_size = 65536
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use framebus_protocol::MAX_MESSAGE_SIZE;

/// Default socket path
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/framebus.sock";

/// Default maximum number of simultaneously registered frames
pub const DEFAULT_MAX_FRAMES: usize = 256;

/// Default maximum number of sessions held by one switchboard
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

/// Limits applied by a switchboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SwitchboardConfig {
    pub max_frames: usize,
    pub max_sessions: usize,
}

impl Default for SwitchboardConfig {
    fn default() -> Self {
        Self {
            max_frames: DEFAULT_MAX_FRAMES,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

/// Settings for a hub process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Path of the Unix socket frames connect to.
    pub socket_path: PathBuf,

    /// Longest accepted line from a frame, in bytes.
    pub max_message_size: usize,

    #[serde(flatten)]
    pub switchboard: SwitchboardConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            max_message_size: MAX_MESSAGE_SIZE,
            switchboard: SwitchboardConfig::default(),
        }
    }
}

impl HubConfig {
    /// Parses a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.switchboard.max_frames == 0 {
            return Err(ConfigError::Invalid("max_frames must be at least 1".into()));
        }
        if self.switchboard.max_sessions == 0 {
            return Err(ConfigError::Invalid("max_sessions must be at least 1".into()));
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::Invalid("max_message_size must be at least 1".into()));
        }
        Ok(())
    }
}

/// Errors loading a hub configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HubConfig::default();
        assert_eq!(config.socket_path, PathBuf::from(DEFAULT_SOCKET_PATH));
        assert_eq!(config.max_message_size, MAX_MESSAGE_SIZE);
        assert_eq!(config.switchboard.max_frames, DEFAULT_MAX_FRAMES);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = HubConfig::from_toml_str("max_frames = 4\nsocket_path = \"/tmp/x.sock\"").unwrap();
        assert_eq!(config.switchboard.max_frames, 4);
        assert_eq!(config.switchboard.max_sessions, DEFAULT_MAX_SESSIONS);
        assert_eq!(config.socket_path, PathBuf::from("/tmp/x.sock"));
    }

    #[test]
    fn test_rejects_zero_limits() {
        let err = HubConfig::from_toml_str("max_sessions = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.toml");
        std::fs::write(&path, "max_message_size = 2048\n").unwrap();

        let config = HubConfig::load(&path).unwrap();
        assert_eq!(config.max_message_size, 2048);

        let missing = HubConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }
}
