//! Configuration for the bridge client.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Sentinel the bridge sends once a device connection is acknowledged.
pub const DEFAULT_CONNECT_OK_SENTINEL: &str = "R device_connect OK";

/// Command sent to the bridge before closing the socket.
pub const DEFAULT_DISCONNECT_COMMAND: &str = "device_disconnect";

/// Main configuration for the bridge client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bridge server host
    pub host: String,

    /// Bridge server port
    pub port: u16,

    /// Upper bound on a blocking connect; zero waits indefinitely
    #[serde(with = "duration_millis")]
    pub connect_timeout: Duration,

    /// Directory for session log files
    pub log_dir: PathBuf,

    /// Prefix of session log file names
    pub log_file_prefix: String,

    /// Response prefix that acknowledges a device connection
    pub connect_ok_sentinel: String,

    /// Best-effort command sent on disconnect
    pub disconnect_command: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("biosensor-bridge-client");

        Self {
            host: "127.0.0.1".to_string(),
            port: 20,
            connect_timeout: Duration::from_secs(5),
            log_dir: data_dir.join("logs"),
            log_file_prefix: "name".to_string(),
            connect_ok_sentinel: DEFAULT_CONNECT_OK_SENTINEL.to_string(),
            disconnect_command: DEFAULT_DISCONNECT_COMMAND.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `config_path`, or defaults if it does not exist.
    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            Self::from_json(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from JSON. Missing fields take their defaults.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("biosensor-bridge-client")
            .join("config.json")
    }

    /// Ensure the log directory exists.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.log_dir).map_err(|e| ConfigError::IoError(e.to_string()))
    }

    /// Connect timeout as passed to a connector.
    pub fn connect_timeout(&self) -> Option<Duration> {
        if self.connect_timeout.is_zero() {
            None
        } else {
            Some(self.connect_timeout)
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 20);
        assert_eq!(config.connect_ok_sentinel, "R device_connect OK");
        assert_eq!(config.disconnect_command, "device_disconnect");
        assert_eq!(config.connect_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = Config::from_json(r#"{"port": 28000, "connect_timeout": 0}"#).unwrap();
        assert_eq!(config.port, 28000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.connect_timeout(), None);
    }

    #[test]
    fn test_json_roundtrip_keeps_timeout_millis() {
        let mut config = Config::default();
        config.connect_timeout = Duration::from_millis(1500);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"connect_timeout\":1500"));
        assert_eq!(Config::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_save_then_load_keeps_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.json");
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());

        let config = Config {
            host: "bridge.local".to_string(),
            port: 28000,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        assert!(matches!(
            Config::from_json("{not json"),
            Err(ConfigError::ParseError(_))
        ));
    }
}
