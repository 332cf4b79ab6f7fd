//! Configuration loading and typed config structures for the game server.
//!
//! The configuration lives in `settlers-config.yaml` at the project root.
//! Every section and field is optional; missing values fall back to the
//! defaults below, so an empty file (or no file at all) is a valid
//! configuration.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level server configuration, mirroring `settlers-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SettlersConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Simulation driver settings.
    #[serde(default)]
    pub ticker: TickerConfig,

    /// Push channel settings.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SettlersConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for the listener:
    /// - `SETTLERS_HOST` overrides `server.host`
    /// - `SETTLERS_PORT` overrides `server.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to a mapping.
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.server.apply_env_overrides();
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// Apply environment variable overrides.
    ///
    /// An unparsable `SETTLERS_PORT` is ignored and the configured port is
    /// kept.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("SETTLERS_HOST") {
            self.host = host;
        }
        if let Some(port) = std::env::var("SETTLERS_PORT")
            .ok()
            .and_then(|p| p.trim().parse().ok())
        {
            self.port = port;
        }
    }
}

/// Simulation driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TickerConfig {
    /// Real-time milliseconds between two ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Computer players take a turn every this many ticks.
    #[serde(default = "default_computer_player_frequency")]
    pub computer_player_frequency: u64,

    /// A world tick slower than this is logged as a regression.
    #[serde(default = "default_tick_time_upper_threshold_ms")]
    pub tick_time_upper_threshold_ms: u64,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            computer_player_frequency: default_computer_player_frequency(),
            tick_time_upper_threshold_ms: default_tick_time_upper_threshold_ms(),
        }
    }
}

/// Push channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedConfig {
    /// Change sets buffered per monitor connection before pushes are
    /// skipped.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

const fn default_tick_interval_ms() -> u64 {
    200
}

const fn default_computer_player_frequency() -> u64 {
    100
}

const fn default_tick_time_upper_threshold_ms() -> u64 {
    150
}

const fn default_channel_capacity() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_timing() {
        let config = SettlersConfig::default();
        assert_eq!(config.ticker.tick_interval_ms, 200);
        assert_eq!(config.ticker.computer_player_frequency, 100);
        assert_eq!(config.ticker.tick_time_upper_threshold_ms, 150);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parse_partial_yaml() {
        let yaml = r"
ticker:
  tick_interval_ms: 50
feed:
  channel_capacity: 8
";
        let config = SettlersConfig::parse(yaml).unwrap();
        assert_eq!(config.ticker.tick_interval_ms, 50);
        assert_eq!(config.ticker.computer_player_frequency, 100);
        assert_eq!(config.feed.channel_capacity, 8);
    }

    #[test]
    fn parse_empty_yaml() {
        let config = SettlersConfig::parse("").unwrap();
        assert_eq!(config.ticker, TickerConfig::default());
        assert_eq!(config.feed, FeedConfig::default());
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let result = SettlersConfig::parse("ticker: [1, 2");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = SettlersConfig::from_file(Path::new("/nonexistent/settlers-config.yaml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../settlers-config.yaml");
        if path.exists() {
            let config = SettlersConfig::from_file(&path).unwrap();
            assert!(config.ticker.tick_interval_ms > 0);
        }
    }
}
