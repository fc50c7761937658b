//! Configuration loading traits and types.
//!
//! This module provides the TOML loading used by the `gpioled` binary for
//! board descriptions, plus the settings shared by every configuration file.
//!
//! # Usage
//!
//! ```rust,no_run
//! use gpioled_common::config::{ConfigError, ConfigLoader};
//! use gpioled_common::hal::config::BoardConfig;
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let board = BoardConfig::load(Path::new("board.toml"))?;
//!     board.validate()?;
//!     println!("Service: {}", board.shared.service_name);
//!     Ok(())
//! }
//! ```

use crate::consts::DEVICE_NAME;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Board file loading errors.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// No board file at the given path.
    #[error("Board file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The board file exists but could not be read.
    #[error("Failed to read {}: {reason}", path.display())]
    ReadError {
        /// Offending file.
        path: PathBuf,
        /// I/O error text.
        reason: String,
    },

    /// TOML syntax or schema mismatch.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log verbosity, lowercase in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Per-pin transitions.
    Trace,
    /// Acquisition and release steps.
    Debug,
    /// Attach, detach and session milestones.
    #[default]
    Info,
    /// Release failures and rejected input.
    Warn,
    /// Fatal errors only.
    Error,
}

impl LogLevel {
    /// Filter directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Common configuration fields embedded in every configuration file.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "gpioled-imx6ull"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Instance identifier used in log output.
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: DEVICE_NAME.to_string(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// TOML loading for any deserializable configuration type.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound(path.to_path_buf()),
            _ => ConfigError::ReadError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from an in-memory TOML document.
    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Any serde-deserializable struct can be loaded.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_log_level_deserialization() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct TestWrapper {
            level: LogLevel,
        }

        let parse = |s: &str| toml::from_str::<TestWrapper>(s).unwrap().level;
        assert_eq!(parse("level = \"trace\""), LogLevel::Trace);
        assert_eq!(parse("level = \"warn\""), LogLevel::Warn);
        assert_eq!(parse("level = \"error\""), LogLevel::Error);
    }

    #[test]
    fn test_log_level_directive_matches_serde_name() {
        #[derive(Serialize)]
        struct TestWrapper {
            level: LogLevel,
        }

        for level in [LogLevel::Trace, LogLevel::Debug, LogLevel::Info, LogLevel::Warn, LogLevel::Error] {
            let text = toml::to_string(&TestWrapper { level }).unwrap();
            assert!(text.contains(level.as_directive()));
        }
    }

    #[test]
    fn test_shared_config_validation_empty_service_name() {
        let config = SharedConfig {
            log_level: LogLevel::Info,
            service_name: "".to_string(),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(SharedConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_loader_file_not_found() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct TestConfig {
            value: String,
        }

        let path = Path::new("/nonexistent/path/board.toml");
        match TestConfig::load(path) {
            Err(ConfigError::FileNotFound(missing)) => assert_eq!(missing, path.to_path_buf()),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_config_loader_directory_is_read_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = SharedConfig::load(dir.path());
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_config_loader_parse_error() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct TestConfig {
            value: String,
        }

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid toml {{{{").unwrap();

        let result = TestConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_config_loader_success() {
        #[derive(Debug, Deserialize)]
        struct TestConfig {
            shared: SharedConfig,
        }

        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[shared]
log_level = "debug"
service_name = "led-test"
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = TestConfig::load(file.path()).unwrap();
        assert_eq!(config.shared.log_level, LogLevel::Debug);
        assert_eq!(config.shared.service_name, "led-test");
    }
}
