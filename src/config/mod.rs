//! Configuration management for dataformat
//!
//! This module handles loading, parsing, and managing configuration from:
//! - Configuration files (TOML format)
//! - Command-line arguments
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Configuration file
//! 3. Default values
//!
//! The export settings are process-wide: they are computed once at startup
//! and shared read-only by every export session.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};

use crate::error::{ConfigError, Result};
use crate::export::sink::SizeLimit;
use crate::utils::time::parse_duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Export configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Export-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Memory ceiling in bytes; percentage limits are computed from it.
    /// Defaults to the ceiling detected at startup.
    #[serde(default = "default_memory_ceiling")]
    pub memory_ceiling: u64,

    /// Default transmission limit ("10%", "10MB", "1048576")
    #[serde(default = "default_limit")]
    pub default_limit: String,

    /// Default scroll keep-alive ("60s", "5m")
    #[serde(default = "default_scroll_keep_alive")]
    pub scroll_keep_alive: String,

    /// Page size used by the bundled backend when none is requested
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Rows buffered by the streaming Excel writer before flushing to disk
    #[serde(default = "default_excel_flush_rows")]
    pub excel_flush_rows: usize,

    /// Placeholder written into blank Excel cells
    #[serde(default = "default_excel_blank_value")]
    pub excel_blank_value: String,

    /// Directory for temporary sinks (None for the system temp dir)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_memory_ceiling() -> u64 {
    detected_memory_ceiling()
}

/// Used when the platform reports no memory at all
const FALLBACK_MEMORY_CEILING: u64 = 1024 * 1024 * 1024;

static MEMORY_CEILING: LazyLock<u64> = LazyLock::new(|| {
    let system = System::new_with_specifics(memory_refresh());
    let total = system.total_memory();
    let ceiling = match system.cgroup_limits() {
        Some(limits) if limits.total_memory > 0 && limits.total_memory < total => {
            limits.total_memory
        }
        _ => total,
    };
    if ceiling == 0 {
        tracing::warn!(
            "Could not detect available memory, assuming {} bytes",
            FALLBACK_MEMORY_CEILING
        );
        FALLBACK_MEMORY_CEILING
    } else {
        tracing::debug!("Detected memory ceiling: {} bytes (physical: {} bytes)", ceiling, total);
        ceiling
    }
});

fn memory_refresh() -> RefreshKind {
    RefreshKind::nothing().with_memory(MemoryRefreshKind::everything())
}

/// Memory available to the process: physical memory, capped by the cgroup
/// limit when one is set. Detected once and cached.
pub fn detected_memory_ceiling() -> u64 {
    *MEMORY_CEILING
}

fn default_limit() -> String {
    "10%".to_string()
}

fn default_scroll_keep_alive() -> String {
    "60s".to_string()
}

fn default_page_size() -> usize {
    10
}

fn default_excel_flush_rows() -> usize {
    1000
}

fn default_excel_blank_value() -> String {
    "-".to_string()
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            memory_ceiling: default_memory_ceiling(),
            default_limit: default_limit(),
            scroll_keep_alive: default_scroll_keep_alive(),
            page_size: default_page_size(),
            excel_flush_rows: default_excel_flush_rows(),
            excel_blank_value: default_excel_blank_value(),
            temp_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    ///
    /// A missing file yields the default configuration; a file that exists
    /// but cannot be parsed is an error.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (None for the default path)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Serialize configuration to TOML text
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".dataformat")
            .join("config.toml")
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        self.export.validate()
    }
}

impl ExportConfig {
    /// Validate export settings
    pub fn validate(&self) -> Result<()> {
        if self.memory_ceiling == 0 {
            return Err(invalid("export.memory_ceiling", "0"));
        }
        if self.excel_flush_rows == 0 {
            return Err(invalid("export.excel_flush_rows", "0"));
        }
        if self.page_size == 0 {
            return Err(invalid("export.page_size", "0"));
        }
        SizeLimit::parse(&self.default_limit)?;
        self.keep_alive()?;
        Ok(())
    }

    /// Default scroll keep-alive as Duration
    pub fn keep_alive(&self) -> Result<Duration> {
        parse_duration(&self.scroll_keep_alive)
            .ok_or_else(|| invalid("export.scroll_keep_alive", &self.scroll_keep_alive))
    }

    /// Default transmission limit
    pub fn limit(&self) -> Result<SizeLimit> {
        SizeLimit::parse(&self.default_limit)
    }
}

fn invalid(field: &str, value: &str) -> crate::error::DataFormatError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.export.excel_flush_rows, 1000);
        assert_eq!(config.export.excel_blank_value, "-");
        assert_eq!(config.export.keep_alive().unwrap(), Duration::from_secs(60));
        assert_eq!(config.export.limit().unwrap(), SizeLimit::Percent(10.0));
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_memory_ceiling_is_detected() {
        let ceiling = detected_memory_ceiling();
        assert!(ceiling > 0);
        assert_eq!(ExportConfig::default().memory_ceiling, ceiling);

        let system = System::new_with_specifics(memory_refresh());
        if system.total_memory() > 0 {
            assert!(ceiling <= system.total_memory());
        }

        let limit = ExportConfig::default().limit().unwrap().resolve(ceiling);
        assert!(limit > 0 && limit < ceiling);
    }

    #[test]
    fn test_memory_ceiling_override() {
        let config = Config::from_toml("[export]\nmemory_ceiling = 2048\n").unwrap();
        assert_eq!(config.export.memory_ceiling, 2048);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [export]
            default_limit = "5MB"
            page_size = 50

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.export.limit().unwrap(), SizeLimit::Bytes(5 * 1024 * 1024));
        assert_eq!(config.export.page_size, 50);
        assert_eq!(config.export.scroll_keep_alive, "60s");
        assert_eq!(config.logging.level.to_tracing_level(), tracing::Level::DEBUG);
        assert!(config.logging.timestamps);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.export.scroll_keep_alive = "soon".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.export.excel_flush_rows = 0;
        assert!(config.validate().is_err());

        assert!(Config::from_toml("[export\nbroken").is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_file(Some(&dir.path().join("none.toml"))).unwrap();
        assert_eq!(config.export.page_size, 10);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.export.temp_dir = Some(dir.path().to_path_buf());
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        let loaded = Config::load_from_file(Some(&path)).unwrap();
        assert_eq!(loaded.export.temp_dir, Some(dir.path().to_path_buf()));
    }
}
