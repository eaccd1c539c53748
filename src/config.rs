//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the JSON documents live
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("trainlog").to_string_lossy().to_string())
        .unwrap_or_else(|| "./TrainingLogs".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Ingestion adapter settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    /// Directory of externally generated daily reports
    #[serde(default)]
    pub reports_dir: Option<String>,

    #[serde(default = "default_report_prefix")]
    pub report_prefix: String,

    #[serde(default = "default_report_extensions")]
    pub report_extensions: Vec<String>,

    /// Year assumed for `MM月DD日` dates in notes; current year if unset
    #[serde(default)]
    pub reference_year: Option<i32>,

    /// Let imports replace existing entries
    #[serde(default)]
    pub overwrite: bool,
}

fn default_report_prefix() -> String {
    "dashboard_".to_string()
}

fn default_report_extensions() -> Vec<String> {
    vec!["md".to_string()]
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            reports_dir: None,
            report_prefix: default_report_prefix(),
            report_extensions: default_report_extensions(),
            reference_year: None,
            overwrite: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        // Try default config locations
        let config_paths = [
            dirs::config_dir().map(|p| p.join("trainlog").join("config.toml")),
            Some(PathBuf::from("./trainlog.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        // Fall back to environment-only config
        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `TRAINLOG_*` overrides from any variable source
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(data_dir) = lookup("TRAINLOG_DATA_DIR") {
            self.storage.data_dir = data_dir;
        }
        if let Some(reports_dir) = lookup("TRAINLOG_REPORTS_DIR") {
            self.ingest.reports_dir = Some(reports_dir);
        }
        if let Some(level) = lookup("TRAINLOG_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("TRAINLOG_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Data directory with a leading `~` expanded
    pub fn data_dir(&self) -> PathBuf {
        expand_home(&self.storage.data_dir)
    }

    /// Reports directory, defaulting to `<data_dir>/reports`
    pub fn reports_dir(&self) -> PathBuf {
        self.ingest
            .reports_dir
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| self.data_dir().join("reports"))
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# trainlog configuration
#
# Environment variables override these settings:
# - TRAINLOG_DATA_DIR
# - TRAINLOG_REPORTS_DIR
# - TRAINLOG_LOG_LEVEL
# - TRAINLOG_LOG_FORMAT

[storage]
# Directory holding training_logs.json, logs_index.json,
# personal_best.json, lung_capacity.json and records_database.json
data_dir = "~/.local/share/trainlog"

[ingest]
# Directory of generated daily reports (default: <data_dir>/reports)
# reports_dir = "~/reports"

# Only report files starting with this prefix are scanned
report_prefix = "dashboard_"

# Report file extensions to scan
report_extensions = ["md"]

# Year used for dates written as MM月DD日 (default: current year)
# reference_year = 2026

# Replace existing entries on import instead of skipping them
overwrite = false

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/trainlog/trainlog.log"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.ingest.report_prefix, "dashboard_");
        assert_eq!(config.ingest.report_extensions, vec!["md"]);
        assert!(!config.ingest.overwrite);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::parse("[storage]\ndata_dir = \"/tmp/logs\"\n").unwrap();
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/logs"));
        assert_eq!(config.reports_dir(), PathBuf::from("/tmp/logs/reports"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TRAINLOG_DATA_DIR", "/data"),
            ("TRAINLOG_REPORTS_DIR", "/reports"),
            ("TRAINLOG_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.storage.data_dir, "/data");
        assert_eq!(config.reports_dir(), PathBuf::from("/reports"));
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trainlog.toml");
        std::fs::write(&path, "[storage\n").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            Config::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
