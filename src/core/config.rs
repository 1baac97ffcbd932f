//! Configuration management for blobsniff.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bytes of decompressed payload inspected per container (32 KiB).
pub const DEFAULT_PEEK_WINDOW_BYTES: usize = 1 << 15;

/// Lines inspected by the markup scanner.
pub const DEFAULT_HTML_CHECK_LINES: usize = 100;

/// Zip members scanned beyond the first.
pub const DEFAULT_ZIP_SCAN_FILES: usize = 1;

/// Prefix length fed to the binary heuristic.
pub const DEFAULT_BINARY_PREFIX_BYTES: usize = 1024;

/// Longest line read from a live stream before it is split.
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// Prefix length fed to the image sniffer.
pub const DEFAULT_IMAGE_PREFIX_BYTES: usize = 1024;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Classification bounds
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigSave(format!("Failed to create config directory: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| Error::ConfigSave(format!("Failed to write config file: {}", e)))
    }

    /// Load configuration from default location, falling back to defaults.
    ///
    /// Unlike `save`, this never writes to disk.
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        if config_path.exists() {
            match Self::load(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    log::warn!("Failed to load config, using defaults: {}", e);
                }
            }
        }

        Self::default()
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("blobsniff")
            .join("config.json")
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<()> {
        self.classifier.validate()
    }
}

/// Bounds applied to every classification call.
///
/// Each field caps how much of an untrusted file is read, decompressed or
/// scanned. None of them may be zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Decompressed bytes peeked from gzip, bzip2 and zip members
    pub peek_window_bytes: usize,
    /// Lines tested by the markup scanner
    pub html_check_lines: usize,
    /// Zip members scanned after the first (so `files + 1` in total)
    pub zip_scan_files: usize,
    /// Raw prefix tested by the binary heuristic
    pub binary_prefix_bytes: usize,
    /// Per-line cap when reading lines from a stream
    pub max_line_bytes: usize,
    /// Raw prefix handed to the image sniffer
    pub image_prefix_bytes: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            peek_window_bytes: DEFAULT_PEEK_WINDOW_BYTES,
            html_check_lines: DEFAULT_HTML_CHECK_LINES,
            zip_scan_files: DEFAULT_ZIP_SCAN_FILES,
            binary_prefix_bytes: DEFAULT_BINARY_PREFIX_BYTES,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            image_prefix_bytes: DEFAULT_IMAGE_PREFIX_BYTES,
        }
    }
}

impl ClassifierConfig {
    /// Validate the configuration values.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("classifier.peek_window_bytes", self.peek_window_bytes),
            ("classifier.html_check_lines", self.html_check_lines),
            ("classifier.binary_prefix_bytes", self.binary_prefix_bytes),
            ("classifier.max_line_bytes", self.max_line_bytes),
            ("classifier.image_prefix_bytes", self.image_prefix_bytes),
        ];

        for (field, value) in fields {
            if value == 0 {
                return Err(Error::ConfigInvalid {
                    field: field.to_string(),
                    message: "Must be greater than 0".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Enable verbose console output
    pub verbose_console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            verbose_console: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.classifier.peek_window_bytes, 32 * 1024);
        assert_eq!(config.classifier.html_check_lines, 100);
        assert_eq!(config.classifier.zip_scan_files, 1);
    }

    #[test]
    fn test_config_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("test_config.json");

        let mut config = Config::default();
        config.classifier.zip_scan_files = 4;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.classifier, config.classifier);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{"classifier": {"html_check_lines": 20}}"#).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.classifier.html_check_lines, 20);
        assert_eq!(loaded.classifier.peek_window_bytes, DEFAULT_PEEK_WINDOW_BYTES);
        assert_eq!(loaded.logging.log_level, "warn");
    }

    #[test]
    fn test_invalid_config() {
        let mut config = Config::default();
        config.classifier.peek_window_bytes = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::ConfigInvalid { ref field, .. }) if field == "classifier.peek_window_bytes"
        ));
    }

    #[test]
    fn test_zero_zip_files_is_valid() {
        let mut config = Config::default();
        config.classifier.zip_scan_files = 0;
        assert!(config.validate().is_ok());
    }
}
