//! Configuration loading and config file resolution
//!
//! Bootstrap configuration lives in a single TOML file. Every section and field is
//! optional; a missing file yields built-in defaults.
//!
//! # Config File Resolution Priority
//!
//! 1. Explicit path (command-line argument)
//! 2. `MDC_CONFIG` environment variable
//! 3. `<platform config dir>/mdc/config.toml`

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "MDC_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Generation cache sizing and concurrency
    #[serde(default)]
    pub cache: CacheConfig,

    /// Duplicate resolution policy
    #[serde(default)]
    pub duplicates: DuplicateConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Generation cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Eviction triggers when the entry count strictly exceeds this bound
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,

    /// Extra entries removed per eviction pass beyond the strict excess
    #[serde(default = "default_overflow_buffer")]
    pub overflow_buffer: usize,

    /// Global cap on concurrently running generations (None = unlimited)
    #[serde(default)]
    pub max_concurrent_generations: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cache_size: default_max_cache_size(),
            overflow_buffer: default_overflow_buffer(),
            max_concurrent_generations: None,
        }
    }
}

/// Duplicate resolution configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuplicateConfig {
    /// How long to wait for a UI decision (None = wait indefinitely)
    #[serde(default)]
    pub decision_timeout_ms: Option<u64>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_cache_size() -> usize {
    50
}

fn default_overflow_buffer() -> usize {
    10
}

/// Resolve which config file to read
///
/// Returns `None` when no explicit path or environment override is given and the
/// platform config directory cannot be determined.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    default_config_path()
}

/// Platform default config file location (`~/.config/mdc/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mdc").join("config.toml"))
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from this file
    File(PathBuf),
    /// The resolved file does not exist; built-in defaults in use
    MissingFile(PathBuf),
    /// No config path could be resolved; built-in defaults in use
    Unresolved,
}

impl ConfigSource {
    /// Report where the configuration came from
    ///
    /// Kept separate from loading so binaries can call it once tracing is installed.
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!(path = %path.display(), "Loaded configuration"),
            ConfigSource::MissingFile(path) => warn!(
                path = %path.display(),
                "Config file not found, using built-in defaults"
            ),
            ConfigSource::Unresolved => {
                warn!("Could not determine config directory, using built-in defaults")
            }
        }
    }
}

/// Read and parse `path`; `None` when the file does not exist
fn read_toml_config(path: &Path) -> Result<Option<TomlConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;

    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    Ok(Some(config))
}

/// Load configuration from a TOML file
///
/// A missing file is not an error: a warning is logged and defaults are returned.
/// A file that exists but cannot be read or parsed is a `Config` error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let (config, source) = match read_toml_config(path)? {
        Some(config) => (config, ConfigSource::File(path.to_path_buf())),
        None => (TomlConfig::default(), ConfigSource::MissingFile(path.to_path_buf())),
    };
    source.log();
    Ok(config)
}

/// Resolve the config path and load it without logging
///
/// Returns the configuration together with where it came from, so the caller can report
/// the source after its logging is set up.
pub fn load_config_with_source(cli_arg: Option<&Path>) -> Result<(TomlConfig, ConfigSource)> {
    let Some(path) = resolve_config_path(cli_arg) else {
        return Ok((TomlConfig::default(), ConfigSource::Unresolved));
    };

    match read_toml_config(&path)? {
        Some(config) => Ok((config, ConfigSource::File(path))),
        None => Ok((TomlConfig::default(), ConfigSource::MissingFile(path))),
    }
}

/// Resolve the config path and load it, falling back to defaults when nothing resolves
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let (config, source) = load_config_with_source(cli_arg)?;
    source.log();
    Ok(config)
}

/// Write configuration to a TOML file
///
/// Writes to a sibling temporary file first and renames it over the target so readers
/// never observe a half-written file.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_none());
        assert_eq!(config.cache.max_cache_size, 50);
        assert_eq!(config.cache.overflow_buffer, 10);
        assert!(config.cache.max_concurrent_generations.is_none());
        assert!(config.duplicates.decision_timeout_ms.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [cache]
            max_cache_size = 200
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.max_cache_size, 200);
        assert_eq!(config.cache.overflow_buffer, 10);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
    }

    #[test]
    fn test_explicit_path_wins() {
        let explicit = PathBuf::from("/tmp/explicit-mdc.toml");
        assert_eq!(resolve_config_path(Some(&explicit)), Some(explicit));
    }
}
