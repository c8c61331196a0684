//! Configuration loading
//!
//! Every setting is resolved with the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8888";
pub const DEFAULT_API_PREFIX: &str = "/FELA";
pub const DEFAULT_GEOCODING_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "es,en";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_GEOCODING_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_GEOCODING_RATE_PER_SEC: u32 = 1;
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_MIN_CHARS: usize = 1;
pub const DEFAULT_MAX_PRESENTATIONS: usize = 10;
pub const DEFAULT_MIN_EVENT_YEAR: i32 = 2000;
pub const DEFAULT_EVENT_BUS_CAPACITY: usize = 100;

pub const ENV_BACKEND_URL: &str = "FELA_BACKEND_URL";
pub const ENV_GEOCODING_URL: &str = "FELA_GEOCODING_URL";
pub const ENV_LOG_LEVEL: &str = "FELA_LOG_LEVEL";
pub const ENV_CONFIG_PATH: &str = "FELA_CONFIG";

/// Standard user-agent for outbound HTTP clients
///
/// Nominatim rejects anonymous clients, so every request identifies itself.
pub fn get_user_agent() -> String {
    format!(
        "FELA/{} (fela-intake catalogue editor)",
        env!("CARGO_PKG_VERSION")
    )
}

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing level (`RUST_LOG` still overrides)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// On-disk TOML configuration; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub backend_url: Option<String>,
    pub api_prefix: Option<String>,
    pub geocoding_url: Option<String>,
    pub user_agent: Option<String>,
    pub accept_language: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub geocoding_timeout_secs: Option<u64>,
    pub geocoding_requests_per_second: Option<u32>,
    pub debounce_ms: Option<u64>,
    pub min_chars: Option<usize>,
    pub max_presentations: Option<usize>,
    pub min_event_year: Option<i32>,
    pub event_bus_capacity: Option<usize>,
    pub logging: LoggingConfig,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub backend_url: Option<String>,
    pub geocoding_url: Option<String>,
    pub log_level: Option<String>,
}

/// Fully resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct FelaConfig {
    pub backend_url: String,
    pub api_prefix: String,
    pub geocoding_url: String,
    pub user_agent: String,
    pub accept_language: String,
    pub request_timeout_secs: u64,
    pub geocoding_timeout_secs: u64,
    pub geocoding_requests_per_second: u32,
    pub debounce_ms: u64,
    pub min_chars: usize,
    pub max_presentations: usize,
    pub min_event_year: i32,
    pub event_bus_capacity: usize,
    pub log_level: String,
}

impl Default for FelaConfig {
    fn default() -> Self {
        Self::from_sources(&ConfigOverrides::default(), &TomlConfig::default(), |_| None)
    }
}

impl FelaConfig {
    /// Resolve configuration from CLI overrides, the process environment and
    /// the TOML file (explicit path, `FELA_CONFIG`, or the platform default).
    pub fn resolve(cli: &ConfigOverrides) -> Result<Self> {
        let toml_path = cli
            .config_path
            .clone()
            .or_else(|| std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from))
            .or_else(default_config_path);

        let toml_config = match toml_path {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                load_toml_config(&path)?
            }
            Some(path) if cli.config_path.is_some() => {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            _ => {
                debug!("No config file found, using defaults");
                TomlConfig::default()
            }
        };

        Ok(Self::from_sources(cli, &toml_config, |key| {
            std::env::var(key).ok()
        }))
    }

    /// Apply the priority order to explicit sources
    pub fn from_sources<F>(cli: &ConfigOverrides, toml: &TomlConfig, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let backend_url = non_empty(cli.backend_url.clone())
            .or_else(|| non_empty(env(ENV_BACKEND_URL)))
            .or_else(|| non_empty(toml.backend_url.clone()))
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let geocoding_url = non_empty(cli.geocoding_url.clone())
            .or_else(|| non_empty(env(ENV_GEOCODING_URL)))
            .or_else(|| non_empty(toml.geocoding_url.clone()))
            .unwrap_or_else(|| DEFAULT_GEOCODING_URL.to_string());

        let log_level = non_empty(cli.log_level.clone())
            .or_else(|| non_empty(env(ENV_LOG_LEVEL)))
            .unwrap_or_else(|| toml.logging.level.clone());

        Self {
            backend_url: backend_url.trim_end_matches('/').to_string(),
            api_prefix: toml
                .api_prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_API_PREFIX.to_string()),
            geocoding_url: geocoding_url.trim_end_matches('/').to_string(),
            user_agent: toml.user_agent.clone().unwrap_or_else(get_user_agent),
            accept_language: toml
                .accept_language
                .clone()
                .unwrap_or_else(|| DEFAULT_ACCEPT_LANGUAGE.to_string()),
            request_timeout_secs: toml
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            geocoding_timeout_secs: toml
                .geocoding_timeout_secs
                .unwrap_or(DEFAULT_GEOCODING_TIMEOUT_SECS),
            geocoding_requests_per_second: toml
                .geocoding_requests_per_second
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_GEOCODING_RATE_PER_SEC),
            debounce_ms: toml.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS),
            min_chars: toml.min_chars.unwrap_or(DEFAULT_MIN_CHARS),
            max_presentations: toml
                .max_presentations
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_PRESENTATIONS),
            min_event_year: toml.min_event_year.unwrap_or(DEFAULT_MIN_EVENT_YEAR),
            event_bus_capacity: toml
                .event_bus_capacity
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_EVENT_BUS_CAPACITY),
            log_level,
        }
    }

    /// Base URL of the catalogue API (`backend_url` + `api_prefix`)
    pub fn api_base_url(&self) -> String {
        format!("{}{}", self.backend_url, self.api_prefix)
    }
}

/// Platform config file location (`~/.config/fela/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fela").join("config.toml"))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write a TOML config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = FelaConfig::default();
        assert_eq!(config.backend_url, DEFAULT_BACKEND_URL);
        assert_eq!(config.api_base_url(), "http://localhost:8888/FELA");
        assert_eq!(config.debounce_ms, 300);
        assert_eq!(config.min_chars, 1);
        assert_eq!(config.max_presentations, 10);
        assert_eq!(config.min_event_year, 2000);
        assert!(config.user_agent.starts_with("FELA/"));
    }

    #[test]
    fn test_priority_cli_over_env_over_toml() {
        let toml = TomlConfig {
            backend_url: Some("http://toml:1".to_string()),
            geocoding_url: Some("http://toml-geo".to_string()),
            ..Default::default()
        };
        let env = env_from(&[(ENV_BACKEND_URL, "http://env:2")]);

        let cli = ConfigOverrides {
            backend_url: Some("http://cli:3/".to_string()),
            ..Default::default()
        };
        let config = FelaConfig::from_sources(&cli, &toml, &env);
        assert_eq!(config.backend_url, "http://cli:3");
        assert_eq!(config.geocoding_url, "http://toml-geo");

        let config = FelaConfig::from_sources(&ConfigOverrides::default(), &toml, &env);
        assert_eq!(config.backend_url, "http://env:2");

        let config = FelaConfig::from_sources(&ConfigOverrides::default(), &toml, |_| None);
        assert_eq!(config.backend_url, "http://toml:1");
    }

    #[test]
    fn test_blank_values_fall_through() {
        let cli = ConfigOverrides {
            backend_url: Some("   ".to_string()),
            ..Default::default()
        };
        let config = FelaConfig::from_sources(&cli, &TomlConfig::default(), |_| None);
        assert_eq!(config.backend_url, DEFAULT_BACKEND_URL);
    }

    #[test]
    fn test_zero_rate_uses_default() {
        let toml = TomlConfig {
            geocoding_requests_per_second: Some(0),
            ..Default::default()
        };
        let config = FelaConfig::from_sources(&ConfigOverrides::default(), &toml, |_| None);
        assert_eq!(config.geocoding_requests_per_second, 1);
    }

    #[test]
    fn test_toml_round_trip_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = TomlConfig {
            backend_url: Some("https://example.org/fela_api".to_string()),
            debounce_ms: Some(150),
            logging: LoggingConfig {
                level: "debug".to_string(),
            },
            ..Default::default()
        };
        write_toml_config(&config, &path).unwrap();

        let loaded = load_toml_config(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "backend_url = [").unwrap();

        match load_toml_config(&path) {
            Err(Error::Config(msg)) => assert!(msg.contains("Parse TOML failed")),
            other => panic!("Expected config error, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_resolve_reads_env_and_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "debounce_ms = 120\n[logging]\nlevel = \"warn\"\n").unwrap();

        std::env::set_var(ENV_GEOCODING_URL, "http://geo.test");
        let cli = ConfigOverrides {
            config_path: Some(path),
            ..Default::default()
        };
        let config = FelaConfig::resolve(&cli).unwrap();
        std::env::remove_var(ENV_GEOCODING_URL);

        assert_eq!(config.debounce_ms, 120);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.geocoding_url, "http://geo.test");
    }

    #[test]
    #[serial]
    fn test_resolve_missing_explicit_file_fails() {
        let cli = ConfigOverrides {
            config_path: Some(PathBuf::from("/nonexistent/fela/config.toml")),
            ..Default::default()
        };
        assert!(matches!(FelaConfig::resolve(&cli), Err(Error::Config(_))));
    }
}
