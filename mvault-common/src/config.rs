//! Configuration loading and resolution
//!
//! Priority order for every setting:
//! 1. Command-line argument / environment variable (`ConfigOverrides`)
//! 2. TOML config file
//! 3. Compiled default
//!
//! The backend endpoint and anon key have no default. Missing either one is
//! a fatal startup condition.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the backend endpoint
pub const URL_ENV: &str = "MVAULT_SUPABASE_URL";
/// Environment variable holding the public anon key
pub const ANON_KEY_ENV: &str = "MVAULT_SUPABASE_ANON_KEY";
/// Environment variable holding the listen address
pub const BIND_ENV: &str = "MVAULT_BIND";

pub const DEFAULT_BUCKET: &str = "music";
pub const DEFAULT_TABLE: &str = "tracks";
pub const DEFAULT_BIND: &str = "127.0.0.1:5780";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// On-disk configuration file (`~/.config/mvault/config.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendSection {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub bucket: Option<String>,
    pub table: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSection {
    pub bind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
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

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// Values supplied on the command line or through the environment
///
/// The binary fills these from clap, which reads `URL_ENV`, `ANON_KEY_ENV`
/// and `BIND_ENV` when the flags are absent.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub bind: Option<String>,
}

/// Connection settings for the hosted backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Project endpoint without trailing slash
    pub url: String,
    pub anon_key: String,
    /// Object-store bucket holding the audio blobs
    pub bucket: String,
    /// Row-store table holding track metadata
    pub table: String,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub backend: BackendConfig,
    pub bind: String,
    pub log_level: String,
}

/// Default config file location for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mvault").join("config.toml"))
}

/// Load the TOML config file
///
/// A missing file yields defaults. A file that exists but cannot be parsed
/// is a configuration error. The caller logs the outcome.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    Ok(config)
}

/// Merge overrides, file values and defaults into a `VaultConfig`
pub fn resolve(overrides: &ConfigOverrides, file: &TomlConfig) -> Result<VaultConfig> {
    let url = pick(overrides.url.as_deref(), file.backend.url.as_deref()).ok_or_else(|| {
        Error::Config(format!(
            "Backend URL not configured. Set {} or backend.url in the config file",
            URL_ENV
        ))
    })?;
    let anon_key =
        pick(overrides.anon_key.as_deref(), file.backend.anon_key.as_deref()).ok_or_else(|| {
            Error::Config(format!(
                "Backend anon key not configured. Set {} or backend.anon_key in the config file",
                ANON_KEY_ENV
            ))
        })?;

    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(Error::Config(format!(
            "Backend URL must start with http:// or https://: {}",
            url
        )));
    }

    let bucket = pick(None, file.backend.bucket.as_deref()).unwrap_or(DEFAULT_BUCKET);
    let table = pick(None, file.backend.table.as_deref()).unwrap_or(DEFAULT_TABLE);
    let bind = pick(overrides.bind.as_deref(), file.server.bind.as_deref()).unwrap_or(DEFAULT_BIND);

    Ok(VaultConfig {
        backend: BackendConfig {
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            bucket: bucket.to_string(),
            table: table.to_string(),
        },
        bind: bind.to_string(),
        log_level: file.logging.level.clone(),
    })
}

/// Non-empty, non-whitespace value
pub fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}

fn pick<'a>(first: Option<&'a str>, second: Option<&'a str>) -> Option<&'a str> {
    first
        .filter(|v| is_valid_value(v))
        .or_else(|| second.filter(|v| is_valid_value(v)))
        .map(str::trim)
}
