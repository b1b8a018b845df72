//! Operator settings read from `~/.library-manager/config.toml`.
//!
//! The file is optional: a missing file yields the defaults, while a file
//! that fails to parse or validate stops startup with a message naming it.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use directories::BaseDirs;
use serde::Deserialize;

/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".library-manager";
const CONFIG_FILE_NAME: &str = "config.toml";
/// SQLite file name used when `database_path` is not configured.
const DB_FILE_NAME: &str = "library.sqlite";
pub const LOG_FILE_NAME: &str = "library.log";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Overrides the database location; relative paths resolve against the
    /// data directory.
    pub database_path: Option<PathBuf>,
    /// `env_logger` filter, e.g. `info` or `library_manager=debug`.
    pub log_level: String,
    pub lookup: LookupConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LookupConfig {
    /// Volumes endpoint; the ISBN query is appended as `?q=isbn:<isbn>`.
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Extra attempts after a transport error or a 5xx answer.
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            log_level: "info".to_string(),
            lookup: LookupConfig::default(),
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.googleapis.com/books/v1/volumes".to_string(),
            timeout_secs: 6,
            max_retries: 1,
            user_agent: concat!("library-manager/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Config {
    /// Load the config from the default data directory.
    pub fn load() -> Result<Self> {
        Self::load_from(&data_dir()?.join(CONFIG_FILE_NAME))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };

        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid settings in {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lookup.endpoint.trim().is_empty() {
            bail!("lookup.endpoint must not be empty");
        }
        if self.lookup.timeout_secs == 0 {
            bail!("lookup.timeout_secs must be greater than zero");
        }
        if self.log_level.trim().is_empty() {
            bail!("log_level must not be empty");
        }
        Ok(())
    }

    /// Where the SQLite store lives for the given data directory.
    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        match &self.database_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => data_dir.join(path),
            None => data_dir.join(DB_FILE_NAME),
        }
    }
}

/// Resolve the application data directory inside the user's home.
pub fn data_dir() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME))
}
