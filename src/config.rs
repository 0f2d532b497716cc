//! hostdb configuration.
//!
//! Configuration is read from a TOML file. Without an explicit path the
//! file is looked up at `<config_dir>/hostdb/config.toml`; a missing file
//! yields the defaults.
//!
//! ```toml
//! listen = "0.0.0.0:8080"
//! request_timeout = "2m"
//! log_format = "json"
//!
//! [[tokens]]
//! token = "s3cret"
//! username = "admin"
//! superuser = true
//!
//! [[backends]]
//! kind = "libvirt"
//! program = "ssh"
//! args = ["{hypervisor}", "virsh", "undefine", "--remove-all-storage", "{hostname}"]
//! timeout = "2m"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application name for config and data directories.
const APP_NAME: &str = "hostdb";

/// Config file name inside the config directory.
const CONFIG_FILENAME: &str = "config.toml";

/// Database file name inside the data directory.
const DATABASE_FILENAME: &str = "hostdb.redb";

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// A static API token and the principal it authenticates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenConfig {
    pub token: String,
    pub username: String,
    #[serde(default)]
    pub superuser: bool,
}

/// A program-driven virtualization backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// Backend kind, referenced by hypervisor records.
    pub kind: String,
    /// Program to run.
    pub program: String,
    /// Program arguments, with `{fqdn}`, `{hostname}` and `{hypervisor}` placeholders.
    #[serde(default)]
    pub args: Vec<String>,
    /// Time the program may run before it is killed, in humantime notation.
    #[serde(default = "default_backend_timeout")]
    pub timeout: String,
}

fn default_backend_timeout() -> String {
    "120s".to_string()
}

impl BackendConfig {
    /// Parsed program timeout.
    pub fn timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.timeout).map_err(|e| {
            Error::Config(format!(
                "invalid timeout '{}' for backend '{}': {}",
                self.timeout, self.kind, e
            ))
        })
    }
}

/// Global hostdb configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostdbConfig {
    /// HTTP listen address.
    pub listen: String,

    /// Database file path.
    pub database: PathBuf,

    /// Per-request timeout, in humantime notation (`300s`, `5m`).
    pub request_timeout: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// API tokens.
    pub tokens: Vec<TokenConfig>,

    /// Virtualization backends.
    pub backends: Vec<BackendConfig>,
}

impl Default for HostdbConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
            database: default_database_path(),
            request_timeout: "300s".to_string(),
            log_format: LogFormat::Text,
            tokens: Vec::new(),
            backends: Vec::new(),
        }
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/var/lib"))
        .join(APP_NAME)
        .join(DATABASE_FILENAME)
}

/// Default config file location.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILENAME))
}

impl HostdbConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// tried and a missing file yields the default configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&text).map_err(|e| match e {
            Error::ConfigLoad(msg) => Error::ConfigLoad(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Parse config text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::ConfigLoad(e.to_string()))
    }

    /// Parsed listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|e| Error::Config(format!("invalid listen address '{}': {}", self.listen, e)))
    }

    /// Parsed request timeout.
    pub fn request_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.request_timeout).map_err(|e| {
            Error::Config(format!(
                "invalid request_timeout '{}': {}",
                self.request_timeout, e
            ))
        })
    }

    /// Check the configuration for inconsistencies.
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        self.request_timeout()?;

        let mut tokens = HashSet::new();
        for token in &self.tokens {
            if token.token.is_empty() {
                return Err(Error::Config(format!(
                    "empty token for user '{}'",
                    token.username
                )));
            }
            if !tokens.insert(token.token.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate token for user '{}'",
                    token.username
                )));
            }
        }

        let mut kinds = HashSet::new();
        for backend in &self.backends {
            if backend.program.trim().is_empty() {
                return Err(Error::Config(format!(
                    "backend '{}' has no program",
                    backend.kind
                )));
            }
            backend.timeout()?;
            if !kinds.insert(backend.kind.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate backend kind '{}'",
                    backend.kind
                )));
            }
        }

        Ok(())
    }
}
