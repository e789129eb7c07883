//! Startup configuration, read once from `config.yaml`.
//!
//! # Configuration File Format
//!
//! ```yaml
//! port: "3000"
//! image: ghcr.io/nottimisreal/alpinewithgit
//! command: ["/bin/sh", "-c", "git pull"]
//! reap_interval_secs: 5
//! log_file: logs.txt
//! binds:
//!   - name: site-a
//!     bind: /srv/site-a:/repo
//! ```
//!
//! Only `binds` is required. A config without it is refused at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::errors::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_IMAGE: &str = "ghcr.io/nottimisreal/alpinewithgit";
pub const DEFAULT_REAP_INTERVAL_SECS: u64 = 5;

/// Update command run inside every launched container.
pub fn default_command() -> Vec<String> {
    vec!["/bin/sh".into(), "-c".into(), "git pull".into()]
}

/// One repository-to-bind pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BindEntry {
    pub name: String,
    pub bind: String,
}

/// `port` may be written as `"3000"`, `":3000"` or a bare number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u16),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    port: Option<PortValue>,
    image: Option<String>,
    command: Option<Vec<String>>,
    reap_interval_secs: Option<u64>,
    log_file: Option<PathBuf>,
    binds: Option<Vec<BindEntry>>,
}

/// Validated configuration. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct HookConfig {
    pub port: u16,
    pub image: String,
    pub command: Vec<String>,
    pub reap_interval: Duration,
    pub log_file: Option<PathBuf>,
    pub binds: Vec<BindEntry>,
}

impl HookConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(content)?;

        let binds = raw.binds.ok_or(ConfigError::MissingBinds)?;
        for (index, entry) in binds.iter().enumerate() {
            if entry.name.trim().is_empty() {
                return Err(ConfigError::InvalidBind {
                    index,
                    field: "name",
                });
            }
            if entry.bind.trim().is_empty() {
                return Err(ConfigError::InvalidBind {
                    index,
                    field: "bind",
                });
            }
        }

        let port = match raw.port {
            None => DEFAULT_PORT,
            Some(PortValue::Number(port)) => port,
            Some(PortValue::Text(text)) => parse_port(&text)?,
        };

        let command = raw.command.unwrap_or_else(default_command);
        if command.is_empty() {
            return Err(ConfigError::EmptyCommand);
        }

        let reap_secs = raw.reap_interval_secs.unwrap_or(DEFAULT_REAP_INTERVAL_SECS);
        if reap_secs == 0 {
            return Err(ConfigError::ZeroReapInterval);
        }

        Ok(Self {
            port,
            image: raw
                .image
                .filter(|i| !i.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
            command,
            reap_interval: Duration::from_secs(reap_secs),
            log_file: raw.log_file,
            binds,
        })
    }
}

/// Accepts `3000` and the listen-address form `:3000`. Empty means default.
pub fn parse_port(text: &str) -> Result<u16, ConfigError> {
    let trimmed = text.trim().trim_start_matches(':');
    if trimmed.is_empty() {
        return Ok(DEFAULT_PORT);
    }
    trimmed
        .parse()
        .map_err(|_| ConfigError::InvalidPort(text.to_string()))
}
