// Configuration management for iproute-model
// Loaded from a TOML file; every section and key is optional

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{IpError, IpResult};

/// Locations tried, in order, when no explicit path is given.
const DEFAULT_PATHS: &[&str] = &["iproute-model.toml", "config.toml"];

/// Configuration file structure (TOML format)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// How the `ip` binary is invoked
    #[serde(default)]
    pub command: CommandConfig,

    /// Per-kind result cache timeouts
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Program to execute (default: ip)
    #[serde(default = "default_program")]
    pub program: String,

    /// Pass `-o` so every record is printed on one line
    #[serde(default = "default_true")]
    pub oneline: bool,

    /// Sub-command listing links
    #[serde(default)]
    pub link_source: LinkSource,
}

/// Which `show` lists links: `ip -0 link show`, or `ip -0 addr show` on old releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinkSource {
    #[default]
    Link,
    Addr,
}

/// Cache timeouts in seconds; absent or zero disables caching for that kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub link: Option<f64>,

    #[serde(default)]
    pub address: Option<f64>,

    #[serde(default)]
    pub neighbor: Option<f64>,

    /// Shared by the IPv4 and IPv6 route tables
    #[serde(default)]
    pub route: Option<f64>,

    /// Shared by the IPv4 and IPv6 rule tables
    #[serde(default)]
    pub rule: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_program() -> String {
    "ip".to_string()
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for CommandConfig {
    fn default() -> Self {
        CommandConfig {
            program: default_program(),
            oneline: default_true(),
            link_source: LinkSource::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl CacheConfig {
    pub fn link_timeout(&self) -> Option<Duration> {
        seconds(self.link)
    }

    pub fn address_timeout(&self) -> Option<Duration> {
        seconds(self.address)
    }

    pub fn neighbor_timeout(&self) -> Option<Duration> {
        seconds(self.neighbor)
    }

    pub fn route_timeout(&self) -> Option<Duration> {
        seconds(self.route)
    }

    pub fn rule_timeout(&self) -> Option<Duration> {
        seconds(self.rule)
    }

    fn validate(&self) -> IpResult<()> {
        let entries = [
            ("link", self.link),
            ("address", self.address),
            ("neighbor", self.neighbor),
            ("route", self.route),
            ("rule", self.rule),
        ];
        for (kind, secs) in entries {
            if let Some(secs) = secs {
                if !secs.is_finite() || secs < 0.0 {
                    return Err(IpError::Config(format!(
                        "cache.{} must be a non-negative number of seconds, got {}",
                        kind, secs
                    )));
                }
            }
        }
        Ok(())
    }
}

fn seconds(secs: Option<f64>) -> Option<Duration> {
    secs.filter(|s| s.is_finite() && *s > 0.0)
        .map(Duration::from_secs_f64)
}

impl Config {
    /// Load from `path`, else from the first default location that exists,
    /// else fall back to defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => DEFAULT_PATHS
                .iter()
                .map(PathBuf::from)
                .find(|path| path.exists()),
        };

        let Some(path) = path else {
            tracing::debug!("No configuration file found, using defaults");
            return Ok(Config::default());
        };

        tracing::info!("Loading configuration from: {}", path.display());
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Config::from_toml_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> IpResult<()> {
        if self.command.program.trim().is_empty() {
            return Err(IpError::Config("command.program must not be empty".to_string()));
        }
        self.cache.validate()?;
        if !matches!(self.logging.format.as_str(), "pretty" | "compact" | "json") {
            return Err(IpError::Config(format!(
                "logging.format must be pretty, compact or json, got '{}'",
                self.logging.format
            )));
        }
        Ok(())
    }
}
