//! Server configuration and command line
//!
//! Settings are layered: defaults, then an optional TOML file, then
//! `TIDELOG_*` environment variables, then command line flags.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};
use tidelog_engine::EngineConfig;
use tidelog_logging::LogConfig;

use crate::error::{ServerError, ServerResult};

/// Device used when a session does not name one
pub const DEFAULT_DEVICE: &str = "default";

/// Process-level configuration for the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: SocketAddr,
    /// Engine settings injected into every session
    pub engine: EngineConfig,
    /// Qualify log names with `device:` before they reach the store
    pub multi_device_prefixing: bool,
    /// Device used when a request names none
    pub default_device: String,
    /// Logging setup
    pub logging: LogConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            engine: EngineConfig::default(),
            multi_device_prefixing: true,
            default_device: DEFAULT_DEVICE.to_string(),
            logging: LogConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::config(e.to_string()))
    }

    /// Read a TOML file
    pub fn from_file(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Apply `TIDELOG_*` overrides using `lookup` to read variables
    pub fn apply_env<F>(&mut self, lookup: F) -> ServerResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("TIDELOG_BIND") {
            self.bind = parse_env("TIDELOG_BIND", &bind)?;
        }
        if let Some(max_len) = lookup("TIDELOG_STREAM_MAXLEN") {
            self.engine.max_len = parse_env("TIDELOG_STREAM_MAXLEN", &max_len)?;
        }
        if let Some(disable) = lookup("TIDELOG_DISABLE_MULTI_DEVICE_PREFIXING") {
            self.multi_device_prefixing = !parse_flag(&disable);
        }
        if let Some(device) = lookup("TIDELOG_DEFAULT_DEVICE") {
            self.default_device = device;
        }
        if let Some(level) = lookup("TIDELOG_LOG_LEVEL") {
            self.logging.default_level = level;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> ServerResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ServerError::config(format!("{name}={value:?}: {e}")))
}

/// `""`, `"0"` and `"false"` are off; anything else is on
fn parse_flag(value: &str) -> bool {
    !matches!(value.trim().to_ascii_lowercase().as_str(), "" | "0" | "false")
}

#[derive(Parser, Debug)]
#[command(
    name = "tidelog-server",
    about = "Stream multi-log data over WebSockets and HTTP"
)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Per-log length bound (0 disables trimming)
    #[arg(long)]
    pub max_len: Option<usize>,

    /// Store log names exactly as clients send them
    #[arg(long)]
    pub no_device_prefixing: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Human-readable console logs
    #[arg(long)]
    pub pretty: bool,
}

impl Cli {
    /// Resolve the configuration from the process environment
    pub fn load_config(&self) -> ServerResult<ServerConfig> {
        self.load_config_with(|name| std::env::var(name).ok())
    }

    /// Resolve the configuration with an explicit environment lookup
    pub fn load_config_with<F>(&self, lookup: F) -> ServerResult<ServerConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };
        config.apply_env(lookup)?;

        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(max_len) = self.max_len {
            config.engine.max_len = max_len;
        }
        if self.no_device_prefixing {
            config.multi_device_prefixing = false;
        }
        if let Some(level) = &self.log_level {
            config.logging.default_level = level.clone();
        }
        if self.pretty {
            config.logging.console.pretty = true;
            config.logging.console.ansi = true;
        }
        Ok(config)
    }
}
