//! Configuration for the ECoS gateway.
//!
//! A TOML file merged with `ECOS_*` environment variables, validated and
//! translated to [`ecos_listener::ListenerConfig`]. The binary adds its
//! command-line overrides on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ecos_listener::config::{DEFAULT_ROUTER_PORT, DEFAULT_STATION_PORT};
use ecos_listener::{ListenerConfig, ReconnectConfig, RouterConfig};

/// Environment variable prefix; `__` separates nested keys.
pub const ENV_PREFIX: &str = "ECOS_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Default `tracing` directive when neither `-v` nor `RUST_LOG` is given.
    pub log_level: String,
    pub station: Station,
    pub reconnect: Reconnect,
    pub router: Router,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            station: Station::default(),
            reconnect: Reconnect::default(),
            router: Router::default(),
        }
    }
}

/// Where the command station listens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Station {
    pub host: String,
    pub port: u16,
    /// Open a second connection dedicated to S88 feedback buses.
    pub feedback_session: bool,
    /// Seconds.
    pub connect_timeout: u64,
    pub max_line_length: usize,
}

impl Default for Station {
    fn default() -> Self {
        Self {
            host: "192.168.1.100".into(),
            port: DEFAULT_STATION_PORT,
            feedback_session: true,
            connect_timeout: 10,
            max_line_length: 64 * 1024,
        }
    }
}

/// Reconnect backoff, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Reconnect {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl Default for Reconnect {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_retries: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Router {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
    pub port_search: u16,
}

impl Default for Router {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1".into(),
            port: DEFAULT_ROUTER_PORT,
            port_search: 16,
        }
    }
}

// ── Validation & translation ────────────────────────────────────────

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.station.host.trim().is_empty() {
            return Err(ConfigError::invalid("station.host", "must not be empty"));
        }
        if self.station.port == 0 {
            return Err(ConfigError::invalid("station.port", "must be between 1 and 65535"));
        }
        if self.station.connect_timeout == 0 {
            return Err(ConfigError::invalid("station.connect_timeout", "must be at least 1 second"));
        }
        if self.station.max_line_length < 64 {
            return Err(ConfigError::invalid("station.max_line_length", "must be at least 64 bytes"));
        }
        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            return Err(ConfigError::invalid(
                "reconnect.initial_delay_ms",
                format!("exceeds max_delay_ms ({})", self.reconnect.max_delay_ms),
            ));
        }
        if self.router.enabled && self.router.bind.trim().is_empty() {
            return Err(ConfigError::invalid("router.bind", "must not be empty"));
        }
        Ok(())
    }

    /// Validated runtime configuration for the listener.
    pub fn to_listener_config(&self) -> Result<ListenerConfig, ConfigError> {
        self.validate()?;

        Ok(ListenerConfig {
            host: self.station.host.trim().to_owned(),
            port: self.station.port,
            feedback_session: self.station.feedback_session,
            connect_timeout: Duration::from_secs(self.station.connect_timeout),
            max_line_length: self.station.max_line_length,
            reconnect: ReconnectConfig {
                initial_delay: Duration::from_millis(self.reconnect.initial_delay_ms),
                max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
                max_retries: self.reconnect.max_retries,
            },
            router: RouterConfig {
                enabled: self.router.enabled,
                bind: self.router.bind.trim().to_owned(),
                port: self.router.port,
                port_search: self.router.port_search,
            },
        })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "ecos", "ecos").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("ecos");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Defaults, then the TOML file at `path` (if present), then `ECOS_*`.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load the config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment(path).extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`, creating parent dirs.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let listener = Config::default().to_listener_config();
        assert!(listener.is_ok());
    }

    #[test]
    fn defaults_match_listener_defaults() {
        let translated = Config::default().to_listener_config().ok();
        assert_eq!(translated, Some(ListenerConfig::default()));
    }

    #[test]
    fn rejects_empty_host() {
        let mut cfg = Config::default();
        cfg.station.host = "  ".into();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Validation { field, .. }) if field == "station.host"
        ));
    }

    #[test]
    fn rejects_zero_port() {
        let mut cfg = Config::default();
        cfg.station.port = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Validation { field, .. }) if field == "station.port"
        ));
    }

    #[test]
    fn rejects_inverted_backoff() {
        let mut cfg = Config::default();
        cfg.reconnect.initial_delay_ms = 60_000;
        assert!(cfg.to_listener_config().is_err());
    }

    #[test]
    fn disabled_router_may_have_no_bind_address() {
        let mut cfg = Config::default();
        cfg.router.enabled = false;
        cfg.router.bind = String::new();
        assert!(cfg.validate().is_ok());
    }
}
