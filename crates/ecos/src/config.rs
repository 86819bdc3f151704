//! CLI configuration -- thin wrapper around `ecos_config`.
//!
//! Adds the `--config` path and the `--host` / `--port` overrides from
//! `GlobalOpts` on top of file + environment loading.

use std::path::PathBuf;

pub use ecos_config::{Config, config_path, load_config_from, save_config_to};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// The config file this invocation reads and writes.
pub fn active_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// Load the config and apply command-line overrides.
pub fn resolve(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = load_config_from(&active_path(global))?;

    if let Some(host) = &global.host {
        cfg.station.host.clone_from(host);
    }
    if let Some(port) = global.port {
        cfg.station.port = port;
    }

    cfg.validate()?;
    Ok(cfg)
}
