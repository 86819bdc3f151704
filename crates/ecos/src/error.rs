//! CLI error types with miette diagnostics.
//!
//! Maps library errors into user-facing errors with help text and exit codes.

use miette::Diagnostic;
use thiserror::Error;

use ecos_config::ConfigError;
use ecos_listener::ListenerError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not start the router on {addr}")]
    #[diagnostic(
        code(ecos::router_bind),
        help(
            "Another process may hold the port.\n\
             Pick one with --router-port or set [router] port in the config file."
        )
    )]
    RouterBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Listener failed: {0}")]
    #[diagnostic(code(ecos::listener))]
    Listener(ListenerError),

    // ── Input ────────────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ecos::validation))]
    Validation { field: String, reason: String },

    #[error("'{text}' is not a protocol command")]
    #[diagnostic(
        code(ecos::bad_command),
        help("Commands look like get(1000, speed) or set(11, switch[DCC13r]).")
    )]
    BadCommand { text: String },

    #[error("Batch contains no decodable commands")]
    #[diagnostic(
        code(ecos::bad_batch),
        help("Pass the base64 text of an `encodedCommands` field.")
    )]
    EmptyBatch,

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file already exists at {path}")]
    #[diagnostic(code(ecos::config_exists), help("Use --force to overwrite it."))]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(ecos::config), help("Check the config file and ECOS_* variables."))]
    Config(#[from] ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Cannot render output: {0}")]
    #[diagnostic(code(ecos::render))]
    Render(String),

    #[error(transparent)]
    #[diagnostic(code(ecos::model))]
    Core(#[from] ecos_core::CoreError),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::RouterBind { .. } | Self::Listener(_) => exit_code::CONNECTION,
            Self::Validation { .. } | Self::BadCommand { .. } | Self::EmptyBatch => {
                exit_code::USAGE
            }
            Self::ConfigExists { .. } | Self::Config(_) => exit_code::CONFIG,
            _ => exit_code::GENERAL,
        }
    }
}

impl From<ListenerError> for CliError {
    fn from(err: ListenerError) -> Self {
        match err {
            ListenerError::Bind { addr, source } => Self::RouterBind { addr, source },
            other => Self::Listener(other),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Render(err.to_string())
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Render(err.to_string())
    }
}

impl From<toml::ser::Error> for CliError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Render(err.to_string())
    }
}
