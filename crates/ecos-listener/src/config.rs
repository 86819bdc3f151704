// ── Runtime listener configuration ──
//
// Describes where the command station lives and how the router listens.
// Never touches disk; `ecos-config` builds one from the TOML profile.

use std::time::Duration;

/// Default ECoS text-protocol port.
pub const DEFAULT_STATION_PORT: u16 = 15471;
/// Default WebSocket router port.
pub const DEFAULT_ROUTER_PORT: u16 = 10050;

/// Exponential backoff for station reconnects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt. Default: 1s.
    pub initial_delay: Duration,
    /// Upper bound on the backoff delay. Default: 30s.
    pub max_delay: Duration,
    /// Attempts before giving up; `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

/// WebSocket fan-out settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
    /// Probe upward from `port` when it is taken, at most this many ports.
    pub port_search: u16,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1".into(),
            port: DEFAULT_ROUTER_PORT,
            port_search: 16,
        }
    }
}

/// Everything a [`Listener`](crate::Listener) needs to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    pub host: String,
    pub port: u16,
    /// Run the S88 feedback session next to the general one.
    pub feedback_session: bool,
    pub connect_timeout: Duration,
    /// Longest accepted protocol line, in bytes.
    pub max_line_length: usize,
    pub reconnect: ReconnectConfig,
    pub router: RouterConfig,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.100".into(),
            port: DEFAULT_STATION_PORT,
            feedback_session: true,
            connect_timeout: Duration::from_secs(10),
            max_line_length: 64 * 1024,
            reconnect: ReconnectConfig::default(),
            router: RouterConfig::default(),
        }
    }
}

impl ListenerConfig {
    /// `host:port` of the command station.
    pub fn station_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
