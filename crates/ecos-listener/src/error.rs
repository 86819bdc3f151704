// ── Listener error types ──
//
// Transport-level failures of the station connector and the router.
// Reconnectable errors are handled inside the connector loop; callers
// only see bind failures and shutdown.

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

#[derive(Debug, Error)]
pub enum ListenerError {
    // ── Station connection ───────────────────────────────────────────
    #[error("Cannot connect to command station at {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("Connection to {addr} timed out after {timeout_secs}s")]
    Timeout { addr: String, timeout_secs: u64 },

    #[error("Line framing error: {0}")]
    Codec(#[from] LinesCodecError),

    // ── Router ───────────────────────────────────────────────────────
    #[error("Cannot bind router to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Router client must enable at least one snapshot section")]
    EmptyFilter,

    #[error("Router message error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid router snapshot: {0}")]
    Snapshot(#[from] ecos_core::CoreError),

    // ── Other ────────────────────────────────────────────────────────
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for ListenerError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}
