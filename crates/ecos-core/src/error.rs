// ── Core error types ──
//
// `ProtocolError` covers wire-level decoding of a batch. `CoreError` is
// what reconciliation and model operations return; the data provider
// catches it at the `handle_data` boundary and logs it.

use thiserror::Error;

/// Failure to decode a batch of protocol lines into blocks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Unknown block start: {line:?}")]
    UnknownBlockStart { line: String },

    #[error("Reply carries no decodable command: {line:?}")]
    MalformedReply { line: String },
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Protocol errors ──────────────────────────────────────────────
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    // ── Reconciliation errors ────────────────────────────────────────
    #[error("Malformed {context} block: {reason}")]
    MalformedBlock { context: &'static str, reason: String },

    #[error("Object {object_id} not found")]
    ObjectNotFound { object_id: i32 },

    #[error("Invalid object id {object_id}")]
    InvalidObjectId { object_id: i32 },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    // ── Snapshot errors ──────────────────────────────────────────────
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}
