//! Error types for forkwire.

use thiserror::Error;

/// Main error type for all forkwire operations.
#[derive(Debug, Error)]
pub enum ForkwireError {
    /// I/O error on the shared byte-stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serializer error (JsonArray serializer).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serializer encode error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack serializer decode error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Framing error (declared payload length over the configured cap).
    #[error("Framing error: {0}")]
    Frame(String),

    /// Protocol violation (unknown response id, FIFO mismatch, premature EOF).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Serializer data error not covered by a format crate (truncated
    /// varint, non-UTF-8 value in a JSON array, ...).
    #[error("Serializer error: {0}")]
    Codec(String),

    /// No handler registered under the given name.
    #[error("Handler not found: {0}")]
    HandlerNotFound(String),

    /// Connection closed while an operation was in progress.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using ForkwireError.
pub type Result<T> = std::result::Result<T, ForkwireError>;
