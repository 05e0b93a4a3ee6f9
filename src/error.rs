//! Error types for framecall.

use thiserror::Error;

/// Main error type for all framecall operations.
///
/// [`Engine::perform`](crate::Engine::perform) deliberately collapses call
/// failures into an absent response with the cause logged;
/// [`Engine::try_perform`](crate::Engine::try_perform) surfaces the same
/// failures as structured variants for callers that need to distinguish
/// them. Construction and codec seams use this type directly.
#[derive(Debug, Error)]
pub enum FramecallError {
    /// Invalid engine configuration detected at build time.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Protocol error: oversized payload, acknowledgment command mismatch.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// MsgPack serialization error (typed call helpers).
    #[error("MsgPack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error (typed call helpers).
    #[error("MsgPack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// All admission slots are taken by in-flight requests.
    #[error("Concurrent request limit reached")]
    SlotsExhausted,

    /// The rendezvous wait elapsed without a matching acknowledgment.
    #[error("Timed out waiting for acknowledgment")]
    Timeout,

    /// The engine shut down while a call was awaiting its acknowledgment.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using FramecallError.
pub type Result<T> = std::result::Result<T, FramecallError>;
