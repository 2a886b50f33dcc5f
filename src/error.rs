//! Error types for portmux.

use thiserror::Error;

/// Main error type for all portmux operations.
#[derive(Debug, Error)]
pub enum MuxError {
    /// I/O error during transport operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A channel name could not be bound at registration time.
    ///
    /// This is a startup error: the mux cannot serve a channel it
    /// failed to bind, so the builder treats it as fatal.
    #[error("cannot bind channel '{name}': {source}")]
    Bind {
        /// The channel name that failed to bind.
        name: String,
        /// The underlying transport error.
        source: std::io::Error,
    },

    /// Inbound message has the wrong field count or an unusable field.
    #[error("malformed request: {0}")]
    Malformed(String),

    /// The parameter field was present but rejected by the decoder.
    #[error("invalid parameter syntax: {0}")]
    InvalidParams(String),

    /// The handler refused or failed the invocation.
    #[error("service error: {0}")]
    Service(String),

    /// The peer side of a channel is gone.
    #[error("channel closed")]
    ChannelClosed,
}

/// Result type alias using MuxError.
pub type Result<T> = std::result::Result<T, MuxError>;
