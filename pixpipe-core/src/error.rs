//! Error types for the pixpipe streaming pipeline.
//!
//! All fallible operations return `Result<T, PipeError>`.
//! Decode failures are never papered over: in delta mode every frame
//! depends on every earlier one, so a bad frame ends the session.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for a pixpipe session.
#[derive(Debug, Error)]
pub enum PipeError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// A message arrived outside the lock-step order.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    // ── Decode Errors ────────────────────────────────────────────
    /// A back-reference pointed at zero bytes back or before the start
    /// of the output written so far.
    #[error("malformed stream at input offset {position}: {reason}")]
    MalformedStream {
        position: usize,
        reason: &'static str,
    },

    /// The compressed stream ended in the middle of a token.
    #[error("truncated input at offset {position}")]
    TruncatedInput { position: usize },

    /// The decoded length differs from the length the session expects.
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    // ── Channel Errors ───────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The peer closed the channel.
    #[error("channel closed")]
    ChannelClosed,

    /// No frame arrived within the configured wait window.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// A length-prefixed message exceeded the codec limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    // ── Configuration Errors ─────────────────────────────────────
    /// Session parameters are unusable (zero or overflowing dimensions).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The presentation sink refused a frame.
    #[error("presentation failed: {0}")]
    Presentation(String),
}

impl PipeError {
    /// Whether a higher layer may retry by opening a new session.
    ///
    /// Only a missed frame deadline qualifies. Decode and protocol
    /// failures poison the reference frame, and a closed channel means
    /// the peer is gone.
    pub fn is_recoverable(&self) -> bool {
        match self {
            PipeError::Timeout(_) => true,
            PipeError::Connection(e) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }

    /// Whether this error came out of the decode stages.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            PipeError::MalformedStream { .. }
                | PipeError::TruncatedInput { .. }
                | PipeError::SizeMismatch { .. }
        )
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, PipeError>;
