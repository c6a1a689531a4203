//! Domain-specific error types for vdisp.
//!
//! All fallible operations return `Result<T, VdispError>`.
//! Invalid input never panics; every error is typed and recoverable.

use std::time::Duration;
use thiserror::Error;

use crate::display::types::DisplayId;

/// The canonical error type for vdisp.
#[derive(Debug, Error)]
pub enum VdispError {
    // ── Display / Session Errors ─────────────────────────────────
    /// No live session (and no default display) is known under this id.
    #[error("unknown display id: {0}")]
    UnknownDisplay(DisplayId),

    /// The display exists but has no input controller attached.
    #[error("no input controller for display id {0}")]
    NoInputController(DisplayId),

    /// The platform handed back a display id that is already registered.
    #[error("display id {0} is already registered")]
    DuplicateDisplay(DisplayId),

    /// A caller supplied an argument outside the accepted range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Creating an encoder, surface or virtual display failed.
    #[error("failed to acquire {resource}: {reason}")]
    ResourceAcquisition {
        resource: &'static str,
        reason: String,
    },

    /// The platform adapter does not implement this capability.
    #[error("unsupported by platform: {0}")]
    Unsupported(&'static str),

    // ── Encoder Errors ───────────────────────────────────────────
    /// The encoder was used while not in an executing state
    /// (typically because it is being torn down).
    #[error("encoder in illegal state: {0}")]
    EncoderState(String),

    /// Any other encoder-reported failure.
    #[error("encoder error: {0}")]
    Encoder(String),

    // ── Remote Errors ────────────────────────────────────────────
    /// The remote endpoint behind a sink handle is gone.
    #[error("remote endpoint is dead")]
    RemoteDead,

    /// A one-way delivery to a remote endpoint failed.
    #[error("remote delivery failed: {0}")]
    Remote(String),

    /// The remote service answered a call with an error.
    #[error("request failed: {0}")]
    RequestFailed(String),

    // ── Wire Errors ──────────────────────────────────────────────
    /// Received bytes that do not start with the `VDS0` magic.
    #[error("invalid magic bytes: expected VDS0")]
    InvalidMagic,

    /// The frame payload failed checksum verification.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The received frame does not match its header.
    #[error("invalid packet length: expected {expected}, got {actual}")]
    InvalidPacketLength { expected: usize, actual: usize },

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // ── Serialization Errors ─────────────────────────────────────
    /// Encoding or decoding of a payload failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

impl VdispError {
    /// Shorthand for a [`VdispError::ResourceAcquisition`].
    pub fn acquisition(resource: &'static str, reason: impl ToString) -> Self {
        VdispError::ResourceAcquisition {
            resource,
            reason: reason.to_string(),
        }
    }

    /// Whether this error reports misuse by the caller (bad display id or
    /// argument) rather than an internal failure.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            VdispError::UnknownDisplay(_)
                | VdispError::NoInputController(_)
                | VdispError::InvalidArgument(_)
        )
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for VdispError {
    fn from(s: String) -> Self {
        VdispError::Other(s)
    }
}

impl From<&str> for VdispError {
    fn from(s: &str) -> Self {
        VdispError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for VdispError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        VdispError::ChannelClosed
    }
}

impl From<Box<bincode::ErrorKind>> for VdispError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        VdispError::Encoding(e.to_string())
    }
}
