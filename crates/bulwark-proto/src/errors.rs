//! Protocol error types.

use thiserror::Error;

/// Result alias for wire-format operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while framing, encoding or decoding packets.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame did not start with the expected magic bytes
    #[error("invalid frame magic: {0:#06x}")]
    InvalidMagic(u16),

    /// Frame version is not one we speak
    #[error("unsupported frame version: {0}")]
    UnsupportedVersion(u8),

    /// Declared body length exceeds the frame cap
    #[error("frame body of {size} bytes exceeds limit of {max}")]
    FrameTooLarge {
        /// Declared body size
        size: usize,
        /// Maximum accepted size
        max: usize,
    },

    /// Buffer ended before the frame did
    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Body is not a well-formed packet (bad CBOR, bad UTF-8, unknown type
    /// code, missing field)
    #[error("malformed packet: {0}")]
    Malformed(String),

    /// Packet could not be serialized
    #[error("failed to encode packet: {0}")]
    Encode(String),

    /// Structured payload (JSON inside `payload`) is invalid
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}
