//! Error types for the router core.

use bulwark_proto::{NodeId, PacketType, ProtocolError};
use thiserror::Error;

/// Failure to resolve a peer's verification key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Directory holds no record for this node
    #[error("no directory record for {0}")]
    NotFound(NodeId),

    /// Record exists but claims a different address
    #[error("directory record for {requested} declares address {declared}")]
    AddressMismatch {
        /// Node we asked about
        requested: NodeId,
        /// Address in the returned record
        declared: NodeId,
    },

    /// Directory could not be queried
    #[error("key directory unavailable: {0}")]
    Unavailable(String),
}

/// Reasons a packet fails authentication.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Non-config packet without a signature
    #[error("packet from {0} is unsigned")]
    MissingSignature(NodeId),

    /// Sequence number not strictly above the last accepted one
    #[error("stale sequence {sequence} from {node} (last accepted {last})")]
    StaleSequence {
        /// Packet source
        node: NodeId,
        /// Sequence carried by the packet
        sequence: u64,
        /// Highest sequence accepted so far
        last: u64,
    },

    /// Signature bytes are malformed or do not match
    #[error("invalid signature from {0}")]
    InvalidSignature(NodeId),

    /// Source key could not be resolved
    #[error("key resolution failed: {0}")]
    KeyResolution(#[from] DirectoryError),

    /// Packet could not be canonically encoded for hashing
    #[error("cannot hash packet: {0}")]
    Encoding(#[from] ProtocolError),
}

/// Errors from packet dispatch and packet generation.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Packet failed authentication and was dropped
    #[error("authentication failure: {0}")]
    Authentication(#[from] AuthError),

    /// Packet type has no handler
    #[error("unsupported packet type {0}")]
    UnsupportedPacketType(PacketType),

    /// Wire or payload encoding problem
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
