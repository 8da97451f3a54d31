//! Server error types.

use std::io;

use bulwark_core::RouterError;
use bulwark_proto::{NodeId, ProtocolError};
use thiserror::Error;

/// Errors raised by the daemon runtime.
///
/// All of these are scoped to one packet or one link; only startup failures
/// (bind, keyring) end the process.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Socket I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Outbound link could not be opened
    #[error("failed to connect to {peer}: {source}")]
    Connect {
        /// Neighbor being dialed
        peer: NodeId,
        /// Underlying error
        source: io::Error,
    },

    /// Link to a peer is gone
    #[error("peer {0} disconnected")]
    PeerDisconnected(NodeId),

    /// Frame could not be encoded or its header was corrupt
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Router rejected a packet or failed to build one
    #[error(transparent)]
    Router(#[from] RouterError),

    /// Keyring file missing or invalid
    #[error("keyring error: {0}")]
    Keyring(String),
}
