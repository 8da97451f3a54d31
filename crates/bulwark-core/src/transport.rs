//! Transport abstraction for neighbor links.
//!
//! A link is one reliable, ordered byte stream per neighbor. Production uses
//! TCP; the simulation harness uses turmoil's simulated TCP.

use std::io;

use async_trait::async_trait;
use bulwark_proto::NodeId;
use tokio::io::{AsyncRead, AsyncWrite};

/// Listening endpoint that can also dial neighbors.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Bidirectional byte stream to one peer.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Accept an inbound link.
    ///
    /// Blocks until a peer connects and returns the stream along with the
    /// peer's node identifier (its address).
    async fn accept(&self) -> io::Result<(Self::Stream, NodeId)>;

    /// Open an outbound link to `peer` on the router port.
    async fn connect(&self, peer: &str) -> io::Result<Self::Stream>;
}
