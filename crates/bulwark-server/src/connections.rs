//! Neighbor link bookkeeping and frame I/O.
//!
//! The [`ConnectionManager`] owns the map from neighbor to live [`Link`].
//! A link is the sending side of a queue drained by that connection's
//! writer task; the reader task runs separately so a slow peer never blocks
//! frames going out to it, and a send never has to wait for a read.
//!
//! Registering a peer again replaces its entry; the older link keeps
//! reading until it closes on its own. Each registration gets a fresh link
//! id, and teardown removes the map entry only if it still holds that id,
//! so a dying link cannot evict the link that replaced it.

use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use bulwark_proto::{FrameHeader, NodeId, Packet, ProtocolError};
use bytes::Bytes;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};

use crate::error::ServerError;

/// Handle for queueing frames on one neighbor link.
#[derive(Debug, Clone)]
pub struct Link {
    id: u64,
    peer: NodeId,
    outbound: mpsc::UnboundedSender<Bytes>,
}

impl Link {
    /// Registration id of this link
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Neighbor at the other end
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Queue an encoded frame for the writer task.
    pub fn send(&self, frame: Bytes) -> Result<(), ServerError> {
        self.outbound.send(frame).map_err(|_| ServerError::PeerDisconnected(self.peer.clone()))
    }
}

/// Live links keyed by neighbor.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    links: Mutex<HashMap<NodeId, Link>>,
    next_id: AtomicU64,
}

impl ConnectionManager {
    /// No links
    pub fn new() -> Self {
        Self::default()
    }

    /// Current link to `peer`, if any.
    pub fn get(&self, peer: &str) -> Option<Link> {
        self.lock().get(peer).cloned()
    }

    /// Register a new link to `peer`, replacing any existing one.
    ///
    /// Returns the link and the queue its writer task must drain.
    pub fn register(&self, peer: &str) -> (Link, mpsc::UnboundedReceiver<Bytes>) {
        let (outbound, queue) = mpsc::unbounded_channel();
        let link = Link {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            peer: peer.to_string(),
            outbound,
        };
        self.lock().insert(peer.to_string(), link.clone());
        (link, queue)
    }

    /// Remove the link to `peer` if it is still link `link_id`.
    ///
    /// Returns whether an entry was removed.
    pub fn deregister(&self, peer: &str, link_id: u64) -> bool {
        let mut links = self.lock();
        if links.get(peer).is_some_and(|link| link.id == link_id) {
            links.remove(peer);
            true
        } else {
            false
        }
    }

    /// Peers with a live link, sorted
    pub fn peers(&self) -> Vec<NodeId> {
        let mut peers: Vec<NodeId> = self.lock().keys().cloned().collect();
        peers.sort();
        peers
    }

    /// Number of live links
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if there are no live links
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<NodeId, Link>> {
        self.links.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Outcome of reading one frame from a link.
#[derive(Debug)]
pub enum FrameRead {
    /// Well-formed packet
    Packet(Packet),
    /// Frame was delimited correctly but its body is not a valid packet.
    /// The link stays usable.
    Malformed(ProtocolError),
    /// Peer closed the stream cleanly between frames
    Closed,
}

/// Read exactly one frame.
///
/// A bad body yields [`FrameRead::Malformed`] since the header already told
/// us where the next frame starts. A bad header loses framing and is
/// returned as an error, as is EOF in the middle of a frame.
pub async fn read_frame<R>(reader: &mut R) -> Result<FrameRead, ServerError>
where
    R: AsyncRead + Unpin,
{
    let mut header_buf = [0u8; FrameHeader::SIZE];

    let first = reader.read(&mut header_buf).await?;
    if first == 0 {
        return Ok(FrameRead::Closed);
    }
    reader.read_exact(&mut header_buf[first..]).await?;

    let header = FrameHeader::parse(&header_buf)?;

    let mut body = vec![0u8; header.body_size()];
    reader.read_exact(&mut body).await?;

    Ok(match Packet::decode_body(&body) {
        Ok(packet) => FrameRead::Packet(packet),
        Err(e) => FrameRead::Malformed(e),
    })
}

/// Drain `queue` onto `writer` until every sender is dropped.
///
/// The write half is left open on return. A replaced link keeps reading
/// until the peer closes it or it goes idle; only the reader ends a link.
pub async fn write_frames<W>(
    writer: &mut W,
    queue: &mut mpsc::UnboundedReceiver<Bytes>,
) -> Result<(), ServerError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = queue.recv().await {
        writer.write_all(&frame).await?;
    }
    writer.flush().await?;
    Ok(())
}
