//! Flood forwarding capability.
//!
//! A router relays FLOOD packets that are not addressed to it through a
//! [`FloodForwarder`] chosen at construction. [`ForwardingRouter`] relays to
//! every neighbor except the inbound link. [`DroppingRouter`] relays nothing,
//! modelling a Byzantine node that signs and routes normally but refuses to
//! carry other nodes' traffic.

use bulwark_proto::{NodeId, Packet};
use tracing::debug;

use crate::router::RouterAction;

/// Decides where a transit FLOOD packet goes next.
pub trait FloodForwarder: Send + Sync {
    /// Relay `packet`, which arrived over the link to `arrived_from`.
    ///
    /// The packet must be relayed unmodified so its signature stays valid.
    fn forward(&self, packet: &Packet, arrived_from: &str, neighbors: &[NodeId]) -> Vec<RouterAction>;
}

/// Relays to every neighbor except the one the packet arrived from.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardingRouter;

impl FloodForwarder for ForwardingRouter {
    fn forward(&self, packet: &Packet, arrived_from: &str, neighbors: &[NodeId]) -> Vec<RouterAction> {
        neighbors
            .iter()
            .filter(|neighbor| neighbor.as_str() != arrived_from)
            .map(|neighbor| RouterAction::Send { to: neighbor.clone(), packet: packet.clone() })
            .collect()
    }
}

/// Silently drops every transit packet.
#[derive(Debug, Clone, Copy, Default)]
pub struct DroppingRouter;

impl FloodForwarder for DroppingRouter {
    fn forward(&self, packet: &Packet, arrived_from: &str, _neighbors: &[NodeId]) -> Vec<RouterAction> {
        debug!(
            source = %packet.source,
            destination = %packet.destination,
            from = arrived_from,
            "dropping transit flood"
        );
        Vec::new()
    }
}

/// Which forwarder a router is built with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ForwardingMode {
    /// Relay transit floods ([`ForwardingRouter`])
    #[default]
    Forward,
    /// Drop transit floods ([`DroppingRouter`])
    Drop,
}

impl ForwardingMode {
    /// Forwarder implementing this mode
    pub fn forwarder(self) -> Box<dyn FloodForwarder> {
        match self {
            Self::Forward => Box::new(ForwardingRouter),
            Self::Drop => Box::new(DroppingRouter),
        }
    }
}
