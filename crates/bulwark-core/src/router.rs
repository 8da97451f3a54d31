//! Packet dispatch and advertisement generation.
//!
//! # Dispatch
//!
//! ```text
//! receive(packet, arrived_from)
//!     │ authenticate (drop on failure)
//!     ▼
//! MASTERCONFIG ──> install hosts and neighbors
//! ROUTEUPDATE  ──> merge advertised destinations via packet.source
//!                  (only when addressed here by the link peer)
//! FLOOD        ──> local? Deliver : forwarder relays to other neighbors
//! other        ──> UnsupportedPacketType
//! ```
//!
//! State lives entirely in the [`RoutingTable`]; there is no explicit
//! protocol automaton.

use std::sync::{Mutex, MutexGuard, PoisonError};

use bulwark_proto::{MasterConfig, NodeId, Packet, PacketType, RouteUpdate};
use tracing::{debug, info};

use crate::{
    auth::Authenticator,
    error::RouterError,
    flood::{FloodForwarder, ForwardingMode},
    routing::RoutingTable,
};

/// Effects requested by the router.
///
/// The runtime executes these: `Send` goes out over the link to `to`
/// (opening it if needed), `Deliver` hands a packet that reached its final
/// destination to the local consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterAction {
    /// Transmit `packet` to neighbor `to`
    Send {
        /// Neighbor to transmit to
        to: NodeId,
        /// Packet to transmit, already signed
        packet: Packet,
    },

    /// Packet reached its destination here
    Deliver(Packet),
}

/// Distance-vector router with split horizon and flood delivery.
pub struct Router {
    auth: Authenticator,
    table: Mutex<RoutingTable>,
    forwarder: Box<dyn FloodForwarder>,
}

impl Router {
    /// Router using the forwarder for `mode`.
    pub fn new(auth: Authenticator, mode: ForwardingMode) -> Self {
        Self::with_forwarder(auth, mode.forwarder())
    }

    /// Router using a custom flood forwarder.
    pub fn with_forwarder(auth: Authenticator, forwarder: Box<dyn FloodForwarder>) -> Self {
        Self { auth, table: Mutex::new(RoutingTable::new()), forwarder }
    }

    /// This router's node identifier
    pub fn node_id(&self) -> &str {
        self.auth.identity().node_id()
    }

    /// Packet authenticator
    pub fn authenticator(&self) -> &Authenticator {
        &self.auth
    }

    /// Snapshot of the routing table
    pub fn table(&self) -> RoutingTable {
        self.lock_table().clone()
    }

    /// True if packets for `destination` terminate here.
    pub fn is_local(&self, destination: &str) -> bool {
        destination == self.node_id() || self.lock_table().is_hosted(destination)
    }

    /// Authenticate and dispatch a packet received over the link to
    /// `arrived_from`.
    ///
    /// Packets failing authentication are rejected before any state changes
    /// and are never forwarded.
    pub async fn receive(
        &self,
        packet: Packet,
        arrived_from: &str,
    ) -> Result<Vec<RouterAction>, RouterError> {
        self.auth.check(&packet).await?;
        self.dispatch(packet, arrived_from)
    }

    /// Dispatch an already authenticated packet by type.
    pub fn dispatch(
        &self,
        packet: Packet,
        arrived_from: &str,
    ) -> Result<Vec<RouterAction>, RouterError> {
        match packet.packet_type {
            PacketType::MasterConfig => self.handle_master_config(&packet),
            PacketType::RouteUpdate => self.handle_route_update(&packet, arrived_from),
            PacketType::Flood => Ok(self.handle_flood(packet, arrived_from)),
            other @ (PacketType::RouteSetup | PacketType::Payload) => {
                Err(RouterError::UnsupportedPacketType(other))
            },
        }
    }

    fn handle_master_config(&self, packet: &Packet) -> Result<Vec<RouterAction>, RouterError> {
        let config = MasterConfig::from_payload(&packet.payload)?;
        let neighbors: Vec<NodeId> =
            config.neighbors.into_iter().filter(|n| n != self.node_id()).collect();

        info!(hosts = ?config.hosts, neighbors = ?neighbors, "installing configuration");
        self.lock_table().install_config(&config.hosts, &neighbors);

        Ok(Vec::new())
    }

    fn handle_route_update(
        &self,
        packet: &Packet,
        arrived_from: &str,
    ) -> Result<Vec<RouterAction>, RouterError> {
        if packet.source == self.node_id() {
            debug!("ignoring route update claiming to come from this node");
            return Ok(Vec::new());
        }

        // Route updates are never relayed: the advertiser must be the link peer.
        if packet.destination != self.node_id() || packet.source != arrived_from {
            debug!(
                source = %packet.source,
                destination = %packet.destination,
                from = arrived_from,
                "ignoring route update not sent directly to this node"
            );
            return Ok(Vec::new());
        }

        let update = RouteUpdate::from_payload(&packet.payload)?;
        let destinations: Vec<NodeId> =
            update.destinations.into_iter().filter(|d| d != self.node_id()).collect();

        debug!(source = %packet.source, count = destinations.len(), "merging route update");
        self.lock_table().merge_route_update(&packet.source, &destinations);

        Ok(Vec::new())
    }

    /// Handle an authenticated FLOOD packet that arrived from `arrived_from`.
    ///
    /// Delivery is terminal: a packet for this node or one of its hosts is
    /// delivered and never relayed. Anything else goes to the forwarder
    /// unmodified.
    pub fn handle_flood(&self, packet: Packet, arrived_from: &str) -> Vec<RouterAction> {
        if packet.source == self.node_id() {
            debug!(sequence = packet.sequence, "own flood looped back, dropping");
            return Vec::new();
        }

        let neighbors = {
            let mut table = self.lock_table();
            if arrived_from != self.node_id() {
                table.add_neighbor(arrived_from);
            }
            if packet.destination == self.node_id() || table.is_hosted(&packet.destination) {
                None
            } else {
                Some(table.neighbors())
            }
        };

        match neighbors {
            None => {
                debug!(source = %packet.source, sequence = packet.sequence, "flood delivered");
                vec![RouterAction::Deliver(packet)]
            },
            Some(neighbors) => self.forwarder.forward(&packet, arrived_from, &neighbors),
        }
    }

    /// Signed split-horizon route updates for every neighbor.
    ///
    /// Neighbors whose advertisement would be empty get nothing. Each packet
    /// takes a fresh sequence number.
    pub fn route_updates(&self) -> Result<Vec<RouterAction>, RouterError> {
        let advertisements = self.lock_table().advertisements();

        let mut actions = Vec::new();
        for (neighbor, destinations) in advertisements {
            if destinations.is_empty() {
                continue;
            }

            let payload = RouteUpdate::new(destinations).to_payload()?;
            let packet = Packet::new(
                self.node_id(),
                neighbor.clone(),
                PacketType::RouteUpdate,
                payload,
                self.auth.next_sequence(),
            );
            actions.push(RouterAction::Send { to: neighbor, packet: self.auth.sign(packet)? });
        }

        Ok(actions)
    }

    /// Originate a signed FLOOD packet to `destination`.
    ///
    /// Sends a copy to every neighbor, or delivers locally if the destination
    /// is this node or one of its hosts.
    pub fn originate_flood(
        &self,
        destination: &str,
        payload: impl Into<String>,
    ) -> Result<Vec<RouterAction>, RouterError> {
        let packet = Packet::new(
            self.node_id(),
            destination,
            PacketType::Flood,
            payload,
            self.auth.next_sequence(),
        );
        let packet = self.auth.sign(packet)?;

        if self.is_local(destination) {
            return Ok(vec![RouterAction::Deliver(packet)]);
        }

        let neighbors = self.lock_table().neighbors();
        Ok(neighbors
            .into_iter()
            .map(|to| RouterAction::Send { to, packet: packet.clone() })
            .collect())
    }

    fn lock_table(&self) -> MutexGuard<'_, RoutingTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("node_id", &self.node_id())
            .field("table", &*self.lock_table())
            .finish_non_exhaustive()
    }
}
