//! Settled simulation state handed to oracles.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use bulwark_proto::{NodeId, Packet};
use bulwark_server::Node;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::SimTransport;

/// Every FLOOD packet a router delivered, in delivery order.
#[derive(Debug, Clone, Default)]
pub struct DeliveryLog {
    packets: Arc<Mutex<Vec<Packet>>>,
}

impl DeliveryLog {
    /// Record everything arriving on `deliveries` until the node goes away.
    pub fn follow(&self, mut deliveries: broadcast::Receiver<Packet>) {
        let log = self.clone();
        tokio::spawn(async move {
            loop {
                match deliveries.recv().await {
                    Ok(packet) => log.lock().push(packet),
                    Err(RecvError::Lagged(_)) => {},
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    /// Snapshot of delivered packets
    pub fn packets(&self) -> Vec<Packet> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Packet>> {
        self.packets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Routers in a running scenario, by scenario name.
pub(crate) type Registry = Arc<Mutex<BTreeMap<String, (Arc<Node<SimTransport>>, DeliveryLog)>>>;

/// Routers as they stand when the oracle runs.
///
/// Queries take and return scenario names ("a", "b"), not simulated
/// addresses, so oracles read like the topology they check.
pub struct World {
    nodes: BTreeMap<String, (Arc<Node<SimTransport>>, DeliveryLog)>,
    names: HashMap<NodeId, String>,
}

impl World {
    pub(crate) fn from_registry(registry: &Registry) -> Self {
        let nodes = registry.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let names = nodes
            .iter()
            .map(|(name, (node, _))| (node.router().node_id().to_string(), name.clone()))
            .collect();
        Self { nodes, names }
    }

    /// The router called `name`.
    pub fn node(&self, name: &str) -> Option<&Arc<Node<SimTransport>>> {
        self.nodes.get(name).map(|(node, _)| node)
    }

    /// Names of every router that booted
    pub fn node_names(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    /// Simulated address of router `name`.
    pub fn id(&self, name: &str) -> Option<NodeId> {
        self.node(name).map(|node| node.router().node_id().to_string())
    }

    /// Name of the router at `id`, or `id` itself for non-router addresses.
    pub fn name_of(&self, id: &str) -> String {
        self.names.get(id).cloned().unwrap_or_else(|| id.to_string())
    }

    /// Next hop (by name) router `name` uses toward router `destination`.
    pub fn next_hop(&self, name: &str, destination: &str) -> Option<String> {
        let destination = self.id(destination)?;
        let table = self.node(name)?.router().table();
        table.next_hop(&destination).map(|hop| self.name_of(hop))
    }

    /// True if router `name` has any entry for `destination`.
    pub fn knows(&self, name: &str, destination: &str) -> bool {
        match (self.node(name), self.id(destination)) {
            (Some(node), Some(id)) => node.router().table().knows(&id),
            _ => false,
        }
    }

    /// Neighbors (by name) of router `name`, sorted
    pub fn neighbors(&self, name: &str) -> Vec<String> {
        let Some(node) = self.node(name) else {
            return Vec::new();
        };
        let mut names: Vec<String> =
            node.router().table().neighbors().iter().map(|id| self.name_of(id)).collect();
        names.sort();
        names
    }

    /// Peers (by name) router `name` currently holds an open link to.
    pub fn links(&self, name: &str) -> Vec<String> {
        let Some(node) = self.node(name) else {
            return Vec::new();
        };
        let mut names: Vec<String> =
            node.connections().peers().iter().map(|id| self.name_of(id)).collect();
        names.sort();
        names
    }

    /// FLOOD packets router `name` delivered.
    pub fn delivered(&self, name: &str) -> Vec<Packet> {
        self.nodes.get(name).map(|(_, log)| log.packets()).unwrap_or_default()
    }
}
