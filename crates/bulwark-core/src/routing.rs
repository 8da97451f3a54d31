//! Routing table and neighbor set.
//!
//! Maps each known destination to the neighbor packets for it should go to.
//! A `None` next hop means the destination is known (installed by
//! configuration) but no route to it has been learned yet.
//!
//! # Invariants
//!
//! - Every neighbor is its own next hop: `routes[n] == Some(n)`.
//! - Nothing is ever removed. Routes are overwritten by newer advertisements
//!   but never withdrawn, and neighbors are never forgotten.
//!
//! Both mutators are idempotent and commute per destination, so replaying
//! an advertisement or a configuration push is harmless.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use bulwark_proto::NodeId;

/// Destinations, next hops, neighbors and locally hosted endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    routes: HashMap<NodeId, Option<NodeId>>,
    neighbors: HashSet<NodeId>,
    hosts: Vec<NodeId>,
}

impl RoutingTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a configuration push.
    ///
    /// Hosts not yet known get an unresolved entry and the hosts list is
    /// replaced. Neighbors are unioned into the neighbor set and routed to
    /// directly.
    pub fn install_config(&mut self, hosts: &[NodeId], neighbors: &[NodeId]) {
        for host in hosts {
            self.routes.entry(host.clone()).or_insert(None);
        }
        self.hosts = hosts.to_vec();

        for neighbor in neighbors {
            self.add_neighbor(neighbor);
        }
    }

    /// Apply a route advertisement received from `source`.
    ///
    /// Every advertised destination is now reached via `source`, and `source`
    /// itself becomes a directly routed neighbor. Destinations that are
    /// direct neighbors or hosted here keep their existing entry.
    pub fn merge_route_update(&mut self, source: &str, destinations: &[NodeId]) {
        for destination in destinations {
            if self.neighbors.contains(destination) || self.is_hosted(destination) {
                continue;
            }
            self.routes.insert(destination.clone(), Some(source.to_string()));
        }
        self.add_neighbor(source);
    }

    /// Record `neighbor` as directly adjacent.
    pub fn add_neighbor(&mut self, neighbor: &str) {
        self.neighbors.insert(neighbor.to_string());
        self.routes.insert(neighbor.to_string(), Some(neighbor.to_string()));
    }

    /// Next hop toward `destination`, if one has been learned.
    pub fn next_hop(&self, destination: &str) -> Option<&str> {
        self.routes.get(destination).and_then(|hop| hop.as_deref())
    }

    /// True if `destination` has an entry, resolved or not.
    pub fn knows(&self, destination: &str) -> bool {
        self.routes.contains_key(destination)
    }

    /// True if `node` is a direct neighbor.
    pub fn is_neighbor(&self, node: &str) -> bool {
        self.neighbors.contains(node)
    }

    /// True if `node` is one of the endpoints hosted here.
    pub fn is_hosted(&self, node: &str) -> bool {
        self.hosts.iter().any(|host| host == node)
    }

    /// Neighbors in sorted order
    pub fn neighbors(&self) -> Vec<NodeId> {
        let sorted: BTreeSet<&NodeId> = self.neighbors.iter().collect();
        sorted.into_iter().cloned().collect()
    }

    /// Locally hosted endpoints
    pub fn hosts(&self) -> &[NodeId] {
        &self.hosts
    }

    /// Sorted snapshot of every route
    pub fn routes(&self) -> BTreeMap<NodeId, Option<NodeId>> {
        self.routes.iter().map(|(dst, hop)| (dst.clone(), hop.clone())).collect()
    }

    /// True if no destination is known
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Split-horizon advertisement for `neighbor`: every destination whose
    /// next hop is not `neighbor`, sorted.
    pub fn advertisement_for(&self, neighbor: &str) -> Vec<NodeId> {
        let mut destinations: Vec<NodeId> = self
            .routes
            .iter()
            .filter(|(_, hop)| hop.as_deref() != Some(neighbor))
            .map(|(destination, _)| destination.clone())
            .collect();
        destinations.sort();
        destinations
    }

    /// Split-horizon advertisement for every neighbor, sorted by neighbor.
    ///
    /// Neighbors with nothing to learn are included with an empty list.
    pub fn advertisements(&self) -> Vec<(NodeId, Vec<NodeId>)> {
        self.neighbors()
            .into_iter()
            .map(|neighbor| {
                let destinations = self.advertisement_for(&neighbor);
                (neighbor, destinations)
            })
            .collect()
    }
}
