//! MASTERCONFIG payload.

use serde::{Deserialize, Serialize};

use crate::{
    errors::{ProtocolError, Result},
    packet::{NodeId, Packet, PacketType},
};

/// Topology assignment for one node.
///
/// # Protocol Flow
///
/// Pushed by the configuration tool at startup (and possibly re-pushed
/// later). The receiving router records `hosts` as endpoints it terminates
/// traffic for and unions `neighbors` into its neighbor set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterConfig {
    /// Endpoints this node delivers traffic for
    #[serde(default)]
    pub hosts: Vec<NodeId>,
    /// Directly adjacent routers
    #[serde(default)]
    pub neighbors: Vec<NodeId>,
}

impl MasterConfig {
    /// Parse from packet payload text.
    pub fn from_payload(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| ProtocolError::InvalidPayload(e.to_string()))
    }

    /// Render as packet payload text.
    pub fn to_payload(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Wrap in an unsigned MASTERCONFIG packet addressed to `destination`.
    pub fn into_packet(self, source: impl Into<NodeId>, destination: impl Into<NodeId>) -> Result<Packet> {
        let payload = self.to_payload()?;
        Ok(Packet::new(source, destination, PacketType::MasterConfig, payload, 0))
    }
}
