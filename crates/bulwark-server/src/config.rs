//! Node configuration.

use std::time::Duration;

use bulwark_core::ForwardingMode;
use bulwark_proto::NodeId;

/// Well-known port every router listens on.
pub const ROUTER_PORT: u16 = 42425;

/// Runtime configuration for one router.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// This node's identifier (the address neighbors know it by)
    pub node_id: NodeId,
    /// Port neighbors listen on
    pub port: u16,
    /// Interval between route advertisement rounds
    pub advertise_interval: Duration,
    /// A link with no inbound frame for this long is closed
    pub idle_timeout: Duration,
    /// Give up on an outbound connect after this long
    pub connect_timeout: Duration,
    /// Whether transit floods are relayed or dropped
    pub forwarding: ForwardingMode,
    /// First sequence number this node signs with
    pub initial_sequence: u64,
}

impl NodeConfig {
    /// Default configuration for `node_id`.
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self { node_id: node_id.into(), ..Self::default() }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: "127.0.0.1".to_string(),
            port: ROUTER_PORT,
            advertise_interval: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(5),
            forwarding: ForwardingMode::Forward,
            initial_sequence: 0,
        }
    }
}
