//! Bulwark router daemon.
//!
//! Runs a [`bulwark_core::Router`] over real neighbor links: one listening
//! socket, one persistent link per neighbor, a periodic split-horizon
//! advertiser, and a line-oriented command surface.
//!
//! # Tasks
//!
//! - accept loop: registers every inbound link
//! - per link: a reader (one frame at a time, idle timeout) and a writer
//!   (drains the link's outbound queue)
//! - advertiser: sends route updates on a fixed interval
//! - command loop (binary only): reads operator commands from stdin
//!
//! Shared state (routing table, link map, key and sequence caches) sits
//! behind mutexes that are never held across an `.await`.

pub mod commands;
pub mod config;
pub mod connections;
pub mod error;
pub mod keyring;
pub mod node;
pub mod tcp;

pub use commands::Command;
pub use config::{NodeConfig, ROUTER_PORT};
pub use connections::{ConnectionManager, FrameRead, Link};
pub use error::ServerError;
pub use keyring::Keyring;
pub use node::Node;
pub use tcp::TcpTransport;
