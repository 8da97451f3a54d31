//! Bulwark router core logic
//!
//! Distance-vector routing with split horizon, flood delivery, and packet
//! authentication, decoupled from sockets and timers.
//!
//! # Architecture
//!
//! The [`Router`] never performs I/O. Feeding it a packet (or asking it for
//! its periodic advertisements) yields a list of [`RouterAction`]s describing
//! the sends and deliveries that should happen. A runtime executes them; a
//! test inspects them. The same router code therefore runs in the daemon, in
//! unit tests, and inside simulated clusters.
//!
//! The only asynchronous step is key resolution, because an unknown peer key
//! may have to be fetched from an external [`KeyDirectory`].
//!
//! # Components
//!
//! - [`identity`]: Own signing identity, key directory, trust store
//! - [`auth`]: Packet signing, verification, replay protection
//! - [`routing`]: Routing table, neighbor set, hosted endpoints
//! - [`flood`]: Flood forwarding capability (forwarding and dropping)
//! - [`router`]: Packet dispatch and advertisement generation
//! - [`transport`]: Transport abstraction (byte streams to neighbors)
//! - [`error`]: Error types

pub mod auth;
pub mod error;
pub mod flood;
pub mod identity;
pub mod router;
pub mod routing;
pub mod transport;

pub use auth::Authenticator;
pub use error::{AuthError, DirectoryError, RouterError};
pub use flood::{DroppingRouter, FloodForwarder, ForwardingMode, ForwardingRouter};
pub use identity::{DirectoryRecord, Identity, KeyDirectory, StaticDirectory, TrustStore};
pub use router::{Router, RouterAction};
pub use routing::RoutingTable;
pub use transport::Transport;
