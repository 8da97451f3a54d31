//! Deterministic simulation harness for Bulwark routers.
//!
//! Turmoil-backed [`bulwark_core::Transport`] and key directory, plus a
//! scenario builder that boots a topology of real [`bulwark_server::Node`]s,
//! pushes their configuration, and checks the settled result with an oracle.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod directory;
pub mod scenario;
pub mod sim_transport;

pub use directory::{SimDirectory, seeded_identity};
pub use scenario::{OracleFn, RunnableScenario, Scenario, Target, World};
pub use sim_transport::SimTransport;
