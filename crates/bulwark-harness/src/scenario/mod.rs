//! Scenario framework for multi-router simulations.
//!
//! A scenario names routers, the links between them, and the floods to send,
//! then hands the settled [`World`] to a mandatory oracle:
//!
//! ```text
//! Scenario::new("line")
//!     .node("a").node("b").node("c")
//!     .link("a", "b").link("b", "c")
//!     .flood("a", Target::Node("c".into()), Duration::from_secs(3))
//!     .oracle(Box::new(|world| { ... }))
//!     .run()
//! ```
//!
//! Every router is a real [`bulwark_server::Node`] on its own turmoil host,
//! talking framed TCP to its neighbors. An `operator` client pushes each
//! router's MASTERCONFIG shortly after boot, runs any checkpoints at their
//! scheduled times, waits out the settle period, and runs the oracle.

mod builder;
mod world;

pub use builder::{RunnableScenario, Scenario, Target};
pub use world::{DeliveryLog, World};

/// Verification run against the settled world.
pub type OracleFn = Box<dyn FnOnce(&World) -> Result<(), String>>;
