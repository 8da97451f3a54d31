//! Structured payloads.
//!
//! A [`Packet`](crate::Packet) payload is opaque text. Control packets carry
//! JSON inside it so the configuration tool can speak the same format without
//! linking this crate:
//!
//! - MASTERCONFIG: `{"hosts": [id...], "neighbors": [id...]}`
//! - ROUTEUPDATE: `[id...]`

pub mod config;
pub mod route;

pub use config::MasterConfig;
pub use route::RouteUpdate;
