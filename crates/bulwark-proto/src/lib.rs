//! Wire format for the Bulwark router.
//!
//! Every packet travels as a frame: a fixed 8-byte header (zero-copy binary)
//! followed by a CBOR body carrying the [`Packet`] fields. The header only
//! holds framing data (magic, version, body length) so a reader can pull one
//! complete frame off a byte stream before touching the body.
//!
//! # Security
//!
//! Header parsing uses compile-time verified layouts via `zerocopy`. Bodies
//! are capped at [`FrameHeader::MAX_BODY_SIZE`] and the cap is checked before
//! any allocation. Signatures cover [`Packet::signing_bytes`], which never
//! includes the signature itself.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod header;
pub mod packet;
pub mod payloads;

pub use errors::{ProtocolError, Result};
pub use header::FrameHeader;
pub use packet::{NodeId, Packet, PacketType};
pub use payloads::{MasterConfig, RouteUpdate};
