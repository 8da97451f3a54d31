//! Packet type and its frame codec.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use sha2::{Digest, Sha256};

use crate::{
    errors::{ProtocolError, Result},
    header::FrameHeader,
};

/// Node identifier. Nodes are named by the address they listen on.
pub type NodeId = String;

/// Packet type codes.
///
/// Encoded as a single `u8`. Decoding an unknown code fails instead of
/// falling back to some default variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum PacketType {
    /// Topology pushed by the out-of-band configuration tool
    MasterConfig = 0,
    /// Split-horizon reachability advertisement
    RouteUpdate = 1,
    /// Path setup request (reserved, not handled by the router)
    RouteSetup = 2,
    /// Path-routed data (reserved, not handled by the router)
    Payload = 3,
    /// Flood-delivered data
    Flood = 4,
}

impl PacketType {
    /// Wire code for this type
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire code, rejecting unknown values.
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::MasterConfig),
            1 => Some(Self::RouteUpdate),
            2 => Some(Self::RouteSetup),
            3 => Some(Self::Payload),
            4 => Some(Self::Flood),
            _ => None,
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MasterConfig => "MASTERCONFIG",
            Self::RouteUpdate => "ROUTEUPDATE",
            Self::RouteSetup => "ROUTESETUP",
            Self::Payload => "PAYLOAD",
            Self::Flood => "FLOOD",
        };
        f.write_str(name)
    }
}

/// A routed packet.
///
/// Once signed, a packet is forwarded as-is: intermediate routers never
/// rewrite any field, so the original signature stays valid end to end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Packet {
    /// Originating node
    pub source: NodeId,
    /// Final destination
    pub destination: NodeId,
    /// Packet type
    #[serde(rename = "type")]
    pub packet_type: PacketType,
    /// Opaque payload, often JSON text (see [`crate::payloads`])
    pub payload: String,
    /// Per-source monotonically increasing sequence number
    pub sequence: u64,
    /// Ed25519 signature over [`Packet::signing_bytes`]. Absent only on
    /// MASTERCONFIG packets.
    pub signature: Option<Vec<u8>>,
}

impl Packet {
    /// Create an unsigned packet.
    pub fn new(
        source: impl Into<NodeId>,
        destination: impl Into<NodeId>,
        packet_type: PacketType,
        payload: impl Into<String>,
        sequence: u64,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            packet_type,
            payload: payload.into(),
            sequence,
            signature: None,
        }
    }

    /// Canonical bytes covered by the signature.
    ///
    /// CBOR encoding of `(source, destination, type, payload, sequence)`. The
    /// signature field is never part of these bytes.
    pub fn signing_bytes(&self) -> Result<Vec<u8>> {
        let fields = (
            &self.source,
            &self.destination,
            self.packet_type,
            &self.payload,
            self.sequence,
        );

        let mut out = Vec::new();
        ciborium::ser::into_writer(&fields, &mut out)
            .map_err(|e| ProtocolError::Encode(e.to_string()))?;
        Ok(out)
    }

    /// SHA-256 of [`Packet::signing_bytes`]; this is what gets signed.
    pub fn digest(&self) -> Result<[u8; 32]> {
        let bytes = self.signing_bytes()?;
        Ok(Sha256::digest(&bytes).into())
    }

    /// Encode the packet as a complete frame (header + CBOR body).
    pub fn encode(&self) -> Result<Bytes> {
        let mut body = Vec::new();
        ciborium::ser::into_writer(self, &mut body)
            .map_err(|e| ProtocolError::Encode(e.to_string()))?;

        let header = FrameHeader::new(body.len())?;

        let mut frame = BytesMut::with_capacity(FrameHeader::SIZE + body.len());
        frame.put_slice(&header.to_bytes());
        frame.put_slice(&body);
        Ok(frame.freeze())
    }

    /// Decode a complete frame produced by [`Packet::encode`].
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let header = FrameHeader::parse(frame)?;
        let expected = FrameHeader::SIZE + header.body_size();

        if frame.len() < expected {
            return Err(ProtocolError::Truncated { expected, actual: frame.len() });
        }
        if frame.len() > expected {
            return Err(ProtocolError::Malformed(format!(
                "{} trailing bytes after frame",
                frame.len() - expected
            )));
        }

        Self::decode_body(&frame[FrameHeader::SIZE..])
    }

    /// Decode a frame body whose header was already consumed.
    ///
    /// The body must hold exactly one packet; anything after it is rejected.
    pub fn decode_body(body: &[u8]) -> Result<Self> {
        let mut rest = body;
        let packet: Self = ciborium::de::from_reader(&mut rest)
            .map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        if !rest.is_empty() {
            return Err(ProtocolError::Malformed(format!(
                "{} trailing bytes after packet",
                rest.len()
            )));
        }
        Ok(packet)
    }
}
