//! Fixed-size frame header.
//!
//! ```text
//! 0      2         3          4                    8
//! +------+---------+----------+--------------------+
//! | "BW" | version | reserved | body length (u32)  |
//! +------+---------+----------+--------------------+
//! ```
//!
//! All multi-byte fields are big-endian.

use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::{BigEndian, U16, U32},
};

use crate::errors::{ProtocolError, Result};

/// Frame header preceding every packet body on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct FrameHeader {
    magic: U16<BigEndian>,
    version: u8,
    reserved: u8,
    body_size: U32<BigEndian>,
}

impl FrameHeader {
    /// Encoded header size in bytes
    pub const SIZE: usize = 8;

    /// Magic bytes `"BW"`
    pub const MAGIC: u16 = 0x4257;

    /// Current frame version
    pub const VERSION: u8 = 1;

    /// Largest body a frame may carry (1 MiB)
    pub const MAX_BODY_SIZE: usize = 1 << 20;

    /// Header for a body of `body_size` bytes.
    pub fn new(body_size: usize) -> Result<Self> {
        if body_size > Self::MAX_BODY_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: body_size,
                max: Self::MAX_BODY_SIZE,
            });
        }

        Ok(Self {
            magic: U16::new(Self::MAGIC),
            version: Self::VERSION,
            reserved: 0,
            body_size: U32::new(body_size as u32),
        })
    }

    /// Parse and validate a header from the first [`Self::SIZE`] bytes.
    ///
    /// Rejects bad magic, unknown versions and oversized bodies, so a caller
    /// can size its body buffer from [`Self::body_size`] without further
    /// checks.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let prefix = bytes.get(..Self::SIZE).ok_or(ProtocolError::Truncated {
            expected: Self::SIZE,
            actual: bytes.len(),
        })?;

        let header = Self::read_from_bytes(prefix).map_err(|_| ProtocolError::Truncated {
            expected: Self::SIZE,
            actual: prefix.len(),
        })?;

        if header.magic.get() != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic(header.magic.get()));
        }
        if header.version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        let size = header.body_size();
        if size > Self::MAX_BODY_SIZE {
            return Err(ProtocolError::FrameTooLarge { size, max: Self::MAX_BODY_SIZE });
        }

        Ok(header)
    }

    /// Length of the body that follows this header
    pub fn body_size(&self) -> usize {
        self.body_size.get() as usize
    }

    /// Serialized header bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_big_endian() {
        let header = FrameHeader::new(0x0102).unwrap();
        assert_eq!(header.to_bytes(), [0x42, 0x57, 1, 0, 0, 0, 0x01, 0x02]);
    }

    #[test]
    fn parse_accepts_own_encoding() {
        let header = FrameHeader::new(300).unwrap();
        let parsed = FrameHeader::parse(&header.to_bytes()).unwrap();
        assert_eq!(parsed.body_size(), 300);
    }

    #[test]
    fn parse_rejects_bad_magic() {
        let mut bytes = FrameHeader::new(4).unwrap().to_bytes();
        bytes[0] = 0xff;
        assert!(matches!(FrameHeader::parse(&bytes), Err(ProtocolError::InvalidMagic(_))));
    }

    #[test]
    fn parse_rejects_unknown_version() {
        let mut bytes = FrameHeader::new(4).unwrap().to_bytes();
        bytes[2] = 9;
        assert_eq!(FrameHeader::parse(&bytes), Err(ProtocolError::UnsupportedVersion(9)));
    }

    #[test]
    fn parse_rejects_oversized_body() {
        let mut bytes = FrameHeader::new(0).unwrap().to_bytes();
        bytes[4..8].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(FrameHeader::parse(&bytes), Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn parse_rejects_short_buffer() {
        assert!(matches!(
            FrameHeader::parse(&[0x42, 0x57, 1]),
            Err(ProtocolError::Truncated { expected: 8, actual: 3 })
        ));
    }

    #[test]
    fn new_rejects_oversized_body() {
        assert!(FrameHeader::new(FrameHeader::MAX_BODY_SIZE + 1).is_err());
    }
}
