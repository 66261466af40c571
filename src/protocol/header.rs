//! Packet and block headers of the radio encoding.
//!
//! ```text
//! packet header (12 bytes)
//! ┌───────────┬────────┬─────────┬────────┬──────────┬───────────────┐
//! │ call sign │ length │ version │ source │ reserved │ packet number │
//! │  6 bytes  │ 1 byte │ 1 byte  │ 1 byte │  1 byte  │   2 bytes LE  │
//! └───────────┴────────┴─────────┴────────┴──────────┴───────────────┘
//!
//! block header (4 bytes)
//! ┌────────┬────────────┬─────────┬─────────────┐
//! │ length │ block type │ subtype │ destination │
//! │ 1 byte │   1 byte   │ 1 byte  │   1 byte    │
//! └────────┴────────────┴─────────┴─────────────┘
//! ```
//!
//! Both length bytes are length words: the total length in bytes is
//! `(word + 1) * 4`, headers included.

use bytes::{Buf, BufMut};

use crate::error::PacketError;
use crate::protocol::block::DeviceAddress;

/// Size of the packet header in bytes.
pub const PACKET_HEADER_LENGTH: usize = 12;

/// Size of a block header in bytes.
pub const BLOCK_HEADER_LENGTH: usize = 4;

/// Maximum call sign length.
pub const CALL_SIGN_LENGTH: usize = 6;

/// Largest length a length word can express.
pub const MAX_ENCODED_LENGTH: usize = 1024;

/// The only packet encoding version this station reads and writes.
pub const SUPPORTED_ENCODING_VERSION: u8 = 1;

/// Decodes a length word into a byte count.
#[must_use]
pub const fn decode_length_word(word: u8) -> usize {
    (word as usize + 1) * 4
}

/// Encodes a byte count as a length word.
///
/// # Errors
///
/// Returns [`PacketError::InvalidLength`] if `len` is zero, not a multiple
/// of 4, or larger than [`MAX_ENCODED_LENGTH`].
pub fn length_word(len: usize) -> Result<u8, PacketError> {
    if len == 0 || len % 4 != 0 || len > MAX_ENCODED_LENGTH {
        return Err(PacketError::InvalidLength(len));
    }
    Ok((len / 4 - 1) as u8)
}

/// Rounds `len` up to the next multiple of 4.
#[must_use]
pub const fn padded_length(len: usize) -> usize {
    len.div_ceil(4) * 4
}

/// Header at the start of every radio packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    /// Call sign of the licensed operator transmitting.
    pub call_sign: String,
    /// Total packet length in bytes, header included.
    pub length: usize,
    /// Encoding version.
    pub version: u8,
    /// Device that sent the packet.
    pub source: DeviceAddress,
    /// Sequence number of the packet.
    pub packet_number: u16,
}

impl PacketHeader {
    /// Parses a packet header from the start of `data`.
    ///
    /// Version checks are left to the caller so that an unsupported packet
    /// can still be reported with its call sign.
    pub fn parse(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() < PACKET_HEADER_LENGTH {
            return Err(PacketError::TooShort {
                expected: PACKET_HEADER_LENGTH,
                got: data.len(),
            });
        }

        let call_sign = parse_call_sign(&data[..CALL_SIGN_LENGTH])?;

        let mut cursor = &data[CALL_SIGN_LENGTH..PACKET_HEADER_LENGTH];
        let length = decode_length_word(cursor.get_u8());
        let version = cursor.get_u8();
        let source_byte = cursor.get_u8() & 0x0F;
        let _reserved = cursor.get_u8();
        let packet_number = cursor.get_u16_le();

        let source =
            DeviceAddress::from_byte(source_byte).ok_or(PacketError::UnknownAddress(source_byte))?;

        Ok(Self {
            call_sign,
            length,
            version,
            source,
            packet_number,
        })
    }

    /// Writes the header to `buf`.
    pub fn encode(&self, buf: &mut impl BufMut) -> Result<(), PacketError> {
        if self.call_sign.len() > CALL_SIGN_LENGTH || !self.call_sign.is_ascii() {
            return Err(PacketError::InvalidCallSign(self.call_sign.clone()));
        }

        let mut call_sign = [0u8; CALL_SIGN_LENGTH];
        call_sign[..self.call_sign.len()].copy_from_slice(self.call_sign.as_bytes());

        buf.put_slice(&call_sign);
        buf.put_u8(length_word(self.length)?);
        buf.put_u8(self.version);
        buf.put_u8(u8::from(self.source));
        buf.put_u8(0);
        buf.put_u16_le(self.packet_number);
        Ok(())
    }
}

/// Header preceding every block inside a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Total block length in bytes, header included.
    pub length: usize,
    /// Raw top-level block type.
    pub block_type: u8,
    /// Raw subtype.
    pub subtype: u8,
    /// Raw destination address.
    pub destination: u8,
}

impl BlockHeader {
    /// Parses a block header from the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() < BLOCK_HEADER_LENGTH {
            return Err(PacketError::TooShort {
                expected: BLOCK_HEADER_LENGTH,
                got: data.len(),
            });
        }

        let mut cursor = &data[..BLOCK_HEADER_LENGTH];
        Ok(Self {
            length: decode_length_word(cursor.get_u8()),
            block_type: cursor.get_u8(),
            subtype: cursor.get_u8(),
            destination: cursor.get_u8(),
        })
    }

    /// Length of the payload following the header.
    #[must_use]
    pub const fn payload_length(&self) -> usize {
        self.length.saturating_sub(BLOCK_HEADER_LENGTH)
    }

    /// The destination as a known device, if it is one.
    #[must_use]
    pub const fn destination_address(&self) -> Option<DeviceAddress> {
        DeviceAddress::from_byte(self.destination)
    }

    /// Writes the header to `buf`.
    pub fn encode(&self, buf: &mut impl BufMut) -> Result<(), PacketError> {
        buf.put_u8(length_word(self.length)?);
        buf.put_u8(self.block_type);
        buf.put_u8(self.subtype);
        buf.put_u8(self.destination);
        Ok(())
    }
}

/// Parses a NUL or space padded ASCII call sign.
fn parse_call_sign(data: &[u8]) -> Result<String, PacketError> {
    let len = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    let raw = &data[..len];

    if !raw.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        return Err(PacketError::InvalidCallSign(hex::encode(raw)));
    }

    Ok(String::from_utf8_lossy(raw).trim_end().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes() -> Vec<u8> {
        let mut data = b"VA3ZZA".to_vec();
        data.push(4); // 20 bytes
        data.push(1); // version
        data.push(0x01); // rocket
        data.push(0);
        data.extend_from_slice(&513u16.to_le_bytes());
        data
    }

    #[test]
    fn test_length_words() {
        assert_eq!(decode_length_word(0), 4);
        assert_eq!(decode_length_word(255), 1024);
        assert_eq!(length_word(4).unwrap(), 0);
        assert_eq!(length_word(20).unwrap(), 4);
        assert_eq!(length_word(6), Err(PacketError::InvalidLength(6)));
        assert_eq!(length_word(0), Err(PacketError::InvalidLength(0)));
        assert_eq!(length_word(1028), Err(PacketError::InvalidLength(1028)));
        assert_eq!(padded_length(5), 8);
        assert_eq!(padded_length(8), 8);
    }

    #[test]
    fn test_parse_packet_header() {
        let header = PacketHeader::parse(&header_bytes()).unwrap();
        assert_eq!(header.call_sign, "VA3ZZA");
        assert_eq!(header.length, 20);
        assert_eq!(header.version, 1);
        assert_eq!(header.source, DeviceAddress::Rocket);
        assert_eq!(header.packet_number, 513);
    }

    #[test]
    fn test_parse_short_call_sign() {
        let mut data = header_bytes();
        data[..6].copy_from_slice(b"VE3\0\0\0");
        let header = PacketHeader::parse(&data).unwrap();
        assert_eq!(header.call_sign, "VE3");
    }

    #[test]
    fn test_parse_packet_header_errors() {
        assert_eq!(
            PacketHeader::parse(&[0u8; 5]),
            Err(PacketError::TooShort {
                expected: 12,
                got: 5
            })
        );

        let mut data = header_bytes();
        data[8] = 0x07;
        assert_eq!(
            PacketHeader::parse(&data),
            Err(PacketError::UnknownAddress(0x07))
        );

        let mut data = header_bytes();
        data[0] = 0x01;
        assert!(matches!(
            PacketHeader::parse(&data),
            Err(PacketError::InvalidCallSign(_))
        ));
    }

    #[test]
    fn test_encode_packet_header() {
        let header = PacketHeader {
            call_sign: "VA3ZZA".into(),
            length: 20,
            version: 1,
            source: DeviceAddress::Rocket,
            packet_number: 513,
        };
        let mut buf = Vec::new();
        header.encode(&mut buf).unwrap();
        assert_eq!(buf, header_bytes());
    }

    #[test]
    fn test_encode_rejects_long_call_sign() {
        let header = PacketHeader {
            call_sign: "TOOLONGCALL".into(),
            length: 12,
            version: 1,
            source: DeviceAddress::GroundStation,
            packet_number: 0,
        };
        let mut buf = Vec::new();
        assert!(matches!(
            header.encode(&mut buf),
            Err(PacketError::InvalidCallSign(_))
        ));
    }

    #[test]
    fn test_block_header() {
        let header = BlockHeader::parse(&[0x02, 0x02, 0x01, 0x00]).unwrap();
        assert_eq!(header.length, 12);
        assert_eq!(header.payload_length(), 8);
        assert_eq!(header.block_type, 0x02);
        assert_eq!(header.subtype, 0x01);
        assert_eq!(
            header.destination_address(),
            Some(DeviceAddress::GroundStation)
        );

        let mut buf = Vec::new();
        header.encode(&mut buf).unwrap();
        assert_eq!(buf, vec![0x02, 0x02, 0x01, 0x00]);
    }
}
