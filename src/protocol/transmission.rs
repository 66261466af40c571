//! Decoding and encoding of complete radio packets.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::{Value, json};

use crate::error::{BlockError, BlockKind, PacketError};
use crate::protocol::block::{ControlBlockSubtype, DataBlockSubtype, DeviceAddress, RadioBlockType};
use crate::protocol::command::CommandBlock;
use crate::protocol::control::ControlBlock;
use crate::protocol::data::DataBlock;
use crate::protocol::header::{
    BLOCK_HEADER_LENGTH, BlockHeader, MAX_ENCODED_LENGTH, PACKET_HEADER_LENGTH, PacketHeader,
    SUPPORTED_ENCODING_VERSION, padded_length,
};

/// The decoded contents of a block.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockContents {
    /// Telemetry data.
    Data(DataBlock),
    /// Link control.
    Control(ControlBlock),
    /// Command to the rocket.
    Command(CommandBlock),
}

impl BlockContents {
    /// Top-level block type.
    #[must_use]
    pub const fn block_type(&self) -> RadioBlockType {
        match self {
            Self::Data(_) => RadioBlockType::Data,
            Self::Control(_) => RadioBlockType::Control,
            Self::Command(_) => RadioBlockType::Command,
        }
    }

    /// Raw subtype tag.
    #[must_use]
    pub fn subtype(&self) -> u8 {
        match self {
            Self::Data(block) => block.subtype().into(),
            Self::Control(block) => block.subtype().into(),
            Self::Command(block) => block.subtype.into(),
        }
    }

    /// Encodes the payload (without block header).
    #[must_use]
    pub fn encode(&self) -> Bytes {
        match self {
            Self::Data(block) => block.encode(),
            Self::Control(block) => block.encode(),
            Self::Command(block) => block.encode(),
        }
    }

    /// Telemetry key for this block.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Data(block) => block.name(),
            Self::Control(block) => block.name(),
            Self::Command(block) => block.name(),
        }
    }

    /// Mission time of the block, if it carries one.
    #[must_use]
    pub const fn mission_time(&self) -> Option<u32> {
        match self {
            Self::Data(block) => Some(block.mission_time()),
            Self::Control(_) | Self::Command(_) => None,
        }
    }

    /// JSON form sent to the dashboard.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Data(block) => block.to_json(),
            Self::Control(block) => block.to_json(),
            Self::Command(block) => block.to_json(),
        }
    }
}

impl fmt::Display for BlockContents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(block) => write!(f, "{block}"),
            Self::Control(block) => write!(f, "{block}"),
            Self::Command(block) => write!(f, "{block}"),
        }
    }
}

/// Decodes a block payload given its header.
///
/// # Errors
///
/// Returns [`BlockError::UnknownType`] or [`BlockError::UnknownSubtype`] for
/// tags without a decoder, [`BlockError::Malformed`] for payloads that do
/// not fit their layout.
pub fn parse_block(header: &BlockHeader, payload: &[u8]) -> Result<BlockContents, BlockError> {
    let block_type =
        RadioBlockType::from_byte(header.block_type).ok_or(BlockError::UnknownType(header.block_type))?;

    match block_type {
        RadioBlockType::Data => {
            let subtype = DataBlockSubtype::from_byte(header.subtype).ok_or(
                BlockError::UnknownSubtype {
                    kind: BlockKind::Data,
                    subtype: header.subtype,
                },
            )?;
            DataBlock::parse(subtype, payload).map(BlockContents::Data)
        }
        RadioBlockType::Control => {
            let subtype = ControlBlockSubtype::from_byte(header.subtype).ok_or(
                BlockError::UnknownSubtype {
                    kind: BlockKind::Control,
                    subtype: header.subtype,
                },
            )?;
            ControlBlock::parse(subtype, payload).map(BlockContents::Control)
        }
        RadioBlockType::Command => {
            CommandBlock::parse(header.subtype, payload).map(BlockContents::Command)
        }
    }
}

/// A decoded block together with its header.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBlock {
    /// Block header as received.
    pub header: BlockHeader,
    /// Decoded contents.
    pub contents: BlockContents,
}

impl ParsedBlock {
    /// Builds a block addressed to `destination`, computing its header.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::InvalidLength`] if the payload does not fit in
    /// a block.
    pub fn new(destination: DeviceAddress, contents: BlockContents) -> Result<Self, PacketError> {
        let length = BLOCK_HEADER_LENGTH + padded_length(contents.encode().len());
        if length > MAX_ENCODED_LENGTH {
            return Err(PacketError::InvalidLength(length));
        }
        Ok(Self {
            header: BlockHeader {
                length,
                block_type: contents.block_type().into(),
                subtype: contents.subtype(),
                destination: destination.into(),
            },
            contents,
        })
    }

    /// Telemetry key for this block.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.contents.name()
    }

    /// Mission time of the block, if it carries one.
    #[must_use]
    pub const fn mission_time(&self) -> Option<u32> {
        self.contents.mission_time()
    }

    /// JSON form sent to the dashboard.
    #[must_use]
    pub fn to_json(&self) -> Value {
        self.contents.to_json()
    }
}

/// A decoded radio packet.
///
/// Blocks that could not be decoded are left out of `blocks` and listed in
/// `errors`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTransmission {
    /// Packet header.
    pub header: PacketHeader,
    /// Successfully decoded blocks, in packet order.
    pub blocks: Vec<ParsedBlock>,
    /// Errors for the blocks that were skipped.
    pub errors: Vec<BlockError>,
}

impl ParsedTransmission {
    /// JSON summary used by the `decode` command.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "call_sign": self.header.call_sign,
            "length": self.header.length,
            "version": self.header.version,
            "source": self.header.source.name(),
            "packet_number": self.header.packet_number,
            "blocks": self
                .blocks
                .iter()
                .map(|b| json!({ "name": b.name(), "data": b.to_json() }))
                .collect::<Vec<_>>(),
            "errors": self.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
        })
    }
}

impl fmt::Display for ParsedTransmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "packet #{} from {} ({}), {} bytes, version {}",
            self.header.packet_number,
            self.header.source.name(),
            self.header.call_sign,
            self.header.length,
            self.header.version
        )?;
        for block in &self.blocks {
            writeln!(f, "  {}", block.contents)?;
        }
        for error in &self.errors {
            writeln!(f, "  error: {error}")?;
        }
        Ok(())
    }
}

/// Decodes a radio packet.
///
/// A call sign missing from a non-empty `approved_call_signs` list is
/// logged but the packet is still decoded.
///
/// # Errors
///
/// Returns a [`PacketError`] if the packet header is invalid, declares more
/// bytes than were received, or uses an unsupported encoding version.
pub fn parse_transmission(
    data: &[u8],
    approved_call_signs: &[String],
) -> Result<ParsedTransmission, PacketError> {
    let header = PacketHeader::parse(data)?;

    if header.version != SUPPORTED_ENCODING_VERSION {
        return Err(PacketError::UnsupportedVersion(header.version));
    }

    if header.length > data.len() {
        return Err(PacketError::LengthMismatch {
            declared: header.length,
            actual: data.len(),
        });
    }
    if header.length < data.len() {
        tracing::warn!(
            "ignoring {} bytes past the declared packet length of {}",
            data.len() - header.length,
            header.length
        );
    }

    if !approved_call_signs.is_empty() && !approved_call_signs.contains(&header.call_sign) {
        tracing::warn!("received transmission from unauthorized call sign {}", header.call_sign);
    }

    let packet = &data[..header.length];
    let mut blocks = Vec::new();
    let mut errors = Vec::new();
    let mut offset = PACKET_HEADER_LENGTH;

    while offset < packet.len() {
        let block_header = match BlockHeader::parse(&packet[offset..]) {
            Ok(h) => h,
            Err(e) => {
                errors.push(BlockError::Framing {
                    offset,
                    reason: e.to_string(),
                });
                break;
            }
        };

        let end = offset + block_header.length;
        if end > packet.len() {
            errors.push(BlockError::Framing {
                offset,
                reason: format!(
                    "block of {} bytes runs past the end of the packet",
                    block_header.length
                ),
            });
            break;
        }

        let payload = &packet[offset + BLOCK_HEADER_LENGTH..end];
        match parse_block(&block_header, payload) {
            Ok(contents) => blocks.push(ParsedBlock {
                header: block_header,
                contents,
            }),
            Err(e) => {
                tracing::debug!("skipping block at offset {}: {}", offset, e);
                errors.push(e);
            }
        }

        offset = end;
    }

    Ok(ParsedTransmission {
        header,
        blocks,
        errors,
    })
}

/// Decodes a radio packet given in hexadecimal, as printed by the RN2483.
///
/// # Errors
///
/// Returns [`PacketError::InvalidHex`] if the text is not valid hex, or any
/// error of [`parse_transmission`].
pub fn parse_hex_transmission(
    hex_payload: &str,
    approved_call_signs: &[String],
) -> Result<ParsedTransmission, PacketError> {
    let data = hex::decode(hex_payload.trim()).map_err(|e| PacketError::InvalidHex(e.to_string()))?;
    parse_transmission(&data, approved_call_signs)
}

/// Builder for outgoing radio packets.
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    call_sign: String,
    source: DeviceAddress,
    packet_number: u16,
    blocks: Vec<(DeviceAddress, BlockContents)>,
}

impl PacketBuilder {
    /// Starts a packet.
    #[must_use]
    pub fn new(call_sign: impl Into<String>, source: DeviceAddress, packet_number: u16) -> Self {
        Self {
            call_sign: call_sign.into(),
            source,
            packet_number,
            blocks: Vec::new(),
        }
    }

    /// Appends a block.
    #[must_use]
    pub fn block(mut self, destination: DeviceAddress, contents: BlockContents) -> Self {
        self.blocks.push((destination, contents));
        self
    }

    /// Encodes the packet.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::InvalidLength`] if the packet exceeds the
    /// maximum encoded length, or [`PacketError::InvalidCallSign`] if the
    /// call sign does not fit the header.
    pub fn build(&self) -> Result<Bytes, PacketError> {
        let mut body = BytesMut::new();
        for (destination, contents) in &self.blocks {
            let payload = contents.encode();
            let padded = padded_length(payload.len());
            BlockHeader {
                length: BLOCK_HEADER_LENGTH + padded,
                block_type: contents.block_type().into(),
                subtype: contents.subtype(),
                destination: (*destination).into(),
            }
            .encode(&mut body)?;
            body.put_slice(&payload);
            body.put_bytes(0, padded - payload.len());
        }

        let header = PacketHeader {
            call_sign: self.call_sign.clone(),
            length: PACKET_HEADER_LENGTH + body.len(),
            version: SUPPORTED_ENCODING_VERSION,
            source: self.source,
            packet_number: self.packet_number,
        };

        let mut buf = BytesMut::with_capacity(header.length);
        header.encode(&mut buf)?;
        buf.put_slice(&body);
        Ok(buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::block::CommandBlockSubtype;
    use crate::protocol::control::SignalReport;
    use crate::protocol::data::{Altitude, Temperature};

    fn altitude(time: u32, mm: i32) -> BlockContents {
        BlockContents::Data(DataBlock::Altitude(Altitude {
            mission_time: time,
            millimetres: mm,
        }))
    }

    fn sample_packet() -> Bytes {
        PacketBuilder::new("VA3ZZA", DeviceAddress::Rocket, 7)
            .block(DeviceAddress::GroundStation, altitude(1000, 152_400))
            .block(
                DeviceAddress::GroundStation,
                BlockContents::Data(DataBlock::Temperature(Temperature {
                    mission_time: 1000,
                    millidegrees: 18_250,
                })),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_layout() {
        let packet = sample_packet();
        assert_eq!(packet.len(), 12 + 12 + 12);
        assert_eq!(&packet[..6], b"VA3ZZA");
        assert_eq!(packet[6], 8); // (8 + 1) * 4 = 36
        assert_eq!(&packet[12..16], &[2, 0x02, 0x01, 0x00]);
    }

    #[test]
    fn test_parse_transmission() {
        let parsed = parse_transmission(&sample_packet(), &["VA3ZZA".to_owned()]).unwrap();
        assert_eq!(parsed.header.packet_number, 7);
        assert_eq!(parsed.header.source, DeviceAddress::Rocket);
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.blocks.len(), 2);
        assert_eq!(parsed.blocks[0].name(), "altitude");
        assert_eq!(parsed.blocks[0].mission_time(), Some(1000));
        assert_eq!(parsed.blocks[1].name(), "temperature");
        assert_eq!(
            parsed.blocks[0].header.destination_address(),
            Some(DeviceAddress::GroundStation)
        );
    }

    #[test]
    fn test_unapproved_call_sign_still_decodes() {
        let parsed = parse_transmission(&sample_packet(), &["VE3XYZ".to_owned()]).unwrap();
        assert_eq!(parsed.blocks.len(), 2);
    }

    #[test]
    fn test_parse_hex_transmission() {
        let text = hex::encode_upper(sample_packet());
        let parsed = parse_hex_transmission(&text, &[]).unwrap();
        assert_eq!(parsed.blocks.len(), 2);

        assert!(matches!(
            parse_hex_transmission("ABC", &[]),
            Err(PacketError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_declared_length_longer_than_data() {
        let packet = sample_packet();
        let err = parse_transmission(&packet[..30], &[]).unwrap_err();
        assert_eq!(
            err,
            PacketError::LengthMismatch {
                declared: 36,
                actual: 30
            }
        );
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        let mut packet = sample_packet().to_vec();
        packet.extend_from_slice(&[0xAA; 8]);
        let parsed = parse_transmission(&packet, &[]).unwrap();
        assert_eq!(parsed.blocks.len(), 2);
        assert!(parsed.errors.is_empty());
    }

    #[test]
    fn test_unsupported_version() {
        let mut packet = sample_packet().to_vec();
        packet[7] = 2;
        assert_eq!(
            parse_transmission(&packet, &[]).unwrap_err(),
            PacketError::UnsupportedVersion(2)
        );
    }

    #[test]
    fn test_unknown_blocks_are_skipped() {
        let mut packet = sample_packet().to_vec();
        packet[12 + 2] = 0x07; // first block becomes gnss metadata
        packet[24 + 1] = 0x09; // second block gets an unknown type
        let parsed = parse_transmission(&packet, &[]).unwrap();
        assert!(parsed.blocks.is_empty());
        assert_eq!(
            parsed.errors,
            vec![
                BlockError::UnknownSubtype {
                    kind: BlockKind::Data,
                    subtype: 0x07
                },
                BlockError::UnknownType(0x09),
            ]
        );
    }

    #[test]
    fn test_malformed_block_is_skipped() {
        let packet = PacketBuilder::new("VA3ZZA", DeviceAddress::Rocket, 1)
            .block(
                DeviceAddress::GroundStation,
                BlockContents::Command(CommandBlock::new(CommandBlockSubtype::TareSensors)),
            )
            .block(DeviceAddress::GroundStation, altitude(5, 10))
            .build()
            .unwrap();
        let mut packet = packet.to_vec();
        // Turn the empty command block into an altitude block with no payload.
        packet[13] = 0x02;
        packet[14] = 0x01;

        let parsed = parse_transmission(&packet, &[]).unwrap();
        assert_eq!(parsed.blocks.len(), 1);
        assert_eq!(parsed.errors.len(), 1);
        assert!(matches!(parsed.errors[0], BlockError::Malformed { .. }));
    }

    #[test]
    fn test_block_overrunning_packet_stops_walk() {
        let mut packet = sample_packet().to_vec();
        packet[24] = 0x10; // second block claims 68 bytes
        let parsed = parse_transmission(&packet, &[]).unwrap();
        assert_eq!(parsed.blocks.len(), 1);
        assert!(matches!(
            parsed.errors[0],
            BlockError::Framing { offset: 24, .. }
        ));
    }

    #[test]
    fn test_control_and_command_blocks() {
        let report = SignalReport {
            snr: 7,
            rssi: -60,
            radio_power: 15,
            request: false,
        };
        let packet = PacketBuilder::new("VE3GS", DeviceAddress::GroundStation, 3)
            .block(
                DeviceAddress::Rocket,
                BlockContents::Control(ControlBlock::SignalReport(report)),
            )
            .block(
                DeviceAddress::Rocket,
                BlockContents::Command(CommandBlock::new(CommandBlockSubtype::DeployParachute)),
            )
            .build()
            .unwrap();

        let parsed = parse_transmission(&packet, &[]).unwrap();
        assert_eq!(parsed.header.call_sign, "VE3GS");
        assert_eq!(
            parsed.blocks[0].contents,
            BlockContents::Control(ControlBlock::SignalReport(report))
        );
        assert_eq!(parsed.blocks[1].name(), "deploy_parachute");
        assert_eq!(parsed.blocks[1].mission_time(), None);
        assert_eq!(parsed.to_json()["blocks"][1]["name"], "deploy_parachute");
    }

    #[test]
    fn test_parsed_block_new() {
        let block = ParsedBlock::new(DeviceAddress::GroundStation, altitude(1, 2)).unwrap();
        assert_eq!(block.header.length, 12);
        assert_eq!(block.header.block_type, 0x02);
        assert_eq!(block.header.subtype, 0x01);
    }

    #[test]
    fn test_build_rejects_oversized_packet() {
        let mut builder = PacketBuilder::new("VA3ZZA", DeviceAddress::Rocket, 0);
        for i in 0..100 {
            builder = builder.block(DeviceAddress::GroundStation, altitude(i, 0));
        }
        assert!(matches!(builder.build(), Err(PacketError::InvalidLength(_))));
    }
}
