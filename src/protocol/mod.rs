//! Radio packet protocol.
//!
//! This module contains the low-level protocol types including:
//! - RN2483 line framing
//! - Packet and block headers
//! - Block tag enumerations
//! - Data, control and command block codecs

pub mod block;
pub mod command;
pub mod control;
pub mod data;
pub mod header;
pub mod line;
pub mod transmission;

pub use block::{
    CommandBlockSubtype, ControlBlockSubtype, DataBlockSubtype, DeviceAddress,
    DiagnosticDataBlockSubtype, LoggingMetadataBlockSubtype, RadioBlockType, SdBlockSubtype,
};
pub use command::CommandBlock;
pub use control::{ControlBlock, SignalReport};
pub use data::DataBlock;
pub use header::{BlockHeader, PacketHeader};
pub use line::{LineDecoder, RadioResponse, encode_line};
pub use transmission::{
    BlockContents, PacketBuilder, ParsedBlock, ParsedTransmission, parse_block,
    parse_hex_transmission, parse_transmission,
};
