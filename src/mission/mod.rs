//! Mission recordings.
//!
//! A mission file mirrors the layout the avionics use on their SD card: a
//! sequence of 512-byte sectors, the first holding a [`SuperBlock`] that
//! indexes up to 32 flights, the rest holding log blocks.
//!
//! ```text
//! super block (sector 0)
//! ┌───────────┬─────────┬───────────┬──────────┬──────────────────┬──────────────────────────┐
//! │   magic   │ version │ continued │ reserved │ partition length │ 32 × flight record       │
//! │  9 bytes  │ 1 byte  │  1 byte   │  1 byte  │    4 bytes LE    │ first, count, time (LE)  │
//! └───────────┴─────────┴───────────┴──────────┴──────────────────┴──────────────────────────┘
//!
//! log block (sectors 1..)
//! ┌────────────┬───────────────┬─────────┬─────────┐
//! │   length   │ SD block type │ subtype │ payload │
//! │ 2 bytes LE │    1 byte     │ 1 byte  │         │
//! └────────────┴───────────────┴─────────┴─────────┘
//! ```

pub mod recorder;
pub mod replay;

use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{BlockError, BlockKind, Error, Result};
use crate::protocol::block::{
    DeviceAddress, DiagnosticDataBlockSubtype, LoggingMetadataBlockSubtype, RadioBlockType,
    SdBlockSubtype,
};
use crate::protocol::header::BlockHeader;
use crate::protocol::transmission::{BlockContents, ParsedBlock, parse_block};
use crate::types::MissionEntry;

pub use recorder::MissionRecorder;
pub use replay::{ReplayEvent, ReplayHandle};

/// Size of a sector.
pub const SECTOR_SIZE: usize = 512;

/// Magic bytes at the start of a mission file.
pub const MAGIC: &[u8; 9] = b"CUInSpace";

/// Mission file format version written by this station.
pub const MISSION_FORMAT_VERSION: u8 = 1;

/// Number of flight records in a super block.
pub const MAX_FLIGHTS: usize = 32;

/// File extension of mission recordings.
pub const MISSION_EXTENSION: &str = "mission";

/// How many names are tried before giving up on a new mission file.
pub const FILE_CREATION_ATTEMPT_LIMIT: usize = 50;

/// Size of a log block header.
pub const SD_BLOCK_HEADER_LENGTH: usize = 4;

const FLIGHT_RECORD_LENGTH: usize = 12;

/// One flight in the super block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flight {
    /// First sector of the flight; 0 marks an unused record.
    pub first_block: u32,
    /// Number of sectors in the flight.
    pub num_blocks: u32,
    /// Start of the flight, seconds since the Unix epoch.
    pub timestamp: u32,
}

impl Flight {
    /// Returns true if this record describes a flight.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.first_block != 0
    }
}

/// Index at the start of a mission file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    /// Format version.
    pub version: u8,
    /// The recording continues a previous partition.
    pub continued: bool,
    /// Partition length in sectors.
    pub partition_length: u32,
    /// Flight records.
    pub flights: [Flight; MAX_FLIGHTS],
}

impl Default for SuperBlock {
    fn default() -> Self {
        Self {
            version: MISSION_FORMAT_VERSION,
            continued: false,
            partition_length: 0,
            flights: [Flight::default(); MAX_FLIGHTS],
        }
    }
}

impl SuperBlock {
    /// Parses a super block from the first sector.
    ///
    /// # Errors
    ///
    /// Returns a reason string if the sector is short or the magic is wrong.
    pub fn parse(sector: &[u8]) -> std::result::Result<Self, String> {
        if sector.len() < SECTOR_SIZE {
            return Err(format!(
                "super block needs {SECTOR_SIZE} bytes, got {}",
                sector.len()
            ));
        }
        if &sector[..MAGIC.len()] != MAGIC {
            return Err("bad magic".to_string());
        }

        let mut cursor = &sector[MAGIC.len()..SECTOR_SIZE];
        let version = cursor.get_u8();
        let continued = cursor.get_u8() != 0;
        let _reserved = cursor.get_u8();
        let partition_length = cursor.get_u32_le();

        let mut flights = [Flight::default(); MAX_FLIGHTS];
        for flight in &mut flights {
            *flight = Flight {
                first_block: cursor.get_u32_le(),
                num_blocks: cursor.get_u32_le(),
                timestamp: cursor.get_u32_le(),
            };
        }

        Ok(Self {
            version,
            continued,
            partition_length,
            flights,
        })
    }

    /// Encodes the super block into a full sector.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(SECTOR_SIZE);
        buf.put_slice(MAGIC);
        buf.put_u8(self.version);
        buf.put_u8(u8::from(self.continued));
        buf.put_u8(0);
        buf.put_u32_le(self.partition_length);
        for flight in &self.flights {
            buf.put_u32_le(flight.first_block);
            buf.put_u32_le(flight.num_blocks);
            buf.put_u32_le(flight.timestamp);
        }
        debug_assert!(buf.len() == 16 + MAX_FLIGHTS * FLIGHT_RECORD_LENGTH);
        buf.resize(SECTOR_SIZE, 0);
        buf.freeze()
    }
}

/// A block read back from a mission file.
#[derive(Debug, Clone, PartialEq)]
pub enum LogBlock {
    /// Radio block logged by the station or the avionics.
    Telemetry(ParsedBlock),
    /// Diagnostic output of the avionics.
    Diagnostic {
        /// Kind of diagnostic.
        subtype: DiagnosticDataBlockSubtype,
        /// Raw payload.
        payload: Bytes,
    },
}

/// SD block type used to store a radio block.
const fn sd_subtype_for(block_type: RadioBlockType) -> SdBlockSubtype {
    match block_type {
        RadioBlockType::Data => SdBlockSubtype::TelemetryData,
        RadioBlockType::Control => SdBlockSubtype::TelemetryControl,
        RadioBlockType::Command => SdBlockSubtype::TelemetryCommand,
    }
}

/// Encodes a radio block as a log block.
#[must_use]
pub fn encode_log_block(contents: &BlockContents) -> Bytes {
    let payload = contents.encode();
    let length = SD_BLOCK_HEADER_LENGTH + payload.len();

    let mut buf = BytesMut::with_capacity(length);
    buf.put_u16_le(length as u16);
    buf.put_u8(sd_subtype_for(contents.block_type()).into());
    buf.put_u8(contents.subtype());
    buf.put_slice(&payload);
    buf.freeze()
}

/// Encodes a spacer filling `length` bytes.
///
/// `length` must be at least [`SD_BLOCK_HEADER_LENGTH`].
#[must_use]
pub fn encode_spacer(length: usize) -> Bytes {
    let mut buf = BytesMut::with_capacity(length);
    buf.put_u16_le(length as u16);
    buf.put_u8(SdBlockSubtype::LoggingMetadata.into());
    buf.put_u8(LoggingMetadataBlockSubtype::Spacer.into());
    buf.resize(length, 0);
    buf.freeze()
}

fn parse_log_block(sd_subtype: u8, subtype: u8, payload: &[u8]) -> std::result::Result<Option<LogBlock>, BlockError> {
    let sd_subtype = SdBlockSubtype::from_byte(sd_subtype).ok_or(BlockError::UnknownType(sd_subtype))?;

    let block_type = match sd_subtype {
        SdBlockSubtype::LoggingMetadata => {
            return match LoggingMetadataBlockSubtype::from_byte(subtype) {
                Some(LoggingMetadataBlockSubtype::Spacer) => Ok(None),
                None => Err(BlockError::UnknownSubtype {
                    kind: BlockKind::Log,
                    subtype,
                }),
            };
        }
        SdBlockSubtype::DiagnosticData => {
            let subtype = DiagnosticDataBlockSubtype::from_byte(subtype).ok_or(
                BlockError::UnknownSubtype {
                    kind: BlockKind::Log,
                    subtype,
                },
            )?;
            return Ok(Some(LogBlock::Diagnostic {
                subtype,
                payload: Bytes::copy_from_slice(payload),
            }));
        }
        SdBlockSubtype::TelemetryData => RadioBlockType::Data,
        SdBlockSubtype::TelemetryControl => RadioBlockType::Control,
        SdBlockSubtype::TelemetryCommand => RadioBlockType::Command,
    };

    let header = BlockHeader {
        length: SD_BLOCK_HEADER_LENGTH + payload.len(),
        block_type: block_type.into(),
        subtype,
        destination: DeviceAddress::GroundStation.into(),
    };
    let contents = parse_block(&header, payload)?;
    Ok(Some(LogBlock::Telemetry(ParsedBlock { header, contents })))
}

/// Decodes the log blocks of one sector.
///
/// Spacers are dropped. Undecodable blocks are skipped and their errors
/// returned; a broken length stops the walk. A zero length marks the
/// unwritten rest of the sector.
#[must_use]
pub fn parse_sector(sector: &[u8]) -> (Vec<LogBlock>, Vec<BlockError>) {
    let mut blocks = Vec::new();
    let mut errors = Vec::new();
    let mut offset = 0;

    while offset + SD_BLOCK_HEADER_LENGTH <= sector.len() {
        let mut cursor = &sector[offset..];
        let length = usize::from(cursor.get_u16_le());
        let sd_subtype = cursor.get_u8();
        let subtype = cursor.get_u8();

        if length == 0 {
            break;
        }
        if length < SD_BLOCK_HEADER_LENGTH || offset + length > sector.len() {
            errors.push(BlockError::Framing {
                offset,
                reason: format!("log block length {length} does not fit the sector"),
            });
            break;
        }

        let payload = &sector[offset + SD_BLOCK_HEADER_LENGTH..offset + length];
        match parse_log_block(sd_subtype, subtype, payload) {
            Ok(Some(block)) => blocks.push(block),
            Ok(None) => {}
            Err(e) => errors.push(e),
        }
        offset += length;
    }

    (blocks, errors)
}

/// Path of the mission file for `name`.
#[must_use]
pub fn mission_path(name: &str, missions_dir: &Path) -> PathBuf {
    missions_dir.join(format!("{name}.{MISSION_EXTENSION}"))
}

/// Finds a free file name for a new mission, appending `_1`, `_2`, ... to
/// `name` while the file exists.
///
/// # Errors
///
/// Returns [`Error::MissionFile`] if the name could escape the missions
/// directory and [`Error::MissionFileExhausted`] if every candidate exists.
pub async fn filepath_for_proposed_name(name: &str, missions_dir: &Path) -> Result<PathBuf> {
    if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
        return Err(Error::MissionFile {
            path: missions_dir.join(name),
            reason: "invalid mission name".to_string(),
        });
    }

    let path = mission_path(name, missions_dir);
    if !tokio::fs::try_exists(&path).await? {
        return Ok(path);
    }

    for i in 1..FILE_CREATION_ATTEMPT_LIMIT {
        let path = mission_path(&format!("{name}_{i}"), missions_dir);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(path);
        }
    }

    Err(Error::MissionFileExhausted {
        name: name.to_string(),
        attempts: FILE_CREATION_ATTEMPT_LIMIT,
    })
}

/// Reads the super block of a mission file.
///
/// # Errors
///
/// Returns [`Error::MissionFile`] if the file is not a mission file.
pub async fn read_super_block(path: &Path) -> Result<SuperBlock> {
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(path).await?;
    let mut sector = vec![0u8; SECTOR_SIZE];
    file.read_exact(&mut sector)
        .await
        .map_err(|e| Error::MissionFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    SuperBlock::parse(&sector).map_err(|reason| Error::MissionFile {
        path: path.to_path_buf(),
        reason,
    })
}

/// Lists the mission files in `missions_dir`, sorted by name.
///
/// Files that are not valid mission files are skipped.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub async fn list_missions(missions_dir: &Path) -> Result<Vec<MissionEntry>> {
    let mut missions = Vec::new();
    let mut entries = match tokio::fs::read_dir(missions_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(missions),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(MISSION_EXTENSION) {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_owned) else {
            continue;
        };

        match read_super_block(&path).await {
            Ok(super_block) => {
                let flight = super_block.flights[0];
                missions.push(MissionEntry {
                    name,
                    length: flight.num_blocks,
                    epoch: i64::from(flight.timestamp),
                    version: super_block.version,
                    path,
                });
            }
            Err(e) => tracing::warn!("skipping {}: {}", path.display(), e),
        }
    }

    missions.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(missions)
}
