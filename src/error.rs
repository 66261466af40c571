//! Error types for the ground station.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The main error type for ground station operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serial port error.
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing error on the radio link.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Radio packet could not be decoded.
    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    /// A single block could not be decoded or encoded.
    #[error("block error: {0}")]
    Block(#[from] BlockError),

    /// WebSocket command could not be understood.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// The radio answered with something other than what was expected.
    #[error("radio error: {message}")]
    Radio { message: String },

    /// Radio command timed out waiting for a response.
    #[error("radio command timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The radio is not connected.
    #[error("not connected")]
    NotConnected,

    /// Channel receive error.
    #[error("channel closed")]
    ChannelClosed,

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation { message: String },

    /// No mission with the given name exists in the missions directory.
    #[error("mission '{name}' not found")]
    MissionNotFound { name: String },

    /// A recording is already running.
    #[error("a mission is already being recorded")]
    AlreadyRecording,

    /// No recording is running.
    #[error("no mission is being recorded")]
    NotRecording,

    /// Replay cannot start or continue in the current state.
    #[error("replay playback error: {reason}")]
    ReplayPlayback { reason: String },

    /// Mission file contents are invalid.
    #[error("invalid mission file {path}: {reason}")]
    MissionFile { path: PathBuf, reason: String },

    /// An encoded log block does not fit in one sector.
    #[error("log block of {length} bytes does not fit a {sector_size}-byte sector")]
    LogBlockTooLarge { length: usize, sector_size: usize },

    /// Could not find a free file name for a new mission.
    #[error("no free mission file name for '{name}' after {attempts} attempts")]
    MissionFileExhausted { name: String, attempts: usize },
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

/// Line framing errors on the serial link.
#[derive(Debug, Error)]
pub enum FrameError {
    /// A line grew past the maximum length without a terminator.
    #[error("line too long: {size} bytes exceeds maximum {max}")]
    LineTooLong { size: usize, max: usize },
}

/// Packet level decoding and encoding errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Not enough bytes for a packet header.
    #[error("packet too short: need at least {expected} bytes, got {got}")]
    TooShort { expected: usize, got: usize },

    /// The header declares more bytes than were received.
    #[error("packet length mismatch: header declares {declared} bytes, got {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// The packet uses an encoding version this station cannot read.
    #[error("unsupported encoding version {0}")]
    UnsupportedVersion(u8),

    /// The source address is not a known device.
    #[error("unknown device address 0x{0:x}")]
    UnknownAddress(u8),

    /// The call sign is not printable ASCII or does not fit the header.
    #[error("invalid call sign: {0}")]
    InvalidCallSign(String),

    /// A length cannot be expressed as a length word.
    #[error("invalid length {0}: must be a non-zero multiple of 4 no greater than 1024")]
    InvalidLength(usize),

    /// The hexadecimal form of a transmission is invalid.
    #[error("invalid hex payload: {0}")]
    InvalidHex(String),
}

/// Category of a block, used to qualify block errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Radio control block.
    Control,
    /// Radio command block.
    Command,
    /// Radio data block.
    Data,
    /// Block stored on the logging medium.
    Log,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Control => "control",
            Self::Command => "command",
            Self::Data => "data",
            Self::Log => "log",
        };
        f.write_str(name)
    }
}

/// Block decoding errors.
///
/// A recognised tag with a payload that does not fit its layout is
/// [`BlockError::Malformed`]. A tag this station has no decoder for is
/// [`BlockError::UnknownType`] or [`BlockError::UnknownSubtype`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockError {
    /// The payload does not match the layout of its subtype.
    #[error("malformed {kind} block: {reason}")]
    Malformed { kind: BlockKind, reason: String },

    /// The top-level block type tag is unknown.
    #[error("unknown block type 0x{0:02x}")]
    UnknownType(u8),

    /// The subtype tag is unknown (or has no decoder) for its category.
    #[error("unknown {kind} block subtype 0x{subtype:02x}")]
    UnknownSubtype { kind: BlockKind, subtype: u8 },

    /// The block framing is broken; nothing after it can be decoded.
    #[error("block framing error at offset {offset}: {reason}")]
    Framing { offset: usize, reason: String },
}

impl BlockError {
    /// Returns true if the error is about an unrecognised tag.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::UnknownType(_) | Self::UnknownSubtype { .. })
    }

    pub(crate) fn malformed(kind: BlockKind, reason: impl Into<String>) -> Self {
        Self::Malformed {
            kind,
            reason: reason.into(),
        }
    }

    pub(crate) fn too_short(kind: BlockKind, name: &str, need: usize, got: usize) -> Self {
        Self::malformed(
            kind,
            format!("{name} payload needs {need} bytes, got {got}"),
        )
    }
}

/// WebSocket command parsing errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The command is empty.
    #[error("empty command")]
    Empty,

    /// The command word is not recognised.
    #[error("unknown command: {0}")]
    Unknown(String),

    /// A required argument is missing.
    #[error("missing argument for '{command}': {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    /// An argument could not be parsed.
    #[error("invalid argument '{value}' for '{command}'")]
    InvalidArgument { command: &'static str, value: String },
}

/// Result type alias for ground station operations.
pub type Result<T> = std::result::Result<T, Error>;
