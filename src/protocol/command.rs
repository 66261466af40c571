//! Radio command blocks sent from the ground station to the rocket.
//!
//! Commands carry no payload; the subtype is the whole message.

use std::fmt;

use bytes::Bytes;
use serde_json::{Value, json};

use crate::error::{BlockError, BlockKind};
use crate::protocol::block::CommandBlockSubtype;

/// A command addressed to the rocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandBlock {
    /// The command.
    pub subtype: CommandBlockSubtype,
}

impl CommandBlock {
    /// Creates a command block.
    #[must_use]
    pub const fn new(subtype: CommandBlockSubtype) -> Self {
        Self { subtype }
    }

    /// Decodes a command block from its raw subtype.
    ///
    /// Any payload bytes are padding and are ignored.
    pub fn parse(subtype: u8, _payload: &[u8]) -> Result<Self, BlockError> {
        CommandBlockSubtype::from_byte(subtype)
            .map(Self::new)
            .ok_or(BlockError::UnknownSubtype {
                kind: BlockKind::Command,
                subtype,
            })
    }

    /// Encodes the block payload, which is always empty.
    #[must_use]
    pub const fn encode(&self) -> Bytes {
        Bytes::new()
    }

    /// Telemetry key for this block.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.subtype.name()
    }

    /// JSON form sent to the dashboard.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({ "command": self.name() })
    }
}

impl From<CommandBlockSubtype> for CommandBlock {
    fn from(subtype: CommandBlockSubtype) -> Self {
        Self::new(subtype)
    }
}

impl fmt::Display for CommandBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command -> {}", self.name())
    }
}
