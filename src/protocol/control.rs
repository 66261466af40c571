//! Radio control blocks.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde_json::{Value, json};

use crate::error::{BlockError, BlockKind};
use crate::protocol::block::ControlBlockSubtype;

/// Payload length of a signal report.
const SIGNAL_REPORT_LENGTH: usize = 4;

/// Flag bit asking the receiver to answer with its own report.
const SIGNAL_REPORT_REQUEST: u8 = 0x01;

/// Link quality as seen by the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalReport {
    /// Signal to noise ratio of the last packet received, in dB.
    pub snr: i8,
    /// Received signal strength of the last packet received, in dBm.
    pub rssi: i8,
    /// Transmit power of the sender, in dBm.
    pub radio_power: i8,
    /// The receiver should answer with its own report.
    pub request: bool,
}

/// A decoded control block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlBlock {
    /// Signal report.
    SignalReport(SignalReport),
}

impl ControlBlock {
    /// Decodes a control block payload.
    ///
    /// Only signal reports have a decoder; the other control subtypes are
    /// reported as unknown.
    pub fn parse(subtype: ControlBlockSubtype, payload: &[u8]) -> Result<Self, BlockError> {
        match subtype {
            ControlBlockSubtype::SignalReport => {
                if payload.len() < SIGNAL_REPORT_LENGTH {
                    return Err(BlockError::too_short(
                        BlockKind::Control,
                        "signal report",
                        SIGNAL_REPORT_LENGTH,
                        payload.len(),
                    ));
                }

                let mut cursor = payload;
                Ok(Self::SignalReport(SignalReport {
                    snr: cursor.get_i8(),
                    rssi: cursor.get_i8(),
                    radio_power: cursor.get_i8(),
                    request: cursor.get_u8() & SIGNAL_REPORT_REQUEST != 0,
                }))
            }
            other => Err(BlockError::UnknownSubtype {
                kind: BlockKind::Control,
                subtype: other.into(),
            }),
        }
    }

    /// Encodes the block payload.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(SIGNAL_REPORT_LENGTH);
        match self {
            Self::SignalReport(report) => {
                buf.put_i8(report.snr);
                buf.put_i8(report.rssi);
                buf.put_i8(report.radio_power);
                buf.put_u8(if report.request {
                    SIGNAL_REPORT_REQUEST
                } else {
                    0
                });
            }
        }
        buf.freeze()
    }

    /// The subtype tag of this block.
    #[must_use]
    pub const fn subtype(&self) -> ControlBlockSubtype {
        match self {
            Self::SignalReport(_) => ControlBlockSubtype::SignalReport,
        }
    }

    /// Telemetry key for this block.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SignalReport(_) => "signal_report",
        }
    }

    /// JSON form sent to the dashboard.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::SignalReport(report) => json!({
                "snr": report.snr,
                "rssi": report.rssi,
                "radio_power": report.radio_power,
                "request": report.request,
            }),
        }
    }
}

impl fmt::Display for ControlBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignalReport(r) => write!(
                f,
                "signal report -> snr: {} dB, rssi: {} dBm, power: {} dBm, request: {}",
                r.snr, r.rssi, r.radio_power, r.request
            ),
        }
    }
}
