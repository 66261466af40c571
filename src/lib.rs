//! # ground-station
//!
//! Ground station for a rocket's LoRa telemetry link.
//!
//! The station talks to an RN2483 radio over a serial port, decodes the
//! rocket's radio packets into typed blocks, keeps the latest readings, and
//! streams them as JSON to dashboards connected over a WebSocket. Missions
//! can be recorded to disk and replayed later.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ground_station::protocol::parse_hex_transmission;
//!
//! let packet = parse_hex_transmission("5641335a5a41020101000100", &[]).unwrap();
//! for block in &packet.blocks {
//!     println!("{}: {}", block.name(), block.to_json());
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`protocol`] - Packet, block and RN2483 line codecs
//! - [`transport`] - Serial link to the radio
//! - [`radio`] - RN2483 driver and the task owning it
//! - [`telemetry`] - Live state, recording and replay control
//! - [`mission`] - Mission files and replay
//! - [`event`] - Snapshot broadcast to WebSocket clients
//! - [`server`] - WebSocket server
//! - [`station`] - Wiring of the above into one process

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod mission;
pub mod protocol;
pub mod radio;
pub mod server;
pub mod station;
pub mod telemetry;
pub mod transport;
pub mod types;

pub use commands::WsCommand;
pub use config::Config;
pub use error::{BlockError, CommandError, Error, FrameError, PacketError, Result};
pub use event::{Event, EventDispatcher, Subscription};
pub use logging::{Verbosity, init_logging};
pub use mission::{MissionRecorder, ReplayEvent, ReplayHandle};
pub use protocol::{BlockContents, ParsedBlock, ParsedTransmission, parse_transmission};
pub use radio::{RadioControl, RadioEvent, RadioManager, Rn2483};
pub use station::GroundStation;
pub use telemetry::Telemetry;
pub use types::{MissionState, ReplayState, StatusData};
