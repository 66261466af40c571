//! Ground station status reported to the dashboard.

use std::path::PathBuf;

use serde::Serialize;

/// State of the current mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionState {
    /// No mission: no radio connected and nothing being replayed.
    #[default]
    Dne,
    /// Telemetry is arriving from a connected radio.
    Live,
    /// A recorded mission is being replayed.
    Recorded,
}

/// State of the replay system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayState {
    /// No replay loaded.
    #[default]
    Dne,
    /// Replay loaded and paused.
    Paused,
    /// Replay running.
    Playing,
    /// Replay reached the end of the mission.
    Finished,
}

/// A mission file found in the missions directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissionEntry {
    /// Mission name (file stem).
    pub name: String,
    /// Length of the recorded flight in sectors.
    pub length: u32,
    /// Recording start, seconds since the Unix epoch.
    pub epoch: i64,
    /// Mission file format version.
    pub version: u8,
    /// Path of the mission file.
    #[serde(skip)]
    pub path: PathBuf,
}

/// Current mission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissionData {
    /// Mission name; empty when there is none.
    pub name: String,
    /// Recording start, seconds since the Unix epoch, or -1.
    pub epoch: i64,
    /// Mission state.
    pub state: MissionState,
    /// A recording is in progress.
    pub recording: bool,
    /// Highest mission time seen so far, in milliseconds.
    pub last_mission_time: i64,
}

impl Default for MissionData {
    fn default() -> Self {
        Self {
            name: String::new(),
            epoch: -1,
            state: MissionState::Dne,
            recording: false,
            last_mission_time: -1,
        }
    }
}

/// Serial ports seen by the station.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SerialData {
    /// Names of the available serial ports.
    pub available_ports: Vec<String>,
}

/// RN2483 radio connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Rn2483RadioData {
    /// The radio is connected.
    pub connected: bool,
    /// Port the radio is connected on; empty when disconnected.
    pub connected_port: String,
    /// SNR of the last received packet in dB.
    pub snr: Option<i32>,
}

/// Replay system.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayData {
    /// Replay state.
    pub state: ReplayState,
    /// Playback speed multiplier; 0 is paused.
    pub speed: f64,
    /// Speed to go back to when resuming.
    #[serde(skip)]
    pub last_played_speed: f64,
    /// Missions available for replay.
    pub mission_list: Vec<MissionEntry>,
}

impl Default for ReplayData {
    fn default() -> Self {
        Self {
            state: ReplayState::Dne,
            speed: 1.0,
            last_played_speed: 1.0,
            mission_list: Vec::new(),
        }
    }
}

impl ReplayData {
    /// Looks up a mission by name.
    #[must_use]
    pub fn mission(&self, name: &str) -> Option<&MissionEntry> {
        self.mission_list.iter().find(|m| m.name == name)
    }
}

/// Everything the dashboard shows besides telemetry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusData {
    /// Current mission.
    pub mission: MissionData,
    /// Serial ports.
    pub serial: SerialData,
    /// Radio connection.
    pub rn2483_radio: Rn2483RadioData,
    /// Replay system.
    pub replay: ReplayData,
}
