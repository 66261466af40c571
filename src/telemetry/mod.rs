//! Telemetry state: the latest blocks, mission status, recording and replay.
//!
//! [`Telemetry`] owns everything the dashboard shows. The station loop feeds
//! it radio events, replay events and commands, then publishes
//! [`Telemetry::snapshot`] after each change.

use std::collections::{BTreeMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::commands::{RecordCommand, ReplayCommand, TelemetryCommand};
use crate::config::TelemetryConfig;
use crate::error::{Error, Result};
use crate::mission::{MissionRecorder, ReplayEvent, ReplayHandle, list_missions};
use crate::protocol::transmission::{ParsedBlock, parse_transmission};
use crate::radio::RadioEvent;
use crate::types::{MissionData, MissionState, ReplayState, StatusData};

/// Organisation name reported to the dashboard.
pub const ORG: &str = "CUInSpace";

/// Version reported to the dashboard.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Live telemetry state.
pub struct Telemetry {
    config: TelemetryConfig,
    status: StatusData,
    telemetry: BTreeMap<&'static str, VecDeque<Value>>,
    recorder: Option<MissionRecorder>,
    replay: Option<ReplayHandle>,
    replay_events: mpsc::Sender<ReplayEvent>,
    next_replay: u64,
}

impl Telemetry {
    /// Creates the telemetry state. Replays send their blocks to
    /// `replay_events`.
    #[must_use]
    pub fn new(config: TelemetryConfig, replay_events: mpsc::Sender<ReplayEvent>) -> Self {
        Self {
            config,
            status: StatusData::default(),
            telemetry: BTreeMap::new(),
            recorder: None,
            replay: None,
            replay_events,
            next_replay: 0,
        }
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> &StatusData {
        &self.status
    }

    /// Buffered blocks for a telemetry key, oldest first.
    #[must_use]
    pub fn blocks(&self, name: &str) -> Option<&VecDeque<Value>> {
        self.telemetry.get(name)
    }

    /// Dashboard snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        json!({
            "version": VERSION,
            "org": ORG,
            "status": self.status,
            "telemetry": self.telemetry,
        })
    }

    /// Adds a block to its buffer and advances the mission time.
    pub fn update(&mut self, block: &ParsedBlock) {
        if let Some(time) = block.mission_time() {
            let time = i64::from(time);
            if time > self.status.mission.last_mission_time {
                self.status.mission.last_mission_time = time;
            }
        }

        let buffer = self.telemetry.entry(block.name()).or_default();
        buffer.push_back(block.to_json());
        while buffer.len() > self.config.buffer_size {
            buffer.pop_front();
        }
    }

    /// Decodes a received packet and applies its blocks.
    ///
    /// Blocks that cannot be decoded are logged and skipped. Decoded blocks
    /// are appended to the recording, if one is running. A block that cannot
    /// be recorded is still shown.
    pub async fn process_transmission(&mut self, data: &[u8]) -> Result<()> {
        let transmission = parse_transmission(data, &self.config.approved_call_signs)?;
        for error in &transmission.errors {
            tracing::warn!("packet #{}: {}", transmission.header.packet_number, error);
        }

        for block in &transmission.blocks {
            self.update(block);
            let Some(recorder) = self.recorder.as_mut() else {
                continue;
            };
            if let Err(e) = recorder.record(block).await {
                tracing::error!("failed to record {} block: {}", block.name(), e);
            }
        }
        Ok(())
    }

    /// Applies a radio event.
    pub async fn handle_radio_event(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::Payload(data) => {
                if self.status.mission.state == MissionState::Recorded {
                    tracing::debug!("ignoring radio packet during replay");
                    return;
                }
                if let Err(e) = self.process_transmission(&data).await {
                    tracing::warn!("dropping packet {}: {}", hex::encode(&data), e);
                }
            }
            RadioEvent::SignalReport { snr } => self.status.rn2483_radio.snr = Some(snr),
            RadioEvent::Connected { port } => {
                self.status.rn2483_radio.connected = true;
                self.set_connected_port(port).await;
            }
            RadioEvent::Disconnected => {
                self.status.rn2483_radio.connected = false;
                self.status.rn2483_radio.snr = None;
                self.set_connected_port(String::new()).await;
            }
            RadioEvent::Ports(ports) => self.status.serial.available_ports = ports,
        }
    }

    /// Records a change of radio port. Any mission in progress is reset; a
    /// connected port starts a live mission.
    async fn set_connected_port(&mut self, port: String) {
        if self.status.mission.state != MissionState::Dne {
            self.reset_data().await;
        }

        self.status.mission.state = if port.is_empty() {
            MissionState::Dne
        } else {
            MissionState::Live
        };
        self.status.rn2483_radio.connected_port = port;
    }

    /// Applies a replay event. Events from a replay other than the current
    /// one are dropped.
    pub fn handle_replay_event(&mut self, event: ReplayEvent) {
        if self.status.mission.state != MissionState::Recorded {
            return;
        }
        if self.replay.as_ref().map(ReplayHandle::id) != Some(event.replay()) {
            tracing::trace!("dropping event from stale replay {}", event.replay());
            return;
        }
        match event {
            ReplayEvent::Block { block, .. } => self.update(&block),
            ReplayEvent::Finished { .. } => {
                tracing::info!("replay of {} finished", self.status.mission.name);
                self.status.replay.state = ReplayState::Finished;
            }
        }
    }

    /// Runs a telemetry command.
    pub async fn execute(&mut self, command: TelemetryCommand) -> Result<()> {
        match command {
            TelemetryCommand::Update => self.refresh_missions().await,
            TelemetryCommand::Replay(ReplayCommand::Play(name)) => self.play_mission(name).await,
            TelemetryCommand::Replay(ReplayCommand::Pause) => {
                self.set_replay_speed(0.0);
                Ok(())
            }
            TelemetryCommand::Replay(ReplayCommand::Resume) => {
                self.set_replay_speed(self.status.replay.last_played_speed);
                Ok(())
            }
            TelemetryCommand::Replay(ReplayCommand::Speed(speed)) => {
                self.set_replay_speed(speed);
                Ok(())
            }
            TelemetryCommand::Replay(ReplayCommand::Stop) => {
                self.stop_replay().await;
                Ok(())
            }
            TelemetryCommand::Record(RecordCommand::Start(name)) => {
                self.start_recording(name).await
            }
            TelemetryCommand::Record(RecordCommand::Stop) => self.stop_recording().await,
        }
    }

    /// Reloads the list of recorded missions.
    pub async fn refresh_missions(&mut self) -> Result<()> {
        self.status.replay.mission_list = list_missions(&self.config.missions_dir).await?;
        Ok(())
    }

    /// Sets the replay speed.
    ///
    /// Negative and NaN speeds pause. The previous speed is kept for resuming,
    /// unless it was a pause.
    pub fn set_replay_speed(&mut self, speed: f64) {
        let speed = if speed.is_nan() || speed < 0.0 { 0.0 } else { speed };

        let previous = self.status.replay.speed;
        self.status.replay.last_played_speed = if previous > 0.0 { previous } else { 1.0 };
        self.status.replay.speed = speed;

        if self.status.mission.state != MissionState::Recorded {
            self.status.replay.state = ReplayState::Dne;
            return;
        }

        self.status.replay.state = if speed > 0.0 {
            ReplayState::Playing
        } else {
            ReplayState::Paused
        };
        if let Some(replay) = &self.replay {
            replay.set_speed(speed);
        }
    }

    /// Starts replaying a recorded mission.
    pub async fn play_mission(&mut self, name: Option<String>) -> Result<()> {
        if self.status.mission.recording {
            return Err(Error::AlreadyRecording);
        }
        let Some(name) = name else {
            return Err(Error::ReplayPlayback {
                reason: "no mission name given".to_string(),
            });
        };

        self.refresh_missions().await?;
        let Some(mission) = self.status.replay.mission(&name).cloned() else {
            return Err(Error::MissionNotFound { name });
        };

        let running = self.replay.as_ref().is_some_and(|r| !r.is_finished());
        if !running || self.status.mission.name != mission.name {
            if let Some(replay) = self.replay.take() {
                replay.stop();
            }
            self.telemetry.clear();
            self.status.mission.last_mission_time = -1;

            let speed = self.status.replay.speed;
            self.next_replay = self.next_replay.wrapping_add(1);
            self.replay = Some(ReplayHandle::spawn(
                self.next_replay,
                mission.path.clone(),
                speed,
                self.replay_events.clone(),
            ));
        }

        self.status.mission.name = mission.name;
        self.status.mission.epoch = mission.epoch;
        self.status.mission.state = MissionState::Recorded;
        self.status.mission.recording = false;

        let last = self.status.replay.last_played_speed;
        self.set_replay_speed(if last > 0.0 { last } else { 1.0 });

        tracing::info!("replaying {}", self.status.mission.name);
        Ok(())
    }

    /// Stops the replay and clears the dashboard.
    pub async fn stop_replay(&mut self) {
        tracing::info!("replay stopped");
        if let Some(replay) = self.replay.take() {
            replay.stop();
        }
        self.reset_data().await;
    }

    /// Starts recording received blocks. The mission is named after the
    /// start time when no name is given.
    pub async fn start_recording(&mut self, name: Option<String>) -> Result<()> {
        if self.status.mission.recording {
            return Err(Error::AlreadyRecording);
        }
        if self.status.replay.state != ReplayState::Dne {
            return Err(Error::ReplayPlayback {
                reason: "cannot record while a replay is loaded".to_string(),
            });
        }

        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX));
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| epoch.to_string());

        let recorder = MissionRecorder::create(&self.config.missions_dir, &name, epoch).await?;
        self.status.mission.name = recorder.name();
        self.status.mission.epoch = epoch;
        self.status.mission.recording = true;
        self.recorder = Some(recorder);
        Ok(())
    }

    /// Stops recording. Mission data is reset apart from its state and
    /// last mission time.
    pub async fn stop_recording(&mut self) -> Result<()> {
        let recorder = self.recorder.take().ok_or(Error::NotRecording)?;
        recorder.finish().await?;

        self.status.mission = MissionData {
            state: self.status.mission.state,
            last_mission_time: self.status.mission.last_mission_time,
            ..MissionData::default()
        };
        self.refresh_missions().await
    }

    /// Resets mission data and telemetry. Ports, radio link and the mission
    /// list are kept; a running recording is closed.
    async fn reset_data(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            if let Err(e) = recorder.finish().await {
                tracing::error!("failed to finish recording: {}", e);
            }
        }
        if let Some(replay) = self.replay.take() {
            replay.stop();
        }

        self.status.mission = MissionData::default();
        self.status.replay.state = ReplayState::Dne;
        self.telemetry.clear();
    }
}
