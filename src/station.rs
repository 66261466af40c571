//! Process wiring: radio task, WebSocket server and the telemetry loop.

use std::future::Future;

use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

use crate::commands::{SerialCommand, WsCommand};
use crate::config::Config;
use crate::error::Result;
use crate::event::{Event, EventDispatcher};
use crate::mission::ReplayEvent;
use crate::protocol::{
    BlockContents, CommandBlock, CommandBlockSubtype, DeviceAddress, PacketBuilder,
};
use crate::radio::{RadioControl, RadioEvent, RadioManager, SerialConnector};
use crate::server;
use crate::telemetry::Telemetry;

/// The ground station process.
pub struct GroundStation {
    config: Config,
}

impl GroundStation {
    /// Creates a station from its configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runs until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let config = self.config;
        let capacity = config.websocket.channel_capacity;

        let listener = TcpListener::bind(config.websocket_address()).await?;
        let events = EventDispatcher::new(capacity);
        let (command_tx, command_rx) = mpsc::channel(capacity);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(server::serve(
            listener,
            events.clone(),
            command_tx,
            async move {
                let _ = stop_rx.await;
            },
        ));

        let connector = SerialConnector::new(config.radio.baud_rate, config.connection_delay());
        let (manager, radio_tx, radio_rx) = RadioManager::new(
            connector,
            config.radio.parameters.clone(),
            config.command_timeout(),
            capacity,
        );
        let radio = tokio::spawn(manager.run());

        let (replay_tx, replay_rx) = mpsc::channel(capacity);
        let mut telemetry = Telemetry::new(config.telemetry.clone(), replay_tx);
        if let Err(e) = telemetry.refresh_missions().await {
            tracing::warn!("failed to list missions: {}", e);
        }

        let station = Station::new(telemetry, events.clone(), radio_tx, config.station.call_sign);
        station
            .run(command_rx, radio_rx, replay_rx, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("failed to listen for Ctrl-C: {}", e);
                }
            })
            .await;

        tracing::info!("shutting down");
        events.dispatch(Event::Shutdown);
        let _ = stop_tx.send(());

        match server.await {
            Ok(result) => result?,
            Err(e) => tracing::error!("WebSocket server task failed: {}", e),
        }
        if let Err(e) = radio.await {
            tracing::error!("radio task failed: {}", e);
        }
        Ok(())
    }
}

/// The telemetry loop.
struct Station {
    telemetry: Telemetry,
    events: EventDispatcher,
    radio: mpsc::Sender<RadioControl>,
    call_sign: String,
    packet_number: u16,
}

impl Station {
    fn new(
        telemetry: Telemetry,
        events: EventDispatcher,
        radio: mpsc::Sender<RadioControl>,
        call_sign: String,
    ) -> Self {
        Self {
            telemetry,
            events,
            radio,
            call_sign,
            packet_number: 0,
        }
    }

    fn publish(&self) {
        self.events.snapshot(self.telemetry.snapshot().to_string());
    }

    async fn send_radio(&self, control: RadioControl) {
        if self.radio.send(control).await.is_err() {
            tracing::error!("radio task is gone");
        }
    }

    /// Encodes a command block addressed to the rocket.
    fn command_packet(&mut self, subtype: CommandBlockSubtype) -> Result<Bytes> {
        let packet = PacketBuilder::new(
            self.call_sign.as_str(),
            DeviceAddress::GroundStation,
            self.packet_number,
        )
        .block(
            DeviceAddress::Rocket,
            BlockContents::Command(CommandBlock::new(subtype)),
        )
        .build()?;
        self.packet_number = self.packet_number.wrapping_add(1);
        Ok(packet)
    }

    async fn handle_command(&mut self, line: &str) {
        let command = match WsCommand::parse(line) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!("ignoring command '{}': {}", line, e);
                return;
            }
        };
        tracing::debug!("executing '{}'", command);

        match command {
            WsCommand::Serial(SerialCommand::Connect(port)) => {
                self.send_radio(RadioControl::Connect(port)).await;
            }
            WsCommand::Serial(SerialCommand::Disconnect) => {
                self.send_radio(RadioControl::Disconnect).await;
            }
            WsCommand::Serial(SerialCommand::Update) => {
                self.send_radio(RadioControl::RefreshPorts).await;
            }
            WsCommand::Telemetry(command) => {
                if let Err(e) = self.telemetry.execute(command).await {
                    tracing::error!("{}", e);
                }
            }
            WsCommand::Command(subtype) => match self.command_packet(subtype) {
                Ok(packet) => {
                    tracing::info!("sending {} to the rocket", subtype.name());
                    self.send_radio(RadioControl::Transmit(packet)).await;
                }
                Err(e) => tracing::error!("failed to encode {}: {}", subtype.name(), e),
            },
        }

        self.publish();
    }

    /// Runs until `shutdown` completes or every input is closed.
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<String>,
        mut radio_events: mpsc::Receiver<RadioEvent>,
        mut replay_events: mpsc::Receiver<ReplayEvent>,
        shutdown: impl Future<Output = ()>,
    ) {
        tokio::pin!(shutdown);
        self.publish();

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                Some(line) = commands.recv() => self.handle_command(&line).await,
                Some(event) = radio_events.recv() => {
                    self.telemetry.handle_radio_event(event).await;
                    self.publish();
                }
                Some(event) = replay_events.recv() => {
                    self.telemetry.handle_replay_event(event);
                    self.publish();
                }
                else => break,
            }
        }

        if self.telemetry.status().mission.recording {
            if let Err(e) = self.telemetry.stop_recording().await {
                tracing::error!("failed to finish recording: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::TelemetryConfig;
    use crate::protocol::parse_transmission;

    struct Harness {
        station: Station,
        radio: mpsc::Receiver<RadioControl>,
        events: EventDispatcher,
        _replay: mpsc::Receiver<ReplayEvent>,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let (replay_tx, replay_rx) = mpsc::channel(8);
        let telemetry = Telemetry::new(
            TelemetryConfig {
                missions_dir: dir.path().to_path_buf(),
                ..TelemetryConfig::default()
            },
            replay_tx,
        );
        let (radio_tx, radio_rx) = mpsc::channel(8);
        let events = EventDispatcher::new(16);
        Harness {
            station: Station::new(telemetry, events.clone(), radio_tx, "VE3GS".into()),
            radio: radio_rx,
            events,
            _replay: replay_rx,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_serial_commands_reach_radio() {
        let mut h = harness();

        h.station.handle_command("connect /dev/ttyUSB0").await;
        h.station.handle_command("serial update").await;
        h.station.handle_command("disconnect").await;

        assert_eq!(
            h.radio.recv().await,
            Some(RadioControl::Connect("/dev/ttyUSB0".into()))
        );
        assert_eq!(h.radio.recv().await, Some(RadioControl::RefreshPorts));
        assert_eq!(h.radio.recv().await, Some(RadioControl::Disconnect));
    }

    #[tokio::test]
    async fn test_rocket_command_is_transmitted() {
        let mut h = harness();

        h.station.handle_command("command deploy_parachute").await;
        h.station.handle_command("command tare_sensors").await;

        let Some(RadioControl::Transmit(first)) = h.radio.recv().await else {
            panic!("expected a transmission");
        };
        let packet = parse_transmission(&first, &[]).unwrap();
        assert_eq!(packet.header.call_sign, "VE3GS");
        assert_eq!(packet.header.source, DeviceAddress::GroundStation);
        assert_eq!(packet.header.packet_number, 0);
        assert_eq!(packet.blocks.len(), 1);
        assert_eq!(
            packet.blocks[0].header.destination_address(),
            Some(DeviceAddress::Rocket)
        );
        assert_eq!(
            packet.blocks[0].contents,
            BlockContents::Command(CommandBlock::new(CommandBlockSubtype::DeployParachute))
        );

        let Some(RadioControl::Transmit(second)) = h.radio.recv().await else {
            panic!("expected a transmission");
        };
        assert_eq!(parse_transmission(&second, &[]).unwrap().header.packet_number, 1);
    }

    #[tokio::test]
    async fn test_commands_publish_snapshots() {
        let mut h = harness();
        let mut subscription = h.events.subscribe();

        h.station.handle_command("update").await;
        let Some(Event::Snapshot(json)) = subscription.recv().await else {
            panic!("expected a snapshot");
        };
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["org"], "CUInSpace");

        // Unparseable commands change nothing and publish nothing.
        h.station.handle_command("self destruct").await;
        assert_eq!(h.events.subscriber_count(), 1);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), subscription.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_run_applies_radio_events_and_stops() {
        let h = harness();
        let mut subscription = h.events.subscribe();
        let (_command_tx, command_rx) = mpsc::channel(8);
        let (radio_event_tx, radio_event_rx) = mpsc::channel(8);
        let (_replay_tx, replay_rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(h.station.run(command_rx, radio_event_rx, replay_rx, async move {
            let _ = stop_rx.await;
        }));

        // Initial snapshot.
        assert!(matches!(subscription.recv().await, Some(Event::Snapshot(_))));

        radio_event_tx
            .send(RadioEvent::Connected {
                port: "COM7".into(),
            })
            .await
            .unwrap();
        let Some(Event::Snapshot(json)) = subscription.recv().await else {
            panic!("expected a snapshot");
        };
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"]["mission"]["state"], "live");
        assert_eq!(value["status"]["rn2483_radio"]["connected_port"], "COM7");

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
