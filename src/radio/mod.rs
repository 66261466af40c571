//! RN2483 LoRa radio driver and the task that owns the radio.
//!
//! [`Rn2483`] speaks the module's command language over a [`Transport`].
//! [`RadioManager`] runs as a background task: it connects and disconnects
//! on request, keeps the radio listening, and publishes received payloads
//! and signal reports as [`RadioEvent`]s.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_serial::SerialStream;

use crate::config::RadioParameters;
use crate::error::{Error, Result};
use crate::protocol::RadioResponse;
use crate::transport::{SerialConfig, StreamTransport, Transport, list_ports, open_serial};

/// How long to wait for a trailing `radio_err` after stopping reception.
const RXSTOP_DRAIN: Duration = Duration::from_millis(50);

/// Builds the `radio set` commands for the given parameters, in the order
/// they are issued.
#[must_use]
pub fn setup_commands(params: &RadioParameters) -> Vec<String> {
    let on_off = |flag: bool| if flag { "on" } else { "off" };
    vec![
        format!("radio set mod {}", params.modulation),
        format!("radio set freq {}", params.frequency),
        format!("radio set pwr {}", params.power),
        format!("radio set sf sf{}", params.spread_factor),
        format!("radio set cr {}", params.coding_rate),
        format!("radio set bw {}", params.bandwidth),
        format!("radio set prlen {}", params.preamble_len),
        format!("radio set crc {}", on_off(params.cyclic_redundancy)),
        format!("radio set iqi {}", on_off(params.iqi)),
        format!(
            "radio set sync {}",
            params.sync_word.trim_start_matches("0x")
        ),
    ]
}

/// Driver for an RN2483 module.
pub struct Rn2483<T> {
    transport: T,
    timeout: Duration,
}

impl<T: Transport> Rn2483<T> {
    /// Wraps a transport connected to the module.
    pub const fn new(transport: T, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Returns true if the underlying transport is connected.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    async fn response(&mut self) -> Result<String> {
        match tokio::time::timeout(self.timeout, self.transport.recv_line()).await {
            Ok(line) => line,
            Err(_) => Err(Error::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Sends a command and returns the first response line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the module does not answer in time.
    pub async fn command(&mut self, command: &str) -> Result<String> {
        self.transport.send_line(command).await?;
        self.response().await
    }

    /// Sends a command that must be answered with `ok`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Radio`] if the module answers anything else.
    pub async fn expect_ok(&mut self, command: &str) -> Result<()> {
        let line = self.command(command).await?;
        match RadioResponse::parse(&line) {
            RadioResponse::Ok => Ok(()),
            _ => Err(Error::Radio {
                message: format!("'{command}' answered '{line}'"),
            }),
        }
    }

    /// Prepares the module for receiving.
    ///
    /// Logs the firmware version, pauses the LoRaWAN stack so the radio can be
    /// driven directly, then applies `params`.
    ///
    /// # Errors
    ///
    /// Returns an error if any command is rejected or times out.
    pub async fn configure(&mut self, params: &RadioParameters) -> Result<()> {
        let version = self.command("sys get ver").await?;
        tracing::info!("radio firmware: {}", version);

        let pause = self.command("mac pause").await?;
        if pause.trim().parse::<u64>().is_err() {
            return Err(Error::Radio {
                message: format!("'mac pause' answered '{pause}'"),
            });
        }

        for command in setup_commands(params) {
            self.expect_ok(&command).await?;
        }

        tracing::debug!("radio configured");
        Ok(())
    }

    /// Puts the radio in continuous receive mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Radio`] if the module refuses.
    pub async fn start_receive(&mut self) -> Result<()> {
        self.expect_ok("radio rx 0").await
    }

    /// Waits for the outcome of a reception started by
    /// [`start_receive`](Self::start_receive).
    ///
    /// Returns `None` when the module reports a reception error. There is no
    /// timeout; the wait can be cancelled safely.
    ///
    /// # Errors
    ///
    /// Returns an error if the link fails or the module answers unexpectedly.
    pub async fn next_packet(&mut self) -> Result<Option<Bytes>> {
        let line = self.transport.recv_line().await?;
        match RadioResponse::parse(&line) {
            RadioResponse::Rx(payload) => Ok(Some(payload)),
            RadioResponse::RxError => Ok(None),
            _ => Err(Error::Radio {
                message: format!("unexpected line while receiving: '{line}'"),
            }),
        }
    }

    /// Receives one packet.
    ///
    /// # Errors
    ///
    /// See [`start_receive`](Self::start_receive) and
    /// [`next_packet`](Self::next_packet).
    pub async fn receive(&mut self) -> Result<Option<Bytes>> {
        self.start_receive().await?;
        self.next_packet().await
    }

    /// Leaves receive mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the module does not acknowledge.
    pub async fn stop_receive(&mut self) -> Result<()> {
        self.transport.send_line("radio rxstop").await?;
        loop {
            let line = self.response().await?;
            match RadioResponse::parse(&line) {
                RadioResponse::Ok => break,
                RadioResponse::RxError => {}
                _ => {
                    return Err(Error::Radio {
                        message: format!("'radio rxstop' answered '{line}'"),
                    });
                }
            }
        }

        // A pending reception may report its abort after the acknowledgement.
        if let Ok(Ok(line)) =
            tokio::time::timeout(RXSTOP_DRAIN, self.transport.recv_line()).await
        {
            tracing::debug!("after rxstop: {}", line);
        }
        Ok(())
    }

    /// Signal to noise ratio of the last received packet, in dB.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Radio`] if the answer is not a number.
    pub async fn snr(&mut self) -> Result<i32> {
        let line = self.command("radio get snr").await?;
        line.trim().parse().map_err(|_| Error::Radio {
            message: format!("'radio get snr' answered '{line}'"),
        })
    }

    /// Transmits a packet and waits for it to leave the antenna.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Radio`] if the module refuses or reports failure.
    pub async fn transmit(&mut self, data: &[u8]) -> Result<()> {
        self.expect_ok(&format!("radio tx {}", hex::encode(data)))
            .await?;

        let line = self.response().await?;
        match RadioResponse::parse(&line) {
            RadioResponse::TxOk => Ok(()),
            _ => Err(Error::Radio {
                message: format!("transmission failed: '{line}'"),
            }),
        }
    }
}

/// Opens transports to a radio by port name.
pub trait Connector: Send {
    /// Transport produced by this connector.
    type Transport: Transport + 'static;

    /// Opens the named port.
    fn connect<'a>(
        &'a mut self,
        port: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Self::Transport>> + Send + 'a>>;

    /// Lists the ports that can be connected to.
    fn list_ports(&self) -> Result<Vec<String>>;
}

/// Connects to radios over serial ports.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    baud_rate: u32,
    connection_delay: Duration,
}

impl SerialConnector {
    /// Creates a connector with the given serial settings.
    #[must_use]
    pub const fn new(baud_rate: u32, connection_delay: Duration) -> Self {
        Self {
            baud_rate,
            connection_delay,
        }
    }
}

impl Connector for SerialConnector {
    type Transport = StreamTransport<SerialStream>;

    fn connect<'a>(
        &'a mut self,
        port: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Self::Transport>> + Send + 'a>> {
        Box::pin(async move {
            let config = SerialConfig::new(port)
                .baud_rate(self.baud_rate)
                .connection_delay(self.connection_delay);
            open_serial(&config).await
        })
    }

    fn list_ports(&self) -> Result<Vec<String>> {
        list_ports()
    }
}

/// Requests handled by the radio task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioControl {
    /// Connect to the radio on the given port, replacing any current link.
    Connect(String),
    /// Drop the current link.
    Disconnect,
    /// Transmit a packet.
    Transmit(Bytes),
    /// Publish the list of available ports.
    RefreshPorts,
}

/// Notifications published by the radio task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// A packet was received.
    Payload(Bytes),
    /// SNR of the packet just received.
    SignalReport {
        /// Signal to noise ratio in dB.
        snr: i32,
    },
    /// The radio is connected and configured.
    Connected {
        /// Port the radio is on.
        port: String,
    },
    /// The radio link is down.
    Disconnected,
    /// Available serial ports.
    Ports(Vec<String>),
}

enum Next {
    Idle,
    Connect(String),
    Shutdown,
}

const fn is_link_error(err: &Error) -> bool {
    matches!(
        err,
        Error::Io(_) | Error::Serial(_) | Error::NotConnected | Error::Timeout { .. }
    )
}

/// Background task owning the radio.
pub struct RadioManager<C: Connector> {
    connector: C,
    parameters: RadioParameters,
    timeout: Duration,
    control: mpsc::Receiver<RadioControl>,
    events: mpsc::Sender<RadioEvent>,
}

impl<C: Connector> RadioManager<C> {
    /// Creates the manager and the channels to talk to it.
    pub fn new(
        connector: C,
        parameters: RadioParameters,
        timeout: Duration,
        capacity: usize,
    ) -> (Self, mpsc::Sender<RadioControl>, mpsc::Receiver<RadioEvent>) {
        let (control_tx, control_rx) = mpsc::channel(capacity);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        (
            Self {
                connector,
                parameters,
                timeout,
                control: control_rx,
                events: event_tx,
            },
            control_tx,
            event_rx,
        )
    }

    async fn publish(&self, event: RadioEvent) {
        if self.events.send(event).await.is_err() {
            tracing::debug!("radio event receiver dropped");
        }
    }

    async fn publish_ports(&self) {
        match self.connector.list_ports() {
            Ok(ports) => self.publish(RadioEvent::Ports(ports)).await,
            Err(e) => tracing::warn!("failed to list serial ports: {}", e),
        }
    }

    async fn connect(&mut self, port: String) -> Option<(String, Rn2483<C::Transport>)> {
        let transport = match self.connector.connect(&port).await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!("failed to open {}: {}", port, e);
                return None;
            }
        };

        let mut radio = Rn2483::new(transport, self.timeout);
        if let Err(e) = radio.configure(&self.parameters).await {
            tracing::error!("failed to configure radio on {}: {}", port, e);
            return None;
        }

        tracing::info!("radio connected on {}", port);
        self.publish(RadioEvent::Connected { port: port.clone() })
            .await;
        Some((port, radio))
    }

    /// Runs until every control sender is dropped.
    pub async fn run(mut self) {
        self.publish_ports().await;

        let mut next = Next::Idle;
        loop {
            next = match next {
                Next::Shutdown => return,
                Next::Idle => match self.control.recv().await {
                    None => Next::Shutdown,
                    Some(RadioControl::Connect(port)) => Next::Connect(port),
                    Some(RadioControl::RefreshPorts) => {
                        self.publish_ports().await;
                        Next::Idle
                    }
                    Some(RadioControl::Disconnect) => Next::Idle,
                    Some(RadioControl::Transmit(_)) => {
                        tracing::warn!("cannot transmit: radio not connected");
                        Next::Idle
                    }
                },
                Next::Connect(port) => match self.connect(port).await {
                    Some((port, mut radio)) => {
                        let next = self.serve(&mut radio).await;
                        tracing::info!("radio on {} disconnected", port);
                        self.publish(RadioEvent::Disconnected).await;
                        next
                    }
                    None => {
                        self.publish(RadioEvent::Disconnected).await;
                        Next::Idle
                    }
                },
            };
        }
    }

    async fn serve(&mut self, radio: &mut Rn2483<C::Transport>) -> Next {
        let mut listening = false;

        loop {
            if !listening {
                if let Err(e) = radio.start_receive().await {
                    tracing::error!("failed to start receiving: {}", e);
                    return Next::Idle;
                }
                listening = true;
            }

            tokio::select! {
                control = self.control.recv() => match control {
                    None => return Next::Shutdown,
                    Some(RadioControl::Disconnect) => return Next::Idle,
                    Some(RadioControl::Connect(port)) => return Next::Connect(port),
                    Some(RadioControl::RefreshPorts) => self.publish_ports().await,
                    Some(RadioControl::Transmit(data)) => {
                        listening = false;
                        let result = match radio.stop_receive().await {
                            Ok(()) => radio.transmit(&data).await,
                            Err(e) => Err(e),
                        };
                        match result {
                            Ok(()) => tracing::info!("transmitted {} bytes", data.len()),
                            Err(e) if is_link_error(&e) => {
                                tracing::error!("radio link lost while transmitting: {}", e);
                                return Next::Idle;
                            }
                            Err(e) => tracing::warn!("transmission failed: {}", e),
                        }
                    }
                },
                packet = radio.next_packet() => {
                    listening = false;
                    match packet {
                        Ok(Some(payload)) => {
                            tracing::debug!("received {} bytes", payload.len());
                            self.publish(RadioEvent::Payload(payload)).await;
                            match radio.snr().await {
                                Ok(snr) => self.publish(RadioEvent::SignalReport { snr }).await,
                                Err(e) if is_link_error(&e) => {
                                    tracing::error!("radio link lost: {}", e);
                                    return Next::Idle;
                                }
                                Err(e) => tracing::warn!("failed to read SNR: {}", e),
                            }
                        }
                        Ok(None) => tracing::trace!("reception error reported by radio"),
                        Err(e) if is_link_error(&e) => {
                            tracing::error!("radio link lost: {}", e);
                            return Next::Idle;
                        }
                        Err(e) => tracing::warn!("{}", e),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use tokio::io::DuplexStream;

    use super::*;

    type TestTransport = StreamTransport<DuplexStream>;

    /// Plays the radio side: checks each command and writes its replies.
    fn spawn_fake_radio(stream: DuplexStream, script: Vec<(String, Vec<&'static str>)>) {
        tokio::spawn(async move {
            let mut radio = StreamTransport::new(stream);
            for (expected, replies) in script {
                let line = radio.recv_line().await.unwrap();
                assert_eq!(line, expected);
                for reply in replies {
                    radio.send_line(reply).await.unwrap();
                }
            }
            while radio.recv_line().await.is_ok() {}
        });
    }

    fn configure_script() -> Vec<(String, Vec<&'static str>)> {
        let mut script = vec![
            ("sys get ver".to_string(), vec!["RN2483 1.0.5 Oct 31 2018 15:06:52"]),
            ("mac pause".to_string(), vec!["4294967245"]),
        ];
        script.extend(
            setup_commands(&RadioParameters::default())
                .into_iter()
                .map(|c| (c, vec!["ok"])),
        );
        script
    }

    fn driver(script: Vec<(String, Vec<&'static str>)>) -> Rn2483<TestTransport> {
        let (near, far) = tokio::io::duplex(1024);
        spawn_fake_radio(far, script);
        Rn2483::new(StreamTransport::new(near), Duration::from_secs(1))
    }

    #[test]
    fn test_setup_commands() {
        let commands = setup_commands(&RadioParameters::default());
        assert_eq!(
            commands,
            vec![
                "radio set mod lora",
                "radio set freq 433050000",
                "radio set pwr 15",
                "radio set sf sf9",
                "radio set cr 4/7",
                "radio set bw 500",
                "radio set prlen 6",
                "radio set crc on",
                "radio set iqi off",
                "radio set sync 43",
            ]
        );
    }

    #[tokio::test]
    async fn test_configure() {
        let mut radio = driver(configure_script());
        radio.configure(&RadioParameters::default()).await.unwrap();
        assert!(radio.is_connected());
    }

    #[tokio::test]
    async fn test_configure_rejected_parameter() {
        let script = vec![
            ("sys get ver".to_string(), vec!["RN2483 1.0.5"]),
            ("mac pause".to_string(), vec!["4294967245"]),
            ("radio set mod lora".to_string(), vec!["invalid_param"]),
        ];
        let mut radio = driver(script);
        let err = radio
            .configure(&RadioParameters::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "radio error: 'radio set mod lora' answered 'invalid_param'"
        );
    }

    #[tokio::test]
    async fn test_receive() {
        let script = vec![
            ("radio rx 0".to_string(), vec!["ok", "radio_rx  0A0B0C"]),
            ("radio rx 0".to_string(), vec!["ok", "radio_err"]),
            ("radio get snr".to_string(), vec!["-7"]),
        ];
        let mut radio = driver(script);
        assert_eq!(
            radio.receive().await.unwrap(),
            Some(Bytes::from_static(&[0x0A, 0x0B, 0x0C]))
        );
        assert_eq!(radio.receive().await.unwrap(), None);
        assert_eq!(radio.snr().await.unwrap(), -7);
    }

    #[tokio::test]
    async fn test_receive_busy() {
        let mut radio = driver(vec![("radio rx 0".to_string(), vec!["busy"])]);
        assert!(matches!(radio.receive().await, Err(Error::Radio { .. })));
    }

    #[tokio::test]
    async fn test_transmit() {
        let script = vec![
            ("radio rxstop".to_string(), vec!["ok"]),
            ("radio tx 0102ff".to_string(), vec!["ok", "radio_tx_ok"]),
        ];
        let mut radio = driver(script);
        radio.stop_receive().await.unwrap();
        radio.transmit(&[0x01, 0x02, 0xFF]).await.unwrap();
    }

    #[tokio::test]
    async fn test_transmit_failure() {
        let script = vec![("radio tx 01".to_string(), vec!["ok", "radio_tx_err"])];
        let mut radio = driver(script);
        assert!(matches!(
            radio.transmit(&[0x01]).await,
            Err(Error::Radio { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_command_timeout() {
        let mut radio = driver(vec![("sys get ver".to_string(), vec![])]);
        assert!(matches!(
            radio.command("sys get ver").await,
            Err(Error::Timeout { timeout_ms: 1000 })
        ));
    }

    struct TestConnector {
        streams: VecDeque<DuplexStream>,
    }

    impl Connector for TestConnector {
        type Transport = TestTransport;

        fn connect<'a>(
            &'a mut self,
            _port: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<Self::Transport>> + Send + 'a>> {
            Box::pin(async move {
                self.streams
                    .pop_front()
                    .map(StreamTransport::new)
                    .ok_or(Error::NotConnected)
            })
        }

        fn list_ports(&self) -> Result<Vec<String>> {
            Ok(vec!["/dev/fake0".to_string()])
        }
    }

    #[tokio::test]
    async fn test_manager_receives_and_reports() {
        let (near, far) = tokio::io::duplex(1024);
        let mut script = configure_script();
        script.push(("radio rx 0".to_string(), vec!["ok", "radio_rx  CAFE"]));
        script.push(("radio get snr".to_string(), vec!["9"]));
        script.push(("radio rx 0".to_string(), vec!["ok"]));
        spawn_fake_radio(far, script);

        let connector = TestConnector {
            streams: VecDeque::from([near]),
        };
        let (manager, control, mut events) = RadioManager::new(
            connector,
            RadioParameters::default(),
            Duration::from_secs(1),
            16,
        );
        let task = tokio::spawn(manager.run());

        assert_eq!(
            events.recv().await,
            Some(RadioEvent::Ports(vec!["/dev/fake0".to_string()]))
        );

        control
            .send(RadioControl::Connect("/dev/fake0".to_string()))
            .await
            .unwrap();
        assert_eq!(
            events.recv().await,
            Some(RadioEvent::Connected {
                port: "/dev/fake0".to_string()
            })
        );
        assert_eq!(
            events.recv().await,
            Some(RadioEvent::Payload(Bytes::from_static(&[0xCA, 0xFE])))
        );
        assert_eq!(events.recv().await, Some(RadioEvent::SignalReport { snr: 9 }));

        control.send(RadioControl::Disconnect).await.unwrap();
        assert_eq!(events.recv().await, Some(RadioEvent::Disconnected));

        drop(control);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_manager_failed_connect() {
        let connector = TestConnector {
            streams: VecDeque::new(),
        };
        let (manager, control, mut events) = RadioManager::new(
            connector,
            RadioParameters::default(),
            Duration::from_secs(1),
            16,
        );
        let task = tokio::spawn(manager.run());

        assert!(matches!(events.recv().await, Some(RadioEvent::Ports(_))));
        control
            .send(RadioControl::Connect("/dev/missing".to_string()))
            .await
            .unwrap();
        assert_eq!(events.recv().await, Some(RadioEvent::Disconnected));

        drop(control);
        task.await.unwrap();
    }
}
