//! Serial transport for the RN2483 radio module.

use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::error::{Error, Result};
use crate::transport::StreamTransport;

/// Default baud rate of the RN2483 UART.
pub const DEFAULT_BAUD_RATE: u32 = 57_600;

/// Default connection delay.
pub const DEFAULT_CONNECTION_DELAY: Duration = Duration::from_millis(300);

/// How long stale bytes are drained after opening the port.
pub const DEFAULT_DRAIN_WINDOW: Duration = Duration::from_millis(200);

/// Serial link to the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Port name, `/dev/ttyUSB0` or `COM3`.
    pub port: String,
    /// UART speed.
    pub baud_rate: u32,
    /// The RN2483 resets when the port opens; commands wait this long.
    pub connection_delay: Duration,
    /// Window for discarding the boot banner.
    pub drain_window: Duration,
}

impl SerialConfig {
    /// Settings for `port` at the RN2483 defaults.
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            connection_delay: DEFAULT_CONNECTION_DELAY,
            drain_window: DEFAULT_DRAIN_WINDOW,
        }
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Sets the connection delay.
    #[must_use]
    pub const fn connection_delay(mut self, delay: Duration) -> Self {
        self.connection_delay = delay;
        self
    }

    /// Sets how long the boot banner is drained.
    #[must_use]
    pub const fn drain_window(mut self, window: Duration) -> Self {
        self.drain_window = window;
        self
    }
}

/// Opens the serial port and wraps it in a line transport.
///
/// Bytes the module printed before the port was opened are discarded.
///
/// # Errors
///
/// Returns [`Error::Serial`] if the port cannot be opened.
pub async fn open_serial(config: &SerialConfig) -> Result<StreamTransport<SerialStream>> {
    tracing::info!("connecting to serial port: {}", config.port);

    let mut stream = tokio_serial::new(&config.port, config.baud_rate)
        .open_native_async()
        .map_err(Error::Serial)?;

    tokio::time::sleep(config.connection_delay).await;

    let mut buf = [0u8; 256];
    let mut total_drained = 0usize;
    let drain_deadline = tokio::time::Instant::now() + config.drain_window;
    while tokio::time::Instant::now() < drain_deadline {
        match tokio::time::timeout(Duration::from_millis(20), stream.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => total_drained += n,
            _ => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }

    if total_drained > 0 {
        tracing::debug!("drained {} stale bytes from buffer", total_drained);
    }

    tracing::info!("connected to serial port {}", config.port);
    Ok(StreamTransport::new(stream))
}

/// Lists available serial ports.
///
/// # Errors
///
/// Returns an error if the port list cannot be retrieved.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports().map_err(Error::Serial)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_defaults() {
        let config = SerialConfig::new("/dev/ttyUSB0");
        assert_eq!(config.port, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 57_600);
        assert_eq!(config.connection_delay, DEFAULT_CONNECTION_DELAY);
        assert_eq!(config.drain_window, DEFAULT_DRAIN_WINDOW);
    }

    #[test]
    fn test_serial_config_builder() {
        let config = SerialConfig::new("COM3")
            .baud_rate(115_200)
            .connection_delay(Duration::from_secs(1))
            .drain_window(Duration::ZERO);
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.connection_delay, Duration::from_secs(1));
        assert_eq!(config.drain_window, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_open_missing_port() {
        let config = SerialConfig::new("/dev/ground-station-test-missing");
        assert!(matches!(open_serial(&config).await, Err(Error::Serial(_))));
    }
}
