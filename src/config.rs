//! Configuration management for the ground station.
//!
//! Configuration is loaded with figment from defaults, a TOML file and
//! environment variables.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::header::CALL_SIGN_LENGTH;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Prefix of environment variable overrides.
const ENV_PREFIX: &str = "GROUND_STATION_";

/// Frequency bands the RN2483 can tune to, in Hz.
const FREQUENCY_BANDS: [(u32, u32); 2] = [(433_050_000, 434_790_000), (863_000_000, 870_000_000)];

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `GROUND_STATION_`, sections
///    separated by `__`, e.g. `GROUND_STATION_WEBSOCKET__PORT`)
/// 2. TOML config file (`config.toml` in the working directory by default)
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Station identity.
    pub station: StationConfig,
    /// Telemetry processing.
    pub telemetry: TelemetryConfig,
    /// Radio link.
    pub radio: RadioConfig,
    /// WebSocket server.
    pub websocket: WebSocketConfig,
}

/// Station identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Call sign of the licensed operator, sent in outgoing packets.
    pub call_sign: String,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            call_sign: "NOCALL".to_string(),
        }
    }
}

/// Telemetry processing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Number of blocks kept per telemetry key.
    pub buffer_size: usize,
    /// Directory holding mission recordings.
    pub missions_dir: PathBuf,
    /// Call signs allowed to transmit. Empty accepts everyone silently.
    pub approved_call_signs: Vec<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            buffer_size: 20,
            missions_dir: PathBuf::from("missions"),
            approved_call_signs: Vec::new(),
        }
    }
}

/// Radio link configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// Serial baud rate.
    pub baud_rate: u32,
    /// Delay after opening the port, in milliseconds.
    pub connection_delay_ms: u64,
    /// How long to wait for a command response, in milliseconds.
    pub command_timeout_ms: u64,
    /// Radio modulation parameters.
    pub parameters: RadioParameters,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            baud_rate: 57_600,
            connection_delay_ms: 300,
            command_timeout_ms: 2_000,
            parameters: RadioParameters::default(),
        }
    }
}

/// RN2483 radio parameters; must match the rocket's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioParameters {
    /// Modulation, `lora` or `fsk`.
    pub modulation: String,
    /// Frequency in Hz.
    pub frequency: u32,
    /// Transmit power in dBm.
    pub power: i8,
    /// Spreading factor, 7 to 12.
    pub spread_factor: u8,
    /// Coding rate, `4/5` to `4/8`.
    pub coding_rate: String,
    /// Bandwidth in kHz: 125, 250 or 500.
    pub bandwidth: u16,
    /// Preamble length in symbols.
    pub preamble_len: u16,
    /// Append a CRC to packets.
    pub cyclic_redundancy: bool,
    /// Invert IQ.
    pub iqi: bool,
    /// Sync word, one hexadecimal byte.
    pub sync_word: String,
}

impl Default for RadioParameters {
    fn default() -> Self {
        Self {
            modulation: "lora".to_string(),
            frequency: 433_050_000,
            power: 15,
            spread_factor: 9,
            coding_rate: "4/7".to_string(),
            bandwidth: 500,
            preamble_len: 6,
            cyclic_redundancy: true,
            iqi: false,
            sync_word: "43".to_string(),
        }
    }
}

impl RadioParameters {
    /// Validates the parameters against what the RN2483 accepts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] naming the first bad parameter.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(Error::ConfigValidation { message });

        if !matches!(self.modulation.as_str(), "lora" | "fsk") {
            return invalid(format!(
                "radio modulation must be lora or fsk, got {}",
                self.modulation
            ));
        }
        if !FREQUENCY_BANDS
            .iter()
            .any(|(low, high)| (*low..=*high).contains(&self.frequency))
        {
            return invalid(format!(
                "radio frequency {} Hz is outside the 433 and 868 MHz bands",
                self.frequency
            ));
        }
        if !(-3..=15).contains(&self.power) {
            return invalid(format!(
                "radio power must be between -3 and 15 dBm, got {}",
                self.power
            ));
        }
        if !(7..=12).contains(&self.spread_factor) {
            return invalid(format!(
                "radio spread factor must be between 7 and 12, got {}",
                self.spread_factor
            ));
        }
        if !matches!(self.coding_rate.as_str(), "4/5" | "4/6" | "4/7" | "4/8") {
            return invalid(format!(
                "radio coding rate must be one of 4/5, 4/6, 4/7, 4/8, got {}",
                self.coding_rate
            ));
        }
        if !matches!(self.bandwidth, 125 | 250 | 500) {
            return invalid(format!(
                "radio bandwidth must be 125, 250 or 500 kHz, got {}",
                self.bandwidth
            ));
        }
        let sync = self.sync_word.trim_start_matches("0x");
        if sync.is_empty() || sync.len() > 2 || u8::from_str_radix(sync, 16).is_err() {
            return invalid(format!(
                "radio sync word must be a single hexadecimal byte, got {}",
                self.sync_word
            ));
        }
        Ok(())
    }
}

/// WebSocket server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Address to bind to.
    pub bind_address: String,
    /// Port to listen on.
    pub port: u16,
    /// Capacity of the snapshot broadcast channel.
    pub channel_capacity: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 33_845,
            channel_capacity: 64,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        PathBuf::from(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.telemetry.buffer_size == 0 {
            return Err(Error::ConfigValidation {
                message: "telemetry buffer_size must be greater than 0".to_string(),
            });
        }

        validate_call_sign(&self.station.call_sign)?;
        for call_sign in &self.telemetry.approved_call_signs {
            validate_call_sign(call_sign)?;
        }

        if self.radio.command_timeout_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "radio command_timeout_ms must be greater than 0".to_string(),
            });
        }

        if self.websocket.channel_capacity == 0 {
            return Err(Error::ConfigValidation {
                message: "websocket channel_capacity must be greater than 0".to_string(),
            });
        }

        self.radio.parameters.validate()
    }

    /// Get the radio command timeout as a Duration.
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.radio.command_timeout_ms)
    }

    /// Get the serial connection delay as a Duration.
    #[must_use]
    pub fn connection_delay(&self) -> Duration {
        Duration::from_millis(self.radio.connection_delay_ms)
    }

    /// Get the WebSocket listen address.
    #[must_use]
    pub fn websocket_address(&self) -> String {
        format!("{}:{}", self.websocket.bind_address, self.websocket.port)
    }
}

fn validate_call_sign(call_sign: &str) -> Result<()> {
    if call_sign.is_empty()
        || call_sign.len() > CALL_SIGN_LENGTH
        || !call_sign.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        return Err(Error::ConfigValidation {
            message: format!(
                "call sign '{call_sign}' must be 1 to {CALL_SIGN_LENGTH} ASCII letters or digits"
            ),
        });
    }
    Ok(())
}
