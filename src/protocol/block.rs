//! Tag enumerations for radio packets and logged blocks.
//!
//! A radio block carries a top-level [`RadioBlockType`] and a subtype whose
//! meaning depends on that type. Blocks written to the logging medium use
//! [`SdBlockSubtype`] as their top-level tag instead.

/// Addresses of the devices that can send or receive packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeviceAddress {
    /// The ground station.
    GroundStation = 0x0,
    /// The rocket avionics.
    Rocket = 0x1,
    /// Every device listening.
    Multicast = 0xF,
}

impl DeviceAddress {
    /// Every device address, in tag order.
    pub const ALL: [Self; 3] = [
        Self::GroundStation,
        Self::Rocket,
        Self::Multicast,
    ];

    /// Attempts to parse a device address from a byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x0 => Some(Self::GroundStation),
            0x1 => Some(Self::Rocket),
            0xF => Some(Self::Multicast),
            _ => None,
        }
    }

    /// Human readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GroundStation => "ground_station",
            Self::Rocket => "rocket",
            Self::Multicast => "multicast",
        }
    }
}

impl From<DeviceAddress> for u8 {
    fn from(addr: DeviceAddress) -> Self {
        addr as Self
    }
}

/// Top-level type of a block inside a radio packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RadioBlockType {
    /// Link management (signal reports, beacons, nonces).
    Control = 0x0,
    /// Commands to the rocket.
    Command = 0x1,
    /// Telemetry data.
    Data = 0x2,
}

impl RadioBlockType {
    /// Every block type, in tag order.
    pub const ALL: [Self; 3] = [
        Self::Control,
        Self::Command,
        Self::Data,
    ];

    /// Attempts to parse a block type from a byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x0 => Some(Self::Control),
            0x1 => Some(Self::Command),
            0x2 => Some(Self::Data),
            _ => None,
        }
    }

    /// Snake case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Command => "command",
            Self::Data => "data",
        }
    }
}

impl From<RadioBlockType> for u8 {
    fn from(kind: RadioBlockType) -> Self {
        kind as Self
    }
}

/// Top-level type of a block stored on the logging medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SdBlockSubtype {
    /// Metadata about the log itself (spacers).
    LoggingMetadata = 0x0,
    /// A telemetry data block.
    TelemetryData = 0x1,
    /// Diagnostic data.
    DiagnosticData = 0x2,
    /// A telemetry control block.
    TelemetryControl = 0x3,
    /// A telemetry command block.
    TelemetryCommand = 0x4,
}

impl SdBlockSubtype {
    /// Every log block type, in tag order.
    pub const ALL: [Self; 5] = [
        Self::LoggingMetadata,
        Self::TelemetryData,
        Self::DiagnosticData,
        Self::TelemetryControl,
        Self::TelemetryCommand,
    ];

    /// Attempts to parse a log block type from a byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x0 => Some(Self::LoggingMetadata),
            0x1 => Some(Self::TelemetryData),
            0x2 => Some(Self::DiagnosticData),
            0x3 => Some(Self::TelemetryControl),
            0x4 => Some(Self::TelemetryCommand),
            _ => None,
        }
    }

    /// Snake case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::LoggingMetadata => "logging_metadata",
            Self::TelemetryData => "telemetry_data",
            Self::DiagnosticData => "diagnostic_data",
            Self::TelemetryControl => "telemetry_control",
            Self::TelemetryCommand => "telemetry_command",
        }
    }
}

impl From<SdBlockSubtype> for u8 {
    fn from(kind: SdBlockSubtype) -> Self {
        kind as Self
    }
}

/// Subtypes of control blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlBlockSubtype {
    /// Link quality report.
    SignalReport = 0x0,
    /// Acknowledgement of a command.
    CommandAcknowledgement = 0x1,
    /// Request for a command nonce.
    CommandNonceRequest = 0x2,
    /// A command nonce.
    CommandNonce = 0x3,
    /// Beacon.
    Beacon = 0x4,
    /// Response to a beacon.
    BeaconResponse = 0x5,
}

impl ControlBlockSubtype {
    /// Every control subtype, in tag order.
    pub const ALL: [Self; 6] = [
        Self::SignalReport,
        Self::CommandAcknowledgement,
        Self::CommandNonceRequest,
        Self::CommandNonce,
        Self::Beacon,
        Self::BeaconResponse,
    ];

    /// Attempts to parse a control subtype from a byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x0 => Some(Self::SignalReport),
            0x1 => Some(Self::CommandAcknowledgement),
            0x2 => Some(Self::CommandNonceRequest),
            0x3 => Some(Self::CommandNonce),
            0x4 => Some(Self::Beacon),
            0x5 => Some(Self::BeaconResponse),
            _ => None,
        }
    }

    /// Snake case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SignalReport => "signal_report",
            Self::CommandAcknowledgement => "command_acknowledgement",
            Self::CommandNonceRequest => "command_nonce_request",
            Self::CommandNonce => "command_nonce",
            Self::Beacon => "beacon",
            Self::BeaconResponse => "beacon_response",
        }
    }
}

impl From<ControlBlockSubtype> for u8 {
    fn from(subtype: ControlBlockSubtype) -> Self {
        subtype as Self
    }
}

/// Subtypes of command blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandBlockSubtype {
    /// Reset the rocket avionics.
    ResetRocketAvionics = 0x0,
    /// Ask the rocket to send telemetry data.
    RequestTelemetryData = 0x1,
    /// Deploy the parachute.
    DeployParachute = 0x2,
    /// Tare the sensors.
    TareSensors = 0x3,
}

impl CommandBlockSubtype {
    /// Every command subtype, in tag order.
    pub const ALL: [Self; 4] = [
        Self::ResetRocketAvionics,
        Self::RequestTelemetryData,
        Self::DeployParachute,
        Self::TareSensors,
    ];

    /// Attempts to parse a command subtype from a byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x0 => Some(Self::ResetRocketAvionics),
            0x1 => Some(Self::RequestTelemetryData),
            0x2 => Some(Self::DeployParachute),
            0x3 => Some(Self::TareSensors),
            _ => None,
        }
    }

    /// Snake case name, as used on the command line and WebSocket.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ResetRocketAvionics => "reset_rocket_avionics",
            Self::RequestTelemetryData => "request_telemetry_data",
            Self::DeployParachute => "deploy_parachute",
            Self::TareSensors => "tare_sensors",
        }
    }

    /// Looks a command up by its snake case name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl From<CommandBlockSubtype> for u8 {
    fn from(subtype: CommandBlockSubtype) -> Self {
        subtype as Self
    }
}

/// Subtypes of data blocks (version 1 of the packet encoding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataBlockSubtype {
    /// Free text from the avionics.
    DebugMessage = 0x00,
    /// Altitude.
    Altitude = 0x01,
    /// Temperature.
    Temperature = 0x02,
    /// Pressure.
    Pressure = 0x03,
    /// Linear acceleration.
    Acceleration = 0x04,
    /// Angular velocity.
    AngularVelocity = 0x05,
    /// GNSS fix.
    GnssLocation = 0x06,
    /// GNSS satellite metadata.
    GnssMetadata = 0x07,
    /// Relative humidity.
    Humidity = 0x08,
    /// Avionics status.
    Status = 0x09,
}

impl DataBlockSubtype {
    /// Every data subtype, in tag order.
    pub const ALL: [Self; 10] = [
        Self::DebugMessage,
        Self::Altitude,
        Self::Temperature,
        Self::Pressure,
        Self::Acceleration,
        Self::AngularVelocity,
        Self::GnssLocation,
        Self::GnssMetadata,
        Self::Humidity,
        Self::Status,
    ];

    /// Attempts to parse a data subtype from a byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::DebugMessage),
            0x01 => Some(Self::Altitude),
            0x02 => Some(Self::Temperature),
            0x03 => Some(Self::Pressure),
            0x04 => Some(Self::Acceleration),
            0x05 => Some(Self::AngularVelocity),
            0x06 => Some(Self::GnssLocation),
            0x07 => Some(Self::GnssMetadata),
            0x08 => Some(Self::Humidity),
            0x09 => Some(Self::Status),
            _ => None,
        }
    }

    /// Snake case name, used as the telemetry key.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DebugMessage => "debug_message",
            Self::Altitude => "altitude",
            Self::Temperature => "temperature",
            Self::Pressure => "pressure",
            Self::Acceleration => "acceleration",
            Self::AngularVelocity => "angular_velocity",
            Self::GnssLocation => "gnss_location",
            Self::GnssMetadata => "gnss_metadata",
            Self::Humidity => "humidity",
            Self::Status => "status",
        }
    }
}

impl From<DataBlockSubtype> for u8 {
    fn from(subtype: DataBlockSubtype) -> Self {
        subtype as Self
    }
}

/// Subtypes of diagnostic data blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DiagnosticDataBlockSubtype {
    /// Log message.
    LogMessage = 0x0,
    /// Copy of a packet that was sent.
    OutgoingRadioPacket = 0x1,
    /// Copy of a packet that was received.
    IncomingRadioPacket = 0x2,
}

impl DiagnosticDataBlockSubtype {
    /// Every diagnostic subtype, in tag order.
    pub const ALL: [Self; 3] = [
        Self::LogMessage,
        Self::OutgoingRadioPacket,
        Self::IncomingRadioPacket,
    ];

    /// Attempts to parse a diagnostic subtype from a byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x0 => Some(Self::LogMessage),
            0x1 => Some(Self::OutgoingRadioPacket),
            0x2 => Some(Self::IncomingRadioPacket),
            _ => None,
        }
    }

    /// Snake case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::LogMessage => "log_message",
            Self::OutgoingRadioPacket => "outgoing_radio_packet",
            Self::IncomingRadioPacket => "incoming_radio_packet",
        }
    }
}

impl From<DiagnosticDataBlockSubtype> for u8 {
    fn from(subtype: DiagnosticDataBlockSubtype) -> Self {
        subtype as Self
    }
}

/// Subtypes of logging metadata blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LoggingMetadataBlockSubtype {
    /// Filler up to the end of a sector.
    Spacer = 0x0,
}

impl LoggingMetadataBlockSubtype {
    /// Every logging metadata subtype, in tag order.
    pub const ALL: [Self; 1] = [
        Self::Spacer,
    ];

    /// Attempts to parse a logging metadata subtype from a byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x0 => Some(Self::Spacer),
            _ => None,
        }
    }

    /// Snake case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Spacer => "spacer",
        }
    }
}

impl From<LoggingMetadataBlockSubtype> for u8 {
    fn from(subtype: LoggingMetadataBlockSubtype) -> Self {
        subtype as Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_address_from_byte() {
        assert_eq!(DeviceAddress::from_byte(0x0), Some(DeviceAddress::GroundStation));
        assert_eq!(DeviceAddress::from_byte(0x1), Some(DeviceAddress::Rocket));
        assert_eq!(DeviceAddress::from_byte(0xF), Some(DeviceAddress::Multicast));
        assert_eq!(DeviceAddress::from_byte(0x2), None);
    }

    macro_rules! assert_tags_round_trip {
        ($($kind:ty),+ $(,)?) => {$(
            for tag in <$kind>::ALL {
                assert_eq!(<$kind>::from_byte(u8::from(tag)), Some(tag), "{tag:?}");
                assert!(!tag.name().is_empty());
            }
            let names: std::collections::HashSet<_> =
                <$kind>::ALL.iter().map(|tag| tag.name()).collect();
            assert_eq!(names.len(), <$kind>::ALL.len());
        )+};
    }

    #[test]
    fn test_every_tag_round_trips() {
        assert_tags_round_trip!(
            DeviceAddress,
            RadioBlockType,
            SdBlockSubtype,
            ControlBlockSubtype,
            CommandBlockSubtype,
            DataBlockSubtype,
            DiagnosticDataBlockSubtype,
            LoggingMetadataBlockSubtype,
        );
    }

    #[test]
    fn test_tag_names() {
        assert_eq!(RadioBlockType::Data.name(), "data");
        assert_eq!(SdBlockSubtype::TelemetryControl.name(), "telemetry_control");
        assert_eq!(ControlBlockSubtype::SignalReport.name(), "signal_report");
        assert_eq!(
            DiagnosticDataBlockSubtype::OutgoingRadioPacket.name(),
            "outgoing_radio_packet"
        );
        assert_eq!(LoggingMetadataBlockSubtype::Spacer.name(), "spacer");
    }

    #[test]
    fn test_data_subtype_tags() {
        for byte in 0x00..=0x09 {
            let subtype = DataBlockSubtype::from_byte(byte).unwrap();
            assert_eq!(u8::from(subtype), byte);
        }
        assert_eq!(DataBlockSubtype::from_byte(0x0A), None);
        assert_eq!(DataBlockSubtype::from_byte(0xFF), None);
    }

    #[test]
    fn test_control_subtype_tags() {
        assert_eq!(
            ControlBlockSubtype::from_byte(0x0),
            Some(ControlBlockSubtype::SignalReport)
        );
        assert_eq!(
            ControlBlockSubtype::from_byte(0x5),
            Some(ControlBlockSubtype::BeaconResponse)
        );
        assert_eq!(ControlBlockSubtype::from_byte(0x6), None);
    }

    #[test]
    fn test_command_names() {
        for command in CommandBlockSubtype::ALL {
            assert_eq!(CommandBlockSubtype::from_name(command.name()), Some(command));
        }
        assert_eq!(CommandBlockSubtype::from_name("launch"), None);
    }

    #[test]
    fn test_log_subtypes() {
        assert_eq!(
            SdBlockSubtype::from_byte(0x1),
            Some(SdBlockSubtype::TelemetryData)
        );
        assert_eq!(SdBlockSubtype::from_byte(0x5), None);
        assert_eq!(
            LoggingMetadataBlockSubtype::from_byte(0),
            Some(LoggingMetadataBlockSubtype::Spacer)
        );
        assert_eq!(
            DiagnosticDataBlockSubtype::from_byte(2),
            Some(DiagnosticDataBlockSubtype::IncomingRadioPacket)
        );
    }
}
