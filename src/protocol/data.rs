//! Telemetry data blocks.
//!
//! Every data block payload starts with the mission time in milliseconds
//! (u32 LE). Payloads are zero padded to a multiple of 4 bytes on the wire;
//! the decoders ignore bytes past the end of their layout.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde_json::{Value, json};

use crate::error::{BlockError, BlockKind};
use crate::protocol::block::DataBlockSubtype;
use crate::protocol::header::padded_length;
use crate::types::units::{
    celsius_to_fahrenheit, metres_to_feet, milli_degrees_to_celsius, pascals_to_psi, round_to,
};

/// Divisor applied to raw inertial readings (full scale is 2^15 counts).
const INERTIAL_FULL_SCALE_COUNTS: f64 = 32_768.0;

/// State of a sensor on the avionics board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SensorStatus {
    /// No sensor.
    None = 0x0,
    /// Sensor is starting up.
    Initializing = 0x1,
    /// Sensor is running.
    Running = 0x2,
    /// Sensor failed its self test.
    SelfTestFailed = 0x3,
    /// Sensor failed.
    Failed = 0x4,
}

impl SensorStatus {
    /// Parses a sensor status from its 3-bit field.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0x0 => Some(Self::None),
            0x1 => Some(Self::Initializing),
            0x2 => Some(Self::Running),
            0x3 => Some(Self::SelfTestFailed),
            0x4 => Some(Self::Failed),
            _ => None,
        }
    }

    /// Human readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::SelfTestFailed => "self test failed",
            Self::Failed => "failed",
        }
    }
}

/// State of the SD card driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SdCardStatus {
    /// No card inserted.
    NotPresent = 0x0,
    /// Card is starting up.
    Initializing = 0x1,
    /// Card is ready.
    Ready = 0x2,
    /// Card failed.
    Failed = 0x3,
}

impl SdCardStatus {
    /// Parses an SD card status from its 3-bit field.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0x0 => Some(Self::NotPresent),
            0x1 => Some(Self::Initializing),
            0x2 => Some(Self::Ready),
            0x3 => Some(Self::Failed),
            _ => None,
        }
    }

    /// Human readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NotPresent => "card not present",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

/// Flight phase reported by the deployment controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeploymentState {
    /// On the pad, not armed.
    Idle = 0x0,
    /// Armed.
    Armed = 0x1,
    /// Motor burning.
    PoweredAscent = 0x2,
    /// Motor burnt out, still climbing.
    CoastingAscent = 0x3,
    /// Drogue parachute being deployed.
    DrogueDeploy = 0x4,
    /// Descending under drogue.
    DrogueDescent = 0x5,
    /// Main parachute being deployed.
    MainDeploy = 0x6,
    /// Descending under main.
    MainDescent = 0x7,
    /// Landed.
    Recovery = 0x8,
}

impl DeploymentState {
    /// Parses a deployment state from its 4-bit field.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0x0 => Some(Self::Idle),
            0x1 => Some(Self::Armed),
            0x2 => Some(Self::PoweredAscent),
            0x3 => Some(Self::CoastingAscent),
            0x4 => Some(Self::DrogueDeploy),
            0x5 => Some(Self::DrogueDescent),
            0x6 => Some(Self::MainDeploy),
            0x7 => Some(Self::MainDescent),
            0x8 => Some(Self::Recovery),
            _ => None,
        }
    }

    /// Human readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Armed => "armed",
            Self::PoweredAscent => "powered ascent",
            Self::CoastingAscent => "coasting ascent",
            Self::DrogueDeploy => "drogue deployed",
            Self::DrogueDescent => "drogue descent",
            Self::MainDeploy => "main deployed",
            Self::MainDescent => "main descent",
            Self::Recovery => "recovery",
        }
    }
}

/// Free text sent by the avionics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugMessage {
    /// Mission time in milliseconds.
    pub mission_time: u32,
    /// Message text.
    pub message: String,
}

/// Altitude above launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Altitude {
    /// Mission time in milliseconds.
    pub mission_time: u32,
    /// Altitude in millimetres.
    pub millimetres: i32,
}

impl Altitude {
    /// Altitude in metres.
    #[must_use]
    pub fn metres(&self) -> f64 {
        f64::from(self.millimetres) / 1000.0
    }
}

/// Air temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Temperature {
    /// Mission time in milliseconds.
    pub mission_time: u32,
    /// Temperature in thousandths of a degree Celsius.
    pub millidegrees: i32,
}

/// Air pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pressure {
    /// Mission time in milliseconds.
    pub mission_time: u32,
    /// Pressure in pascals.
    pub pascals: u32,
}

/// Relative humidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Humidity {
    /// Mission time in milliseconds.
    pub mission_time: u32,
    /// Relative humidity in hundredths of a percent.
    pub hundredths: u32,
}

impl Humidity {
    /// Relative humidity in whole percent, halves rounded to even.
    #[must_use]
    pub const fn percentage(&self) -> u32 {
        let whole = self.hundredths / 100;
        match self.hundredths % 100 {
            51.. => whole + 1,
            50 if whole % 2 == 1 => whole + 1,
            _ => whole,
        }
    }
}

/// Three-axis sample from an inertial sensor (accelerometer or gyroscope).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InertialSample {
    /// Mission time in milliseconds.
    pub mission_time: u32,
    /// Full scale range of the sensor (g or degrees per second).
    pub full_scale_range: u16,
    /// Raw X reading.
    pub x: i16,
    /// Raw Y reading.
    pub y: i16,
    /// Raw Z reading.
    pub z: i16,
}

impl InertialSample {
    /// Converts a raw reading into the sensor's unit.
    #[must_use]
    pub fn scale(&self, raw: i16) -> f64 {
        f64::from(raw) * f64::from(self.full_scale_range) / INERTIAL_FULL_SCALE_COUNTS
    }

    /// Scaled (x, y, z).
    #[must_use]
    pub fn scaled(&self) -> (f64, f64, f64) {
        (self.scale(self.x), self.scale(self.y), self.scale(self.z))
    }
}

/// Kind of GNSS fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GnssFixType {
    /// Fix type not known.
    Unknown,
    /// No fix.
    NotAvailable,
    /// Two dimensional fix.
    Fix2D,
    /// Three dimensional fix.
    Fix3D,
}

impl GnssFixType {
    /// Parses the fix type from the low two bits of its byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte & 0x03 {
            1 => Self::NotAvailable,
            2 => Self::Fix2D,
            3 => Self::Fix3D,
            _ => Self::Unknown,
        }
    }

    /// Encoded value.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::NotAvailable => 1,
            Self::Fix2D => 2,
            Self::Fix3D => 3,
        }
    }

    /// Human readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::NotAvailable => "not available",
            Self::Fix2D => "2D fix",
            Self::Fix3D => "3D fix",
        }
    }
}

/// GNSS position fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GnssLocation {
    /// Mission time when the fix was received, in milliseconds.
    pub fix_time: u32,
    /// Latitude in units of 10^-4 arc minutes.
    pub latitude: i32,
    /// Longitude in units of 10^-4 arc minutes.
    pub longitude: i32,
    /// UTC time of the fix, seconds since the Unix epoch.
    pub utc_time: u32,
    /// Altitude above sea level in millimetres.
    pub altitude: i32,
    /// Speed over ground in hundredths of a knot.
    pub speed: i16,
    /// Course over ground in hundredths of a degree.
    pub course: i16,
    /// Position dilution of precision, times 100.
    pub pdop: u16,
    /// Horizontal dilution of precision, times 100.
    pub hdop: u16,
    /// Vertical dilution of precision, times 100.
    pub vdop: u16,
    /// Number of satellites used for the fix.
    pub satellites: u8,
    /// Kind of fix.
    pub fix_type: GnssFixType,
}

impl GnssLocation {
    /// Latitude in decimal degrees.
    #[must_use]
    pub fn latitude_degrees(&self) -> f64 {
        f64::from(self.latitude) / 600_000.0
    }

    /// Longitude in decimal degrees.
    #[must_use]
    pub fn longitude_degrees(&self) -> f64 {
        f64::from(self.longitude) / 600_000.0
    }
}

/// Avionics health summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// Mission time in milliseconds.
    pub mission_time: u32,
    /// KX134 accelerometer state.
    pub kx134_state: SensorStatus,
    /// Altimeter state.
    pub altimeter_state: SensorStatus,
    /// IMU state.
    pub imu_state: SensorStatus,
    /// SD card driver state.
    pub sd_state: SdCardStatus,
    /// Deployment controller state.
    pub deployment_state: DeploymentState,
    /// Number of blocks written to the SD card.
    pub sd_blocks_recorded: u32,
    /// Number of SD card checkouts missed.
    pub sd_checkouts_missed: u32,
}

impl Status {
    fn pack_states(&self) -> u32 {
        (u32::from(self.kx134_state as u8 & 0x7) << 16)
            | (u32::from(self.altimeter_state as u8 & 0x7) << 19)
            | (u32::from(self.imu_state as u8 & 0x7) << 22)
            | (u32::from(self.sd_state as u8 & 0x7) << 25)
            | (u32::from(self.deployment_state as u8 & 0xF) << 28)
    }
}

/// A decoded data block.
#[derive(Debug, Clone, PartialEq)]
pub enum DataBlock {
    /// Debug text.
    DebugMessage(DebugMessage),
    /// Altitude.
    Altitude(Altitude),
    /// Temperature.
    Temperature(Temperature),
    /// Pressure.
    Pressure(Pressure),
    /// Linear acceleration in m/s^2 full scale units.
    Acceleration(InertialSample),
    /// Angular velocity.
    AngularVelocity(InertialSample),
    /// GNSS fix.
    GnssLocation(GnssLocation),
    /// Humidity.
    Humidity(Humidity),
    /// Avionics status.
    Status(Status),
}

fn require(payload: &[u8], need: usize, subtype: DataBlockSubtype) -> Result<(), BlockError> {
    if payload.len() < need {
        return Err(BlockError::too_short(
            BlockKind::Data,
            subtype.name(),
            need,
            payload.len(),
        ));
    }
    Ok(())
}

fn parse_state<T>(
    value: Option<T>,
    what: &str,
    bits: u32,
) -> Result<T, BlockError> {
    value.ok_or_else(|| BlockError::malformed(BlockKind::Data, format!("invalid {what} state: {bits}")))
}

impl DataBlock {
    /// Decodes a data block payload of the given subtype.
    ///
    /// # Errors
    ///
    /// Returns [`BlockError::Malformed`] if the payload is too short or holds
    /// an invalid value, and [`BlockError::UnknownSubtype`] for subtypes
    /// without a decoder.
    pub fn parse(subtype: DataBlockSubtype, payload: &[u8]) -> Result<Self, BlockError> {
        let mut cursor = payload;

        match subtype {
            DataBlockSubtype::DebugMessage => {
                require(payload, 4, subtype)?;
                let mission_time = cursor.get_u32_le();
                let text_len = cursor
                    .iter()
                    .rposition(|&b| b != 0)
                    .map_or(0, |last| last + 1);
                let message = std::str::from_utf8(&cursor[..text_len])
                    .map_err(|e| {
                        BlockError::malformed(BlockKind::Data, format!("debug message is not UTF-8: {e}"))
                    })?
                    .to_owned();
                Ok(Self::DebugMessage(DebugMessage {
                    mission_time,
                    message,
                }))
            }
            DataBlockSubtype::Altitude => {
                require(payload, 8, subtype)?;
                Ok(Self::Altitude(Altitude {
                    mission_time: cursor.get_u32_le(),
                    millimetres: cursor.get_i32_le(),
                }))
            }
            DataBlockSubtype::Temperature => {
                require(payload, 8, subtype)?;
                Ok(Self::Temperature(Temperature {
                    mission_time: cursor.get_u32_le(),
                    millidegrees: cursor.get_i32_le(),
                }))
            }
            DataBlockSubtype::Pressure => {
                require(payload, 8, subtype)?;
                Ok(Self::Pressure(Pressure {
                    mission_time: cursor.get_u32_le(),
                    pascals: cursor.get_u32_le(),
                }))
            }
            DataBlockSubtype::Humidity => {
                require(payload, 8, subtype)?;
                Ok(Self::Humidity(Humidity {
                    mission_time: cursor.get_u32_le(),
                    hundredths: cursor.get_u32_le(),
                }))
            }
            DataBlockSubtype::Acceleration | DataBlockSubtype::AngularVelocity => {
                require(payload, 12, subtype)?;
                let sample = InertialSample {
                    mission_time: cursor.get_u32_le(),
                    full_scale_range: cursor.get_u16_le(),
                    x: cursor.get_i16_le(),
                    y: cursor.get_i16_le(),
                    z: cursor.get_i16_le(),
                };
                if subtype == DataBlockSubtype::Acceleration {
                    Ok(Self::Acceleration(sample))
                } else {
                    Ok(Self::AngularVelocity(sample))
                }
            }
            DataBlockSubtype::GnssLocation => {
                require(payload, 32, subtype)?;
                Ok(Self::GnssLocation(GnssLocation {
                    fix_time: cursor.get_u32_le(),
                    latitude: cursor.get_i32_le(),
                    longitude: cursor.get_i32_le(),
                    utc_time: cursor.get_u32_le(),
                    altitude: cursor.get_i32_le(),
                    speed: cursor.get_i16_le(),
                    course: cursor.get_i16_le(),
                    pdop: cursor.get_u16_le(),
                    hdop: cursor.get_u16_le(),
                    vdop: cursor.get_u16_le(),
                    satellites: cursor.get_u8(),
                    fix_type: GnssFixType::from_byte(cursor.get_u8()),
                }))
            }
            DataBlockSubtype::Status => {
                require(payload, 16, subtype)?;
                let mission_time = cursor.get_u32_le();
                let states = cursor.get_u32_le();

                let kx134 = (states >> 16) & 0x7;
                let altimeter = (states >> 19) & 0x7;
                let imu = (states >> 22) & 0x7;
                let sd = (states >> 25) & 0x7;
                let deployment = (states >> 28) & 0xF;

                Ok(Self::Status(Status {
                    mission_time,
                    kx134_state: parse_state(SensorStatus::from_bits(kx134 as u8), "KX134", kx134)?,
                    altimeter_state: parse_state(
                        SensorStatus::from_bits(altimeter as u8),
                        "altimeter",
                        altimeter,
                    )?,
                    imu_state: parse_state(SensorStatus::from_bits(imu as u8), "IMU", imu)?,
                    sd_state: parse_state(SdCardStatus::from_bits(sd as u8), "SD card", sd)?,
                    deployment_state: parse_state(
                        DeploymentState::from_bits(deployment as u8),
                        "deployment",
                        deployment,
                    )?,
                    sd_blocks_recorded: cursor.get_u32_le(),
                    sd_checkouts_missed: cursor.get_u32_le(),
                }))
            }
            DataBlockSubtype::GnssMetadata => Err(BlockError::UnknownSubtype {
                kind: BlockKind::Data,
                subtype: subtype.into(),
            }),
        }
    }

    /// Encodes the block payload, zero padded to a multiple of 4 bytes.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(32);

        match self {
            Self::DebugMessage(m) => {
                buf.put_u32_le(m.mission_time);
                buf.put_slice(m.message.as_bytes());
            }
            Self::Altitude(a) => {
                buf.put_u32_le(a.mission_time);
                buf.put_i32_le(a.millimetres);
            }
            Self::Temperature(t) => {
                buf.put_u32_le(t.mission_time);
                buf.put_i32_le(t.millidegrees);
            }
            Self::Pressure(p) => {
                buf.put_u32_le(p.mission_time);
                buf.put_u32_le(p.pascals);
            }
            Self::Humidity(h) => {
                buf.put_u32_le(h.mission_time);
                buf.put_u32_le(h.hundredths);
            }
            Self::Acceleration(s) | Self::AngularVelocity(s) => {
                buf.put_u32_le(s.mission_time);
                buf.put_u16_le(s.full_scale_range);
                buf.put_i16_le(s.x);
                buf.put_i16_le(s.y);
                buf.put_i16_le(s.z);
            }
            Self::GnssLocation(g) => {
                buf.put_u32_le(g.fix_time);
                buf.put_i32_le(g.latitude);
                buf.put_i32_le(g.longitude);
                buf.put_u32_le(g.utc_time);
                buf.put_i32_le(g.altitude);
                buf.put_i16_le(g.speed);
                buf.put_i16_le(g.course);
                buf.put_u16_le(g.pdop);
                buf.put_u16_le(g.hdop);
                buf.put_u16_le(g.vdop);
                buf.put_u8(g.satellites);
                buf.put_u8(g.fix_type.to_byte());
            }
            Self::Status(s) => {
                buf.put_u32_le(s.mission_time);
                buf.put_u32_le(s.pack_states());
                buf.put_u32_le(s.sd_blocks_recorded);
                buf.put_u32_le(s.sd_checkouts_missed);
            }
        }

        buf.resize(padded_length(buf.len()), 0);
        buf.freeze()
    }

    /// The subtype tag of this block.
    #[must_use]
    pub const fn subtype(&self) -> DataBlockSubtype {
        match self {
            Self::DebugMessage(_) => DataBlockSubtype::DebugMessage,
            Self::Altitude(_) => DataBlockSubtype::Altitude,
            Self::Temperature(_) => DataBlockSubtype::Temperature,
            Self::Pressure(_) => DataBlockSubtype::Pressure,
            Self::Acceleration(_) => DataBlockSubtype::Acceleration,
            Self::AngularVelocity(_) => DataBlockSubtype::AngularVelocity,
            Self::GnssLocation(_) => DataBlockSubtype::GnssLocation,
            Self::Humidity(_) => DataBlockSubtype::Humidity,
            Self::Status(_) => DataBlockSubtype::Status,
        }
    }

    /// Telemetry key for this block.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.subtype().name()
    }

    /// Mission time of the measurement in milliseconds.
    #[must_use]
    pub const fn mission_time(&self) -> u32 {
        match self {
            Self::DebugMessage(m) => m.mission_time,
            Self::Altitude(a) => a.mission_time,
            Self::Temperature(t) => t.mission_time,
            Self::Pressure(p) => p.mission_time,
            Self::Acceleration(s) | Self::AngularVelocity(s) => s.mission_time,
            Self::GnssLocation(g) => g.fix_time,
            Self::Humidity(h) => h.mission_time,
            Self::Status(s) => s.mission_time,
        }
    }

    /// JSON form sent to the dashboard.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::DebugMessage(m) => json!({
                "mission_time": m.mission_time,
                "message": m.message,
            }),
            Self::Altitude(a) => json!({
                "mission_time": a.mission_time,
                "altitude": {
                    "metres": a.metres(),
                    "feet": round_to(metres_to_feet(a.metres()), 2),
                },
            }),
            Self::Temperature(t) => {
                let celsius = milli_degrees_to_celsius(t.millidegrees);
                json!({
                    "mission_time": t.mission_time,
                    "temperature": {
                        "millidegrees": t.millidegrees,
                        "celsius": celsius,
                        "fahrenheit": round_to(celsius_to_fahrenheit(celsius), 2),
                    },
                })
            }
            Self::Pressure(p) => json!({
                "mission_time": p.mission_time,
                "pressure": {
                    "pascals": p.pascals,
                    "psi": round_to(pascals_to_psi(p.pascals), 3),
                },
            }),
            Self::Humidity(h) => json!({
                "mission_time": h.mission_time,
                "percentage": h.percentage(),
            }),
            Self::Acceleration(s) | Self::AngularVelocity(s) => {
                let (x, y, z) = s.scaled();
                json!({
                    "mission_time": s.mission_time,
                    "fsr": s.full_scale_range,
                    "x_axis": round_to(x, 4),
                    "y_axis": round_to(y, 4),
                    "z_axis": round_to(z, 4),
                })
            }
            Self::GnssLocation(g) => json!({
                "mission_time": g.fix_time,
                "coords": {
                    "latitude": g.latitude_degrees(),
                    "longitude": g.longitude_degrees(),
                },
                "utc_time": g.utc_time,
                "altitude": { "mm": g.altitude },
                "speed": { "cent_knots": g.speed },
                "course": { "cent_degrees": g.course },
                "pdop": g.pdop,
                "hdop": g.hdop,
                "vdop": g.vdop,
                "num_sats": g.satellites,
                "fix_type": g.fix_type.name(),
            }),
            Self::Status(s) => json!({
                "mission_time": s.mission_time,
                "kx134_state": s.kx134_state.name(),
                "altimeter_state": s.altimeter_state.name(),
                "imu_state": s.imu_state.name(),
                "sd_driver_state": s.sd_state.name(),
                "deployment_state": s.deployment_state.name(),
                "blocks_recorded": s.sd_blocks_recorded,
                "checkouts_missed": s.sd_checkouts_missed,
            }),
        }
    }
}

impl fmt::Display for DataBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = self.mission_time();
        match self {
            Self::DebugMessage(m) => write!(f, "debug message -> time: {time} ms, message: {}", m.message),
            Self::Altitude(a) => write!(f, "altitude -> time: {time} ms, altitude: {} m", a.metres()),
            Self::Temperature(t) => write!(
                f,
                "temperature -> time: {time} ms, temperature: {} mC ({:.1}°C)",
                t.millidegrees,
                milli_degrees_to_celsius(t.millidegrees)
            ),
            Self::Pressure(p) => write!(f, "pressure -> time: {time} ms, pressure: {} Pa", p.pascals),
            Self::Humidity(h) => write!(f, "humidity -> time: {time} ms, humidity: {}%", h.percentage()),
            Self::Acceleration(s) | Self::AngularVelocity(s) => {
                let (x, y, z) = s.scaled();
                write!(
                    f,
                    "{} -> time: {time} ms, fsr: {}, x: {x:.3}, y: {y:.3}, z: {z:.3}",
                    self.name(),
                    s.full_scale_range
                )
            }
            Self::GnssLocation(g) => write!(
                f,
                "gnss location -> time: {time} ms, lat: {:.6}, lon: {:.6}, sats: {}, fix: {}",
                g.latitude_degrees(),
                g.longitude_degrees(),
                g.satellites,
                g.fix_type.name()
            ),
            Self::Status(s) => write!(
                f,
                "status -> time: {time} ms, kx134 state: {}, altimeter state: {}, IMU state: {}, \
                 SD driver state: {}, deployment state: {}, blocks recorded: {}, checkouts missed: {}",
                s.kx134_state.name(),
                s.altimeter_state.name(),
                s.imu_state.name(),
                s.sd_state.name(),
                s.deployment_state.name(),
                s.sd_blocks_recorded,
                s.sd_checkouts_missed
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_parse_altitude() {
        let data = [1000u32.to_le_bytes(), (-1500i32).to_le_bytes()].concat();
        let block = DataBlock::parse(DataBlockSubtype::Altitude, &data).unwrap();
        let DataBlock::Altitude(altitude) = block else {
            panic!("expected altitude");
        };
        assert_eq!(altitude.mission_time, 1000);
        assert!((altitude.metres() + 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_temperature_json() {
        let data = [20u32.to_le_bytes(), 21_500i32.to_le_bytes()].concat();
        let block = DataBlock::parse(DataBlockSubtype::Temperature, &data).unwrap();
        let json = block.to_json();
        assert_eq!(json["mission_time"], 20);
        assert_eq!(json["temperature"]["millidegrees"], 21_500);
        assert_eq!(json["temperature"]["celsius"], 21.5);
        assert_eq!(json["temperature"]["fahrenheit"], 70.7);
    }

    #[test]
    fn test_parse_pressure_and_humidity() {
        let block = DataBlock::parse(DataBlockSubtype::Pressure, &payload(&[5, 101_325])).unwrap();
        assert_eq!(
            block,
            DataBlock::Pressure(Pressure {
                mission_time: 5,
                pascals: 101_325
            })
        );

        let block = DataBlock::parse(DataBlockSubtype::Humidity, &payload(&[6, 4_250])).unwrap();
        assert_eq!(block.to_json()["percentage"], 42);

        let percent = |hundredths| Humidity { mission_time: 0, hundredths }.percentage();
        assert_eq!(percent(4_251), 43);
        assert_eq!(percent(4_350), 44);
        assert_eq!(percent(4_249), 42);
        assert_eq!(percent(0), 0);
    }

    #[test]
    fn test_parse_debug_message_strips_padding() {
        let mut data = 77u32.to_le_bytes().to_vec();
        data.extend_from_slice(b"hello\0\0\0");
        let block = DataBlock::parse(DataBlockSubtype::DebugMessage, &data).unwrap();
        assert_eq!(
            block,
            DataBlock::DebugMessage(DebugMessage {
                mission_time: 77,
                message: "hello".into()
            })
        );
    }

    #[test]
    fn test_parse_debug_message_invalid_utf8() {
        let mut data = 1u32.to_le_bytes().to_vec();
        data.extend_from_slice(&[0xFF, 0xFE, 0x00, 0x00]);
        let err = DataBlock::parse(DataBlockSubtype::DebugMessage, &data).unwrap_err();
        assert!(matches!(err, BlockError::Malformed { .. }));
    }

    #[test]
    fn test_parse_acceleration_scaling() {
        let mut data = 9u32.to_le_bytes().to_vec();
        data.extend_from_slice(&16u16.to_le_bytes());
        data.extend_from_slice(&16_384i16.to_le_bytes());
        data.extend_from_slice(&(-8_192i16).to_le_bytes());
        data.extend_from_slice(&0i16.to_le_bytes());

        let block = DataBlock::parse(DataBlockSubtype::Acceleration, &data).unwrap();
        let DataBlock::Acceleration(sample) = block else {
            panic!("expected acceleration");
        };
        let (x, y, z) = sample.scaled();
        assert!((x - 8.0).abs() < 1e-9);
        assert!((y + 4.0).abs() < 1e-9);
        assert!(z.abs() < 1e-9);

        let block = DataBlock::parse(DataBlockSubtype::AngularVelocity, &data).unwrap();
        assert_eq!(block.name(), "angular_velocity");
    }

    #[test]
    fn test_parse_status() {
        let states = (2u32 << 16) | (1 << 19) | (4 << 22) | (2 << 25) | (8 << 28);
        let block = DataBlock::parse(DataBlockSubtype::Status, &payload(&[100, states, 42, 3])).unwrap();
        let DataBlock::Status(status) = block else {
            panic!("expected status");
        };
        assert_eq!(status.kx134_state, SensorStatus::Running);
        assert_eq!(status.altimeter_state, SensorStatus::Initializing);
        assert_eq!(status.imu_state, SensorStatus::Failed);
        assert_eq!(status.sd_state, SdCardStatus::Ready);
        assert_eq!(status.deployment_state, DeploymentState::Recovery);
        assert_eq!(status.sd_blocks_recorded, 42);
        assert_eq!(status.sd_checkouts_missed, 3);

        let json = DataBlock::Status(status).to_json();
        assert_eq!(json["deployment_state"], "recovery");
        assert_eq!(json["imu_state"], "failed");
    }

    #[test]
    fn test_parse_status_invalid_state_is_malformed() {
        let states = 7u32 << 16;
        let err = DataBlock::parse(DataBlockSubtype::Status, &payload(&[0, states, 0, 0])).unwrap_err();
        assert_eq!(
            err,
            BlockError::Malformed {
                kind: BlockKind::Data,
                reason: "invalid KX134 state: 7".into()
            }
        );

        let states = 9u32 << 28;
        let err = DataBlock::parse(DataBlockSubtype::Status, &payload(&[0, states, 0, 0])).unwrap_err();
        assert!(!err.is_unknown());
    }

    #[test]
    fn test_short_payload_is_malformed() {
        let err = DataBlock::parse(DataBlockSubtype::Altitude, &[0, 0, 0]).unwrap_err();
        assert_eq!(
            err,
            BlockError::Malformed {
                kind: BlockKind::Data,
                reason: "altitude payload needs 8 bytes, got 3".into()
            }
        );
    }

    #[test]
    fn test_gnss_metadata_has_no_decoder() {
        let err = DataBlock::parse(DataBlockSubtype::GnssMetadata, &[0; 16]).unwrap_err();
        assert!(err.is_unknown());
    }

    #[test]
    fn test_gnss_location() {
        let location = GnssLocation {
            fix_time: 500,
            latitude: 27_000_000,
            longitude: -45_000_000,
            utc_time: 1_700_000_000,
            altitude: 120_000,
            speed: 250,
            course: 9_000,
            pdop: 120,
            hdop: 90,
            vdop: 80,
            satellites: 9,
            fix_type: GnssFixType::Fix3D,
        };
        let encoded = DataBlock::GnssLocation(location).encode();
        assert_eq!(encoded.len(), 32);

        let decoded = DataBlock::parse(DataBlockSubtype::GnssLocation, &encoded).unwrap();
        assert_eq!(decoded, DataBlock::GnssLocation(location));
        assert!((location.latitude_degrees() - 45.0).abs() < 1e-9);
        assert!((location.longitude_degrees() + 75.0).abs() < 1e-9);
        assert_eq!(decoded.to_json()["fix_type"], "3D fix");
    }

    #[test]
    fn test_encode_pads_debug_message() {
        let block = DataBlock::DebugMessage(DebugMessage {
            mission_time: 1,
            message: "abcde".into(),
        });
        let encoded = block.encode();
        assert_eq!(encoded.len(), 12);
        assert_eq!(&encoded[4..9], b"abcde");
        assert_eq!(&encoded[9..], &[0, 0, 0]);
    }

    #[test]
    fn test_encode_status_keeps_deployment_nibble() {
        let status = Status {
            mission_time: 1,
            kx134_state: SensorStatus::Running,
            altimeter_state: SensorStatus::Running,
            imu_state: SensorStatus::Running,
            sd_state: SdCardStatus::Ready,
            deployment_state: DeploymentState::Recovery,
            sd_blocks_recorded: 10,
            sd_checkouts_missed: 0,
        };
        let encoded = DataBlock::Status(status).encode();
        let decoded = DataBlock::parse(DataBlockSubtype::Status, &encoded).unwrap();
        assert_eq!(decoded, DataBlock::Status(status));
    }

    #[test]
    fn test_display() {
        let block = DataBlock::Pressure(Pressure {
            mission_time: 12,
            pascals: 90_000,
        });
        assert_eq!(block.to_string(), "pressure -> time: 12 ms, pressure: 90000 Pa");
    }
}
