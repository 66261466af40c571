//! Commands sent by dashboard clients over the WebSocket.
//!
//! Commands are space separated words, routed by their first word:
//!
//! ```text
//! serial rn2483_radio connect <port>     connect <port>
//! serial rn2483_radio disconnect         disconnect
//! serial update
//! telemetry update                       update
//! telemetry replay play <name...>
//! telemetry replay pause|resume|stop
//! telemetry replay speed <speed>
//! telemetry record start [name...]
//! telemetry record stop
//! command <command block>
//! ```
//!
//! The right column lists the short aliases.

use std::fmt;

use crate::error::CommandError;
use crate::protocol::CommandBlockSubtype;

/// Commands for the radio task.
#[derive(Debug, Clone, PartialEq)]
pub enum SerialCommand {
    /// Connect the RN2483 radio on a port.
    Connect(String),
    /// Disconnect the RN2483 radio.
    Disconnect,
    /// Refresh the list of serial ports.
    Update,
}

/// Replay controls.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayCommand {
    /// Play a recorded mission.
    Play(Option<String>),
    /// Pause playback.
    Pause,
    /// Resume at the last speed.
    Resume,
    /// Set the playback speed.
    Speed(f64),
    /// Stop playback and clear the dashboard.
    Stop,
}

/// Recording controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordCommand {
    /// Start recording, optionally under a name.
    Start(Option<String>),
    /// Stop recording.
    Stop,
}

/// Commands for the telemetry state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryCommand {
    /// Refresh the mission list and publish the state.
    Update,
    /// Replay control.
    Replay(ReplayCommand),
    /// Recording control.
    Record(RecordCommand),
}

/// A parsed WebSocket command.
#[derive(Debug, Clone, PartialEq)]
pub enum WsCommand {
    /// Radio and serial port control.
    Serial(SerialCommand),
    /// Telemetry control.
    Telemetry(TelemetryCommand),
    /// Transmit a command block to the rocket.
    Command(CommandBlockSubtype),
}

/// Joins the remaining words into a name, `None` if there are none.
fn joined(words: &[&str]) -> Option<String> {
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

impl WsCommand {
    /// Parses a command line.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] if the command is empty, unknown or has a
    /// missing or malformed argument.
    pub fn parse(input: &str) -> Result<Self, CommandError> {
        let mut words: Vec<&str> = input.split_whitespace().collect();

        let first = words.first().copied();
        match first {
            None => return Err(CommandError::Empty),
            Some("connect" | "disconnect") => words = [&["serial", "rn2483_radio"][..], &words[..]].concat(),
            Some("update") => words.insert(0, "telemetry"),
            Some(_) => {}
        }

        match words.as_slice() {
            ["serial", rest @ ..] => Self::parse_serial(rest).map(Self::Serial),
            ["telemetry", rest @ ..] => Self::parse_telemetry(rest).map(Self::Telemetry),
            ["command", name, ..] => CommandBlockSubtype::from_name(name)
                .map(Self::Command)
                .ok_or_else(|| CommandError::InvalidArgument {
                    command: "command",
                    value: (*name).to_string(),
                }),
            ["command"] => Err(CommandError::MissingArgument {
                command: "command",
                argument: "command name",
            }),
            _ => Err(CommandError::Unknown(words.join(" "))),
        }
    }

    fn parse_serial(words: &[&str]) -> Result<SerialCommand, CommandError> {
        match words {
            ["rn2483_radio", "connect", port, ..] => Ok(SerialCommand::Connect((*port).to_string())),
            ["rn2483_radio", "connect"] => Err(CommandError::MissingArgument {
                command: "connect",
                argument: "port",
            }),
            ["rn2483_radio", "disconnect", ..] => Ok(SerialCommand::Disconnect),
            ["update", ..] => Ok(SerialCommand::Update),
            _ => Err(CommandError::Unknown(format!("serial {}", words.join(" ")))),
        }
    }

    fn parse_telemetry(words: &[&str]) -> Result<TelemetryCommand, CommandError> {
        let command = match words {
            ["update", ..] => TelemetryCommand::Update,
            ["replay", "play", name @ ..] => TelemetryCommand::Replay(ReplayCommand::Play(joined(name))),
            ["replay", "pause", ..] => TelemetryCommand::Replay(ReplayCommand::Pause),
            ["replay", "resume", ..] => TelemetryCommand::Replay(ReplayCommand::Resume),
            ["replay", "stop", ..] => TelemetryCommand::Replay(ReplayCommand::Stop),
            ["replay", "speed", speed, ..] => {
                let speed = speed.parse().map_err(|_| CommandError::InvalidArgument {
                    command: "speed",
                    value: (*speed).to_string(),
                })?;
                TelemetryCommand::Replay(ReplayCommand::Speed(speed))
            }
            ["replay", "speed"] => {
                return Err(CommandError::MissingArgument {
                    command: "speed",
                    argument: "speed",
                });
            }
            ["record", "start", name @ ..] => TelemetryCommand::Record(RecordCommand::Start(joined(name))),
            ["record", "stop", ..] => TelemetryCommand::Record(RecordCommand::Stop),
            _ => return Err(CommandError::Unknown(format!("telemetry {}", words.join(" ")))),
        };
        Ok(command)
    }
}

impl fmt::Display for WsCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial(SerialCommand::Connect(port)) => write!(f, "serial rn2483_radio connect {port}"),
            Self::Serial(SerialCommand::Disconnect) => f.write_str("serial rn2483_radio disconnect"),
            Self::Serial(SerialCommand::Update) => f.write_str("serial update"),
            Self::Telemetry(TelemetryCommand::Update) => f.write_str("telemetry update"),
            Self::Telemetry(TelemetryCommand::Replay(replay)) => match replay {
                ReplayCommand::Play(Some(name)) => write!(f, "telemetry replay play {name}"),
                ReplayCommand::Play(None) => f.write_str("telemetry replay play"),
                ReplayCommand::Pause => f.write_str("telemetry replay pause"),
                ReplayCommand::Resume => f.write_str("telemetry replay resume"),
                ReplayCommand::Speed(speed) => write!(f, "telemetry replay speed {speed}"),
                ReplayCommand::Stop => f.write_str("telemetry replay stop"),
            },
            Self::Telemetry(TelemetryCommand::Record(RecordCommand::Start(Some(name)))) => {
                write!(f, "telemetry record start {name}")
            }
            Self::Telemetry(TelemetryCommand::Record(RecordCommand::Start(None))) => {
                f.write_str("telemetry record start")
            }
            Self::Telemetry(TelemetryCommand::Record(RecordCommand::Stop)) => {
                f.write_str("telemetry record stop")
            }
            Self::Command(subtype) => write!(f, "command {}", subtype.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        assert_eq!(
            WsCommand::parse("connect /dev/ttyUSB0").unwrap(),
            WsCommand::Serial(SerialCommand::Connect("/dev/ttyUSB0".into()))
        );
        assert_eq!(
            WsCommand::parse("disconnect").unwrap(),
            WsCommand::Serial(SerialCommand::Disconnect)
        );
        assert_eq!(
            WsCommand::parse("update").unwrap(),
            WsCommand::Telemetry(TelemetryCommand::Update)
        );
    }

    #[test]
    fn test_full_forms() {
        assert_eq!(
            WsCommand::parse("serial rn2483_radio connect COM3").unwrap(),
            WsCommand::Serial(SerialCommand::Connect("COM3".into()))
        );
        assert_eq!(
            WsCommand::parse("serial update").unwrap(),
            WsCommand::Serial(SerialCommand::Update)
        );
        assert_eq!(
            WsCommand::parse("telemetry replay pause").unwrap(),
            WsCommand::Telemetry(TelemetryCommand::Replay(ReplayCommand::Pause))
        );
        assert_eq!(
            WsCommand::parse("telemetry record stop").unwrap(),
            WsCommand::Telemetry(TelemetryCommand::Record(RecordCommand::Stop))
        );
    }

    #[test]
    fn test_names_keep_spaces() {
        assert_eq!(
            WsCommand::parse("telemetry replay play Launch Day 2").unwrap(),
            WsCommand::Telemetry(TelemetryCommand::Replay(ReplayCommand::Play(Some(
                "Launch Day 2".into()
            ))))
        );
        assert_eq!(
            WsCommand::parse("telemetry replay play").unwrap(),
            WsCommand::Telemetry(TelemetryCommand::Replay(ReplayCommand::Play(None)))
        );
        assert_eq!(
            WsCommand::parse("telemetry record start").unwrap(),
            WsCommand::Telemetry(TelemetryCommand::Record(RecordCommand::Start(None)))
        );
    }

    #[test]
    fn test_speed() {
        assert_eq!(
            WsCommand::parse("telemetry replay speed 2.5").unwrap(),
            WsCommand::Telemetry(TelemetryCommand::Replay(ReplayCommand::Speed(2.5)))
        );
        assert_eq!(
            WsCommand::parse("telemetry replay speed fast"),
            Err(CommandError::InvalidArgument {
                command: "speed",
                value: "fast".into()
            })
        );
        assert!(matches!(
            WsCommand::parse("telemetry replay speed"),
            Err(CommandError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_rocket_commands() {
        assert_eq!(
            WsCommand::parse("command deploy_parachute").unwrap(),
            WsCommand::Command(CommandBlockSubtype::DeployParachute)
        );
        assert!(matches!(
            WsCommand::parse("command launch"),
            Err(CommandError::InvalidArgument { .. })
        ));
        assert!(matches!(
            WsCommand::parse("command"),
            Err(CommandError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_invalid_commands() {
        assert_eq!(WsCommand::parse("   "), Err(CommandError::Empty));
        assert_eq!(
            WsCommand::parse("launch now"),
            Err(CommandError::Unknown("launch now".into()))
        );
        assert_eq!(
            WsCommand::parse("telemetry replay rewind"),
            Err(CommandError::Unknown("telemetry replay rewind".into()))
        );
        assert!(matches!(
            WsCommand::parse("connect"),
            Err(CommandError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_display_matches_parse() {
        for input in [
            "serial rn2483_radio connect /dev/ttyACM0",
            "telemetry replay play flight one",
            "telemetry replay speed 0.5",
            "telemetry record start",
            "command tare_sensors",
        ] {
            assert_eq!(WsCommand::parse(input).unwrap().to_string(), input);
        }
    }
}
