//! Command vocabulary and validation
//!
//! A [`CommandMessage`] is the loosely typed key/value payload that travels on
//! the wire. Incoming frames are decoded as a [`RawCommand`], any JSON object,
//! so a known key holding a value of the wrong type is refused as an invalid
//! command instead of failing the decode. [`CommandMessage::validate`] turns a
//! message into an immutable, fully typed [`Command`] or explains why it was
//! refused. Optional keys fall back
//! to their documented defaults; anything that is present but unrecognized is
//! rejected rather than guessed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Which actuator(s) a command applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Actuator1,
    Actuator2,
    Both,
}

impl Target {
    fn as_wire(self) -> &'static str {
        match self {
            Target::Actuator1 => "1",
            Target::Actuator2 => "2",
            Target::Both => "both",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Actuator1 => write!(f, "motor 1"),
            Target::Actuator2 => write!(f, "motor 2"),
            Target::Both => write!(f, "both motors"),
        }
    }
}

/// Rotation direction, seen from the motor shaft
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

impl Direction {
    /// The direction that undoes this one
    pub fn opposite(self) -> Self {
        match self {
            Direction::Clockwise => Direction::CounterClockwise,
            Direction::CounterClockwise => Direction::Clockwise,
        }
    }

    fn as_wire(self) -> &'static str {
        match self {
            Direction::Clockwise => "clockwise",
            Direction::CounterClockwise => "counterclockwise",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Built-in choreographies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternName {
    Default,
    Alternate,
}

impl PatternName {
    fn as_wire(self) -> &'static str {
        match self {
            PatternName::Default => "default",
            PatternName::Alternate => "alternate",
        }
    }
}

impl fmt::Display for PatternName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// A validated command. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Rotate one or both actuators by `angle` degrees.
    ///
    /// With `target = Both`, actuator 2 turns in `direction` as well unless
    /// `mirror` is set, in which case it turns the opposite way.
    Rotate {
        target: Target,
        angle: f64,
        direction: Direction,
        mirror: bool,
    },
    Enable {
        target: Target,
    },
    Disable {
        target: Target,
    },
    Pattern {
        name: PatternName,
    },
    /// Cancel every rotation and pattern that is in flight
    Stop,
    /// Report power state and phase counters of both actuators
    Status,
}

impl Command {
    /// Short action name, as used on the wire
    pub fn action(&self) -> &'static str {
        match self {
            Command::Rotate { .. } => "rotate",
            Command::Enable { .. } => "enable",
            Command::Disable { .. } => "disable",
            Command::Pattern { .. } => "pattern",
            Command::Stop => "stop",
            Command::Status => "status",
        }
    }

    /// Build the wire message for this command
    pub fn to_message(&self) -> CommandMessage {
        let mut message = CommandMessage {
            action: Some(self.action().to_string()),
            ..Default::default()
        };

        match *self {
            Command::Rotate {
                target,
                angle,
                direction,
                mirror,
            } => {
                message.motor = Some(MotorField::Text(target.as_wire().into()));
                message.angle = Some(angle);
                message.direction = Some(direction.as_wire().into());
                if mirror {
                    message.mirror = Some(true);
                }
            }
            Command::Enable { target } | Command::Disable { target } => {
                message.motor = Some(MotorField::Text(target.as_wire().into()));
            }
            Command::Pattern { name } => {
                message.pattern = Some(name.as_wire().into());
            }
            Command::Stop | Command::Status => {}
        }

        message
    }
}

/// The `motor` key accepts either a string or a bare integer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MotorField {
    Number(u64),
    Text(String),
}

impl fmt::Display for MotorField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorField::Number(n) => write!(f, "{}", n),
            MotorField::Text(s) => f.write_str(s),
        }
    }
}

/// Raw command payload as it appears on the wire
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motor: Option<MotorField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror: Option<bool>,
}

/// Reasons a decodable message is refused
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("missing \"action\" key")]
    MissingAction,

    #[error("unknown action: {0:?}")]
    UnknownAction(String),

    #[error("unknown motor: {0:?} (expected \"1\", \"2\" or \"both\")")]
    UnknownTarget(String),

    #[error("unknown direction: {0:?} (expected \"clockwise\" or \"counterclockwise\")")]
    UnknownDirection(String),

    #[error("unknown pattern type: {0:?} (expected \"default\" or \"alternate\")")]
    UnknownPattern(String),

    #[error("invalid angle {angle}: must be between 0 and {max} degrees")]
    InvalidAngle { angle: f64, max: f64 },

    #[error("invalid value for {key:?}: expected {expected}")]
    InvalidField {
        key: &'static str,
        expected: &'static str,
    },
}

/// A decoded JSON object whose fields have not been type-checked yet
#[derive(Debug, Clone, PartialEq)]
pub struct RawCommand(Map<String, Value>);

impl RawCommand {
    /// Decode a JSON payload. Fails only when the payload is not a JSON object.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload).map(RawCommand)
    }

    /// Type-check the known keys. Unknown keys are ignored.
    pub fn to_message(&self) -> Result<CommandMessage, CommandError> {
        Ok(CommandMessage {
            action: self.field("action", "a string")?,
            motor: self.field("motor", "\"1\", \"2\", \"both\" or an integer")?,
            angle: self.field("angle", "a number")?,
            direction: self.field("direction", "a string")?,
            pattern: self.field("type", "a string")?,
            mirror: self.field("mirror", "a boolean")?,
        })
    }

    pub fn validate(&self, max_angle_deg: f64) -> Result<Command, CommandError> {
        self.to_message()?.validate(max_angle_deg)
    }

    fn field<T: DeserializeOwned>(
        &self,
        key: &'static str,
        expected: &'static str,
    ) -> Result<Option<T>, CommandError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|_| CommandError::InvalidField { key, expected }),
        }
    }
}

impl CommandMessage {
    /// Validate this message into a [`Command`], refusing angles above `max_angle_deg`
    pub fn validate(&self, max_angle_deg: f64) -> Result<Command, CommandError> {
        let action = self.action.as_deref().ok_or(CommandError::MissingAction)?;

        match action {
            "rotate" => {
                let angle = self.angle.unwrap_or(0.0);
                if !angle.is_finite() || angle < 0.0 || angle > max_angle_deg {
                    return Err(CommandError::InvalidAngle {
                        angle,
                        max: max_angle_deg,
                    });
                }
                Ok(Command::Rotate {
                    target: self.target()?,
                    angle,
                    direction: self.direction()?,
                    mirror: self.mirror.unwrap_or(false),
                })
            }
            "enable" => Ok(Command::Enable {
                target: self.target()?,
            }),
            "disable" => Ok(Command::Disable {
                target: self.target()?,
            }),
            "pattern" => {
                let name = match self.pattern.as_deref().unwrap_or("default") {
                    "default" => PatternName::Default,
                    "alternate" => PatternName::Alternate,
                    other => return Err(CommandError::UnknownPattern(other.into())),
                };
                Ok(Command::Pattern { name })
            }
            "stop" => Ok(Command::Stop),
            "status" => Ok(Command::Status),
            other => Err(CommandError::UnknownAction(other.into())),
        }
    }

    fn target(&self) -> Result<Target, CommandError> {
        match &self.motor {
            None => Ok(Target::Both),
            Some(MotorField::Number(1)) => Ok(Target::Actuator1),
            Some(MotorField::Number(2)) => Ok(Target::Actuator2),
            Some(MotorField::Text(s)) if s == "1" => Ok(Target::Actuator1),
            Some(MotorField::Text(s)) if s == "2" => Ok(Target::Actuator2),
            Some(MotorField::Text(s)) if s == "both" => Ok(Target::Both),
            Some(other) => Err(CommandError::UnknownTarget(other.to_string())),
        }
    }

    fn direction(&self) -> Result<Direction, CommandError> {
        match self.direction.as_deref().unwrap_or("clockwise") {
            "clockwise" => Ok(Direction::Clockwise),
            "counterclockwise" => Ok(Direction::CounterClockwise),
            other => Err(CommandError::UnknownDirection(other.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: f64 = 3600.0;

    fn parse(json: &str) -> Result<Command, CommandError> {
        RawCommand::decode(json.as_bytes())
            .expect("decode failed")
            .validate(MAX)
    }

    #[test]
    fn test_rotate_defaults() {
        let cmd = parse(r#"{"action":"rotate"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::Rotate {
                target: Target::Both,
                angle: 0.0,
                direction: Direction::Clockwise,
                mirror: false,
            }
        );
    }

    #[test]
    fn test_rotate_single_motor() {
        let cmd = parse(r#"{"action":"rotate","motor":"2","angle":90,"direction":"counterclockwise"}"#)
            .unwrap();
        assert_eq!(
            cmd,
            Command::Rotate {
                target: Target::Actuator2,
                angle: 90.0,
                direction: Direction::CounterClockwise,
                mirror: false,
            }
        );
    }

    #[test]
    fn test_numeric_motor_id() {
        let cmd = parse(r#"{"action":"enable","motor":1}"#).unwrap();
        assert_eq!(cmd, Command::Enable { target: Target::Actuator1 });
    }

    #[test]
    fn test_pattern_defaults_to_default() {
        let cmd = parse(r#"{"action":"pattern"}"#).unwrap();
        assert_eq!(cmd, Command::Pattern { name: PatternName::Default });

        let cmd = parse(r#"{"action":"pattern","type":"alternate"}"#).unwrap();
        assert_eq!(cmd, Command::Pattern { name: PatternName::Alternate });
    }

    #[test]
    fn test_unknown_values_rejected() {
        assert_eq!(
            parse(r#"{"action":"spin"}"#),
            Err(CommandError::UnknownAction("spin".into()))
        );
        assert_eq!(
            parse(r#"{"action":"disable","motor":"3"}"#),
            Err(CommandError::UnknownTarget("3".into()))
        );
        assert_eq!(
            parse(r#"{"action":"rotate","angle":5,"direction":"left"}"#),
            Err(CommandError::UnknownDirection("left".into()))
        );
        assert_eq!(
            parse(r#"{"action":"pattern","type":"zigzag"}"#),
            Err(CommandError::UnknownPattern("zigzag".into()))
        );
        assert_eq!(parse(r#"{"motor":"1"}"#), Err(CommandError::MissingAction));
    }

    #[test]
    fn test_angle_bounds() {
        assert!(matches!(
            parse(r#"{"action":"rotate","angle":-5}"#),
            Err(CommandError::InvalidAngle { .. })
        ));
        assert!(matches!(
            parse(r#"{"action":"rotate","angle":3600.5}"#),
            Err(CommandError::InvalidAngle { .. })
        ));
        assert!(parse(r#"{"action":"rotate","angle":3600}"#).is_ok());
    }

    #[test]
    fn test_malformed_payloads_fail_decode() {
        assert!(RawCommand::decode(b"not json").is_err());
        assert!(RawCommand::decode(b"42").is_err());
        assert!(RawCommand::decode(b"[\"rotate\"]").is_err());
    }

    #[test]
    fn test_wrongly_typed_fields_rejected() {
        assert_eq!(
            parse(r#"{"action":"rotate","angle":"ninety"}"#),
            Err(CommandError::InvalidField {
                key: "angle",
                expected: "a number"
            })
        );
        assert!(matches!(
            parse(r#"{"action":"rotate","motor":"1","angle":"90"}"#),
            Err(CommandError::InvalidField { key: "angle", .. })
        ));
        assert!(matches!(
            parse(r#"{"action":"enable","motor":1.0}"#),
            Err(CommandError::InvalidField { key: "motor", .. })
        ));
        assert!(matches!(
            parse(r#"{"action":"rotate","mirror":"yes"}"#),
            Err(CommandError::InvalidField { key: "mirror", .. })
        ));
        assert!(matches!(
            parse(r#"{"action":7}"#),
            Err(CommandError::InvalidField { key: "action", .. })
        ));
    }

    #[test]
    fn test_null_and_unknown_keys_ignored() {
        let cmd = parse(r#"{"action":"enable","motor":null,"speed":"fast"}"#).unwrap();
        assert_eq!(cmd, Command::Enable { target: Target::Both });
    }

    #[test]
    fn test_mirror_flag() {
        let cmd = parse(r#"{"action":"rotate","angle":10,"mirror":true}"#).unwrap();
        assert!(matches!(cmd, Command::Rotate { mirror: true, .. }));
    }

    #[test]
    fn test_to_message_validates_back() {
        let original = Command::Disable { target: Target::Both };
        let message = original.to_message();
        assert_eq!(message.validate(MAX), Ok(original));
    }
}
