//! Acknowledgment payloads
//!
//! Every dispatched command is answered with exactly one [`Ack`]:
//!
//! ```text
//! { "status": "ok" }
//! { "status": "error", "kind": "invalid_command", "message": "..." }
//! ```

use serde::{Deserialize, Serialize};

/// Power state of one actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    Disabled,
    Enabled,
}

/// Snapshot of one actuator, reported by the `status` command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorReport {
    pub id: u8,
    pub power: PowerState,
    /// Net phase transitions since startup (clockwise positive)
    pub phase_counter: i64,
}

/// Failure classes a caller can tell apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The command was understood but refused (unknown value, bad angle)
    InvalidCommand,
    /// The command started but an actuator operation failed
    ExecutionFault,
    /// The command was interrupted by a stop request
    Cancelled,
}

/// Tagged command result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Ack {
    Ok {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        actuators: Vec<ActuatorReport>,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl Ack {
    /// Plain success acknowledgment
    pub fn ok() -> Self {
        Ack::Ok {
            actuators: Vec::new(),
        }
    }

    /// Success acknowledgment carrying actuator snapshots
    pub fn status(actuators: Vec<ActuatorReport>) -> Self {
        Ack::Ok { actuators }
    }

    /// Failure acknowledgment
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Ack::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Ack::Ok { .. })
    }
}
