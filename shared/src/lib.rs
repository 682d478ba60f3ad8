//! Arm controller shared protocol types
//!
//! This crate provides the command vocabulary, acknowledgment payloads and
//! frame codec shared by the motor controller daemon and the remote sender.

pub mod ack;
pub mod codec;
pub mod command;

// Re-export commonly used types at crate root
pub use ack::{Ack, ActuatorReport, ErrorKind, PowerState};
pub use command::{
    Command, CommandError, CommandMessage, Direction, MotorField, PatternName, RawCommand, Target,
};

/// Protocol parameters shared by both ends of the link
pub mod protocol {
    /// Default TCP port the controller listens on
    pub const DEFAULT_PORT: u16 = 5000;

    /// Maximum payload size of a single frame (64 KiB)
    pub const MAX_FRAME_SIZE: u32 = 64 * 1024;

    /// Largest rotation accepted in a single command, in degrees (10 turns)
    pub const DEFAULT_MAX_ANGLE_DEG: f64 = 3600.0;
}
