//! Networked controller for two stepper-motor actuators
//!
//! Commands arrive as length-prefixed JSON frames, are validated into typed
//! commands, and run against a shared pair of actuators. Rotations aimed at
//! both actuators run concurrently and are joined before the command is
//! acknowledged.

pub mod actuator;
pub mod command;
pub mod config;
pub mod session;
