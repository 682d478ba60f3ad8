//! Command execution for the controller
//!
//! This module handles:
//! - Mapping validated commands onto actuator operations
//! - Concurrent fan-out and join for two-actuator rotations
//! - The built-in motion patterns
//! - Classifying failures for the acknowledgment

mod dispatcher;
pub mod patterns;

pub use dispatcher::{DispatchError, DispatchSettings, Dispatcher, Motion, Outcome};
