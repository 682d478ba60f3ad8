//! Stepper actuators
//!
//! This module handles:
//! - Coil sequencing and open-loop rotation
//! - The enable/disable power lifecycle around motion
//! - The shared actuator registry and its stop signal
//! - The GPIO pin boundary and its simulated backend

mod pins;
mod registry;
mod stepper;
mod stop;

pub use pins::{EnableLine, PinRole, Polarity, SimPin, SimPinFault};
pub use registry::ActuatorRegistry;
pub use stepper::{
    phase_sequence, Actuator, ActuatorError, ActuatorId, Rotation, StepGeometry, PHASE_TABLE,
};
pub use stop::{StopSignal, StopToken, Stopped};
