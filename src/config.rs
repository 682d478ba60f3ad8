//! Controller configuration

use crate::actuator::StepGeometry;
use armctl_shared::protocol;
use std::time::Duration;

/// Environment variable overriding the listen address
pub const LISTEN_ENV: &str = "ARMCTL_LISTEN";

/// BCM pin numbers for one actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorPins {
    /// Coil pins in phase-table order
    pub coils: [u8; 4],
    /// Active-low driver enable
    pub enable: u8,
}

/// Configuration for the controller daemon
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Address the command listener binds to
    pub listen_addr: String,
    /// Hold time per phase; sets the rotation speed
    pub step_delay: Duration,
    /// Settle time after raising the enable line
    pub enable_settle: Duration,
    /// Largest angle a single command may request
    pub max_angle_deg: f64,
    /// Motor step geometry (shared by both actuators)
    pub geometry: StepGeometry,
    pub actuator1: ActuatorPins,
    pub actuator2: ActuatorPins,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{}", protocol::DEFAULT_PORT),
            step_delay: Duration::from_millis(10),
            enable_settle: Duration::from_millis(10),
            max_angle_deg: protocol::DEFAULT_MAX_ANGLE_DEG,
            geometry: StepGeometry::default(),
            actuator1: ActuatorPins {
                coils: [23, 24, 27, 22],
                enable: 18,
            },
            actuator2: ActuatorPins {
                coils: [5, 6, 16, 17],
                enable: 12,
            },
        }
    }
}

impl ControllerConfig {
    /// Apply listen address overrides; a CLI argument wins over the environment
    pub fn with_listen_override(mut self, env: Option<String>, arg: Option<String>) -> Self {
        if let Some(addr) = arg.or(env).filter(|a| !a.trim().is_empty()) {
            self.listen_addr = addr;
        }
        self
    }
}
