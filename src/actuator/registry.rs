//! Process-wide actuator set
//!
//! Built once at startup and shared by reference with every session. Sessions
//! never create or destroy actuators.

use super::stepper::{Actuator, ActuatorError, ActuatorId};
use super::stop::{StopSignal, StopToken};
use crate::config::ControllerConfig;
use armctl_shared::{ActuatorReport, Target};
use embedded_hal::digital::OutputPin;
use std::sync::Arc;
use tracing::{error, info};

pub struct ActuatorRegistry<P> {
    first: Arc<Actuator<P>>,
    second: Arc<Actuator<P>>,
    stop: StopSignal,
}

impl<P: OutputPin> ActuatorRegistry<P> {
    pub fn new(first: Actuator<P>, second: Actuator<P>) -> Self {
        Self {
            first: Arc::new(first),
            second: Arc::new(second),
            stop: StopSignal::new(),
        }
    }

    /// Build both actuators from the configured pin numbers
    pub fn from_config(
        config: &ControllerConfig,
        mut make_pin: impl FnMut(u8) -> P,
    ) -> Result<Self, ActuatorError> {
        let mut build = |id, pins: &crate::config::ActuatorPins| {
            Actuator::new(
                id,
                pins.coils.map(&mut make_pin),
                make_pin(pins.enable),
                config.geometry,
                config.enable_settle,
            )
        };

        let first = build(ActuatorId::One, &config.actuator1)?;
        let second = build(ActuatorId::Two, &config.actuator2)?;
        Ok(Self::new(first, second))
    }

    pub fn get(&self, id: ActuatorId) -> &Arc<Actuator<P>> {
        match id {
            ActuatorId::One => &self.first,
            ActuatorId::Two => &self.second,
        }
    }

    /// Actuators addressed by `target`, in id order
    pub fn select(&self, target: Target) -> Vec<&Arc<Actuator<P>>> {
        match target {
            Target::Actuator1 => vec![&self.first],
            Target::Actuator2 => vec![&self.second],
            Target::Both => vec![&self.first, &self.second],
        }
    }

    /// Token for a command about to start
    pub fn stop_token(&self) -> StopToken {
        self.stop.token()
    }

    /// Interrupt every command currently in flight
    pub fn raise_stop(&self) {
        self.stop.raise();
    }

    pub fn reports(&self) -> Vec<ActuatorReport> {
        vec![self.first.report(), self.second.report()]
    }

    /// Stop all motion and cut power to both actuators
    pub async fn shutdown(&self) {
        self.raise_stop();
        for actuator in [&self.first, &self.second] {
            match actuator.disable().await {
                Ok(()) => info!("[SHUTDOWN] Actuator {} disabled", actuator.id()),
                Err(e) => error!("[SHUTDOWN] Failed to disable actuator {}: {}", actuator.id(), e),
            }
        }
    }
}
