//! Four-coil stepper actuator
//!
//! Open-loop: displacement is produced purely by walking the coil-energization
//! table at a fixed rate. `rotate` holds each phase for `step_delay`, so a
//! rotation takes `steps * 4 * step_delay` of wall-clock time.
//!
//! All hardware access goes through an async mutex, so two commands aimed at
//! the same actuator run one after the other instead of interleaving phases.

use super::pins::{EnableLine, PinRole, Polarity};
use super::stop::StopToken;
use armctl_shared::{ActuatorReport, Direction, PowerState};
use embedded_hal::digital::{Error as _, ErrorKind, OutputPin};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Full-step energization table, one row per phase
pub const PHASE_TABLE: [[bool; 4]; 4] = [
    [true, false, false, false],
    [false, true, false, false],
    [false, false, true, false],
    [false, false, false, true],
];

/// Stable actuator identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActuatorId {
    One,
    Two,
}

impl ActuatorId {
    pub fn number(self) -> u8 {
        match self {
            ActuatorId::One => 1,
            ActuatorId::Two => 2,
        }
    }
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Mechanical step geometry of a motor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepGeometry {
    pub degrees_per_step: f64,
}

impl Default for StepGeometry {
    fn default() -> Self {
        Self {
            degrees_per_step: 1.8,
        }
    }
}

impl StepGeometry {
    /// Full steps per shaft revolution (200 for a 1.8° motor)
    pub fn steps_per_revolution(&self) -> u32 {
        (360.0 / self.degrees_per_step).round() as u32
    }

    /// Table iterations needed for `angle` degrees:
    /// `round(angle / 360 * steps_per_revolution * table_len)`
    pub fn step_count(&self, angle: f64) -> u64 {
        let table_len = PHASE_TABLE.len() as f64;
        (angle / 360.0 * f64::from(self.steps_per_revolution()) * table_len).round() as u64
    }
}

/// Phase table in traversal order for `direction`
pub fn phase_sequence(direction: Direction) -> [[bool; 4]; 4] {
    let mut table = PHASE_TABLE;
    if direction == Direction::CounterClockwise {
        table.reverse();
    }
    table
}

/// Errors raised by actuator operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActuatorError {
    #[error("invalid angle {0}: must be a finite, non-negative number of degrees")]
    InvalidAngle(f64),

    #[error("write to {pin} pin failed: {kind:?}")]
    Pin { pin: PinRole, kind: ErrorKind },

    #[error("rotation stopped after {phases} phases")]
    Cancelled { phases: u64 },
}

/// What a completed rotation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    pub steps: u64,
    pub phases: u64,
}

struct Hardware<P> {
    coils: [P; 4],
    enable: EnableLine<P>,
}

impl<P: OutputPin> Hardware<P> {
    fn energize(&mut self, phase: &[bool; 4]) -> Result<(), ActuatorError> {
        for (i, (pin, on)) in self.coils.iter_mut().zip(phase).enumerate() {
            let written = if *on { pin.set_high() } else { pin.set_low() };
            written.map_err(|e| ActuatorError::Pin {
                pin: PinRole::Coil(i),
                kind: e.kind(),
            })?;
        }
        Ok(())
    }

    /// Drive every coil low. Attempts all four even if one fails.
    fn de_energize(&mut self) -> Result<(), ActuatorError> {
        let mut first_error = None;
        for (i, pin) in self.coils.iter_mut().enumerate() {
            if let Err(e) = pin.set_low() {
                first_error.get_or_insert(ActuatorError::Pin {
                    pin: PinRole::Coil(i),
                    kind: e.kind(),
                });
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), ActuatorError> {
        self.enable.set(enabled).map_err(|e| ActuatorError::Pin {
            pin: PinRole::Enable,
            kind: e.kind(),
        })
    }
}

/// Hardware held for one motion
///
/// If the motion future is dropped before [`MotionGuard::disarm`] (task abort,
/// runtime teardown) the coils are forced off, and when `power_down` is set the
/// driver is disabled as well.
struct MotionGuard<'a, P: OutputPin> {
    actuator: &'a Actuator<P>,
    hw: MutexGuard<'a, Hardware<P>>,
    power_down: bool,
    armed: bool,
}

impl<'a, P: OutputPin> MotionGuard<'a, P> {
    fn new(actuator: &'a Actuator<P>, hw: MutexGuard<'a, Hardware<P>>, power_down: bool) -> Self {
        Self {
            actuator,
            hw,
            power_down,
            armed: true,
        }
    }

    fn hw(&mut self) -> &mut Hardware<P> {
        &mut self.hw
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<P: OutputPin> Drop for MotionGuard<'_, P> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let id = self.actuator.id;
        warn!("[ACTUATOR {}] motion interrupted, forcing coils off", id);
        if let Err(e) = self.hw.de_energize() {
            warn!("[ACTUATOR {}] coil cleanup failed: {}", id, e);
        }
        if self.power_down {
            self.actuator.enabled.store(false, Ordering::SeqCst);
            if let Err(e) = self.hw.set_enabled(false) {
                warn!("[ACTUATOR {}] disable after interruption failed: {}", id, e);
            }
        }
    }
}

/// One stepper motor with its coil and enable pins
pub struct Actuator<P> {
    id: ActuatorId,
    geometry: StepGeometry,
    settle: Duration,
    hardware: Mutex<Hardware<P>>,
    enabled: AtomicBool,
    phase_counter: AtomicI64,
}

impl<P: OutputPin> Actuator<P> {
    /// Bind an actuator to its pins. Starts disabled with every coil off.
    pub fn new(
        id: ActuatorId,
        coils: [P; 4],
        enable: P,
        geometry: StepGeometry,
        settle: Duration,
    ) -> Result<Self, ActuatorError> {
        let mut hardware = Hardware {
            coils,
            enable: EnableLine::new(enable, Polarity::ActiveLow),
        };
        hardware.de_energize()?;
        hardware.set_enabled(false)?;

        Ok(Self {
            id,
            geometry,
            settle,
            hardware: Mutex::new(hardware),
            enabled: AtomicBool::new(false),
            phase_counter: AtomicI64::new(0),
        })
    }

    pub fn id(&self) -> ActuatorId {
        self.id
    }

    pub fn power_state(&self) -> PowerState {
        if self.enabled.load(Ordering::SeqCst) {
            PowerState::Enabled
        } else {
            PowerState::Disabled
        }
    }

    /// Net phase transitions since startup, clockwise positive
    pub fn phase_counter(&self) -> i64 {
        self.phase_counter.load(Ordering::SeqCst)
    }

    /// Index into [`PHASE_TABLE`] implied by the phase counter
    pub fn phase_index(&self) -> usize {
        self.phase_counter().rem_euclid(PHASE_TABLE.len() as i64) as usize
    }

    pub fn report(&self) -> ActuatorReport {
        ActuatorReport {
            id: self.id.number(),
            power: self.power_state(),
            phase_counter: self.phase_counter(),
        }
    }

    /// Power the driver, then wait for the gate to settle
    pub async fn enable(&self) -> Result<(), ActuatorError> {
        let mut hw = self.hardware.lock().await;
        self.enable_locked(&mut hw).await
    }

    /// Cut power. Coils are forced off first.
    pub async fn disable(&self) -> Result<(), ActuatorError> {
        let mut hw = self.hardware.lock().await;
        self.disable_locked(&mut hw)
    }

    /// Step through `angle` degrees without touching the power state
    pub async fn rotate(
        &self,
        angle: f64,
        direction: Direction,
        step_delay: Duration,
        stop: &StopToken,
    ) -> Result<Rotation, ActuatorError> {
        let steps = self.checked_steps(angle)?;
        let mut guard = MotionGuard::new(self, self.hardware.lock().await, false);
        let rotated = self
            .run_steps(guard.hw(), steps, direction, step_delay, stop)
            .await;
        guard.disarm();
        rotated
    }

    /// Enable, rotate, disable. The disable runs whatever the rotation outcome.
    pub async fn rotate_powered(
        &self,
        angle: f64,
        direction: Direction,
        step_delay: Duration,
        stop: &StopToken,
    ) -> Result<Rotation, ActuatorError> {
        let steps = self.checked_steps(angle)?;
        let mut guard = MotionGuard::new(self, self.hardware.lock().await, true);

        let rotated = match self.enable_locked(guard.hw()).await {
            Ok(()) => {
                self.run_steps(guard.hw(), steps, direction, step_delay, stop)
                    .await
            }
            Err(e) => Err(e),
        };
        let disabled = self.disable_locked(guard.hw());
        guard.disarm();

        let rotation = rotated?;
        disabled?;
        Ok(rotation)
    }

    fn checked_steps(&self, angle: f64) -> Result<u64, ActuatorError> {
        if !angle.is_finite() || angle < 0.0 {
            return Err(ActuatorError::InvalidAngle(angle));
        }
        Ok(self.geometry.step_count(angle))
    }

    async fn enable_locked(&self, hw: &mut Hardware<P>) -> Result<(), ActuatorError> {
        hw.set_enabled(true)?;
        self.enabled.store(true, Ordering::SeqCst);
        tokio::time::sleep(self.settle).await;
        debug!("[ACTUATOR {}] enabled", self.id);
        Ok(())
    }

    fn disable_locked(&self, hw: &mut Hardware<P>) -> Result<(), ActuatorError> {
        // Recorded as disabled even if a pin write fails below; the
        // controller must never believe a faulted motor is still powered.
        self.enabled.store(false, Ordering::SeqCst);
        let coils = hw.de_energize();
        hw.set_enabled(false)?;
        coils?;
        debug!("[ACTUATOR {}] disabled", self.id);
        Ok(())
    }

    async fn run_steps(
        &self,
        hw: &mut Hardware<P>,
        steps: u64,
        direction: Direction,
        step_delay: Duration,
        stop: &StopToken,
    ) -> Result<Rotation, ActuatorError> {
        debug!(
            "[ACTUATOR {}] rotating {} steps {}",
            self.id, steps, direction
        );

        let driven = self.drive(hw, steps, direction, step_delay, stop).await;
        let cleared = hw.de_energize();

        match (driven, cleared) {
            (Err(e), _) => {
                warn!("[ACTUATOR {}] rotation aborted: {}", self.id, e);
                Err(e)
            }
            (Ok(_), Err(e)) => Err(e),
            (Ok(phases), Ok(())) => Ok(Rotation { steps, phases }),
        }
    }

    async fn drive(
        &self,
        hw: &mut Hardware<P>,
        steps: u64,
        direction: Direction,
        step_delay: Duration,
        stop: &StopToken,
    ) -> Result<u64, ActuatorError> {
        let sequence = phase_sequence(direction);
        let delta = match direction {
            Direction::Clockwise => 1,
            Direction::CounterClockwise => -1,
        };

        let mut phases = 0;
        for _ in 0..steps {
            for phase in &sequence {
                if stop.is_stopped() {
                    return Err(ActuatorError::Cancelled { phases });
                }
                hw.energize(phase)?;
                self.phase_counter.fetch_add(delta, Ordering::SeqCst);
                phases += 1;
                tokio::time::sleep(step_delay).await;
            }
        }
        Ok(phases)
    }
}
