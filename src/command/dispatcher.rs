//! Command dispatcher - runs validated commands against the actuator registry

use super::patterns;
use crate::actuator::{
    ActuatorError, ActuatorId, ActuatorRegistry, Rotation, StopToken, Stopped,
};
use crate::config::ControllerConfig;
use armctl_shared::{ActuatorReport, Command, Direction, ErrorKind, Target};
use embedded_hal::digital::OutputPin;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{debug, error, info};

/// Timing and limits applied to every dispatched command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchSettings {
    pub step_delay: Duration,
    pub max_angle_deg: f64,
}

impl From<&ControllerConfig> for DispatchSettings {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            step_delay: config.step_delay,
            max_angle_deg: config.max_angle_deg,
        }
    }
}

/// One actuator's share of a rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub angle: f64,
    pub direction: Direction,
}

impl Motion {
    pub const fn new(angle: f64, direction: Direction) -> Self {
        Self { angle, direction }
    }

    /// Same angle, opposite direction
    pub fn reversed(self) -> Self {
        Self::new(self.angle, self.direction.opposite())
    }
}

/// Successful result of a command
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed,
    Status(Vec<ActuatorReport>),
}

/// Failure while executing a command
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("actuator {id}: {source}")]
    Actuator { id: ActuatorId, source: ActuatorError },

    #[error("actuator {id} task ended abnormally: {reason}")]
    TaskFailed { id: ActuatorId, reason: String },

    #[error("pattern stopped")]
    Stopped,
}

impl From<Stopped> for DispatchError {
    fn from(_: Stopped) -> Self {
        DispatchError::Stopped
    }
}

impl DispatchError {
    /// Error class reported to the remote caller
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Stopped
            | DispatchError::Actuator {
                source: ActuatorError::Cancelled { .. },
                ..
            } => ErrorKind::Cancelled,
            DispatchError::Actuator {
                source: ActuatorError::InvalidAngle(_),
                ..
            } => ErrorKind::InvalidCommand,
            _ => ErrorKind::ExecutionFault,
        }
    }
}

/// Maps commands onto one or two actuator operations
pub struct Dispatcher<P> {
    registry: Arc<ActuatorRegistry<P>>,
    settings: DispatchSettings,
}

impl<P> Dispatcher<P>
where
    P: OutputPin + Send + 'static,
{
    pub fn new(registry: Arc<ActuatorRegistry<P>>, settings: DispatchSettings) -> Self {
        Self { registry, settings }
    }

    pub fn settings(&self) -> DispatchSettings {
        self.settings
    }

    pub fn registry(&self) -> &Arc<ActuatorRegistry<P>> {
        &self.registry
    }

    /// Execute a command. Returns only once every actuator operation it
    /// started has finished.
    pub async fn execute(&self, command: &Command) -> Result<Outcome, DispatchError> {
        let mut stop = self.registry.stop_token();

        match *command {
            Command::Rotate {
                target,
                angle,
                direction,
                mirror,
            } => {
                info!("[DISPATCH] Rotating {} {} degrees {}", target, angle, direction);
                let motion = Motion::new(angle, direction);
                match target {
                    Target::Actuator1 => self.rotate_one(ActuatorId::One, motion, &stop).await?,
                    Target::Actuator2 => self.rotate_one(ActuatorId::Two, motion, &stop).await?,
                    Target::Both => {
                        let second = if mirror { motion.reversed() } else { motion };
                        self.rotate_pair(motion, second, &stop).await?
                    }
                }
            }
            Command::Enable { target } => {
                self.set_power(target, true).await?;
                info!("[DISPATCH] {} enabled", target);
            }
            Command::Disable { target } => {
                self.set_power(target, false).await?;
                info!("[DISPATCH] {} disabled", target);
            }
            Command::Pattern { name } => patterns::run(self, name, &mut stop).await?,
            Command::Stop => {
                info!("[DISPATCH] Stop requested");
                self.registry.raise_stop();
            }
            Command::Status => return Ok(Outcome::Status(self.registry.reports())),
        }

        Ok(Outcome::Completed)
    }

    /// Rotate a single actuator on the calling task
    pub async fn rotate_one(
        &self,
        id: ActuatorId,
        motion: Motion,
        stop: &StopToken,
    ) -> Result<(), DispatchError> {
        let rotation = self
            .registry
            .get(id)
            .rotate_powered(motion.angle, motion.direction, self.settings.step_delay, stop)
            .await
            .map_err(|source| DispatchError::Actuator { id, source })?;
        log_rotation(id, rotation);
        Ok(())
    }

    /// Rotate both actuators concurrently and wait for both
    ///
    /// Each actuator runs on its own task. Both tasks are always joined, so
    /// a failure on one side never cuts the other short; the first error (in
    /// id order) is returned afterwards.
    pub async fn rotate_pair(
        &self,
        first: Motion,
        second: Motion,
        stop: &StopToken,
    ) -> Result<(), DispatchError> {
        let spawn = |id: ActuatorId, motion: Motion| {
            let actuator = Arc::clone(self.registry.get(id));
            let step_delay = self.settings.step_delay;
            let stop = stop.clone();
            tokio::spawn(async move {
                actuator
                    .rotate_powered(motion.angle, motion.direction, step_delay, &stop)
                    .await
            })
        };

        let (joined_first, joined_second) = tokio::join!(
            spawn(ActuatorId::One, first),
            spawn(ActuatorId::Two, second),
        );

        let first = self.settle_task(ActuatorId::One, joined_first).await;
        let second = self.settle_task(ActuatorId::Two, joined_second).await;
        first.and(second)
    }

    async fn settle_task(
        &self,
        id: ActuatorId,
        joined: Result<Result<Rotation, ActuatorError>, JoinError>,
    ) -> Result<(), DispatchError> {
        match joined {
            Ok(Ok(rotation)) => {
                log_rotation(id, rotation);
                Ok(())
            }
            Ok(Err(source)) => Err(DispatchError::Actuator { id, source }),
            Err(e) => {
                error!("[DISPATCH] Actuator {} task failed: {}", id, e);
                // The task died holding the coils in an unknown state
                if let Err(cleanup) = self.registry.get(id).disable().await {
                    error!("[DISPATCH] Cleanup of actuator {} failed: {}", id, cleanup);
                }
                Err(DispatchError::TaskFailed {
                    id,
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn set_power(&self, target: Target, enabled: bool) -> Result<(), DispatchError> {
        let results = join_all(self.registry.select(target).into_iter().map(|actuator| async move {
            let result = if enabled {
                actuator.enable().await
            } else {
                actuator.disable().await
            };
            result.map_err(|source| DispatchError::Actuator {
                id: actuator.id(),
                source,
            })
        }))
        .await;

        results.into_iter().collect()
    }
}

fn log_rotation(id: ActuatorId, rotation: Rotation) {
    debug!(
        "[DISPATCH] Actuator {} finished: {} steps, {} phases",
        id, rotation.steps, rotation.phases
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::SimPin;
    use armctl_shared::{PatternName, PowerState};
    use std::collections::HashMap;
    use tokio::time::Instant;

    const STEP_DELAY: Duration = Duration::from_millis(10);

    struct Bench {
        dispatcher: Dispatcher<SimPin>,
        pins: HashMap<u8, SimPin>,
    }

    impl Bench {
        fn new() -> Self {
            Self::with_pins(SimPin::new)
        }

        fn with_pins(mut make: impl FnMut(u8) -> SimPin) -> Self {
            let config = ControllerConfig::default();
            let mut pins = HashMap::new();
            let registry = ActuatorRegistry::from_config(&config, |bcm| {
                let pin = make(bcm);
                pins.insert(bcm, pin.clone());
                pin
            })
            .expect("registry");

            Self {
                dispatcher: Dispatcher::new(Arc::new(registry), DispatchSettings::from(&config)),
                pins,
            }
        }

        fn coils_off(&self) -> bool {
            let config = ControllerConfig::default();
            config
                .actuator1
                .coils
                .iter()
                .chain(config.actuator2.coils.iter())
                .all(|bcm| !self.pins[bcm].is_high())
        }

        fn phase_counters(&self) -> (i64, i64) {
            let registry = self.dispatcher.registry();
            (
                registry.get(ActuatorId::One).phase_counter(),
                registry.get(ActuatorId::Two).phase_counter(),
            )
        }
    }

    fn rotate(target: Target, angle: f64, direction: Direction, mirror: bool) -> Command {
        Command::Rotate {
            target,
            angle,
            direction,
            mirror,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_target_rotation() {
        let bench = Bench::new();

        let outcome = bench
            .dispatcher
            .execute(&rotate(Target::Actuator2, 9.0, Direction::CounterClockwise, false))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(bench.phase_counters(), (0, -80));
        assert!(bench.coils_off());
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_runs_concurrently_and_joins() {
        let bench = Bench::new();
        let single = STEP_DELAY * 200 * 4;

        let start = Instant::now();
        bench
            .dispatcher
            .execute(&rotate(Target::Both, 90.0, Direction::Clockwise, false))
            .await
            .unwrap();
        let elapsed = start.elapsed();

        // Not before the slower side finished, and not the sum of both
        assert!(elapsed >= single);
        assert!(elapsed < single * 2);
        assert_eq!(bench.phase_counters(), (800, 800));
        assert!(bench.coils_off());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mirror_reverses_second_actuator() {
        let bench = Bench::new();

        bench
            .dispatcher
            .execute(&rotate(Target::Both, 1.8, Direction::Clockwise, true))
            .await
            .unwrap();

        assert_eq!(bench.phase_counters(), (16, -16));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_on_one_side_lets_other_finish() {
        // Actuator 1, coil 2 fails early
        let bench = Bench::with_pins(|bcm| {
            if bcm == 24 {
                SimPin::failing_after(bcm, 2)
            } else {
                SimPin::new(bcm)
            }
        });

        let result = bench
            .dispatcher
            .execute(&rotate(Target::Both, 9.0, Direction::Clockwise, false))
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, DispatchError::Actuator { id: ActuatorId::One, .. }));
        assert_eq!(err.kind(), ErrorKind::ExecutionFault);
        // Actuator 2 completed its full rotation
        assert_eq!(bench.phase_counters().1, 80);
        assert!(bench.coils_off());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_disable_both() {
        let bench = Bench::new();
        let registry = bench.dispatcher.registry().clone();

        bench
            .dispatcher
            .execute(&Command::Enable { target: Target::Both })
            .await
            .unwrap();
        assert!(registry.reports().iter().all(|r| r.power == PowerState::Enabled));

        bench
            .dispatcher
            .execute(&Command::Disable { target: Target::Actuator1 })
            .await
            .unwrap();
        assert_eq!(registry.get(ActuatorId::One).power_state(), PowerState::Disabled);
        assert_eq!(registry.get(ActuatorId::Two).power_state(), PowerState::Enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reports_both() {
        let bench = Bench::new();
        let outcome = bench.dispatcher.execute(&Command::Status).await.unwrap();

        match outcome {
            Outcome::Status(reports) => {
                assert_eq!(reports.len(), 2);
                assert_eq!(reports[0].id, 1);
                assert_eq!(reports[1].id, 2);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_in_flight_rotation() {
        let bench = Arc::new(Bench::new());

        let runner = bench.clone();
        let rotation = tokio::spawn(async move {
            runner
                .dispatcher
                .execute(&rotate(Target::Both, 360.0, Direction::Clockwise, false))
                .await
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        bench.dispatcher.execute(&Command::Stop).await.unwrap();

        let err = rotation.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(bench.coils_off());

        // A command issued after the stop runs normally
        bench
            .dispatcher
            .execute(&rotate(Target::Actuator1, 1.8, Direction::Clockwise, false))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pattern_dispatch() {
        let bench = Bench::new();
        bench
            .dispatcher
            .execute(&Command::Pattern {
                name: PatternName::Default,
            })
            .await
            .unwrap();
        assert_eq!(bench.phase_counters(), (0, 0));
    }
}
