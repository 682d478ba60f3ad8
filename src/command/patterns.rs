//! Built-in choreographies
//!
//! Each pattern is a fixed script of rotations and pauses. The values are
//! literal and must not change: remote callers rely on the exact motion.

use super::dispatcher::{DispatchError, Dispatcher, Motion};
use crate::actuator::{ActuatorId, StopToken};
use armctl_shared::{Direction::*, PatternName};
use embedded_hal::digital::OutputPin;
use std::time::Duration;
use tracing::info;

/// One line of a pattern script
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Rotate one actuator on the calling task
    Single(ActuatorId, Motion),
    /// Rotate both actuators concurrently, then join
    Pair(Motion, Motion),
    /// Interruptible pause
    Pause(Duration),
}

/// Out 5° in opposite directions, hold, then back
pub const DEFAULT: &[Step] = &[
    Step::Pair(Motion::new(5.0, Clockwise), Motion::new(5.0, CounterClockwise)),
    Step::Pause(Duration::from_secs(1)),
    Step::Pair(Motion::new(5.0, CounterClockwise), Motion::new(5.0, Clockwise)),
];

/// Each actuator 90° in turn, then both nudge back together
pub const ALTERNATE: &[Step] = &[
    Step::Single(ActuatorId::One, Motion::new(90.0, Clockwise)),
    Step::Pause(Duration::from_millis(500)),
    Step::Single(ActuatorId::Two, Motion::new(90.0, Clockwise)),
    Step::Pause(Duration::from_secs(1)),
    Step::Pair(Motion::new(5.0, CounterClockwise), Motion::new(5.0, CounterClockwise)),
];

pub fn script(name: PatternName) -> &'static [Step] {
    match name {
        PatternName::Default => DEFAULT,
        PatternName::Alternate => ALTERNATE,
    }
}

/// Run a pattern to completion as one logical command
pub async fn run<P>(
    dispatcher: &Dispatcher<P>,
    name: PatternName,
    stop: &mut StopToken,
) -> Result<(), DispatchError>
where
    P: OutputPin + Send + 'static,
{
    info!("[PATTERN] Running {} pattern", name);

    for step in script(name) {
        match *step {
            Step::Single(id, motion) => dispatcher.rotate_one(id, motion, stop).await?,
            Step::Pair(first, second) => dispatcher.rotate_pair(first, second, stop).await?,
            Step::Pause(duration) => {
                info!("[PATTERN] Pausing for {:?}", duration);
                stop.pause(duration).await?;
            }
        }
    }

    info!("[PATTERN] {} pattern complete", name);
    Ok(())
}
