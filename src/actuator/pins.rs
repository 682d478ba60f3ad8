//! GPIO pin boundary
//!
//! Actuators drive any `embedded_hal::digital::OutputPin`. The enable input of
//! the driver board is active-low; [`EnableLine`] hides that so the actuator
//! only ever says "enabled" or "disabled".
//!
//! [`SimPin`] is the in-process backend used by the daemon on hosts without
//! GPIO access and by the tests. Clones share state, so a test can keep a
//! clone of every pin it hands to an actuator and inspect the levels later.

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Which physical pin of an actuator an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinRole {
    Coil(usize),
    Enable,
}

impl fmt::Display for PinRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinRole::Coil(i) => write!(f, "coil {}", i + 1),
            PinRole::Enable => write!(f, "enable"),
        }
    }
}

/// Electrical level that means "enabled"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polarity {
    ActiveHigh,
    #[default]
    ActiveLow,
}

/// Boolean view of an enable input with configurable polarity
#[derive(Debug)]
pub struct EnableLine<P> {
    pin: P,
    polarity: Polarity,
}

impl<P: OutputPin> EnableLine<P> {
    pub fn new(pin: P, polarity: Polarity) -> Self {
        Self { pin, polarity }
    }

    /// Drive the line to the level meaning `enabled`
    pub fn set(&mut self, enabled: bool) -> Result<(), P::Error> {
        let high = match self.polarity {
            Polarity::ActiveHigh => enabled,
            Polarity::ActiveLow => !enabled,
        };
        if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        }
    }
}

/// Error raised by an injected [`SimPin`] fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimPinFault {
    pub bcm: u8,
}

impl embedded_hal::digital::Error for SimPinFault {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Simulated output pin labelled with its BCM number
#[derive(Debug, Clone)]
pub struct SimPin {
    bcm: u8,
    high: Arc<AtomicBool>,
    high_writes: Arc<AtomicU64>,
    fail_after: Option<u64>,
}

impl SimPin {
    pub fn new(bcm: u8) -> Self {
        Self {
            bcm,
            high: Arc::new(AtomicBool::new(false)),
            high_writes: Arc::new(AtomicU64::new(0)),
            fail_after: None,
        }
    }

    /// A pin whose `set_high` fails once `successful` high writes have gone through.
    /// `set_low` always succeeds.
    pub fn failing_after(bcm: u8, successful: u64) -> Self {
        Self {
            fail_after: Some(successful),
            ..Self::new(bcm)
        }
    }

    /// Current electrical level
    pub fn is_high(&self) -> bool {
        self.high.load(Ordering::SeqCst)
    }

    /// Number of successful `set_high` calls so far
    pub fn high_writes(&self) -> u64 {
        self.high_writes.load(Ordering::SeqCst)
    }
}

impl ErrorType for SimPin {
    type Error = SimPinFault;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high.store(false, Ordering::SeqCst);
        trace!("[GPIO {}] low", self.bcm);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if let Some(limit) = self.fail_after {
            if self.high_writes() >= limit {
                return Err(SimPinFault { bcm: self.bcm });
            }
        }
        self.high_writes.fetch_add(1, Ordering::SeqCst);
        self.high.store(true, Ordering::SeqCst);
        trace!("[GPIO {}] high", self.bcm);
        Ok(())
    }
}
