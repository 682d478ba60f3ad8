//! Stop signal for in-flight motion
//!
//! The signal is a generation counter on a `watch` channel. A [`StopToken`]
//! remembers the generation it was issued at; raising the signal bumps the
//! counter, which every token issued earlier observes as "stopped". Tokens
//! issued afterwards start clean, so a stop only affects work that was
//! already running.

use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Returned when a pause was interrupted by a stop request
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("stopped")]
pub struct Stopped;

/// Process-wide stop signal
#[derive(Debug)]
pub struct StopSignal {
    tx: watch::Sender<u64>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    /// Issue a token bound to the current generation
    pub fn token(&self) -> StopToken {
        let rx = self.tx.subscribe();
        let generation = *rx.borrow();
        StopToken { rx, generation }
    }

    /// Stop everything holding a token issued before this call
    pub fn raise(&self) {
        self.tx.send_modify(|generation| *generation += 1);
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative cancellation checkpoint handed to motion code
#[derive(Debug, Clone)]
pub struct StopToken {
    rx: watch::Receiver<u64>,
    generation: u64,
}

impl StopToken {
    /// Whether a stop was raised since this token was issued
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow() != self.generation
    }

    /// Sleep for `duration`, returning early with [`Stopped`] on a stop request
    pub async fn pause(&mut self, duration: Duration) -> Result<(), Stopped> {
        if self.is_stopped() {
            return Err(Stopped);
        }

        let generation = self.generation;
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            Ok(_) = self.rx.wait_for(|current| *current != generation) => Err(Stopped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_affects_earlier_tokens_only() {
        let signal = StopSignal::new();
        let before = signal.token();
        signal.raise();
        let after = signal.token();

        assert!(before.is_stopped());
        assert!(!after.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_completes() {
        let signal = StopSignal::new();
        let mut token = signal.token();
        let start = tokio::time::Instant::now();

        assert_eq!(token.pause(Duration::from_secs(1)).await, Ok(()));
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_interrupted() {
        let signal = std::sync::Arc::new(StopSignal::new());
        let mut token = signal.token();

        let raiser = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            raiser.raise();
        });

        let start = tokio::time::Instant::now();
        assert_eq!(token.pause(Duration::from_secs(10)).await, Err(Stopped));
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}
