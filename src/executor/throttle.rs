//! # Throttle
//!
//! Bounds database load by pausing after each completed sub-batch. A zero
//! pause means no delay at all, which tests rely on pervasively.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Fixed pause inserted after each completed sub-batch of a run.
#[derive(Debug)]
pub struct Throttle {
    pause: Duration,
    pauses_observed: AtomicU64,
}

impl Throttle {
    pub fn new(pause: Duration) -> Self {
        Self {
            pause,
            pauses_observed: AtomicU64::new(0),
        }
    }

    /// Sleep for the configured pause. With a zero pause this returns
    /// immediately and records nothing.
    ///
    /// ```
    /// use backfill_core::Throttle;
    /// use std::time::Duration;
    ///
    /// let throttle = Throttle::new(Duration::from_millis(1));
    /// tokio_test::block_on(throttle.pause());
    /// assert_eq!(throttle.pauses_observed(), 1);
    /// ```
    pub async fn pause(&self) {
        if self.pause.is_zero() {
            return;
        }
        self.pauses_observed.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(self.pause).await;
    }

    pub fn pause_duration(&self) -> Duration {
        self.pause
    }

    /// How many pauses this run has actually slept through.
    pub fn pauses_observed(&self) -> u64 {
        self.pauses_observed.load(Ordering::Relaxed)
    }
}
