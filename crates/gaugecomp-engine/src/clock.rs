// SPDX-License-Identifier: Apache-2.0

//! Injectable clock.
//!
//! The cycle-idle reset and the batch debounce are expressed as explicit
//! deadlines checked against this clock rather than live timers, so tests
//! drive time deterministically with [`ManualClock`].

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Monotonic time source for the engine's deadline checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Production clock backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests.
///
/// Starts at an arbitrary base instant; [`ManualClock::advance`] moves it
/// forward. Never moves on its own.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_only_moves_when_advanced() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        assert_eq!(clock.now(), t0);
        clock.advance(Duration::from_millis(750));
        assert_eq!(clock.now() - t0, Duration::from_millis(750));
    }
}
