//! Host clock.
use std::{
    thread,
    time::{Duration, Instant},
};

use chip8::Hz;

/// Timer to synchronize the host loop with a software clock.
///
/// It is designed to work with the cooperative pattern of the
/// host loop. Time that elapses while the caller is busy is taken
/// into account when determining the next cycle.
pub struct Clock {
    interval: Duration,
    last: Instant,
}

impl Clock {
    /// Creates a new clock with the current time as internal state.
    ///
    /// A zero interval is unthrottled, every check is a new cycle.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }

    pub fn from_hz(freq: Hz) -> Self {
        Self::new(freq.into())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Set the clock state back to zero.
    pub fn reset(&mut self) {
        self.last = Instant::now()
    }

    /// Check whether a clock cycle has elapsed, starting the next cycle if so.
    pub fn tick(&mut self) -> bool {
        if self.last.elapsed() >= self.interval {
            // Reset back to zero, rather than trying to catch up.
            //
            // If the host was suspended, and a large amount of time
            // has elapsed until it is resumed, it should simply continue
            // at the next cycle running at its usual speed.
            self.reset();
            true
        } else {
            false
        }
    }

    /// Count the whole cycles that elapsed since the last check.
    ///
    /// Unlike [`Clock::tick`] the clock catches up, the remainder of a
    /// partial cycle carries over to the next check. An unthrottled
    /// clock counts one cycle per check.
    pub fn elapsed_cycles(&mut self) -> u32 {
        if self.interval.is_zero() {
            self.reset();
            return 1;
        }

        let elapsed = self.last.elapsed().as_nanos() / self.interval.as_nanos();
        let cycles = elapsed.min(u32::MAX as u128) as u32;
        self.last += self.interval * cycles;
        cycles
    }

    /// Block the current thread until the next clock cycle.
    pub fn wait(&mut self) {
        while !self.tick() {
            // Sleep does not have enough resolution, and causes
            // the clock to run at 30 FPS.
            //
            // Spinning a loop causes high CPU usage and fan madness.
            //
            // Yielding in a loop is the best alternative.
            thread::yield_now();
        }
    }
}
