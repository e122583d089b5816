//! Elapsed-time source for the `iGlobalTime` uniform.
//!
//! Two modes:
//! - **Self-driven** (default): elapsed = seconds since the source was created, read from a
//!   monotonic clock on every frame.
//! - **Host-driven**: the host called SetTime at least once. From then on the value is exactly
//!   what the host last supplied (rewinds included) and the clock is never consulted again.
//!
//! The switch is one-way for the lifetime of the source.

use std::time::Instant;

/// "Monotonic seconds since start" capability.
///
/// Implementations must return non-negative, non-decreasing values.
pub trait Clock: Send {
    fn seconds_since_start(&self) -> f64;
}

/// Default clock backed by `std::time::Instant`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn seconds_since_start(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeMode {
    SelfDriven,
    HostDriven,
}

pub struct TimingSource {
    clock: Box<dyn Clock>,
    mode: TimeMode,
    elapsed: f64,
}

impl std::fmt::Debug for TimingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimingSource")
            .field("mode", &self.mode)
            .field("elapsed", &self.elapsed)
            .field("clock", &"<clock>")
            .finish()
    }
}

impl TimingSource {
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        Self {
            clock,
            mode: TimeMode::SelfDriven,
            elapsed: 0.0,
        }
    }

    pub fn mode(&self) -> TimeMode {
        self.mode
    }

    pub fn is_host_driven(&self) -> bool {
        self.mode == TimeMode::HostDriven
    }

    /// Last computed or host-supplied elapsed time, in seconds.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Per-frame tick. Reads the clock in self-driven mode; no-op once host-driven.
    pub fn advance(&mut self) -> f64 {
        if self.mode == TimeMode::SelfDriven {
            self.elapsed = self.clock.seconds_since_start();
        }
        self.elapsed
    }

    /// Record a host-supplied time verbatim and latch host-driven mode.
    pub fn set_external(&mut self, seconds: f64) {
        self.mode = TimeMode::HostDriven;
        self.elapsed = seconds;
    }
}

impl Default for TimingSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ManualClock;

    #[test]
    fn system_clock_is_non_decreasing() {
        let c = SystemClock::new();
        let a = c.seconds_since_start();
        let b = c.seconds_since_start();
        assert!(a >= 0.0);
        assert!(b >= a);
    }

    #[test]
    fn self_driven_follows_clock() {
        let clock = ManualClock::new();
        let mut t = TimingSource::with_clock(Box::new(clock.clone()));
        assert_eq!(t.mode(), TimeMode::SelfDriven);

        clock.set(1.5);
        assert_eq!(t.advance(), 1.5);
        clock.set(2.0);
        let a = t.advance();
        let b = t.advance();
        assert_eq!(a, 2.0);
        assert!(b >= a);
    }

    #[test]
    fn host_time_latches_and_stops_clock_updates() {
        let clock = ManualClock::new();
        let mut t = TimingSource::with_clock(Box::new(clock.clone()));
        clock.set(5.0);
        t.advance();

        t.set_external(1.25);
        assert!(t.is_host_driven());
        clock.set(100.0);
        assert_eq!(t.advance(), 1.25);
        assert_eq!(t.advance(), 1.25);

        // rewinds and negative values are passed through verbatim
        t.set_external(-3.0);
        assert_eq!(t.advance(), -3.0);
        assert_eq!(t.mode(), TimeMode::HostDriven);
    }
}
