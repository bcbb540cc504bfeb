//! Waiting policies for the handshake signals.
//!
//! How long "wait for the ready line" may take depends on the host: a
//! fast processor can afford to spin on the pin, a hosted target
//! should yield to the scheduler. Either way the wait is bounded; a
//! module that never answers surfaces as a timeout instead of a hung
//! host.

use std::time::{Duration, Instant};

/// How a transport pauses and polls.
pub trait WaitStrategy {
    /// Poll `cond` until it holds or `budget` is exhausted. Returns
    /// whether the condition was observed.
    fn wait_until(&mut self, budget: Duration, cond: &mut dyn FnMut() -> bool) -> bool;

    /// Pause between iterations of a slower polling loop.
    fn sleep(&mut self, interval: Duration);
}

/// Busy-polling wait for bare-metal hosts with no usable clock.
///
/// Time is approximated by a calibrated iteration count, so the bound
/// is in loop iterations rather than wall time.
#[derive(Debug, Clone, Copy)]
pub struct SpinWait {
    /// Spin iterations that approximate one millisecond.
    pub iterations_per_ms: u32,
}

impl Default for SpinWait {
    fn default() -> Self {
        SpinWait {
            iterations_per_ms: 10_000,
        }
    }
}

impl WaitStrategy for SpinWait {
    fn wait_until(&mut self, budget: Duration, cond: &mut dyn FnMut() -> bool) -> bool {
        let iterations = (budget.as_millis() as u64)
            .saturating_mul(u64::from(self.iterations_per_ms))
            .max(1);
        for _ in 0..iterations {
            if cond() {
                return true;
            }
            std::hint::spin_loop();
        }
        false
    }

    fn sleep(&mut self, interval: Duration) {
        let iterations = (interval.as_millis() as u64)
            .saturating_mul(u64::from(self.iterations_per_ms))
            .max(1);
        for _ in 0..iterations {
            std::hint::spin_loop();
        }
    }
}

/// Scheduler-friendly wait for hosted targets, bounded by wall clock.
#[derive(Debug, Clone, Copy)]
pub struct SleepWait {
    /// Pause between condition polls.
    pub poll_interval: Duration,
}

impl Default for SleepWait {
    fn default() -> Self {
        SleepWait {
            poll_interval: Duration::from_millis(1),
        }
    }
}

impl WaitStrategy for SleepWait {
    fn wait_until(&mut self, budget: Duration, cond: &mut dyn FnMut() -> bool) -> bool {
        let deadline = Instant::now() + budget;
        loop {
            if cond() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    fn sleep(&mut self, interval: Duration) {
        std::thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spin_wait_gives_up_after_its_budget() {
        let mut wait = SpinWait {
            iterations_per_ms: 10,
        };
        let mut polls = 0u64;
        let observed = wait.wait_until(Duration::from_millis(3), &mut || {
            polls += 1;
            false
        });
        assert!(!observed);
        assert_eq!(polls, 30);
    }

    #[test]
    fn spin_wait_stops_as_soon_as_the_condition_holds() {
        let mut wait = SpinWait::default();
        let mut polls = 0u64;
        let observed = wait.wait_until(Duration::from_millis(100), &mut || {
            polls += 1;
            polls == 3
        });
        assert!(observed);
        assert_eq!(polls, 3);
    }

    #[test]
    fn sleep_wait_observes_an_immediate_condition() {
        let mut wait = SleepWait::default();
        assert!(wait.wait_until(Duration::from_millis(1), &mut || true));
    }

    #[test]
    fn sleep_wait_times_out_on_a_stuck_condition() {
        let mut wait = SleepWait {
            poll_interval: Duration::from_micros(100),
        };
        assert!(!wait.wait_until(Duration::from_millis(2), &mut || false));
    }
}
