//! [`Clock`] – monotonic time source and pacing delay.
//!
//! The output modulator paces the whole control loop by sleeping through the
//! ON and OFF phases of each window.  Routing that sleep through a trait lets
//! tests and the fast simulation advance time without waiting.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic millisecond clock with a blocking delay.
pub trait Clock: Send + Sync {
    /// Milliseconds since this clock's epoch.  Never decreases.
    fn now_ms(&self) -> u64;

    /// Block the calling thread for `ms` milliseconds.
    fn sleep_ms(&self, ms: u64);
}

// ────────────────────────────────────────────────────────────────────────────
// SystemClock
// ────────────────────────────────────────────────────────────────────────────

/// Wall-clock implementation backed by [`Instant`] and [`std::thread::sleep`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn sleep_ms(&self, ms: u64) {
        if ms > 0 {
            std::thread::sleep(Duration::from_millis(ms));
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimClock
// ────────────────────────────────────────────────────────────────────────────

/// Simulated clock.  `sleep_ms` advances time instantly.
///
/// Clones share the same counter, so a test can keep one handle while the
/// loop under test owns another.
///
/// ```
/// use crema_hal::clock::{Clock, SimClock};
///
/// let clock = SimClock::new();
/// clock.sleep_ms(250);
/// clock.advance(750);
/// assert_eq!(clock.now_ms(), 1000);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: Arc<AtomicU64>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the clock at `ms` instead of zero.
    pub fn starting_at(ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(ms)),
        }
    }

    /// Move time forward by `ms`.
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn sleep_ms(&self, ms: u64) {
        self.advance(ms);
    }
}
