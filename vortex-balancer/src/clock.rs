//! Injectable time sources.
//!
//! Every time-bucketed component reads time through a [`Clock`] handed to it
//! at construction. Production code uses [`SystemClock`]; tests drive a
//! [`ManualClock`] forward explicitly.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of wall-clock time expressed as the offset from the Unix epoch.
pub trait Clock: Send + Sync + Debug {
    /// The current time.
    fn now(&self) -> Duration;
}

/// A shared, thread-safe clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// Reads the operating system's wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        // A clock set before 1970 is treated as the epoch itself.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
    }
}

/// A frozen clock that only moves when told to.
///
/// Stored as whole milliseconds in an atomic so it can be shared between the
/// test body and the components under test without extra locking.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: Duration) -> Self {
        Self {
            millis: AtomicU64::new(start.as_millis() as u64),
        }
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.millis
            .fetch_add(delta.as_millis() as u64, Ordering::AcqRel);
    }

    /// Jump to an absolute point in time.
    pub fn set(&self, at: Duration) {
        self.millis.store(at.as_millis() as u64, Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::Acquire))
    }
}
