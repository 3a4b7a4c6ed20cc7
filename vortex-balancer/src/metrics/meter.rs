//! Rolling-window failure-rate meter.
//!
//! The window is split into `B` buckets of `R` each. A timestamp `t` lands
//! in slot `floor(t / R)` and bucket `slot mod B`, so as time moves forward
//! new slots overwrite the bucket that held the slot `B` steps earlier. Any
//! slot skipped over since the last observation is zeroed before the next
//! read or write, which keeps idle periods from leaking old counts into the
//! current window.

use std::time::Duration;

use tracing::trace;

use crate::clock::SharedClock;
use crate::config::{MAX_BUCKET_COUNT, MIN_PERIOD_MS};
use crate::error::{BalancerError, Result};

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    successes: u64,
    failures: u64,
}

/// Sliding-window counter of successes and failures for one endpoint.
///
/// The meter itself is not synchronized; the owning selector mutates it
/// under its own lock.
#[derive(Debug)]
pub struct RollingWindowMeter {
    clock: SharedClock,
    resolution_ms: u64,
    buckets: Vec<Bucket>,
    /// Highest slot that received an observation since the last reset.
    last_slot: Option<u64>,
    /// Bucket indices that received an observation since the last reset.
    covered: Vec<bool>,
    counted_buckets: usize,
}

impl RollingWindowMeter {
    /// Create a meter with `buckets` buckets of `resolution` each.
    ///
    /// Fails if the bucket count is zero or above [`MAX_BUCKET_COUNT`], or
    /// if the resolution is below one second.
    pub fn new(buckets: usize, resolution: Duration, clock: SharedClock) -> Result<Self> {
        if buckets == 0 || buckets > MAX_BUCKET_COUNT {
            return Err(BalancerError::Configuration(format!(
                "meter needs between 1 and {MAX_BUCKET_COUNT} buckets, got {buckets}"
            )));
        }
        let resolution_ms = u64::try_from(resolution.as_millis()).unwrap_or(u64::MAX);
        if resolution_ms < MIN_PERIOD_MS {
            return Err(BalancerError::Configuration(format!(
                "meter resolution must be at least {MIN_PERIOD_MS}ms, got {resolution_ms}ms"
            )));
        }
        Ok(Self {
            clock,
            resolution_ms,
            buckets: vec![Bucket::default(); buckets],
            last_slot: None,
            covered: vec![false; buckets],
            counted_buckets: 0,
        })
    }

    /// Record the outcome of one request.
    pub fn observe(&mut self, success: bool) {
        let slot = self.current_slot();
        self.cleanup(slot);

        let index = self.index(slot);
        let bucket = &mut self.buckets[index];
        if success {
            bucket.successes += 1;
        } else {
            bucket.failures += 1;
        }

        if self.last_slot.map_or(true, |last| slot > last) {
            self.last_slot = Some(slot);
        }
        if !self.covered[index] {
            self.covered[index] = true;
            self.counted_buckets += 1;
        }
    }

    /// `failures / (successes + failures)` over the window, or 0 with no data.
    pub fn failure_rate(&mut self) -> f64 {
        let slot = self.current_slot();
        self.cleanup(slot);

        let (successes, failures) = self.totals();
        if successes + failures == 0 {
            return 0.0;
        }
        failures as f64 / (successes + failures) as f64
    }

    /// Whether every bucket index has received an observation since the
    /// last reset.
    pub fn is_ready(&self) -> bool {
        self.counted_buckets >= self.buckets()
    }

    /// Zero every bucket and forget readiness.
    pub fn reset(&mut self) {
        self.buckets.fill(Bucket::default());
        self.last_slot = None;
        self.covered.fill(false);
        self.counted_buckets = 0;
    }

    /// Successes inside the current window.
    pub fn success_count(&mut self) -> u64 {
        let slot = self.current_slot();
        self.cleanup(slot);
        self.totals().0
    }

    /// Failures inside the current window.
    pub fn failure_count(&mut self) -> u64 {
        let slot = self.current_slot();
        self.cleanup(slot);
        self.totals().1
    }

    /// All outcomes inside the current window.
    pub fn processed_count(&mut self) -> u64 {
        let slot = self.current_slot();
        self.cleanup(slot);
        let (successes, failures) = self.totals();
        successes + failures
    }

    /// Number of buckets.
    pub fn buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Time covered by one bucket.
    pub fn resolution(&self) -> Duration {
        Duration::from_millis(self.resolution_ms)
    }

    /// Time covered by the whole window, saturating at [`Duration::MAX`].
    pub fn window_size(&self) -> Duration {
        let buckets = u32::try_from(self.buckets()).unwrap_or(u32::MAX);
        self.resolution().saturating_mul(buckets)
    }

    fn current_slot(&self) -> u64 {
        self.clock.now().as_millis() as u64 / self.resolution_ms
    }

    fn index(&self, slot: u64) -> usize {
        (slot % self.buckets() as u64) as usize
    }

    fn totals(&self) -> (u64, u64) {
        self.buckets.iter().fold((0, 0), |(s, f), b| {
            (s + b.successes, f + b.failures)
        })
    }

    /// Zero the buckets of every slot in `(last_slot, now_slot]`.
    fn cleanup(&mut self, now_slot: u64) {
        let Some(last) = self.last_slot else {
            return;
        };
        if now_slot <= last {
            return;
        }
        let stale = (now_slot - last).min(self.buckets.len() as u64);
        for offset in 0..stale {
            let index = self.index(now_slot - offset);
            self.buckets[index] = Bucket::default();
        }
        trace!(last_slot = last, now_slot, stale, "reclaimed stale meter buckets");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use proptest::prelude::*;
    use std::sync::Arc;

    // 2012-03-04T05:06:07Z
    const START: Duration = Duration::from_secs(1_330_837_567);

    fn meter(buckets: usize) -> (Arc<ManualClock>, RollingWindowMeter) {
        let clock = Arc::new(ManualClock::new(START));
        let meter = RollingWindowMeter::new(buckets, Duration::from_secs(1), clock.clone()).unwrap();
        (clock, meter)
    }

    fn tick(clock: &ManualClock, secs: u64) {
        clock.advance(Duration::from_secs(secs));
    }

    #[test]
    fn invalid_parameters() {
        let clock: SharedClock = Arc::new(ManualClock::new(START));
        assert!(matches!(
            RollingWindowMeter::new(0, Duration::from_secs(1), clock.clone()),
            Err(BalancerError::Configuration(_))
        ));
        assert!(matches!(
            RollingWindowMeter::new(MAX_BUCKET_COUNT + 1, Duration::from_secs(1), clock.clone()),
            Err(BalancerError::Configuration(_))
        ));
        assert!(matches!(
            RollingWindowMeter::new(10, Duration::from_millis(1), clock),
            Err(BalancerError::Configuration(_))
        ));
    }

    #[test]
    fn window_size_saturates() {
        let clock: SharedClock = Arc::new(ManualClock::new(START));
        let m = RollingWindowMeter::new(MAX_BUCKET_COUNT, Duration::from_millis(u64::MAX), clock)
                .unwrap();
        assert_eq!(m.buckets(), MAX_BUCKET_COUNT);
        assert_eq!(m.window_size(), Duration::MAX);
    }

    #[test]
    fn empty_meter_reports_no_failures() {
        let (_, mut m) = meter(10);
        assert!(!m.is_ready());
        assert_eq!(m.failure_rate(), 0.0);
        assert_eq!(m.window_size(), Duration::from_secs(10));
    }

    #[test]
    fn not_ready_until_every_bucket_is_covered() {
        let (clock, mut m) = meter(3);
        m.observe(false);
        assert!(!m.is_ready());

        // More observations in the same slot do not count as coverage.
        m.observe(true);
        assert!(!m.is_ready());

        tick(&clock, 1);
        m.observe(true);
        assert!(!m.is_ready());

        tick(&clock, 1);
        m.observe(true);
        assert!(m.is_ready());
    }

    #[test]
    fn same_bucket_in_a_later_window_is_not_new_coverage() {
        let (clock, mut m) = meter(2);
        m.observe(false);

        // One full window later the observation lands in the same index.
        tick(&clock, 2);
        m.observe(false);
        assert!(!m.is_ready());

        tick(&clock, 2);
        m.observe(false);
        assert!(!m.is_ready());

        tick(&clock, 1);
        m.observe(true);
        assert!(m.is_ready());
    }

    #[test]
    fn reset_forgets_covered_buckets() {
        let (clock, mut m) = meter(2);
        m.observe(false);
        tick(&clock, 1);
        m.observe(false);
        assert!(m.is_ready());

        m.reset();
        m.observe(true);
        tick(&clock, 2);
        m.observe(true);
        assert!(!m.is_ready());
    }

    #[test]
    fn single_bucket_meter() {
        let (_, mut m) = meter(1);
        m.observe(false);
        assert!(m.is_ready());
        assert_eq!(m.failure_rate(), 1.0);

        let (_, mut m) = meter(1);
        m.observe(true);
        assert_eq!(m.failure_rate(), 0.0);
    }

    #[test]
    fn rate_across_multiple_buckets() {
        let (clock, mut m) = meter(3);
        m.observe(true);
        tick(&clock, 1);
        m.observe(false);
        tick(&clock, 1);
        m.observe(false);

        assert!(m.is_ready());
        assert_eq!(m.failure_rate(), 2.0 / 3.0);
    }

    #[test]
    fn rolling_over_overwrites_the_oldest_bucket() {
        let (clock, mut m) = meter(3);
        m.observe(true);
        tick(&clock, 1);
        m.observe(false);
        tick(&clock, 1);
        m.observe(false);

        tick(&clock, 1);
        m.observe(false);
        m.observe(true);
        m.observe(true);

        assert_eq!(m.failure_rate(), 3.0 / 5.0);
    }

    #[test]
    fn idle_slots_are_reclaimed() {
        let (clock, mut m) = meter(3);
        m.observe(true);
        tick(&clock, 1);
        m.observe(false);
        tick(&clock, 1);
        m.observe(false);
        tick(&clock, 1);
        m.observe(false);
        m.observe(true);
        m.observe(true);

        // Skip a slot: the skipped bucket and the reused one are both cleared.
        tick(&clock, 2);
        m.observe(true);

        assert!(m.is_ready());
        assert_eq!(m.failure_rate(), 1.0 / 4.0);
    }

    #[test]
    fn stale_buckets_cleared_after_gap() {
        let (clock, mut m) = meter(3);
        m.observe(true);
        tick(&clock, 1);
        m.observe(false);
        tick(&clock, 1);
        m.observe(false);
        assert_eq!(m.failure_rate(), 2.0 / 3.0);
        assert!(m.is_ready());

        // t=4: slots 3 and 4 are stale, slot 2 survives.
        tick(&clock, 2);
        m.observe(true);
        assert_eq!(m.success_count(), 1);
        assert_eq!(m.failure_count(), 1);

        // t=7: everything before slot 5 is gone.
        tick(&clock, 3);
        m.observe(false);
        assert_eq!(m.processed_count(), 1);
        assert_eq!(m.failure_rate(), 1.0);
    }

    #[test]
    fn full_window_gap_forgets_history() {
        let (clock, mut m) = meter(2);
        m.observe(true);
        tick(&clock, 1);
        m.observe(false);
        assert_eq!(m.failure_rate(), 0.5);

        tick(&clock, 100);
        m.observe(false);
        assert_eq!(m.failure_rate(), 1.0);

        for _ in 0..50 {
            m.observe(false);
        }
        tick(&clock, 2);
        m.observe(true);
        assert_eq!(m.failure_rate(), 0.0);
    }

    #[test]
    fn reads_reclaim_without_writes() {
        let (clock, mut m) = meter(3);
        m.observe(false);
        tick(&clock, 3);
        assert_eq!(m.failure_rate(), 0.0);
        assert_eq!(m.processed_count(), 0);
    }

    #[test]
    fn reset_clears_data_and_readiness() {
        let (_, mut m) = meter(1);
        m.observe(true);
        m.observe(false);
        assert!(m.is_ready());
        assert_eq!(m.failure_rate(), 0.5);

        m.reset();
        assert!(!m.is_ready());
        assert_eq!(m.processed_count(), 0);

        m.observe(false);
        m.observe(false);
        assert!(m.is_ready());
        assert_eq!(m.failure_rate(), 1.0);
    }

    proptest! {
        #[test]
        fn rate_stays_a_ratio(
            steps in proptest::collection::vec((0u64..4, any::<bool>()), 1..200),
            buckets in 1usize..12,
        ) {
            let (clock, mut m) = meter(buckets);
            let mut observed = 0u64;
            for (gap, success) in steps {
                tick(&clock, gap);
                m.observe(success);
                observed += 1;

                let rate = m.failure_rate();
                prop_assert!((0.0..=1.0).contains(&rate));
                prop_assert!(m.processed_count() <= observed);
                prop_assert!(m.processed_count() >= 1);
            }
        }
    }
}
