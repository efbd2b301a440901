use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotone time source driving the scheduler.
pub trait Clock {
    /// Time since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Wall-clock time measured from construction.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock advanced by hand. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Shape of the time-slice schedule. All times are in seconds.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub total_budget: u64,
    /// First slice as a fraction of the total budget.
    pub minimum_ratio: f64,
    /// Slices handed out before the slice grows.
    pub steps_per_round: u32,
    pub increase_ratio: f64,
    /// Lower bound of the first slice.
    pub minimum_slice: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            total_budget: 3600,
            minimum_ratio: 0.005,
            steps_per_round: 20,
            increase_ratio: 2.0,
            minimum_slice: 30,
        }
    }
}

/// Hands out growing time slices until the total budget is spent.
///
/// Every `steps_per_round` slices the slice is multiplied by
/// `increase_ratio`; each slice is capped by the budget still remaining.
/// Once exhausted the scheduler stays exhausted.
#[derive(Debug)]
pub struct TimeBudgetScheduler<C: Clock = MonotonicClock> {
    config: ScheduleConfig,
    clock: C,
    start: Duration,
    steps_in_round: u32,
    current_slice: u64,
    exhausted: bool,
}

impl TimeBudgetScheduler<MonotonicClock> {
    pub fn new(config: ScheduleConfig) -> Self {
        Self::with_clock(config, MonotonicClock::new())
    }
}

impl<C: Clock> TimeBudgetScheduler<C> {
    pub fn with_clock(config: ScheduleConfig, clock: C) -> Self {
        let first = (config.total_budget as f64 * config.minimum_ratio) as u64;
        let current_slice = first.max(config.minimum_slice);
        let start = clock.now();
        Self {
            config,
            clock,
            start,
            steps_in_round: 0,
            current_slice,
            exhausted: false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.start)
    }

    /// Next time slice in seconds, or `None` once the budget is spent.
    pub fn next_slice(&mut self) -> Option<u64> {
        if self.exhausted {
            return None;
        }

        let elapsed = self.elapsed();
        if elapsed > Duration::from_secs(self.config.total_budget) {
            self.exhausted = true;
            return None;
        }

        self.steps_in_round += 1;
        if self.steps_in_round > self.config.steps_per_round {
            self.current_slice = (self.current_slice as f64 * self.config.increase_ratio) as u64;
            self.steps_in_round = 1;
        }

        let remaining = self.config.total_budget - elapsed.as_secs();
        let slice = self.current_slice.min(remaining);
        // A zero slice can only appear at the exact end of the budget.
        if slice == 0 {
            self.exhausted = true;
            return None;
        }
        Some(slice)
    }
}

impl<C: Clock> Iterator for TimeBudgetScheduler<C> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        self.next_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(total: u64, ratio: f64, steps: u32, increase: f64, floor: u64) -> ScheduleConfig {
        ScheduleConfig {
            total_budget: total,
            minimum_ratio: ratio,
            steps_per_round: steps,
            increase_ratio: increase,
            minimum_slice: floor,
        }
    }

    #[test]
    fn test_first_slice_respects_floor() {
        let clock = ManualClock::new();
        let mut scheduler =
            TimeBudgetScheduler::with_clock(config(1000, 0.005, 20, 2.0, 30), clock);
        assert_eq!(scheduler.next_slice(), Some(30));

        let clock = ManualClock::new();
        let mut scheduler =
            TimeBudgetScheduler::with_clock(config(10000, 0.005, 20, 2.0, 30), clock);
        assert_eq!(scheduler.next_slice(), Some(50));
    }

    #[test]
    fn test_slices_grow_per_round_while_time_stands_still() {
        let clock = ManualClock::new();
        let scheduler = TimeBudgetScheduler::with_clock(config(100, 0.1, 2, 2.0, 5), clock);
        let slices: Vec<u64> = scheduler.take(9).collect();
        assert_eq!(slices, vec![10, 10, 20, 20, 40, 40, 80, 80, 100]);
    }

    #[test]
    fn test_consuming_each_slice_ends_at_budget() {
        let clock = ManualClock::new();
        let mut scheduler =
            TimeBudgetScheduler::with_clock(config(100, 0.1, 2, 2.0, 5), clock.clone());

        let mut slices = Vec::new();
        while let Some(slice) = scheduler.next_slice() {
            assert!(scheduler.elapsed().as_secs() <= 100);
            slices.push(slice);
            clock.advance_secs(slice);
        }
        assert_eq!(slices, vec![10, 10, 20, 20, 40]);
        assert_eq!(scheduler.next_slice(), None);
    }

    #[test]
    fn test_slice_capped_by_remaining_budget() {
        let clock = ManualClock::new();
        let mut scheduler =
            TimeBudgetScheduler::with_clock(config(50, 0.5, 20, 2.0, 1), clock.clone());
        clock.advance(Duration::from_millis(40_700));
        assert_eq!(scheduler.next_slice(), Some(10));
    }

    #[test]
    fn test_exhaustion_is_terminal() {
        let clock = ManualClock::new();
        let mut scheduler =
            TimeBudgetScheduler::with_clock(config(10, 0.5, 1, 2.0, 1), clock.clone());
        assert_eq!(scheduler.next_slice(), Some(5));
        clock.advance(Duration::from_millis(10_001));
        assert_eq!(scheduler.next_slice(), None);
        assert_eq!(scheduler.next_slice(), None);
    }

    #[test]
    fn test_non_integer_increase_truncates() {
        let clock = ManualClock::new();
        let scheduler = TimeBudgetScheduler::with_clock(config(1000, 0.0, 1, 1.5, 5), clock);
        let slices: Vec<u64> = scheduler.take(4).collect();
        assert_eq!(slices, vec![5, 7, 10, 15]);
    }
}
