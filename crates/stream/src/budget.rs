use std::collections::VecDeque;
use std::time::Duration;

/// Per-viewer send counter with carry between ticks.
///
/// Every transmitted cell adds one to `chunks_sent`; each tick first pays the
/// counter down by the tick's allowance. Sending stops once the counter reaches
/// the base rate, so a burst that overshoots is paid back over later ticks.
/// While priority cells wait, the pay-down is multiplied and the backlog clears
/// faster.
#[derive(Debug, Clone)]
pub struct SendBudget {
    base: u32,
    multiplier: u32,
    chunks_sent: u32,
}

impl SendBudget {
    pub fn new(base: u32, multiplier: u32) -> Self {
        Self {
            base,
            multiplier,
            chunks_sent: 0,
        }
    }

    /// Pay down the counter at the start of a send pass. Returns the allowance used.
    pub fn begin_tick(&mut self, priority_pending: bool) -> u32 {
        let allowance = if priority_pending {
            self.base.saturating_mul(self.multiplier)
        } else {
            self.base
        };
        self.chunks_sent = self.chunks_sent.saturating_sub(allowance);
        allowance
    }

    pub fn has_capacity(&self) -> bool {
        self.chunks_sent < self.base
    }

    pub fn record_sent(&mut self, cells: u32) {
        self.chunks_sent = self.chunks_sent.saturating_add(cells);
    }

    pub fn chunks_sent(&self) -> u32 {
        self.chunks_sent
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn reset(&mut self) {
        self.chunks_sent = 0;
    }
}

/// Per-tick streaming statistics for instrumentation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamStats {
    pub recomputed: bool,
    pub freed: usize,
    pub initialized: usize,
    pub sent: usize,
    /// Extra queued cells cleared by multi-cell transmissions.
    pub bundled: usize,
    /// Cells skipped this tick (absent or ineligible).
    pub deferred: usize,
    pub observed: usize,
    pub pending_observe: usize,
    /// The send drain stopped because the tick ran out of time.
    pub time_exhausted: bool,
    pub phase_time: Duration,
}

/// Hub tick times over a sliding window, plus a lifetime tick count.
#[derive(Debug)]
pub struct TickTimer {
    window: VecDeque<Duration>,
    capacity: usize,
    total: Duration,
    ticks: u64,
}

impl TickTimer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            total: Duration::ZERO,
            ticks: 0,
        }
    }

    pub fn record(&mut self, dt: Duration) {
        if self.window.len() == self.capacity {
            if let Some(evicted) = self.window.pop_front() {
                self.total -= evicted;
            }
        }
        self.window.push_back(dt);
        self.total += dt;
        self.ticks += 1;
    }

    pub fn average(&self) -> Duration {
        match self.window.len() {
            0 => Duration::ZERO,
            n => self.total / n as u32,
        }
    }

    pub fn max(&self) -> Duration {
        self.window.iter().copied().max().unwrap_or_default()
    }

    pub fn min(&self) -> Duration {
        self.window.iter().copied().min().unwrap_or_default()
    }

    pub fn last(&self) -> Option<Duration> {
        self.window.back().copied()
    }

    /// Samples currently in the window.
    pub fn count(&self) -> usize {
        self.window.len()
    }

    /// Ticks recorded since creation, including evicted ones.
    pub fn total_ticks(&self) -> u64 {
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_budget_has_capacity() {
        let mut budget = SendBudget::new(3, 4);
        budget.begin_tick(false);
        assert!(budget.has_capacity());
        budget.record_sent(3);
        assert!(!budget.has_capacity());
    }

    #[test]
    fn overshoot_carries_into_next_tick() {
        let mut budget = SendBudget::new(3, 4);
        budget.begin_tick(false);
        // One multi-cell send can overshoot the base.
        budget.record_sent(8);
        budget.begin_tick(false);
        assert_eq!(budget.chunks_sent(), 5);
        assert!(!budget.has_capacity());
        budget.begin_tick(false);
        assert_eq!(budget.chunks_sent(), 2);
        assert!(budget.has_capacity());
    }

    #[test]
    fn priority_pays_down_faster() {
        let mut budget = SendBudget::new(3, 4);
        budget.record_sent(12);
        assert_eq!(budget.begin_tick(true), 12);
        assert_eq!(budget.chunks_sent(), 0);
    }

    #[test]
    fn counter_never_goes_negative() {
        let mut budget = SendBudget::new(3, 4);
        budget.record_sent(1);
        budget.begin_tick(true);
        assert_eq!(budget.chunks_sent(), 0);
    }

    #[test]
    fn window_evicts_oldest_sample() {
        let ms = Duration::from_millis;
        let mut timer = TickTimer::new(3);
        for t in [40, 5, 15, 25] {
            timer.record(ms(t));
        }
        assert_eq!(timer.count(), 3);
        assert_eq!(timer.total_ticks(), 4);
        assert_eq!(timer.average(), ms(15));
        assert_eq!(timer.max(), ms(25));
        assert_eq!(timer.min(), ms(5));
        assert_eq!(timer.last(), Some(ms(25)));
    }

    #[test]
    fn zero_capacity_keeps_latest_tick() {
        let mut timer = TickTimer::new(0);
        timer.record(Duration::from_millis(3));
        timer.record(Duration::from_millis(9));
        assert_eq!(timer.count(), 1);
        assert_eq!(timer.average(), Duration::from_millis(9));
    }

    #[test]
    fn empty_timer_reports_zero() {
        let timer = TickTimer::new(4);
        assert_eq!(timer.average(), Duration::ZERO);
        assert_eq!(timer.max(), Duration::ZERO);
        assert!(timer.last().is_none());
    }
}
