//! Monotonic counters for pool activity.
//!
//! These are diagnostic, not load-bearing: a caller racing a `fetch_add` against
//! a read may see a slightly stale value, and that is fine. Nothing in the pool's
//! correctness depends on a stats read being exact.

use std::sync::atomic::{AtomicI64, Ordering};

/// A point-in-time copy of a pool's [`Stats`], safe to hand to a caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_creations: i64,
    pub total_real_closeds: i64,
    pub total_borrows: i64,
    pub total_returns: i64,
    pub total_invalids: i64,
    pub borrow_wait_nanos: i64,
    pub used_nanos: i64,
}

impl StatsSnapshot {
    /// Cumulative time callers have spent waiting for a connection to become
    /// available, in milliseconds.
    pub fn borrow_wait_millis(&self) -> i64 {
        self.borrow_wait_nanos / 1_000_000
    }

    /// Cumulative time connections have spent checked out by callers, in
    /// milliseconds.
    pub fn used_millis(&self) -> i64 {
        self.used_nanos / 1_000_000
    }
}

#[derive(Debug, Default)]
pub(crate) struct Stats {
    creations: AtomicI64,
    real_closeds: AtomicI64,
    borrows: AtomicI64,
    returns: AtomicI64,
    invalids: AtomicI64,
    borrow_wait_nanos: AtomicI64,
    used_nanos: AtomicI64,
}

impl Stats {
    pub(crate) fn record_creation(&self) {
        self.creations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_real_close(&self) {
        self.real_closeds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_borrow(&self, wait_nanos: i64) {
        self.borrows.fetch_add(1, Ordering::Relaxed);
        self.borrow_wait_nanos.fetch_add(wait_nanos, Ordering::Relaxed);
    }

    pub(crate) fn record_return(&self, used_nanos: i64) {
        self.returns.fetch_add(1, Ordering::Relaxed);
        self.used_nanos.fetch_add(used_nanos, Ordering::Relaxed);
    }

    pub(crate) fn record_invalid(&self) {
        self.invalids.fetch_add(1, Ordering::Relaxed);
    }

    /// Resets any counter that has gone negative, which can only happen from a
    /// 64-bit wraparound. A cheap defensive measure; in practice it never fires.
    pub(crate) fn fix_overflow(&self) {
        for counter in [
            &self.creations,
            &self.real_closeds,
            &self.borrows,
            &self.returns,
            &self.invalids,
            &self.borrow_wait_nanos,
            &self.used_nanos,
        ] {
            if counter.load(Ordering::Relaxed) < 0 {
                counter.store(0, Ordering::Relaxed);
            }
        }
    }

    pub(crate) fn reset_all(&self) {
        for counter in [
            &self.creations,
            &self.real_closeds,
            &self.borrows,
            &self.returns,
            &self.invalids,
            &self.borrow_wait_nanos,
            &self.used_nanos,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_creations: self.creations.load(Ordering::Relaxed),
            total_real_closeds: self.real_closeds.load(Ordering::Relaxed),
            total_borrows: self.borrows.load(Ordering::Relaxed),
            total_returns: self.returns.load(Ordering::Relaxed),
            total_invalids: self.invalids.load(Ordering::Relaxed),
            borrow_wait_nanos: self.borrow_wait_nanos.load(Ordering::Relaxed),
            used_nanos: self.used_nanos.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fix_overflow_resets_negative_counters_only() {
        let stats = Stats::default();
        stats.record_creation();
        stats.creations.store(-5, Ordering::Relaxed);
        stats.record_borrow(100);

        stats.fix_overflow();

        let snap = stats.snapshot();
        assert_eq!(snap.total_creations, 0);
        assert_eq!(snap.total_borrows, 1);
        assert_eq!(snap.borrow_wait_nanos, 100);
    }

    #[test]
    fn reset_all_zeroes_everything() {
        let stats = Stats::default();
        stats.record_creation();
        stats.record_borrow(50);
        stats.reset_all();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }
}
