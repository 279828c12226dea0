//! Tracks the pool's population invariant: `idle queue size + borrowing <= max_pool_size`.
//!
//! There is no central registry of "all connections" anywhere in this crate; the
//! only structures that exist are the idle queue and this counter. `Population`
//! counts every live connection, whether idle in the queue or out with a caller;
//! `Borrowing` counts only the latter, for metrics and the liveness-replacement
//! path in [`crate::manager`].

use std::mem;
use std::sync::atomic::{AtomicU32, Ordering};

/// Total count of live connections (idle + borrowed), capped at `max_pool_size`.
pub(crate) struct Population {
    size: AtomicU32,
    max_pool_size: u32,
}

/// Proof that [`Population::try_increase`] succeeded; must be either
/// [`commit`][IncreaseGuard::commit]ted once the connection is published to the
/// idle queue or caller, or dropped, which undoes the increase.
#[must_use]
pub(crate) struct IncreaseGuard<'a>(DecreaseOnDrop<'a>);

/// Decrements the population counter on drop unless [`cancel`][Self::cancel] is
/// called first.
pub(crate) struct DecreaseOnDrop<'a> {
    size: &'a AtomicU32,
    dropped: bool,
}

impl Population {
    pub(crate) fn new(max_pool_size: u32) -> Self {
        Population {
            size: AtomicU32::new(0),
            max_pool_size,
        }
    }

    pub(crate) fn current(&self) -> u32 {
        self.size.load(Ordering::Acquire)
    }

    /// Attempts to reserve one population slot. Returns `None` if the pool is
    /// already at `max_pool_size`.
    pub(crate) fn try_increase(&self) -> Option<IncreaseGuard<'_>> {
        let mut size = self.current();

        while size < self.max_pool_size {
            match self
                .size
                .compare_exchange(size, size + 1, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Some(IncreaseGuard(self.decrease_on_drop())),
                Err(observed) => size = observed,
            }
        }

        None
    }

    pub(crate) fn decrease_on_drop(&self) -> DecreaseOnDrop<'_> {
        DecreaseOnDrop {
            size: &self.size,
            dropped: false,
        }
    }
}

impl IncreaseGuard<'_> {
    /// The reservation is now backed by a real connection; stop tracking it for
    /// rollback purposes.
    pub(crate) fn commit(self) {
        self.0.cancel();
    }
}

impl DecreaseOnDrop<'_> {
    pub(crate) fn cancel(self) {
        mem::forget(self);
    }
}

impl Drop for DecreaseOnDrop<'_> {
    fn drop(&mut self) {
        if self.dropped {
            return;
        }
        self.dropped = true;
        self.size.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Count of connections currently out with callers.
#[derive(Default)]
pub(crate) struct Borrowing(AtomicU32);

impl Borrowing {
    pub(crate) fn current(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn increment(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn decrement(&self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_increase_stops_at_max() {
        let population = Population::new(2);
        let g1 = population.try_increase().unwrap();
        let g2 = population.try_increase().unwrap();
        assert!(population.try_increase().is_none());
        assert_eq!(population.current(), 2);

        g1.commit();
        drop(g2);
        assert_eq!(population.current(), 1);
    }

    #[test]
    fn borrowing_tracks_increments_and_decrements() {
        let borrowing = Borrowing::default();
        borrowing.increment();
        borrowing.increment();
        borrowing.decrement();
        assert_eq!(borrowing.current(), 1);
    }
}
