//! A single live connection plus the bookkeeping the liveness and lifetime
//! policy needs.

use crate::config::CheckInterval;
use crate::driver::RawConnection;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

/// A [`RawConnection`] wrapped with an expiration deadline and probe bookkeeping.
///
/// Lives either inside the idle queue or out with a caller; see
/// [`crate::manager`] for the state machine that moves it between the two.
pub(crate) struct ProbedConnection {
    raw: Box<dyn RawConnection>,
    expiration_time: Instant,
    last_check: Instant,
    last_borrow: Instant,
}

impl ProbedConnection {
    pub(crate) fn new(raw: Box<dyn RawConnection>, max_lifetime: Duration) -> Self {
        let now = Instant::now();
        ProbedConnection {
            raw,
            expiration_time: now + randomized_lifetime(max_lifetime),
            last_check: now,
            last_borrow: now,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expiration_time
    }

    /// Runs the liveness policy described in [`CheckInterval`]: age first, then
    /// probe throttling, then (if warranted) an actual probe.
    pub(crate) async fn is_available(
        &mut self,
        check_interval: CheckInterval,
        check_timeout: Duration,
        check_sql: Option<&str>,
    ) -> bool {
        let now = Instant::now();
        if self.is_expired(now) {
            return false;
        }

        match check_interval {
            CheckInterval::Disabled => true,
            CheckInterval::Always => self.probe(check_timeout, check_sql).await,
            CheckInterval::Throttled(ms) => {
                if now.saturating_duration_since(self.last_check) < Duration::from_millis(u64::from(ms)) {
                    true
                } else {
                    self.probe(check_timeout, check_sql).await
                }
            }
        }
    }

    async fn probe(&mut self, timeout: Duration, check_sql: Option<&str>) -> bool {
        self.last_check = Instant::now();
        let alive = match check_sql {
            Some(sql) => tokio::time::timeout(timeout, self.raw.execute(sql))
                .await
                .map(|result| result.is_ok())
                .unwrap_or(false),
            None => self.raw.is_alive(timeout).await,
        };
        tracing::trace!(alive, "liveness probe completed");
        alive
    }

    pub(crate) fn stamp_borrowed(&mut self) {
        self.last_borrow = Instant::now();
    }

    pub(crate) fn last_borrow(&self) -> Instant {
        self.last_borrow
    }

    pub(crate) fn raw(&self) -> &dyn RawConnection {
        self.raw.as_ref()
    }

    pub(crate) fn raw_mut(&mut self) -> &mut dyn RawConnection {
        self.raw.as_mut()
    }

    pub(crate) fn into_raw(self) -> Box<dyn RawConnection> {
        self.raw
    }
}

/// Picks a deadline uniformly within `[0.8 * max_lifetime, max_lifetime)` so a
/// cohort of connections created together does not expire in lockstep.
fn randomized_lifetime(max_lifetime: Duration) -> Duration {
    let max_nanos = max_lifetime.as_nanos().min(u128::from(u64::MAX)) as u64;
    let min_nanos = (max_nanos as f64 * 0.8) as u64;

    if min_nanos >= max_nanos {
        return Duration::from_nanos(max_nanos);
    }

    let nanos = rand::thread_rng().gen_range(min_nanos..max_nanos);
    Duration::from_nanos(nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn randomized_lifetime_stays_within_window() {
        let max_lifetime = Duration::from_millis(1_800_000);
        for _ in 0..1_000 {
            let lifetime = randomized_lifetime(max_lifetime);
            assert!(lifetime.as_nanos() as f64 >= max_lifetime.as_nanos() as f64 * 0.8);
            assert!(lifetime <= max_lifetime);
        }
    }
}
