//! The pool manager: the bounded idle queue, the borrow/return protocol, and
//! the single background maintenance task that keeps the idle population
//! within `min_idle..=max_pool_size`.

use crate::config::{CheckInterval, Config};
use crate::driver::ConnectionFactory;
use crate::error::{Error, Result};
use crate::handle::PooledConnection;
use crate::population::{Borrowing, Population};
use crate::probed::ProbedConnection;
use crate::stats::{Stats, StatsSnapshot};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(5);

/// The engine behind [`blinkpool`](https://docs.rs/blinkpool)'s `DataSource`.
///
/// Not usually constructed directly by applications; see the `blinkpool` crate
/// for the validated, ergonomic entry point.
pub struct PoolManager {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    config: Config,
    factory: Arc<dyn ConnectionFactory>,
    idle_tx: flume::Sender<ProbedConnection>,
    idle_rx: flume::Receiver<ProbedConnection>,
    population: Population,
    borrowing: Borrowing,
    stats: Stats,
    creation_lock: AsyncMutex<()>,
    closed: AtomicBool,
    /// Nanoseconds since `started_at` at which a borrow or return last occurred.
    last_active_nanos: AtomicU64,
    started_at: Instant,
    maintenance: AsyncMutex<Option<JoinHandle<()>>>,
}

impl PoolManager {
    /// Builds a new pool: resolves the driver, opens one connection synchronously
    /// so misconfiguration surfaces from this call rather than from the first
    /// `borrow`, fills the rest of `min_idle` (inline or in the background per
    /// `config.get_async_init_idle()`), and starts the maintenance task.
    pub async fn new(config: Config, factory: Arc<dyn ConnectionFactory>) -> Result<PoolManager> {
        let max_pool_size = config.get_max_pool_size();

        let (idle_tx, idle_rx) = flume::bounded(max_pool_size as usize);

        let inner = Arc::new(Inner {
            config,
            factory,
            idle_tx,
            idle_rx,
            population: Population::new(max_pool_size),
            borrowing: Borrowing::default(),
            stats: Stats::default(),
            creation_lock: AsyncMutex::new(()),
            closed: AtomicBool::new(false),
            last_active_nanos: AtomicU64::new(0),
            started_at: Instant::now(),
            maintenance: AsyncMutex::new(None),
        });

        // Establishing the very first connection synchronously means a bad
        // jdbc_url or unreachable database is reported from construction.
        let first = create_one(&inner).await?;
        inner
            .idle_tx
            .try_send(first)
            .expect("idle queue has capacity for at least one connection just after construction");

        if inner.config.get_min_idle() > 1 {
            if inner.config.get_async_init_idle() {
                let inner = Arc::clone(&inner);
                tokio::spawn(async move {
                    fill_to_min_idle(&inner).await;
                });
            } else {
                fill_to_min_idle(&inner).await;
            }
        }

        let maintenance_inner = Arc::clone(&inner);
        let handle = tokio::spawn(async move {
            maintenance_loop(maintenance_inner).await;
        });
        *inner.maintenance.lock().await = Some(handle);

        Ok(PoolManager { inner })
    }

    /// Removes a connection from the idle queue (creating one if necessary) and
    /// hands it to the caller, waiting no longer than `config.get_borrow_timeout()`.
    pub async fn borrow(&self) -> Result<PooledConnection> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(Error::PoolClosed);
        }

        let wait_start = Instant::now();
        let borrow_timeout = self.inner.config.get_borrow_timeout();

        let mut probed = match self.inner.idle_rx.try_recv() {
            Ok(probed) => probed,
            Err(flume::TryRecvError::Empty) => {
                maybe_spawn_background_fill(&self.inner);
                wait_for_idle(&self.inner, borrow_timeout).await?
            }
            Err(flume::TryRecvError::Disconnected) => return Err(Error::PoolClosed),
        };

        self.inner.borrowing.increment();
        touch_last_active(&self.inner);

        let check_interval = self.inner.config.get_check_interval();
        let check_timeout = self.inner.config.get_check_timeout();
        let check_sql = self.inner.config.get_check_sql();

        if probed.is_available(check_interval, check_timeout, check_sql).await {
            self.inner
                .stats
                .record_borrow(wait_start.elapsed().as_nanos() as i64);
            probed.stamp_borrowed();
            return Ok(PooledConnection::new(Arc::clone(&self.inner), probed));
        }

        // Connection failed liveness: discard it and make exactly one
        // replacement attempt. No retry loop beyond this.
        self.inner.borrowing.decrement();
        self.inner.stats.record_invalid();
        real_close(&self.inner, probed).await;

        let mut probed = create_one(&self.inner).await?;
        self.inner.borrowing.increment();
        self.inner
            .stats
            .record_borrow(wait_start.elapsed().as_nanos() as i64);
        probed.stamp_borrowed();
        Ok(PooledConnection::new(Arc::clone(&self.inner), probed))
    }

    /// Returns a point-in-time snapshot of the pool's counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Number of connections currently sitting idle in the queue.
    pub fn current_pool_size(&self) -> u32 {
        self.inner.idle_rx.len() as u32
    }

    /// Number of connections currently checked out by callers.
    pub fn current_borrowings(&self) -> u32 {
        self.inner.borrowing.current()
    }

    /// Shuts the pool down: stops accepting new borrows, stops the maintenance
    /// task, and real-closes every idle connection. Idempotent. Connections
    /// already checked out are real-closed as they are returned rather than
    /// forcibly revoked.
    pub async fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return; // already closed
        }

        if let Some(handle) = self.inner.maintenance.lock().await.take() {
            handle.abort();
        }

        while let Ok(probed) = self.inner.idle_rx.try_recv() {
            real_close(&self.inner, probed).await;
        }

        self.inner.stats.reset_all();
    }
}

/// Called from [`PooledConnection`]'s return path (explicit `close()` or drop).
pub(crate) async fn return_connection(inner: &Arc<Inner>, probed: ProbedConnection) {
    let used_nanos = probed.last_borrow().elapsed().as_nanos() as i64;

    if inner.closed.load(Ordering::Acquire) {
        inner.borrowing.decrement();
        real_close(inner, probed).await;
        return;
    }

    inner.stats.record_return(used_nanos);
    touch_last_active(inner);
    inner.borrowing.decrement();

    match inner.idle_tx.try_send(probed) {
        Ok(()) => {}
        Err(flume::TrySendError::Full(probed)) | Err(flume::TrySendError::Disconnected(probed)) => {
            tracing::debug!("idle queue refused returned connection; closing it instead");
            real_close(inner, probed).await;
        }
    }
}

async fn wait_for_idle(inner: &Arc<Inner>, timeout: Duration) -> Result<ProbedConnection> {
    match tokio::time::timeout(timeout, inner.idle_rx.recv_async()).await {
        Ok(Ok(probed)) => Ok(probed),
        Ok(Err(_)) => Err(Error::PoolClosed),
        Err(_) => Err(Error::BorrowTimeout(timeout)),
    }
}

fn maybe_spawn_background_fill(inner: &Arc<Inner>) {
    if inner.borrowing.current() < inner.config.get_max_pool_size() {
        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            fill_to_min_idle(&inner).await;
        });
    }
}

/// Opens one new connection under the creation lock, re-checking the
/// population invariant first. Used both for the initial synchronous
/// connection and for the replacement-on-invalid path in [`PoolManager::borrow`].
async fn create_one(inner: &Arc<Inner>) -> Result<ProbedConnection> {
    let _permit = inner.creation_lock.lock().await;
    create_one_locked(inner).await
}

async fn create_one_locked(inner: &Arc<Inner>) -> Result<ProbedConnection> {
    let guard = match inner.population.try_increase() {
        Some(guard) => guard,
        None => {
            return Err(Error::Connect(
                "pool is already at max_pool_size".into(),
            ));
        }
    };

    let raw = inner
        .factory
        .open(
            inner.config.get_jdbc_url(),
            inner.config.get_username(),
            inner.config.get_password(),
        )
        .await
        .map_err(Error::Connect)?;

    guard.commit();
    inner.stats.record_creation();
    tracing::debug!(pool = inner.config.get_pool_name(), "opened a new connection");

    Ok(ProbedConnection::new(raw, inner.config.get_max_lifetime()))
}

/// Fills the idle queue up to `min_idle`, serialised by the creation lock so
/// concurrent fillers cannot together overshoot `max_pool_size`.
async fn fill_to_min_idle(inner: &Arc<Inner>) {
    let _permit = inner.creation_lock.lock().await;

    while (inner.idle_rx.len() as u32) < inner.config.get_min_idle() {
        if inner.closed.load(Ordering::Acquire) {
            return;
        }

        match create_one_locked(inner).await {
            Ok(probed) => {
                if inner.idle_tx.try_send(probed).is_err() {
                    // Lost the race against a concurrent borrow/return; the
                    // invariant check at the top of the loop will stop us.
                    break;
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to fill pool toward min_idle");
                break;
            }
        }
    }
}

async fn real_close(inner: &Arc<Inner>, probed: ProbedConnection) {
    drop(inner.population.decrease_on_drop());
    let raw = probed.into_raw();
    if let Err(err) = raw.close().await {
        tracing::debug!(error = %err, "error closing connection");
    }
    inner.stats.record_real_close();
}

fn touch_last_active(inner: &Arc<Inner>) {
    let nanos = inner.started_at.elapsed().as_nanos() as u64;
    inner.last_active_nanos.store(nanos, Ordering::Relaxed);
}

async fn maintenance_loop(inner: Arc<Inner>) {
    let mut ticker = tokio::time::interval(MAINTENANCE_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if inner.closed.load(Ordering::Acquire) {
            return;
        }

        if let Err(err) = run_maintenance_cycle(&inner).await {
            tracing::warn!(error = %err, "maintenance cycle failed");
        }
    }
}

async fn run_maintenance_cycle(inner: &Arc<Inner>) -> Result<()> {
    let idle_timeout = inner.config.get_idle_timeout();
    let last_active_nanos = inner.last_active_nanos.load(Ordering::Relaxed);
    let elapsed = inner.started_at.elapsed().as_nanos() as u64 - last_active_nanos;

    if Duration::from_nanos(elapsed) < idle_timeout {
        return Ok(());
    }

    let min_idle = inner.config.get_min_idle();
    while (inner.idle_rx.len() as u32) > min_idle {
        match inner.idle_rx.try_recv() {
            Ok(probed) => real_close(inner, probed).await,
            Err(_) => break,
        }
    }

    fill_to_min_idle(inner).await;
    inner.stats.fix_overflow();

    Ok(())
}

