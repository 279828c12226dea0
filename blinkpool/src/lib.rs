//! `blinkpool`: the application-facing entry point for a lightweight,
//! high-performance async database connection pool.
//!
//! Most applications only need [`DataSource`]. The engine that actually
//! implements the pool lives in `blinkpool-core` and is re-exported here for
//! convenience (error types, the `Config` builder, and the driver traits).

pub use blinkpool_core::config::{CheckInterval, Config};
pub use blinkpool_core::driver::{ConnectionFactory, RawConnection};
pub use blinkpool_core::error::{Error, Result};
pub use blinkpool_core::stats::StatsSnapshot;
pub use blinkpool_core::PooledConnection;

use blinkpool_core::PoolManager;
use std::sync::Arc;

/// A validated, ready-to-use connection pool.
///
/// Construct with [`DataSource::new`], borrow connections with
/// [`DataSource::borrow`], and call [`DataSource::close`] when done (or just
/// let it drop - outstanding connections still return to a closing pool
/// correctly, see the core crate's shutdown contract).
pub struct DataSource {
    manager: PoolManager,
}

impl DataSource {
    /// Validates `config`, opens the first connection synchronously (so a bad
    /// URL or unreachable database fails here rather than on first use), and
    /// starts the background maintenance task.
    pub async fn new(config: Config, factory: Arc<dyn ConnectionFactory>) -> Result<DataSource> {
        let config = config.validate_and_normalize()?;
        let manager = PoolManager::new(config, factory).await?;
        Ok(DataSource { manager })
    }

    /// Borrows a connection, waiting up to the configured `borrow_timeout` if
    /// the pool is momentarily saturated.
    pub async fn borrow(&self) -> Result<PooledConnection> {
        self.manager.borrow().await
    }

    /// Current number of idle connections sitting in the pool.
    pub fn current_pool_size(&self) -> u32 {
        self.manager.current_pool_size()
    }

    /// Current number of connections checked out by callers.
    pub fn current_borrowings(&self) -> u32 {
        self.manager.current_borrowings()
    }

    /// A point-in-time snapshot of the pool's counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.manager.stats()
    }

    /// Shuts the pool down. Idempotent; safe to call more than once.
    pub async fn close(&self) {
        self.manager.shutdown().await;
    }
}
