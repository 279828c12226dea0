//! The driver seam: the only place this crate talks to an actual database.
//!
//! The pool never parses SQL and never interprets driver-specific errors beyond
//! "did opening succeed" and "is this session still alive". Everything else about
//! a session is opaque to the pool.

use async_trait::async_trait;
use std::fmt;

/// A single raw, already-open database session.
///
/// Implementations are provided by whatever driver crate the application links
/// against; this crate only ever sees them through this trait.
#[async_trait]
pub trait RawConnection: Send + Sync + 'static {
    /// Returns whether the underlying session is still usable, waiting no longer
    /// than `timeout`.
    ///
    /// Drivers that have a cheap native liveness check (a protocol-level ping)
    /// should use it here rather than issuing a query.
    async fn is_alive(&mut self, timeout: std::time::Duration) -> bool;

    /// Runs `sql` against the session and discards any result, returning `Ok(())`
    /// only if the statement completed without error.
    ///
    /// Used in place of [`is_alive`][Self::is_alive] when a pool is configured
    /// with an explicit `check_sql`.
    async fn execute(&mut self, sql: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Tears the session down. Errors are logged by the caller and otherwise
    /// ignored - there is no recovery action to take on a failed close.
    async fn close(self: Box<Self>) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Opens new [`RawConnection`]s against a `jdbc:`-style URL and credential pair.
///
/// One factory is bound to a pool for its entire lifetime; this crate never
/// selects between several factories at runtime. The URL and credentials are
/// passed on every call rather than captured once, so the same factory
/// implementation can be reused across pools with different configurations.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Opens one new session against `url`, authenticating with `username` and
    /// `password`.
    async fn open(
        &self,
        url: &str,
        username: &str,
        password: &str,
    ) -> Result<Box<dyn RawConnection>, Box<dyn std::error::Error + Send + Sync>>;
}

impl fmt::Debug for dyn ConnectionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn ConnectionFactory")
    }
}

impl fmt::Debug for dyn RawConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn RawConnection")
    }
}
