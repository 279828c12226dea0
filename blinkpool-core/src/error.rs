use std::time::Duration;

/// The error type for all fallible operations in this crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// [`Config::validate_and_normalize`][crate::config::Config::validate_and_normalize] rejected
    /// the configuration.
    #[error("invalid pool configuration: {0}")]
    Config(String),

    /// The driver's connection factory failed to open a new session.
    #[error("failed to open a new connection")]
    Connect(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// [`PoolManager::borrow`][crate::manager::PoolManager::borrow] was called after
    /// [`PoolManager::shutdown`][crate::manager::PoolManager::shutdown].
    #[error("pool is closed")]
    PoolClosed,

    /// No idle connection became available within the configured `borrow_timeout`.
    #[error("timed out after {0:?} waiting for a connection")]
    BorrowTimeout(Duration),

    /// The calling task was cancelled while waiting for a connection.
    #[error("interrupted while waiting for a connection")]
    Interrupted,
}

/// A specialized [`Result`](std::result::Result) for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, Error>;
