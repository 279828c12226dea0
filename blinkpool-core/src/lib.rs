//! Core engine of blink-pool: a lightweight, high-performance pool of reusable
//! database connections.
//!
//! Not intended to be used directly; see the
//! [`blinkpool`](https://docs.rs/blinkpool) crate for the application-facing
//! `DataSource`. This crate holds the bounded idle queue, the borrow/return
//! protocol, the liveness/lifetime policy, and the background maintenance
//! task - the part of the system that is actually interesting to get right.

#![forbid(unsafe_code)]

pub mod config;
pub mod driver;
pub mod error;
mod handle;
mod manager;
mod population;
mod probed;
pub mod stats;

pub use config::Config;
pub use driver::{ConnectionFactory, RawConnection};
pub use error::{Error, Result};
pub use handle::PooledConnection;
pub use manager::PoolManager;
pub use stats::StatsSnapshot;
