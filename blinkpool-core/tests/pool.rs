//! End-to-end scenarios against the pool manager, backed by an in-memory mock
//! driver rather than a real database.

use async_trait::async_trait;
use blinkpool_core::driver::{ConnectionFactory, RawConnection};
use blinkpool_core::{Config, Error, PoolManager};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type DynError = Box<dyn std::error::Error + Send + Sync>;

struct MockConnection {
    id: u32,
    dead_ids: Arc<Mutex<HashSet<u32>>>,
}

#[async_trait]
impl RawConnection for MockConnection {
    async fn is_alive(&mut self, _timeout: Duration) -> bool {
        !self.dead_ids.lock().unwrap().contains(&self.id)
    }

    async fn execute(&mut self, _sql: &str) -> Result<(), DynError> {
        if self.dead_ids.lock().unwrap().contains(&self.id) {
            Err("connection is dead".into())
        } else {
            Ok(())
        }
    }

    async fn close(self: Box<Self>) -> Result<(), DynError> {
        Ok(())
    }
}

#[derive(Default)]
struct MockFactory {
    next_id: AtomicU32,
    dead_ids: Arc<Mutex<HashSet<u32>>>,
}

impl MockFactory {
    fn kill(&self, id: u32) {
        self.dead_ids.lock().unwrap().insert(id);
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    async fn open(
        &self,
        _url: &str,
        _username: &str,
        _password: &str,
    ) -> Result<Box<dyn RawConnection>, DynError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            id,
            dead_ids: Arc::clone(&self.dead_ids),
        }))
    }
}

fn base_config() -> Config {
    Config::new("jdbc:postgresql://localhost/test")
}

#[tokio::test]
async fn basic_borrow_and_return() {
    let config = base_config()
        .min_idle(5)
        .max_pool_size(20)
        .async_init_idle(false)
        .validate_and_normalize()
        .unwrap();
    let factory = Arc::new(MockFactory::default());

    let pool = PoolManager::new(config, factory).await.unwrap();
    assert_eq!(pool.current_pool_size(), 5);
    assert_eq!(pool.stats().total_creations, 5);

    let conn = pool.borrow().await.unwrap();
    assert_eq!(pool.current_pool_size(), 4);
    assert_eq!(pool.current_borrowings(), 1);

    conn.close().await;
    assert_eq!(pool.current_pool_size(), 5);
    assert_eq!(pool.current_borrowings(), 0);
    assert_eq!(pool.stats().total_returns, 1);
}

#[tokio::test]
async fn saturation_times_out_the_extra_borrower() {
    let config = base_config()
        .min_idle(1)
        .max_pool_size(2)
        .borrow_timeout(Duration::from_millis(200))
        .validate_and_normalize()
        .unwrap();
    let factory = Arc::new(MockFactory::default());

    let pool = PoolManager::new(config, factory).await.unwrap();

    let _c1 = pool.borrow().await.unwrap();
    let _c2 = pool.borrow().await.unwrap();
    assert_eq!(pool.current_borrowings(), 2);

    let start = tokio::time::Instant::now();
    let result = pool.borrow().await;
    assert!(matches!(result, Err(Error::BorrowTimeout(_))));
    assert!(start.elapsed() >= Duration::from_millis(190));
    assert_eq!(pool.current_borrowings(), 2);
}

#[tokio::test]
async fn dead_connection_is_replaced_on_borrow() {
    let config = base_config()
        .min_idle(1)
        .max_pool_size(5)
        .check_interval_ms(0) // probe on every borrow
        .validate_and_normalize()
        .unwrap();
    let factory = Arc::new(MockFactory::default());
    factory.kill(0); // the one connection created during construction

    let pool = PoolManager::new(config, factory).await.unwrap();

    let mut conn = pool.borrow().await.unwrap();
    assert!(conn.execute("select 1").await.is_ok());

    let stats = pool.stats();
    assert_eq!(stats.total_invalids, 1);
    assert_eq!(stats.total_creations, 2);
    assert_eq!(stats.total_real_closeds, 1);
}

#[tokio::test(start_paused = true)]
async fn expired_connection_is_replaced_on_next_borrow() {
    let config = base_config()
        .min_idle(1)
        .max_pool_size(5)
        .max_lifetime(Duration::from_millis(60_000))
        .validate_and_normalize()
        .unwrap();
    let factory = Arc::new(MockFactory::default());

    let pool = PoolManager::new(config, factory).await.unwrap();

    tokio::time::advance(Duration::from_millis(61_000)).await;

    let _conn = pool.borrow().await.unwrap();
    assert_eq!(pool.stats().total_invalids, 1);
}

#[tokio::test(start_paused = true)]
async fn idle_trim_reduces_queue_to_min_idle_after_idle_timeout() {
    let config = base_config()
        .min_idle(2)
        .max_pool_size(20)
        .idle_timeout(Duration::from_secs(10))
        .async_init_idle(false)
        .validate_and_normalize()
        .unwrap();
    let factory = Arc::new(MockFactory::default());

    let pool = PoolManager::new(config, factory).await.unwrap();

    // Push the idle queue up to 10 by borrowing and returning 10 connections.
    let mut handles = Vec::new();
    for _ in 0..10 {
        handles.push(pool.borrow().await.unwrap());
    }
    for handle in handles {
        handle.close().await;
    }
    assert_eq!(pool.current_pool_size(), 10);

    tokio::time::advance(Duration::from_secs(11)).await;
    // Give the maintenance task's 5s ticks a chance to fire under paused time.
    tokio::time::advance(Duration::from_secs(6)).await;
    tokio::task::yield_now().await;

    assert_eq!(pool.current_pool_size(), 2);
    assert!(pool.stats().total_real_closeds >= 8);
}

#[tokio::test]
async fn shutdown_closes_idle_and_rejects_new_borrows() {
    let config = base_config()
        .min_idle(1)
        .max_pool_size(5)
        .validate_and_normalize()
        .unwrap();
    let factory = Arc::new(MockFactory::default());

    let pool = PoolManager::new(config, factory).await.unwrap();
    let conn = pool.borrow().await.unwrap();

    pool.shutdown().await;
    assert_eq!(pool.current_pool_size(), 0);

    conn.close().await;

    let err = pool.borrow().await.unwrap_err();
    assert!(matches!(err, Error::PoolClosed));

    // idempotent
    pool.shutdown().await;
}
