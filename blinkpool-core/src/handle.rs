//! The handle callers actually hold: a [`PooledConnection`] derefs to the
//! underlying [`RawConnection`] and returns itself to the pool on `close()` or
//! on drop.

use crate::driver::RawConnection;
use crate::manager::{return_connection, Inner};
use crate::probed::ProbedConnection;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// A connection checked out from a [`PoolManager`][crate::manager::PoolManager].
///
/// Delegates every operation to the underlying driver session except `close`,
/// which returns the connection to the pool instead of tearing it down. If the
/// handle is simply dropped without calling `close`, the same return happens
/// from the `Drop` impl.
pub struct PooledConnection {
    probed: Option<ProbedConnection>,
    pool: Arc<Inner>,
}

const DEREF_ERR: &str = "(bug) PooledConnection used after close()";

impl PooledConnection {
    pub(crate) fn new(pool: Arc<Inner>, probed: ProbedConnection) -> Self {
        PooledConnection {
            probed: Some(probed),
            pool,
        }
    }

    /// Returns this connection to the pool. Equivalent to dropping the handle,
    /// but awaitable so callers can be sure the return has completed (for
    /// instance before shutting the pool down).
    pub async fn close(mut self) {
        if let Some(probed) = self.probed.take() {
            return_connection(&self.pool, probed).await;
        }
    }
}

impl Deref for PooledConnection {
    type Target = dyn RawConnection;

    fn deref(&self) -> &Self::Target {
        self.probed.as_ref().expect(DEREF_ERR).raw()
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.probed.as_mut().expect(DEREF_ERR).raw_mut()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(probed) = self.probed.take() {
            let pool = Arc::clone(&self.pool);
            tokio::spawn(async move {
                return_connection(&pool, probed).await;
            });
        }
    }
}
