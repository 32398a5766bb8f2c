//! Bounded pool of exclusive session handles.
//!
//! Fixed size, set at construction. `acquire` suspends the caller until a
//! handle frees up or the configured wait elapses, then fails with
//! `PoolExhausted`. Leases are exclusive RAII guards: the handle returns to
//! the pool exactly once, on every exit path, including drop during
//! cancellation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::config::{HostConfig, PoolConfig};
use crate::error::{Result, XenError};
use crate::remote::handle::RemoteHandle;
use crate::remote::transport::RemoteTransport;

struct PoolInner {
    idle: Mutex<Vec<Arc<RemoteHandle>>>,
    permits: Arc<Semaphore>,
    acquire_timeout: Duration,
    size: usize,
}

/// A bounded set of authenticated session handles.
///
/// Constructed explicitly at service start and shut down at service stop;
/// callers receive it by injection, never through a global.
#[derive(Clone)]
pub struct SessionPool {
    inner: Arc<PoolInner>,
}

impl SessionPool {
    /// Log in `pool.size` sessions against the given transport.
    pub async fn connect(
        transport: Arc<dyn RemoteTransport>,
        host: &HostConfig,
        pool: &PoolConfig,
    ) -> Result<Self> {
        if pool.size == 0 {
            return Err(XenError::InvalidArgument(
                "pool.size must be at least 1".into(),
            ));
        }
        let mut handles = Vec::with_capacity(pool.size);
        for _ in 0..pool.size {
            let handle = RemoteHandle::connect(
                Arc::clone(&transport),
                &host.username,
                &host.password,
                pool.session_retry_limit,
            )
            .await?;
            handles.push(Arc::new(handle));
        }
        info!(size = pool.size, "session pool connected");
        Ok(Self {
            inner: Arc::new(PoolInner {
                idle: Mutex::new(handles),
                permits: Arc::new(Semaphore::new(pool.size)),
                acquire_timeout: pool.acquire_timeout(),
                size: pool.size,
            }),
        })
    }

    /// Acquire an exclusive lease on one session handle.
    ///
    /// Suspends until a handle is free or the configured wait elapses.
    pub async fn acquire(&self) -> Result<SessionLease> {
        let started = Instant::now();
        let permit = tokio::time::timeout(
            self.inner.acquire_timeout,
            Arc::clone(&self.inner.permits).acquire_owned(),
        )
        .await
        .map_err(|_| {
            let waited_ms = started.elapsed().as_millis() as u64;
            warn!(waited_ms, "session pool exhausted");
            XenError::PoolExhausted { waited_ms }
        })?
        .map_err(|_| {
            // Semaphore closed: the pool has been shut down.
            XenError::SessionUnavailable { attempts: 0 }
        })?;

        let handle = self
            .inner
            .idle
            .lock()
            .pop()
            .ok_or(XenError::SessionUnavailable { attempts: 0 })?;
        debug!("session lease acquired");
        Ok(SessionLease {
            handle: Some(handle),
            permit: Some(permit),
            pool: Arc::clone(&self.inner),
        })
    }

    /// Number of handles currently available without waiting.
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Fixed pool size.
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Log out every idle session and refuse further acquisition.
    ///
    /// Outstanding leases return their handles to the idle list as usual;
    /// their sessions are released by the host's own expiry.
    pub async fn shutdown(&self) {
        self.inner.permits.close();
        let handles: Vec<_> = self.inner.idle.lock().drain(..).collect();
        for handle in handles {
            if let Err(failure) = handle.logout().await {
                warn!(error = %failure, "logout failed during pool shutdown");
            }
        }
        info!("session pool shut down");
    }
}

/// Exclusive, time-unbounded loan of one session handle.
///
/// Dropping the lease returns the handle to the pool; `release` does the
/// same explicitly and is safe to call from a cleanup path that may run
/// after (or instead of) normal completion.
pub struct SessionLease {
    handle: Option<Arc<RemoteHandle>>,
    permit: Option<OwnedSemaphorePermit>,
    pool: Arc<PoolInner>,
}

impl SessionLease {
    /// The leased handle.
    ///
    /// # Panics
    ///
    /// Panics if called after `release`; a released lease must not be used
    /// again by its prior holder.
    pub fn handle(&self) -> &RemoteHandle {
        self.handle
            .as_deref()
            .expect("session lease used after release")
    }

    /// Return the handle to the pool. Idempotent.
    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.idle.lock().push(handle);
            // Dropping the permit wakes exactly one waiter.
            self.permit.take();
            debug!("session lease released");
        }
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.release();
    }
}

// RemoteHandle holds a trait object, so this is spelled out by hand.
impl std::fmt::Debug for SessionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLease")
            .field("held", &self.handle.is_some())
            .finish()
    }
}
