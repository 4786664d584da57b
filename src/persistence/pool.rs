//! Process-wide connection pool with bounded overflow.
//!
//! [`Pool`] owns every physical connection to the backing store. It is
//! created once at startup, shared by cloning the handle, and disposed once
//! at shutdown.
//!
//! # Capacity
//!
//! The connections themselves live in a `sqlx` pool configured by
//! [`SqlConnectionManager::pool_options`]: at most
//! `max_persistent + max_overflow` are open at once, `max_persistent` are
//! kept warm, and overflow connections left idle past `idle_timeout_secs`
//! are closed by the pool's reaper.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──initialize()──▶ Ready ──shutdown()──▶ Disposed
//! ```
//!
//! Shutdown wakes waiters, which fail with [`StoreError::PoolClosed`], and
//! waits for checked-out connections to come back before closing them.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::Serialize;
use sqlx::AnyPool;
use sqlx::any::Any;
use sqlx::pool::PoolConnection;
use sqlx::{AnyConnection, Connection};
use tokio::time::Instant;

use super::error::StoreError;
use super::manager::{SqlConnectionManager, execute};

const UNINITIALIZED: u8 = 0;
const STARTING: u8 = 1;
const READY: u8 = 2;
const DISPOSED: u8 = 3;

/// Pool sizing and connection-health settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolConfig {
    /// Connections kept open while idle.
    pub max_persistent: u32,
    /// Additional transient connections allowed under load.
    pub max_overflow: u32,
    /// Maximum connection age in seconds before replacement; `0` disables.
    pub recycle_seconds: u64,
    /// Verify liveness of idle connections before handing them out.
    pub pre_ping: bool,
    /// Backend connection URL.
    #[serde(skip)]
    pub backend_url: String,
    /// Seconds to wait for capacity before [`StoreError::PoolExhausted`].
    pub acquire_timeout_secs: u64,
    /// Seconds an idle overflow connection survives before it is closed.
    pub idle_timeout_secs: u64,
    /// Log every statement (diagnostic only).
    pub echo_queries: bool,
}

impl PoolConfig {
    /// Hard ceiling on simultaneously live connections.
    #[must_use]
    pub const fn max_connections(&self) -> u32 {
        self.max_persistent.saturating_add(self.max_overflow)
    }

    /// Maximum connection age, if recycling is enabled.
    #[must_use]
    pub const fn recycle_after(&self) -> Option<Duration> {
        if self.recycle_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.recycle_seconds))
        }
    }

    /// Time an acquisition may wait for capacity.
    #[must_use]
    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Checks sizing invariants.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if `max_persistent` is zero.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.max_persistent == 0 {
            return Err(StoreError::Config(
                "max_persistent must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Observable lifecycle of a [`Pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolLifecycle {
    /// Created but not yet initialized.
    Uninitialized,
    /// Accepting acquisitions.
    Ready,
    /// Shut down (terminal).
    Disposed,
}

/// Point-in-time view of pool usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Current lifecycle state.
    pub lifecycle: PoolLifecycle,
    /// Physical connections currently open.
    pub live: usize,
    /// Connections parked and ready for reuse.
    pub idle: usize,
    /// Connections checked out or on their way back.
    pub in_use: usize,
    /// Capacity slots free for new checkouts.
    pub available: usize,
    /// Configured ceiling.
    pub max_connections: u32,
}

struct PoolInner {
    manager: SqlConnectionManager,
    config: PoolConfig,
    state: AtomicU8,
    connections: OnceLock<AnyPool>,
    next_lease: AtomicU64,
}

/// Shared handle to the connection pool.
///
/// Cloning the handle is cheap; all clones refer to the same pool.
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Clone for Pool {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("manager", &self.inner.manager)
            .field("status", &self.status())
            .finish()
    }
}

impl Pool {
    /// Creates an uninitialized pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if `config` is invalid.
    pub fn new(manager: SqlConnectionManager, config: PoolConfig) -> Result<Self, StoreError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(PoolInner {
                manager,
                config,
                state: AtomicU8::new(UNINITIALIZED),
                connections: OnceLock::new(),
                next_lease: AtomicU64::new(1),
            }),
        })
    }

    /// Transitions the pool to `Ready`.
    ///
    /// One connection is opened up front so that an unreachable backend
    /// fails startup instead of the first request.
    ///
    /// # Errors
    ///
    /// - [`StoreError::PoolAlreadyInitialized`] if already running.
    /// - [`StoreError::PoolClosed`] if the pool was shut down.
    /// - Any connection error from the first connection; the pool stays
    ///   uninitialized in that case.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        match self.inner.state.compare_exchange(
            UNINITIALIZED,
            STARTING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {}
            Err(DISPOSED) => return Err(StoreError::PoolClosed),
            Err(_) => return Err(StoreError::PoolAlreadyInitialized),
        }

        let manager = &self.inner.manager;
        let connected = manager
            .pool_options(&self.inner.config)
            .connect(manager.url())
            .await;
        let connections = match connected {
            Ok(connections) => connections,
            Err(e) => {
                let _ = self.inner.state.compare_exchange(
                    STARTING,
                    UNINITIALIZED,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                return Err(StoreError::from(e));
            }
        };
        if let Err(connections) = self.inner.connections.set(connections) {
            connections.close().await;
            return Err(StoreError::PoolAlreadyInitialized);
        }

        if self
            .inner
            .state
            .compare_exchange(STARTING, READY, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Shut down while connecting.
            if let Some(connections) = self.inner.connections.get() {
                connections.close().await;
            }
            return Err(StoreError::PoolClosed);
        }

        tracing::info!(
            max_persistent = self.inner.config.max_persistent,
            max_overflow = self.inner.config.max_overflow,
            pre_ping = self.inner.config.pre_ping,
            "connection pool ready"
        );
        Ok(())
    }

    /// Checks out a connection, waiting for capacity if necessary.
    ///
    /// Idle connections past their recycle age are replaced. With
    /// `pre_ping`, an idle connection failing its liveness check is closed
    /// and a fresh one is opened in its place.
    ///
    /// # Errors
    ///
    /// - [`StoreError::PoolUninitialized`] before [`Pool::initialize`].
    /// - [`StoreError::PoolClosed`] after (or during) [`Pool::shutdown`].
    /// - [`StoreError::PoolExhausted`] if no capacity frees up in time.
    /// - [`StoreError::ConnectionLost`] if no healthy connection can be
    ///   opened.
    pub async fn acquire(&self) -> Result<PooledConnection, StoreError> {
        let connections = self.inner.ready()?;
        let started = Instant::now();
        let conn = connections.acquire().await.map_err(|e| match e {
            sqlx::Error::PoolTimedOut => {
                let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(waited_ms, "connection pool exhausted");
                StoreError::PoolExhausted { waited_ms }
            }
            sqlx::Error::PoolClosed => StoreError::PoolClosed,
            other => StoreError::ConnectionLost(other.to_string()),
        })?;

        let lease = self.inner.next_lease.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(lease, "connection checked out");
        Ok(PooledConnection {
            conn: Some(conn),
            lease,
            needs_reset: false,
        })
    }

    /// Disposes the pool. Idempotent.
    ///
    /// Pending and future acquisitions fail with [`StoreError::PoolClosed`].
    /// Idle connections are closed at once; checked-out connections stay
    /// usable and are closed as they are released. Returns once every
    /// connection is closed.
    pub async fn shutdown(&self) {
        if self.inner.state.swap(DISPOSED, Ordering::AcqRel) == DISPOSED {
            return;
        }
        if let Some(connections) = self.inner.connections.get() {
            connections.close().await;
        }
        tracing::info!("connection pool shut down");
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> PoolLifecycle {
        self.inner.lifecycle()
    }

    /// Snapshot of usage counters.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let max_connections = self.inner.config.max_connections();
        let (live, idle) = self.inner.connections.get().map_or((0, 0), |connections| {
            let live = usize::try_from(connections.size()).unwrap_or(usize::MAX);
            (live, connections.num_idle())
        });
        let in_use = live.saturating_sub(idle);
        let total = usize::try_from(max_connections).unwrap_or(usize::MAX);
        PoolStatus {
            lifecycle: self.lifecycle(),
            live,
            idle,
            in_use,
            available: total.saturating_sub(in_use),
            max_connections,
        }
    }

    /// Pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// The connection manager.
    #[must_use]
    pub fn manager(&self) -> &SqlConnectionManager {
        &self.inner.manager
    }
}

impl PoolInner {
    fn lifecycle(&self) -> PoolLifecycle {
        match self.state.load(Ordering::Acquire) {
            READY => PoolLifecycle::Ready,
            DISPOSED => PoolLifecycle::Disposed,
            _ => PoolLifecycle::Uninitialized,
        }
    }

    fn ready(&self) -> Result<&AnyPool, StoreError> {
        match self.lifecycle() {
            PoolLifecycle::Ready => self
                .connections
                .get()
                .ok_or(StoreError::PoolUninitialized),
            PoolLifecycle::Uninitialized => Err(StoreError::PoolUninitialized),
            PoolLifecycle::Disposed => Err(StoreError::PoolClosed),
        }
    }
}

/// A connection checked out of a [`Pool`].
///
/// Dropping it returns the connection to the pool. When flagged with
/// [`PooledConnection::mark_needs_reset`] it is rolled back first, and it
/// keeps its capacity slot until that finishes.
pub struct PooledConnection {
    conn: Option<PoolConnection<Any>>,
    lease: u64,
    needs_reset: bool,
}

impl PooledConnection {
    /// Pool-unique identifier of this checkout.
    #[must_use]
    pub const fn lease(&self) -> u64 {
        self.lease
    }

    /// Requests a transaction reset before the connection is reused.
    pub fn mark_needs_reset(&mut self) {
        self.needs_reset = true;
    }
}

impl Deref for PooledConnection {
    type Target = AnyConnection;

    fn deref(&self) -> &Self::Target {
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("connection is present until drop"),
        }
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.conn {
            Some(conn) => conn,
            None => unreachable!("connection is present until drop"),
        }
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("lease", &self.lease)
            .field("needs_reset", &self.needs_reset)
            .finish()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        let lease = self.lease;
        match tokio::runtime::Handle::try_current() {
            Ok(_) if !self.needs_reset => drop(conn),
            Ok(handle) => {
                tracing::debug!(lease, "rolling back abandoned transaction");
                drop(handle.spawn(reset(conn, lease)));
            }
            Err(_) => {
                // Returning to the pool needs a runtime; close it instead.
                tracing::debug!(lease, "connection released without a runtime");
                drop(conn.detach());
            }
        }
    }
}

/// Rolls back `conn` and returns it to the pool, or closes it for good.
async fn reset(mut conn: PoolConnection<Any>, lease: u64) {
    if let Err(e) = execute(&mut conn, "ROLLBACK", Vec::new()).await {
        tracing::warn!(lease, error = %e, "reset failed, discarding connection");
        if let Err(e) = conn.detach().close().await {
            tracing::debug!(lease, error = %e, "close after failed reset");
        }
    }
}
