//! Connection pooling for datagate.
//!
//! `Pool<C>` bounds the number of open connections, reuses idle ones and hands
//! them out as RAII [`PooledConnection`] guards. A guard returns its connection
//! exactly once, when dropped, and the pool discards connections that report
//! themselves unusable (an exchange abandoned by a deadline or cancellation,
//! a lost link) instead of handing them to the next caller.
//!
//! Connections are created lazily by a caller-supplied factory, so the pool
//! knows nothing about drivers.
//!
//! # Example
//!
//! ```ignore
//! let pool = Pool::new(PoolConfig::new(10).min_connections(2));
//! pool.warm_up(&cx, || PgConnection::connect(&cx, pg_config.clone())).await;
//!
//! let conn = pool.acquire(&cx, || PgConnection::connect(&cx, pg_config.clone())).await?;
//! let rows = conn.query(&cx, "SELECT 1", &[]).await?;
//! // returned to the pool here
//! ```

pub mod config;

pub use config::{PoolConfig, PoolSettings};

use std::collections::VecDeque;
use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use asupersync::{Cx, Outcome};
use datagate_core::{Connection, Deadline, Error, PoolErrorKind, Result, with_deadline};

// ============================================================================
// Pool state
// ============================================================================

struct IdleConnection<C> {
    conn: C,
    created_at: Instant,
    idle_since: Instant,
}

struct PoolState<C> {
    idle: VecDeque<IdleConnection<C>>,
    /// Open connections, idle or checked out, plus slots reserved for
    /// connections being created.
    total: usize,
    waiters: Vec<(u64, Waker)>,
    next_waiter: u64,
    closed: bool,
}

#[derive(Default)]
struct Counters {
    acquired: AtomicU64,
    created: AtomicU64,
    timeouts: AtomicU64,
    discarded: AtomicU64,
}

struct PoolInner<C> {
    config: PoolConfig,
    state: Mutex<PoolState<C>>,
    counters: Counters,
}

impl<C: Connection> PoolInner<C> {
    fn lock(&self) -> MutexGuard<'_, PoolState<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, created_at: Instant, idle_since: Instant, now: Instant) -> bool {
        let too_old = self
            .config
            .max_lifetime
            .is_some_and(|max| now.saturating_duration_since(created_at) >= max);
        let too_idle = self
            .config
            .idle_timeout
            .is_some_and(|max| now.saturating_duration_since(idle_since) >= max);
        too_old || too_idle
    }

    /// Whether a waiter could make progress right now.
    fn slot_available(&self, state: &PoolState<C>) -> bool {
        state.closed || !state.idle.is_empty() || state.total < self.config.max_connections
    }

    fn wake_waiters(state: &mut PoolState<C>) -> Vec<Waker> {
        std::mem::take(&mut state.waiters)
            .into_iter()
            .map(|(_, w)| w)
            .collect()
    }

    /// Give a slot back without returning a connection.
    fn release_slot(&self) {
        let mut state = self.lock();
        state.total = state.total.saturating_sub(1);
        let wakers = Self::wake_waiters(&mut state);
        drop(state);
        wakers.into_iter().for_each(Waker::wake);
    }

    /// Return a checked-out connection.
    fn release(&self, conn: C, created_at: Instant, reusable: bool) {
        let now = Instant::now();
        let mut state = self.lock();
        let keep = reusable && !state.closed && !self.is_expired(created_at, now, now);
        let dropped = if keep {
            state.idle.push_back(IdleConnection {
                conn,
                created_at,
                idle_since: now,
            });
            None
        } else {
            state.total = state.total.saturating_sub(1);
            self.counters.discarded.fetch_add(1, Ordering::Relaxed);
            Some(conn)
        };
        let wakers = Self::wake_waiters(&mut state);
        drop(state);

        if dropped.is_some() {
            tracing::debug!(reusable, "Discarding pooled connection");
        }
        drop(dropped);
        wakers.into_iter().for_each(Waker::wake);
    }
}

enum Step<C> {
    Reuse(IdleConnection<C>),
    Create,
    Wait,
    Closed,
}

/// Releases a reserved slot unless a connection was created into it.
struct SlotReservation<'a, C: Connection> {
    inner: &'a PoolInner<C>,
    armed: bool,
}

impl<C: Connection> SlotReservation<'_, C> {
    fn fulfil(mut self) {
        self.armed = false;
    }
}

impl<C: Connection> Drop for SlotReservation<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.release_slot();
        }
    }
}

/// Resolves once a slot may be free (or the pool closed).
struct SlotWait<'a, C: Connection> {
    inner: &'a PoolInner<C>,
    id: Option<u64>,
}

impl<C: Connection> Future for SlotWait<'_, C> {
    type Output = Outcome<(), Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let inner = self.inner;
        let mut state = inner.lock();
        match self.id {
            None => {
                if inner.slot_available(&state) {
                    return Poll::Ready(Outcome::Ok(()));
                }
                let id = state.next_waiter;
                state.next_waiter = state.next_waiter.wrapping_add(1);
                state.waiters.push((id, cx.waker().clone()));
                drop(state);
                self.id = Some(id);
                Poll::Pending
            }
            Some(id) => {
                if let Some((_, waker)) = state.waiters.iter_mut().find(|(w, _)| *w == id) {
                    waker.clone_from(cx.waker());
                    return Poll::Pending;
                }
                // Woken: the entry was removed by the waker.
                drop(state);
                self.id = None;
                Poll::Ready(Outcome::Ok(()))
            }
        }
    }
}

impl<C: Connection> Drop for SlotWait<'_, C> {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            self.inner.lock().waiters.retain(|(w, _)| *w != id);
        }
    }
}

// ============================================================================
// Pool
// ============================================================================

/// Point-in-time pool statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Open connections (idle + active).
    pub total: usize,
    pub idle: usize,
    pub active: usize,
    /// Callers waiting for a slot.
    pub waiting: usize,
    pub max_connections: usize,
    /// Successful acquires since creation.
    pub acquired: u64,
    /// Connections created since creation.
    pub created: u64,
    /// Acquires that gave up waiting.
    pub timeouts: u64,
    /// Connections closed instead of being reused.
    pub discarded: u64,
}

/// A bounded pool of database connections.
pub struct Pool<C: Connection> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Connection> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connection> Pool<C> {
    /// Create an empty pool. No connection is opened until the first acquire
    /// (or `warm_up`).
    pub fn new(config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                config,
                state: Mutex::new(PoolState {
                    idle: VecDeque::new(),
                    total: 0,
                    waiters: Vec::new(),
                    next_waiter: 0,
                    closed: false,
                }),
                counters: Counters::default(),
            }),
        }
    }

    /// Create a pool after validating its configuration.
    pub fn try_new(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    fn next_step(&self) -> Step<C> {
        let now = Instant::now();
        let mut expired = Vec::new();
        let mut state = self.inner.lock();
        let step = if state.closed {
            Step::Closed
        } else {
            let mut reuse = None;
            while let Some(idle) = state.idle.pop_back() {
                if self.inner.is_expired(idle.created_at, idle.idle_since, now) {
                    state.total = state.total.saturating_sub(1);
                    expired.push(idle.conn);
                    continue;
                }
                reuse = Some(idle);
                break;
            }
            match reuse {
                Some(idle) => Step::Reuse(idle),
                None if state.total < self.inner.config.max_connections => {
                    state.total += 1;
                    Step::Create
                }
                None => Step::Wait,
            }
        };
        let wakers = if expired.is_empty() {
            Vec::new()
        } else {
            PoolInner::wake_waiters(&mut state)
        };
        drop(state);

        if !expired.is_empty() {
            self.inner
                .counters
                .discarded
                .fetch_add(expired.len() as u64, Ordering::Relaxed);
            tracing::debug!(expired = expired.len(), "Closing expired idle connections");
        }
        drop(expired);
        wakers.into_iter().for_each(Waker::wake);
        step
    }

    fn exhausted(&self) -> Error {
        self.inner.counters.timeouts.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            max_connections = self.inner.config.max_connections,
            timeout_ms = self.inner.config.acquire_timeout.as_millis() as u64,
            "Timed out waiting for a pooled connection"
        );
        Error::pool(
            PoolErrorKind::Exhausted,
            format!(
                "no connection available within {:?} (max_connections = {})",
                self.inner.config.acquire_timeout, self.inner.config.max_connections
            ),
        )
    }

    fn checkout(&self, conn: C, created_at: Instant) -> PooledConnection<C> {
        self.inner.counters.acquired.fetch_add(1, Ordering::Relaxed);
        PooledConnection {
            conn: Some(conn),
            created_at,
            pool: Arc::clone(&self.inner),
            discard: false,
        }
    }

    /// Acquire a connection, creating one with `factory` when the pool has
    /// room and no idle connection is usable.
    ///
    /// Waits up to `acquire_timeout` for a slot, then fails with a
    /// `PoolErrorKind::Exhausted` error.
    #[tracing::instrument(level = "debug", skip(self, cx, factory))]
    pub async fn acquire<F, Fut>(&self, cx: &Cx, factory: F) -> Outcome<PooledConnection<C>, Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Outcome<C, Error>>,
    {
        let deadline = Deadline::after(self.inner.config.acquire_timeout);
        loop {
            if let Some(reason) = cx.cancel_reason() {
                return Outcome::Cancelled(reason);
            }

            match self.next_step() {
                Step::Closed => {
                    return Outcome::Err(Error::pool(PoolErrorKind::Closed, "pool is closed"));
                }
                Step::Reuse(idle) => return Outcome::Ok(self.checkout(idle.conn, idle.created_at)),
                Step::Create => {
                    let reservation = SlotReservation {
                        inner: &self.inner,
                        armed: true,
                    };
                    return match factory().await {
                        Outcome::Ok(conn) => {
                            reservation.fulfil();
                            self.inner.counters.created.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!("Opened new pooled connection");
                            Outcome::Ok(self.checkout(conn, Instant::now()))
                        }
                        Outcome::Err(e) => Outcome::Err(e),
                        Outcome::Cancelled(r) => Outcome::Cancelled(r),
                        Outcome::Panicked(p) => Outcome::Panicked(p),
                    };
                }
                Step::Wait => {
                    if deadline.is_expired() {
                        return Outcome::Err(self.exhausted());
                    }
                    let wait = SlotWait {
                        inner: &self.inner,
                        id: None,
                    };
                    match with_deadline(deadline, wait).await {
                        Outcome::Ok(()) => {}
                        Outcome::Err(Error::Timeout) => return Outcome::Err(self.exhausted()),
                        Outcome::Err(e) => return Outcome::Err(e),
                        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                        Outcome::Panicked(p) => return Outcome::Panicked(p),
                    }
                }
            }
        }
    }

    /// Open connections until `min_connections` are available.
    ///
    /// Returns the number of connections opened.
    #[tracing::instrument(level = "debug", skip(self, cx, factory))]
    pub async fn warm_up<F, Fut>(&self, cx: &Cx, factory: F) -> Outcome<usize, Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Outcome<C, Error>>,
    {
        let mut opened = 0;
        loop {
            if let Some(reason) = cx.cancel_reason() {
                return Outcome::Cancelled(reason);
            }
            {
                let mut state = self.inner.lock();
                if state.closed || state.total >= self.inner.config.min_connections {
                    break;
                }
                state.total += 1;
            }
            let reservation = SlotReservation {
                inner: &self.inner,
                armed: true,
            };
            match factory().await {
                Outcome::Ok(conn) => {
                    reservation.fulfil();
                    self.inner.counters.created.fetch_add(1, Ordering::Relaxed);
                    self.inner.release(conn, Instant::now(), true);
                    opened += 1;
                }
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        tracing::info!(opened, "Connection pool warmed up");
        Outcome::Ok(opened)
    }

    /// Current statistics.
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.lock();
        let idle = state.idle.len();
        PoolStats {
            total: state.total,
            idle,
            active: state.total.saturating_sub(idle),
            waiting: state.waiters.len(),
            max_connections: self.inner.config.max_connections,
            acquired: self.inner.counters.acquired.load(Ordering::Relaxed),
            created: self.inner.counters.created.load(Ordering::Relaxed),
            timeouts: self.inner.counters.timeouts.load(Ordering::Relaxed),
            discarded: self.inner.counters.discarded.load(Ordering::Relaxed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Close the pool.
    ///
    /// Idle connections are closed now; checked-out connections are closed
    /// when their guards drop. Pending and future acquires fail.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn close(&self, cx: &Cx) {
        let (idle, wakers) = {
            let mut state = self.inner.lock();
            state.closed = true;
            let idle: Vec<IdleConnection<C>> = state.idle.drain(..).collect();
            state.total = state.total.saturating_sub(idle.len());
            (idle, PoolInner::wake_waiters(&mut state))
        };
        wakers.into_iter().for_each(Waker::wake);

        let count = idle.len();
        for entry in idle {
            if let Err(e) = entry.conn.close(cx).await {
                tracing::warn!(error = %e, "Error closing pooled connection");
            }
        }
        tracing::info!(closed = count, "Connection pool closed");
    }
}

impl<C: Connection> std::fmt::Debug for Pool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

// ============================================================================
// Pooled connection guard
// ============================================================================

/// A connection checked out of a [`Pool`].
///
/// Dereferences to the connection. Dropping the guard returns the connection,
/// or closes it when it is no longer reusable.
pub struct PooledConnection<C: Connection> {
    conn: Option<C>,
    created_at: Instant,
    pool: Arc<PoolInner<C>>,
    discard: bool,
}

impl<C: Connection> PooledConnection<C> {
    /// Close the connection instead of returning it to the pool.
    pub fn discard(mut self) {
        self.discard = true;
    }

    /// Time since the underlying connection was opened.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl<C: Connection> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl<C: Connection> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        let reusable = !self.discard && conn.is_reusable();
        self.pool.release(conn, self.created_at, reusable);
    }
}

impl<C: Connection + std::fmt::Debug> std::fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("conn", &self.conn)
            .field("age", &self.age())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asupersync::runtime::RuntimeBuilder;
    use datagate_core::{Executor, Row, TransactionOps, TxOptions, Value};
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    #[derive(Debug)]
    struct MockConn {
        id: usize,
        reusable: Arc<AtomicBool>,
    }

    struct MockTx;

    impl Executor for MockConn {
        fn query(
            &self,
            _cx: &Cx,
            _sql: &str,
            _params: &[Value],
        ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
            async { Outcome::Ok(Vec::new()) }
        }

        fn execute(
            &self,
            _cx: &Cx,
            _sql: &str,
            _params: &[Value],
        ) -> impl Future<Output = Outcome<u64, Error>> + Send {
            async { Outcome::Ok(0) }
        }
    }

    impl Executor for MockTx {
        fn query(
            &self,
            _cx: &Cx,
            _sql: &str,
            _params: &[Value],
        ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
            async { Outcome::Ok(Vec::new()) }
        }

        fn execute(
            &self,
            _cx: &Cx,
            _sql: &str,
            _params: &[Value],
        ) -> impl Future<Output = Outcome<u64, Error>> + Send {
            async { Outcome::Ok(0) }
        }
    }

    impl TransactionOps for MockTx {
        fn savepoint(&self, _cx: &Cx, _name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
            async { Outcome::Ok(()) }
        }

        fn rollback_to(
            &self,
            _cx: &Cx,
            _name: &str,
        ) -> impl Future<Output = Outcome<(), Error>> + Send {
            async { Outcome::Ok(()) }
        }

        fn release(&self, _cx: &Cx, _name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
            async { Outcome::Ok(()) }
        }

        fn commit(self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
            async { Outcome::Ok(()) }
        }

        fn rollback(self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
            async { Outcome::Ok(()) }
        }
    }

    impl Connection for MockConn {
        type Tx = MockTx;

        fn begin_with(
            &self,
            _cx: &Cx,
            _options: TxOptions,
        ) -> impl Future<Output = Outcome<Self::Tx, Error>> + Send {
            async { Outcome::Ok(MockTx) }
        }

        fn ping(&self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
            async { Outcome::Ok(()) }
        }

        fn is_reusable(&self) -> bool {
            self.reusable.load(Ordering::SeqCst)
        }

        fn close(self, _cx: &Cx) -> impl Future<Output = Result<()>> + Send {
            async { Ok(()) }
        }
    }

    struct Factory {
        next_id: AtomicUsize,
        reusable: Arc<AtomicBool>,
    }

    impl Factory {
        fn new() -> Self {
            Self {
                next_id: AtomicUsize::new(0),
                reusable: Arc::new(AtomicBool::new(true)),
            }
        }

        fn make(&self) -> impl Future<Output = Outcome<MockConn, Error>> + use<> {
            let conn = MockConn {
                id: self.next_id.fetch_add(1, Ordering::SeqCst),
                reusable: Arc::clone(&self.reusable),
            };
            async move { Outcome::Ok(conn) }
        }
    }

    fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
        match outcome {
            Outcome::Ok(v) => v,
            Outcome::Err(e) => panic!("unexpected error: {e}"),
            Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
            Outcome::Panicked(p) => panic!("panicked: {p:?}"),
        }
    }

    fn run<T>(fut: impl Future<Output = T>) -> T {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        rt.block_on(fut)
    }

    #[test]
    fn test_release_and_reuse() {
        run(async {
            let cx = Cx::for_testing();
            let pool = Pool::new(PoolConfig::new(2));
            let factory = Factory::new();

            let first = unwrap_outcome(pool.acquire(&cx, || factory.make()).await);
            assert_eq!(first.id, 0);
            assert_eq!(pool.stats().active, 1);
            drop(first);

            let stats = pool.stats();
            assert_eq!(stats.idle, 1);
            assert_eq!(stats.active, 0);

            let again = unwrap_outcome(pool.acquire(&cx, || factory.make()).await);
            assert_eq!(again.id, 0);
            assert_eq!(pool.stats().created, 1);
            assert_eq!(pool.stats().acquired, 2);
        });
    }

    #[test]
    fn test_exhausted_after_acquire_timeout() {
        run(async {
            let cx = Cx::for_testing();
            let pool = Pool::new(PoolConfig::new(1).acquire_timeout(Duration::from_millis(40)));
            let factory = Factory::new();

            let _held = unwrap_outcome(pool.acquire(&cx, || factory.make()).await);
            match pool.acquire(&cx, || factory.make()).await {
                Outcome::Err(Error::Pool(e)) => assert_eq!(e.kind, PoolErrorKind::Exhausted),
                _ => panic!("expected pool exhaustion"),
            }
            assert_eq!(pool.stats().timeouts, 1);
        });
    }

    #[test]
    fn test_waiter_gets_released_connection() {
        let pool = Pool::new(PoolConfig::new(1).acquire_timeout(Duration::from_secs(5)));
        let factory = Factory::new();
        let held = run(async {
            let cx = Cx::for_testing();
            unwrap_outcome(pool.acquire(&cx, || factory.make()).await)
        });

        std::thread::scope(|s| {
            s.spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                drop(held);
            });
            let conn = run(async {
                let cx = Cx::for_testing();
                unwrap_outcome(pool.acquire(&cx, || factory.make()).await)
            });
            assert_eq!(conn.id, 0);
        });
        assert_eq!(pool.stats().created, 1);
    }

    #[test]
    fn test_unusable_connection_is_discarded() {
        run(async {
            let cx = Cx::for_testing();
            let pool = Pool::new(PoolConfig::new(2));
            let factory = Factory::new();

            let conn = unwrap_outcome(pool.acquire(&cx, || factory.make()).await);
            factory.reusable.store(false, Ordering::SeqCst);
            drop(conn);
            let stats = pool.stats();
            assert_eq!(stats.total, 0);
            assert_eq!(stats.discarded, 1);

            factory.reusable.store(true, Ordering::SeqCst);
            let conn = unwrap_outcome(pool.acquire(&cx, || factory.make()).await);
            assert_eq!(conn.id, 1);
            conn.discard();
            assert_eq!(pool.stats().total, 0);
        });
    }

    #[test]
    fn test_expired_connections_are_replaced() {
        run(async {
            let cx = Cx::for_testing();
            let pool = Pool::new(PoolConfig::new(2).max_lifetime(Duration::ZERO));
            let factory = Factory::new();

            drop(unwrap_outcome(pool.acquire(&cx, || factory.make()).await));
            let conn = unwrap_outcome(pool.acquire(&cx, || factory.make()).await);
            assert_eq!(conn.id, 1);
            assert_eq!(pool.stats().created, 2);
        });
    }

    #[test]
    fn test_factory_failure_releases_slot() {
        run(async {
            let cx = Cx::for_testing();
            let pool: Pool<MockConn> = Pool::new(PoolConfig::new(1));
            let failed = pool
                .acquire(&cx, || async {
                    Outcome::Err(Error::connection(
                        datagate_core::ConnectionErrorKind::Refused,
                        "refused",
                    ))
                })
                .await;
            assert!(matches!(failed, Outcome::Err(Error::Connection(_))));
            assert_eq!(pool.stats().total, 0);

            let factory = Factory::new();
            let conn = unwrap_outcome(pool.acquire(&cx, || factory.make()).await);
            assert_eq!(conn.id, 0);
        });
    }

    #[test]
    fn test_warm_up_and_close() {
        run(async {
            let cx = Cx::for_testing();
            let pool = Pool::new(PoolConfig::new(4).min_connections(2));
            let factory = Factory::new();

            let opened = unwrap_outcome(pool.warm_up(&cx, || factory.make()).await);
            assert_eq!(opened, 2);
            assert_eq!(pool.stats().idle, 2);

            pool.close(&cx).await;
            assert!(pool.is_closed());
            assert_eq!(pool.stats().total, 0);
            match pool.acquire(&cx, || factory.make()).await {
                Outcome::Err(Error::Pool(e)) => assert_eq!(e.kind, PoolErrorKind::Closed),
                _ => panic!("expected closed pool"),
            }
        });
    }

    #[test]
    fn test_try_new_validates() {
        assert!(Pool::<MockConn>::try_new(PoolConfig::new(0)).is_err());
        assert!(Pool::<MockConn>::try_new(PoolConfig::new(1)).is_ok());
    }
}
