//! Pool-backed entry point.
//!
//! [`Db`] pairs a connection pool with a [`Connector`] and applies a deadline
//! to every call: [`DbConfig::default_timeout`] for single statements,
//! [`DbConfig::multi_step_timeout`] for transactions and batches. Each call
//! acquires one connection and releases it on every exit path when its
//! `PooledConnection` guard drops.

use std::future::Future;
use std::sync::Arc;

use asupersync::{Cx, Outcome};
use datagate_core::{Connection, Deadline, Error, FromRow, Record, Statement, TxOptions, with_deadline};
use datagate_pool::{Pool, PoolStats, PooledConnection};

use crate::batch::Batch;
use crate::bulk::{self, BulkPayload};
use crate::config::DbConfig;
use crate::executor;
use crate::transaction::run_in_tx;

/// Opens new connections for the pool.
pub trait Connector: Send + Sync {
    type Conn: Connection;

    fn connect(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Conn, Error>> + Send;
}

/// Transaction handle type for a connector's connections.
pub type TxOf<K> = <<K as Connector>::Conn as Connection>::Tx;

/// Pool-backed executor with per-call deadlines.
pub struct Db<K: Connector> {
    pool: Pool<K::Conn>,
    connector: Arc<K>,
    config: DbConfig,
}

impl<K: Connector> Clone for Db<K> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            connector: Arc::clone(&self.connector),
            config: self.config,
        }
    }
}

impl<K: Connector> std::fmt::Debug for Db<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("pool", &self.pool)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<K: Connector> Db<K> {
    pub fn new(pool: Pool<K::Conn>, connector: K, config: DbConfig) -> Self {
        Self {
            pool,
            connector: Arc::new(connector),
            config,
        }
    }

    pub fn pool(&self) -> &Pool<K::Conn> {
        &self.pool
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Open `min_connections` up front.
    pub async fn warm_up(&self, cx: &Cx) -> Outcome<usize, Error> {
        self.pool.warm_up(cx, || self.connector.connect(cx)).await
    }

    /// Check out a connection for direct use.
    pub async fn acquire(&self, cx: &Cx) -> Outcome<PooledConnection<K::Conn>, Error> {
        self.pool.acquire(cx, || self.connector.connect(cx)).await
    }

    /// Close idle connections and refuse further acquisitions.
    pub async fn close(&self, cx: &Cx) {
        self.pool.close(cx).await;
    }

    /// Acquire a connection and run `op` on it under `deadline`.
    async fn with_conn<T, F>(&self, cx: &Cx, deadline: Deadline, op: F) -> Outcome<T, Error>
    where
        F: AsyncFnOnce(&K::Conn) -> Outcome<T, Error>,
    {
        with_deadline(deadline, async {
            let conn = match self.acquire(cx).await {
                Outcome::Ok(conn) => conn,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            };
            op(&*conn).await
        })
        .await
    }

    fn single_step(&self) -> Deadline {
        Deadline::after(self.config.default_timeout)
    }

    fn multi_step(&self) -> Deadline {
        Deadline::after(self.config.multi_step_timeout)
    }

    // ==================== Single-record ====================

    pub async fn select_one<R: FromRow>(&self, cx: &Cx, stmt: &Statement) -> Outcome<R, Error> {
        self.with_conn(cx, self.single_step(), async |conn| {
            executor::select_one(cx, conn, stmt).await
        })
        .await
    }

    pub async fn select_optional<R: FromRow>(
        &self,
        cx: &Cx,
        stmt: &Statement,
    ) -> Outcome<Option<R>, Error> {
        self.with_conn(cx, self.single_step(), async |conn| {
            executor::select_optional(cx, conn, stmt).await
        })
        .await
    }

    /// Write the single resulting row into `dest`; `dest` is untouched unless
    /// this returns `Ok`.
    pub async fn select_one_into<R: FromRow>(
        &self,
        cx: &Cx,
        stmt: &Statement,
        dest: &mut R,
    ) -> Outcome<(), Error> {
        self.select_one(cx, stmt).await.map(|record| *dest = record)
    }

    pub async fn insert_returning<R: FromRow>(&self, cx: &Cx, stmt: &Statement) -> Outcome<R, Error> {
        self.with_conn(cx, self.single_step(), async |conn| {
            executor::insert_returning(cx, conn, stmt).await
        })
        .await
    }

    // ==================== Multi-record ====================

    pub async fn select_rows<R: FromRow>(&self, cx: &Cx, stmt: &Statement) -> Outcome<Vec<R>, Error> {
        self.with_conn(cx, self.single_step(), async |conn| {
            executor::select_rows(cx, conn, stmt).await
        })
        .await
    }

    pub async fn exec(&self, cx: &Cx, stmt: &Statement) -> Outcome<u64, Error> {
        self.with_conn(cx, self.single_step(), async |conn| {
            executor::exec(cx, conn, stmt).await
        })
        .await
    }

    pub async fn bulk_insert<R: Record>(&self, cx: &Cx, records: &[R]) -> Outcome<u64, Error> {
        self.with_conn(cx, self.multi_step(), async |conn| {
            bulk::bulk_insert(cx, conn, records).await
        })
        .await
    }

    /// Insert every payload inside one read-write transaction.
    pub async fn bulk_insert_all<P: BulkPayload>(&self, cx: &Cx, payloads: &[P]) -> Outcome<u64, Error> {
        self.write_tx(cx, async |tx| bulk::bulk_insert_all(cx, tx, payloads).await)
            .await
    }

    // ==================== Transactions ====================

    /// Run `f` as one unit of work on a single connection.
    ///
    /// Commits when `f` returns `Ok`, rolls back otherwise. See
    /// [`run_in_tx`](crate::transaction::run_in_tx) for how failures are
    /// reported.
    pub async fn with_tx<T, F>(&self, cx: &Cx, options: TxOptions, f: F) -> Outcome<T, Error>
    where
        F: AsyncFnOnce(&TxOf<K>) -> Outcome<T, Error>,
    {
        let deadline = self.multi_step();
        let conn = match with_deadline(deadline, self.acquire(cx)).await {
            Outcome::Ok(conn) => conn,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        run_in_tx(
            cx,
            &*conn,
            options,
            deadline,
            self.config.default_timeout,
            f,
        )
        .await
    }

    /// Read-committed, read-write unit of work.
    pub async fn write_tx<T, F>(&self, cx: &Cx, f: F) -> Outcome<T, Error>
    where
        F: AsyncFnOnce(&TxOf<K>) -> Outcome<T, Error>,
    {
        self.with_tx(cx, TxOptions::default(), f).await
    }

    /// Read-committed, read-only unit of work.
    pub async fn read_tx<T, F>(&self, cx: &Cx, f: F) -> Outcome<T, Error>
    where
        F: AsyncFnOnce(&TxOf<K>) -> Outcome<T, Error>,
    {
        self.with_tx(cx, TxOptions::read_only(), f).await
    }

    // ==================== Batches ====================

    /// Send `batch` on one connection under the multi-step deadline.
    pub async fn send_batch(&self, cx: &Cx, batch: Batch<'_>) -> Outcome<(), Error> {
        self.with_conn(cx, self.multi_step(), async move |conn| batch.send(cx, conn).await)
            .await
    }
}
