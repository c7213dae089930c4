//! In-memory `Connection` double.
//!
//! Replies are scripted by SQL substring. Writes issued outside a transaction
//! are committed immediately; writes issued on a transaction handle only
//! become visible on commit.
//!
//! Like the Postgres driver, every call returns `Cancelled` when its `cx` is
//! cancelled, and a call abandoned mid-exchange ([`Reply::Stall`]) leaves the
//! connection unusable: it is no longer reusable and a later ROLLBACK fails
//! without reaching the server.

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use asupersync::runtime::RuntimeBuilder;
use asupersync::types::CancelReason;
use asupersync::{Cx, Outcome};
use datagate_core::{
    Connection, ConnectionErrorKind, Error, Executor, QueryError, QueryErrorKind, Result, Row,
    TransactionOps, TxOptions, Value,
};
use datagate_pool::{Pool, PoolConfig};
use datagate_session::{Connector, Db, DbConfig};

type Lookup = Arc<dyn Fn(&[Value]) -> Vec<Row> + Send + Sync>;

#[derive(Clone)]
pub enum Reply {
    Rows(Vec<Row>),
    Lookup(Lookup),
    Fail(&'static str),
    /// Never answers.
    Stall,
}

impl Reply {
    pub fn lookup(f: impl Fn(&[Value]) -> Vec<Row> + Send + Sync + 'static) -> Self {
        Reply::Lookup(Arc::new(f))
    }
}

#[derive(Default)]
struct State {
    rules: Vec<(String, Reply)>,
    log: Vec<String>,
    committed: Vec<String>,
    fail_rollback: bool,
}

#[derive(Clone, Default)]
pub struct MockDatabase {
    state: Arc<Mutex<State>>,
    opened: Arc<AtomicUsize>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `reply` to any statement containing `needle`.
    pub fn on(&self, needle: &str, reply: Reply) -> &Self {
        self.state
            .lock()
            .unwrap()
            .rules
            .push((needle.to_string(), reply));
        self
    }

    pub fn fail_rollback(&self) {
        self.state.lock().unwrap().fail_rollback = true;
    }

    /// Every statement seen, in order, including transaction control.
    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    /// Writes that are visible outside any transaction.
    pub fn committed(&self) -> Vec<String> {
        self.state.lock().unwrap().committed.clone()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn connector(&self) -> MockConnector {
        MockConnector { db: self.clone() }
    }

    pub fn db(&self, max_connections: usize) -> Db<MockConnector> {
        self.db_with(max_connections, DbConfig::default())
    }

    pub fn db_with(&self, max_connections: usize, config: DbConfig) -> Db<MockConnector> {
        Db::new(
            Pool::new(PoolConfig::new(max_connections)),
            self.connector(),
            config,
        )
    }

    fn answer(&self, cx: &Cx, sql: &str, params: &[Value]) -> Answer {
        if let Some(reason) = cx.cancel_reason() {
            return Answer::Cancelled(reason);
        }
        let mut state = self.state.lock().unwrap();
        state.log.push(sql.to_string());
        let reply = state
            .rules
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone());
        drop(state);
        match reply {
            Some(Reply::Rows(rows)) => Answer::Done(Ok(rows)),
            Some(Reply::Lookup(f)) => Answer::Done(Ok(f(params))),
            Some(Reply::Fail(code)) => Answer::Done(Err(server_error(code, sql))),
            Some(Reply::Stall) => Answer::Stall,
            None => Answer::Done(Ok(Vec::new())),
        }
    }

    fn control(&self, sql: &str) {
        self.state.lock().unwrap().log.push(sql.to_string());
    }
}

enum Answer {
    Done(Result<Vec<Row>>),
    Stall,
    Cancelled(CancelReason),
}

impl Answer {
    /// Resolve the answer, marking `in_flight` when the exchange never ends.
    async fn resolve<T>(
        self,
        in_flight: Arc<AtomicBool>,
        done: impl FnOnce(Vec<Row>) -> T,
    ) -> Outcome<T, Error> {
        match self {
            Answer::Done(Ok(rows)) => Outcome::Ok(done(rows)),
            Answer::Done(Err(e)) => Outcome::Err(e),
            Answer::Cancelled(reason) => Outcome::Cancelled(reason),
            Answer::Stall => {
                in_flight.store(true, Ordering::SeqCst);
                std::future::pending().await
            }
        }
    }
}

fn lost_link() -> Error {
    Error::connection(
        ConnectionErrorKind::Disconnected,
        "connection is no longer usable",
    )
}

pub fn server_error(code: &str, sql: &str) -> Error {
    let kind = if code.starts_with("23") {
        QueryErrorKind::Constraint
    } else {
        QueryErrorKind::Database
    };
    Error::Query(QueryError {
        kind,
        message: "mock server error".to_string(),
        sqlstate: Some(code.to_string()),
        sql: Some(sql.to_string()),
        detail: None,
        hint: None,
        position: None,
    })
}

pub struct MockConnector {
    db: MockDatabase,
}

impl Connector for MockConnector {
    type Conn = MockConnection;

    fn connect(&self, _cx: &Cx) -> impl Future<Output = Outcome<MockConnection, Error>> + Send {
        let conn = MockConnection {
            id: self.db.opened.fetch_add(1, Ordering::SeqCst),
            db: self.db.clone(),
            tx_open: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicBool::new(false)),
        };
        async move { Outcome::Ok(conn) }
    }
}

pub struct MockConnection {
    pub id: usize,
    db: MockDatabase,
    tx_open: Arc<AtomicBool>,
    in_flight: Arc<AtomicBool>,
}

impl Executor for MockConnection {
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let answer = self.db.answer(cx, sql, params);
        answer.resolve(Arc::clone(&self.in_flight), |rows| rows)
    }

    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let answer = self.db.answer(cx, sql, params);
        if matches!(answer, Answer::Done(Ok(_))) {
            self.db.state.lock().unwrap().committed.push(sql.to_string());
        }
        answer.resolve(Arc::clone(&self.in_flight), |rows| rows.len().max(1) as u64)
    }
}

impl Connection for MockConnection {
    type Tx = MockTx;

    fn begin_with(
        &self,
        cx: &Cx,
        options: TxOptions,
    ) -> impl Future<Output = Outcome<MockTx, Error>> + Send {
        let cancelled = cx.cancel_reason();
        if cancelled.is_none() {
            self.db.control(&options.begin_sql());
            self.tx_open.store(true, Ordering::SeqCst);
        }
        let tx = MockTx {
            db: self.db.clone(),
            pending: Mutex::new(Vec::new()),
            tx_open: Arc::clone(&self.tx_open),
            in_flight: Arc::clone(&self.in_flight),
        };
        async move {
            match cancelled {
                Some(reason) => Outcome::Cancelled(reason),
                None => Outcome::Ok(tx),
            }
        }
    }

    fn ping(&self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async { Outcome::Ok(()) }
    }

    fn is_reusable(&self) -> bool {
        !self.tx_open.load(Ordering::SeqCst) && !self.in_flight.load(Ordering::SeqCst)
    }

    fn close(self, _cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}

pub struct MockTx {
    db: MockDatabase,
    pending: Mutex<Vec<String>>,
    tx_open: Arc<AtomicBool>,
    in_flight: Arc<AtomicBool>,
}

impl Executor for MockTx {
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let answer = self.db.answer(cx, sql, params);
        answer.resolve(Arc::clone(&self.in_flight), |rows| rows)
    }

    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let answer = self.db.answer(cx, sql, params);
        if matches!(answer, Answer::Done(Ok(_))) {
            self.pending.lock().unwrap().push(sql.to_string());
        }
        answer.resolve(Arc::clone(&self.in_flight), |rows| rows.len().max(1) as u64)
    }
}

impl TransactionOps for MockTx {
    fn savepoint(&self, _cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.db.control(&format!("SAVEPOINT {name}"));
        async { Outcome::Ok(()) }
    }

    fn rollback_to(&self, _cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.db.control(&format!("ROLLBACK TO SAVEPOINT {name}"));
        async { Outcome::Ok(()) }
    }

    fn release(&self, _cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.db.control(&format!("RELEASE SAVEPOINT {name}"));
        async { Outcome::Ok(()) }
    }

    fn commit(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let cancelled = cx.cancel_reason();
        if cancelled.is_none() {
            self.db.control("COMMIT");
            let pending = std::mem::take(&mut *self.pending.lock().unwrap());
            self.db.state.lock().unwrap().committed.extend(pending);
            self.tx_open.store(false, Ordering::SeqCst);
        }
        async move {
            match cancelled {
                Some(reason) => Outcome::Cancelled(reason),
                None => Outcome::Ok(()),
            }
        }
    }

    fn rollback(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let cancelled = cx.cancel_reason();
        let abandoned = self.in_flight.load(Ordering::SeqCst);
        if cancelled.is_none() && !abandoned {
            self.db.control("ROLLBACK");
        }
        let fail = self.db.state.lock().unwrap().fail_rollback;
        async move {
            if let Some(reason) = cancelled {
                return Outcome::Cancelled(reason);
            }
            if abandoned {
                return Outcome::Err(lost_link());
            }
            if fail {
                return Outcome::Err(Error::connection(
                    ConnectionErrorKind::Disconnected,
                    "connection lost during rollback",
                ));
            }
            self.tx_open.store(false, Ordering::SeqCst);
            Outcome::Ok(())
        }
    }
}

pub fn row(columns: &[&str], values: Vec<Value>) -> Row {
    Row::new(columns.iter().map(|c| (*c).to_string()).collect(), values)
}

pub fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

pub fn run<T>(fut: impl Future<Output = T>) -> T {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    rt.block_on(fut)
}
