//! Async PostgreSQL connection.
//!
//! [`PgAsyncConnection`] owns the socket and speaks the extended query
//! protocol. [`SharedPgConnection`] wraps it behind an async mutex and
//! implements the `datagate-core` [`Connection`] contract; its transaction
//! handle [`SharedPgTransaction`] owns a clone of the same link so it can be
//! moved into a unit-of-work closure.
//!
//! Every exchange, single statement or pipeline, is written as
//! Parse/Bind/Describe/Execute per statement followed by one Sync, and the
//! responses are always drained up to ReadyForQuery. A server error therefore
//! never leaves unread messages behind; only an abandoned exchange (deadline,
//! cancellation, I/O failure) does, and that marks the connection
//! non-reusable.

// Allow `impl Future` return types in trait methods - intentional for async trait compat
#![allow(clippy::manual_async_fn)]
// The Error type is intentionally large to carry full context
#![allow(clippy::result_large_err)]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use asupersync::io::{AsyncRead, AsyncWrite, ReadBuf};
use asupersync::net::TcpStream;
use asupersync::sync::Mutex;
use asupersync::{Cx, Outcome};

use datagate_core::connection::validate_savepoint_name;
use datagate_core::error::{ConnectionError, QueryError};
use datagate_core::{
    ColumnInfo, Connection, ConnectionErrorKind, Error, Executor, QueryErrorKind, Result, Row,
    Statement, StatementResult, TransactionOps, TxOptions, Value,
};

use crate::auth::{SCRAM_SHA_256, ScramClient, md5_password};
use crate::config::PgConfig;
use crate::connection::{ConnectionHealth, ConnectionState, TransactionStatusState};
use crate::protocol::{
    BackendMessage, DescribeKind, ErrorFields, FieldDescription, FrontendMessage, MessageReader,
    MessageWriter, startup,
};
use crate::types::{Format, decode_value, encode_param};

/// Async PostgreSQL connection.
pub struct PgAsyncConnection {
    stream: TcpStream,
    state: ConnectionState,
    process_id: i32,
    secret_key: i32,
    parameters: HashMap<String, String>,
    config: PgConfig,
    reader: MessageReader,
    writer: MessageWriter,
    read_buf: Vec<u8>,
    health: Arc<ConnectionHealth>,
}

impl std::fmt::Debug for PgAsyncConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgAsyncConnection")
            .field("state", &self.state)
            .field("process_id", &self.process_id)
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("database", &self.config.database)
            .finish_non_exhaustive()
    }
}

impl PgAsyncConnection {
    /// Connect, authenticate and wait for the first ReadyForQuery.
    #[tracing::instrument(level = "debug", skip(cx, config), fields(addr = %config.socket_addr(), database = %config.database))]
    pub async fn connect(cx: &Cx, config: PgConfig) -> Outcome<Self, Error> {
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }

        let stream = match open_stream(&config).await {
            Ok(s) => s,
            Err(e) => return Outcome::Err(e),
        };

        let mut conn = Self {
            stream,
            state: ConnectionState::Connecting,
            process_id: 0,
            secret_key: 0,
            parameters: HashMap::new(),
            config,
            reader: MessageReader::new(),
            writer: MessageWriter::new(),
            read_buf: vec![0u8; 8192],
            health: Arc::new(ConnectionHealth::default()),
        };

        match conn.handshake().await {
            Ok(()) => {
                tracing::info!(
                    process_id = conn.process_id,
                    server_version = conn.parameter("server_version").unwrap_or("unknown"),
                    "connected to postgres"
                );
                Outcome::Ok(conn)
            }
            Err(e) => {
                conn.state = ConnectionState::Error;
                tracing::warn!(error = %e, "postgres handshake failed");
                Outcome::Err(e)
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn process_id(&self) -> i32 {
        self.process_id
    }

    /// A server parameter reported during startup (e.g. `server_version`).
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// Run a statement and return its rows.
    pub async fn query_async(
        &mut self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> Outcome<Vec<Row>, Error> {
        self.exchange(cx, &[(sql, params)])
            .await
            .map(|results| results.into_iter().next().map(|r| r.rows).unwrap_or_default())
    }

    /// Run a statement and return the affected row count.
    pub async fn execute_async(
        &mut self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> Outcome<u64, Error> {
        self.exchange(cx, &[(sql, params)])
            .await
            .map(|results| results.first().map_or(0, |r| r.rows_affected))
    }

    /// Run several statements in one round trip.
    pub async fn pipeline_async(
        &mut self,
        cx: &Cx,
        statements: &[Statement],
    ) -> Outcome<Vec<StatementResult>, Error> {
        let pending: Vec<(&str, &[Value])> =
            statements.iter().map(|s| (s.sql(), s.params())).collect();
        self.exchange(cx, &pending).await
    }

    /// Send Terminate and mark the connection closed.
    pub async fn close_async(&mut self) -> Result<()> {
        let bytes = self
            .writer
            .write(&FrontendMessage::Terminate)
            .map_err(|e| Error::protocol(format!("cannot encode terminate: {e}")))?
            .to_vec();
        let result = write_all(&mut self.stream, &bytes).await;
        self.state = ConnectionState::Closed;
        self.health.mark_broken();
        result.map_err(|e| io_error("failed to send terminate", e))
    }

    // ==================== Protocol: extended query ====================

    async fn exchange(
        &mut self,
        cx: &Cx,
        statements: &[(&str, &[Value])],
    ) -> Outcome<Vec<StatementResult>, Error> {
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        if self.health.is_in_flight() {
            // A previous exchange was dropped before ReadyForQuery.
            self.health.mark_broken();
        }
        if self.health.is_broken() {
            return Outcome::Err(Error::connection(
                ConnectionErrorKind::Disconnected,
                "connection is no longer usable",
            ));
        }

        let started = Instant::now();
        if let Err(e) = self.encode_exchange(statements) {
            // Nothing was sent; the connection stays usable.
            self.writer.clear();
            return Outcome::Err(e);
        }

        self.health.begin_exchange();
        self.state = ConnectionState::Busy;
        if let Err(e) = write_all(&mut self.stream, self.writer.as_bytes()).await {
            self.fail();
            return Outcome::Err(io_error("failed to write to server", e));
        }

        let mut results = Vec::with_capacity(statements.len());
        let mut current = ResultBuilder::default();
        let mut first_error: Option<Error> = None;

        loop {
            if let Some(reason) = cx.cancel_reason() {
                // The rest of the response stays unread; the connection must not be reused.
                return Outcome::Cancelled(reason);
            }
            let msg = match self.recv().await {
                Ok(m) => m,
                Err(e) => {
                    self.fail();
                    return Outcome::Err(e);
                }
            };

            match msg {
                BackendMessage::ParseComplete
                | BackendMessage::BindComplete
                | BackendMessage::CloseComplete
                | BackendMessage::ParameterDescription(_)
                | BackendMessage::NoData
                | BackendMessage::PortalSuspended => {}
                BackendMessage::RowDescription(desc) => current.describe(desc),
                BackendMessage::DataRow(raw) => {
                    if first_error.is_none() {
                        if let Err(e) = current.push_row(raw) {
                            first_error = Some(e);
                        }
                    }
                }
                BackendMessage::CommandComplete(tag) => {
                    results.push(std::mem::take(&mut current).finish(Some(&tag)));
                }
                BackendMessage::EmptyQueryResponse => {
                    results.push(std::mem::take(&mut current).finish(None));
                }
                BackendMessage::ErrorResponse(fields) => {
                    let sql = statements.get(results.len()).map(|(sql, _)| *sql);
                    let err = error_from_fields(&fields, sql);
                    if fields.is_fatal() {
                        self.fail();
                        return Outcome::Err(err);
                    }
                    // The server skips the remaining statements up to Sync.
                    first_error.get_or_insert(err);
                    current = ResultBuilder::default();
                }
                BackendMessage::NoticeResponse(notice) => {
                    tracing::debug!(code = %notice.code, message = %notice.message, "server notice");
                }
                BackendMessage::ParameterStatus { name, value } => {
                    self.parameters.insert(name, value);
                }
                BackendMessage::ReadyForQuery(status) => {
                    let status = TransactionStatusState::from(status);
                    self.state = ConnectionState::Ready(status);
                    self.health.finish_exchange(status);
                    break;
                }
                other => {
                    self.fail();
                    return Outcome::Err(Error::protocol(format!(
                        "unexpected message during query: {other:?}"
                    )));
                }
            }
        }

        let elapsed_ms = started.elapsed().as_millis();
        match first_error {
            Some(e) => {
                tracing::debug!(statements = statements.len(), elapsed_ms, error = %e, "exchange failed");
                Outcome::Err(e)
            }
            None => {
                tracing::debug!(statements = statements.len(), elapsed_ms, "exchange complete");
                Outcome::Ok(results)
            }
        }
    }

    /// Parse/Bind/Describe/Execute per statement, then one Sync.
    fn encode_exchange(&mut self, statements: &[(&str, &[Value])]) -> Result<()> {
        self.writer.clear();
        for (sql, params) in statements {
            let mut param_types = Vec::with_capacity(params.len());
            let mut values = Vec::with_capacity(params.len());
            for value in *params {
                let (bytes, type_oid) = encode_param(value);
                param_types.push(type_oid);
                values.push(bytes);
            }
            let messages = [
                FrontendMessage::Parse {
                    name: String::new(),
                    query: (*sql).to_string(),
                    param_types,
                },
                FrontendMessage::Bind {
                    portal: String::new(),
                    statement: String::new(),
                    param_formats: if params.is_empty() {
                        Vec::new()
                    } else {
                        vec![Format::Text.code()]
                    },
                    params: values,
                    result_formats: Vec::new(),
                },
                FrontendMessage::Describe {
                    kind: DescribeKind::Portal,
                    name: String::new(),
                },
                FrontendMessage::Execute {
                    portal: String::new(),
                    max_rows: 0,
                },
            ];
            for msg in &messages {
                self.writer
                    .push(msg)
                    .map_err(|e| Error::protocol(format!("cannot encode statement: {e}")))?;
            }
        }
        self.writer
            .push(&FrontendMessage::Sync)
            .map_err(|e| Error::protocol(format!("cannot encode statement: {e}")))
    }

    fn transaction_status(&self) -> Option<TransactionStatusState> {
        match self.state {
            ConnectionState::Ready(status) => Some(status),
            _ => None,
        }
    }

    fn fail(&mut self) {
        self.state = ConnectionState::Error;
        self.health.mark_broken();
        self.reader.reset();
    }

    // ==================== Startup + auth ====================

    async fn handshake(&mut self) -> Result<()> {
        if self.config.ssl_mode.should_try_ssl() {
            self.negotiate_ssl().await?;
        }
        self.send(&startup(self.config.startup_params())).await?;
        self.state = ConnectionState::Authenticating;
        self.authenticate().await?;
        self.read_startup_messages().await
    }

    async fn negotiate_ssl(&mut self) -> Result<()> {
        self.send(&FrontendMessage::SSLRequest).await?;
        let mut answer = [0u8; 1];
        read_exact_async(&mut self.stream, &mut answer)
            .await
            .map_err(|e| ssl_error(format!("failed to read SSL response: {e}")))?;
        match answer[0] {
            b'N' if self.config.ssl_mode.is_required() => {
                Err(ssl_error("server does not support SSL"))
            }
            b'N' => Ok(()),
            b'S' => Err(ssl_error(
                "server accepted SSL but this driver only speaks plaintext; use sslmode=disable",
            )),
            other => Err(Error::protocol(format!(
                "unexpected SSL response byte: 0x{other:02x}"
            ))),
        }
    }

    fn require_password(&self) -> Result<&str> {
        self.config
            .password
            .as_deref()
            .ok_or_else(|| auth_error("server requested a password but none is configured"))
    }

    async fn authenticate(&mut self) -> Result<()> {
        loop {
            match self.recv().await? {
                BackendMessage::AuthenticationOk => return Ok(()),
                BackendMessage::AuthenticationCleartextPassword => {
                    let password = self.require_password()?.to_string();
                    self.send(&FrontendMessage::PasswordMessage(password)).await?;
                }
                BackendMessage::AuthenticationMD5Password(salt) => {
                    let hash = md5_password(&self.config.user, self.require_password()?, salt);
                    self.send(&FrontendMessage::PasswordMessage(hash)).await?;
                }
                BackendMessage::AuthenticationSASL(mechanisms) => {
                    if !mechanisms.iter().any(|m| m == SCRAM_SHA_256) {
                        return Err(auth_error(format!(
                            "unsupported SASL mechanisms: {mechanisms:?}"
                        )));
                    }
                    self.scram_auth().await?;
                }
                BackendMessage::ErrorResponse(fields) => return Err(startup_error(&fields)),
                BackendMessage::NoticeResponse(_) => {}
                other => {
                    return Err(Error::protocol(format!(
                        "unexpected message during authentication: {other:?}"
                    )));
                }
            }
        }
    }

    /// Runs the SASL exchange; the final AuthenticationOk is left to the caller.
    async fn scram_auth(&mut self) -> Result<()> {
        let mut client = ScramClient::new(&self.config.user, self.require_password()?);

        self.send(&FrontendMessage::SASLInitialResponse {
            mechanism: SCRAM_SHA_256.to_string(),
            data: client.client_first(),
        })
        .await?;

        let server_first = match self.recv().await? {
            BackendMessage::AuthenticationSASLContinue(data) => data,
            BackendMessage::ErrorResponse(fields) => return Err(startup_error(&fields)),
            other => {
                return Err(Error::protocol(format!(
                    "expected SASL continue, got: {other:?}"
                )));
            }
        };
        let client_final = client.process_server_first(&server_first)?;
        self.send(&FrontendMessage::SASLResponse(client_final)).await?;

        match self.recv().await? {
            BackendMessage::AuthenticationSASLFinal(data) => client.verify_server_final(&data),
            BackendMessage::ErrorResponse(fields) => Err(startup_error(&fields)),
            other => Err(Error::protocol(format!(
                "expected SASL final, got: {other:?}"
            ))),
        }
    }

    async fn read_startup_messages(&mut self) -> Result<()> {
        loop {
            match self.recv().await? {
                BackendMessage::BackendKeyData {
                    process_id,
                    secret_key,
                } => {
                    self.process_id = process_id;
                    self.secret_key = secret_key;
                }
                BackendMessage::ParameterStatus { name, value } => {
                    self.parameters.insert(name, value);
                }
                BackendMessage::NegotiateProtocolVersion {
                    newest_minor,
                    unrecognized,
                } => {
                    tracing::debug!(newest_minor, ?unrecognized, "server negotiated protocol version");
                }
                BackendMessage::ReadyForQuery(status) => {
                    let status = TransactionStatusState::from(status);
                    self.state = ConnectionState::Ready(status);
                    self.health.finish_exchange(status);
                    return Ok(());
                }
                BackendMessage::ErrorResponse(fields) => return Err(startup_error(&fields)),
                BackendMessage::NoticeResponse(_) => {}
                other => {
                    return Err(Error::protocol(format!(
                        "unexpected startup message: {other:?}"
                    )));
                }
            }
        }
    }

    // ==================== I/O ====================

    async fn send(&mut self, msg: &FrontendMessage) -> Result<()> {
        self.writer.clear();
        self.writer
            .push(msg)
            .map_err(|e| Error::protocol(format!("cannot encode message: {e}")))?;
        write_all(&mut self.stream, self.writer.as_bytes())
            .await
            .map_err(|e| io_error("failed to write to server", e))
    }

    async fn recv(&mut self) -> Result<BackendMessage> {
        loop {
            if let Some(msg) = self
                .reader
                .next_message()
                .map_err(|e| Error::protocol(format!("malformed backend message: {e}")))?
            {
                return Ok(msg);
            }

            let mut read_buf = ReadBuf::new(&mut self.read_buf);
            std::future::poll_fn(|cx| Pin::new(&mut self.stream).poll_read(cx, &mut read_buf))
                .await
                .map_err(|e| io_error("failed to read from server", e))?;
            let filled = read_buf.filled();
            if filled.is_empty() {
                self.state = ConnectionState::Disconnected;
                return Err(Error::connection(
                    ConnectionErrorKind::Disconnected,
                    "connection closed by server",
                ));
            }
            self.reader.push(filled);
        }
    }
}

/// Accumulates one statement's result while its responses stream in.
#[derive(Default)]
struct ResultBuilder {
    fields: Vec<FieldDescription>,
    columns: Option<Arc<ColumnInfo>>,
    rows: Vec<Row>,
}

impl ResultBuilder {
    fn describe(&mut self, fields: Vec<FieldDescription>) {
        let names = fields.iter().map(|f| f.name.clone()).collect();
        self.columns = Some(Arc::new(ColumnInfo::new(names)));
        self.fields = fields;
    }

    fn push_row(&mut self, raw: Vec<Option<Vec<u8>>>) -> Result<()> {
        let Some(columns) = &self.columns else {
            return Err(Error::protocol("DataRow received before RowDescription"));
        };
        if raw.len() != self.fields.len() {
            return Err(Error::protocol("DataRow field count mismatch"));
        }
        let values = raw
            .into_iter()
            .zip(&self.fields)
            .map(|(bytes, field)| match bytes {
                None => Ok(Value::Null),
                Some(bytes) => decode_value(field.type_oid, &bytes, Format::from_code(field.format))
                    .map_err(|e| match e {
                        Error::Mapping(msg) => Error::Mapping(format!("column {}: {msg}", field.name)),
                        other => other,
                    }),
            })
            .collect::<Result<Vec<_>>>()?;
        self.rows.push(Row::with_columns(Arc::clone(columns), values));
        Ok(())
    }

    fn finish(self, tag: Option<&str>) -> StatementResult {
        let rows_affected = tag
            .and_then(parse_rows_affected)
            .unwrap_or(self.rows.len() as u64);
        StatementResult {
            rows: self.rows,
            rows_affected,
        }
    }
}

// ==================== Shared connection ====================

/// Lock-protected access to one connection, shared by the connection handle
/// and its transaction handle.
#[derive(Clone)]
struct Link {
    inner: Arc<Mutex<PgAsyncConnection>>,
}

impl Link {
    async fn query(&self, cx: &Cx, sql: &str, params: &[Value]) -> Outcome<Vec<Row>, Error> {
        let Ok(mut guard) = self.inner.lock(cx).await else {
            return Outcome::Err(lock_error());
        };
        guard.query_async(cx, sql, params).await
    }

    async fn execute(&self, cx: &Cx, sql: &str, params: &[Value]) -> Outcome<u64, Error> {
        let Ok(mut guard) = self.inner.lock(cx).await else {
            return Outcome::Err(lock_error());
        };
        guard.execute_async(cx, sql, params).await
    }

    async fn pipeline(
        &self,
        cx: &Cx,
        statements: &[Statement],
    ) -> Outcome<Vec<StatementResult>, Error> {
        let Ok(mut guard) = self.inner.lock(cx).await else {
            return Outcome::Err(lock_error());
        };
        guard.pipeline_async(cx, statements).await
    }
}

/// Shared, cloneable PostgreSQL connection.
#[derive(Clone)]
pub struct SharedPgConnection {
    link: Link,
    health: Arc<ConnectionHealth>,
}

impl SharedPgConnection {
    pub fn new(conn: PgAsyncConnection) -> Self {
        let health = Arc::clone(&conn.health);
        Self {
            link: Link {
                inner: Arc::new(Mutex::new(conn)),
            },
            health,
        }
    }

    pub async fn connect(cx: &Cx, config: PgConfig) -> Outcome<Self, Error> {
        PgAsyncConnection::connect(cx, config).await.map(Self::new)
    }

    pub fn inner(&self) -> &Arc<Mutex<PgAsyncConnection>> {
        &self.link.inner
    }
}

impl std::fmt::Debug for SharedPgConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedPgConnection")
            .field("reusable", &self.health.is_reusable())
            .finish_non_exhaustive()
    }
}

impl Executor for SharedPgConnection {
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        self.link.query(cx, sql, params)
    }

    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        self.link.execute(cx, sql, params)
    }

    fn pipeline(
        &self,
        cx: &Cx,
        statements: &[Statement],
    ) -> impl Future<Output = Outcome<Vec<StatementResult>, Error>> + Send {
        self.link.pipeline(cx, statements)
    }
}

impl Connection for SharedPgConnection {
    type Tx = SharedPgTransaction;

    fn begin_with(
        &self,
        cx: &Cx,
        options: TxOptions,
    ) -> impl Future<Output = Outcome<Self::Tx, Error>> + Send {
        let link = self.link.clone();
        async move {
            tracing::debug!(isolation = ?options.isolation, access = ?options.access, "begin transaction");
            match link.execute(cx, &options.begin_sql(), &[]).await {
                Outcome::Ok(_) => Outcome::Ok(SharedPgTransaction {
                    link,
                    finished: false,
                }),
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        }
    }

    fn ping(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let link = self.link.clone();
        async move { link.execute(cx, "SELECT 1", &[]).await.map(|_| ()) }
    }

    fn is_reusable(&self) -> bool {
        self.health.is_reusable()
    }

    fn close(self, cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        async move {
            let Ok(mut guard) = self.link.inner.lock(cx).await else {
                return Err(lock_error());
            };
            guard.close_async().await
        }
    }
}

/// An open transaction on a [`SharedPgConnection`].
///
/// Dropping it without `commit` or `rollback` leaves the server-side
/// transaction open; the connection then reports itself non-reusable and the
/// pool closes it, which rolls the transaction back.
pub struct SharedPgTransaction {
    link: Link,
    finished: bool,
}

impl std::fmt::Debug for SharedPgTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedPgTransaction")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl Drop for SharedPgTransaction {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("transaction dropped without commit or rollback");
        }
    }
}

impl SharedPgTransaction {
    async fn savepoint_command(&self, cx: &Cx, command: &str, name: &str) -> Outcome<(), Error> {
        if let Err(e) = validate_savepoint_name(name) {
            return Outcome::Err(e);
        }
        self.link
            .execute(cx, &format!("{command} {name}"), &[])
            .await
            .map(|_| ())
    }
}

impl Executor for SharedPgTransaction {
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        self.link.query(cx, sql, params)
    }

    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        self.link.execute(cx, sql, params)
    }

    fn pipeline(
        &self,
        cx: &Cx,
        statements: &[Statement],
    ) -> impl Future<Output = Outcome<Vec<StatementResult>, Error>> + Send {
        self.link.pipeline(cx, statements)
    }
}

impl TransactionOps for SharedPgTransaction {
    fn savepoint(&self, cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.savepoint_command(cx, "SAVEPOINT", name)
    }

    fn rollback_to(&self, cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.savepoint_command(cx, "ROLLBACK TO SAVEPOINT", name)
    }

    fn release(&self, cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.savepoint_command(cx, "RELEASE SAVEPOINT", name)
    }

    fn commit(mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move {
            let Ok(mut guard) = self.link.inner.lock(cx).await else {
                return Outcome::Err(lock_error());
            };
            // COMMIT of an aborted transaction silently rolls back; report it.
            if guard.transaction_status() == Some(TransactionStatusState::InFailed) {
                let rolled_back = guard.execute_async(cx, "ROLLBACK", &[]).await;
                drop(guard);
                self.finished = matches!(rolled_back, Outcome::Ok(_));
                return Outcome::Err(aborted_transaction_error());
            }
            let result = guard.execute_async(cx, "COMMIT", &[]).await;
            drop(guard);
            self.finished = matches!(result, Outcome::Ok(_));
            result.map(|_| ())
        }
    }

    fn rollback(mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move {
            let result = self.link.execute(cx, "ROLLBACK", &[]).await;
            self.finished = matches!(result, Outcome::Ok(_));
            result.map(|_| ())
        }
    }
}

// ==================== Helpers ====================

async fn open_stream(config: &PgConfig) -> Result<TcpStream> {
    let mut last_error = None;
    for addr in config.resolve()? {
        match TcpStream::connect_timeout(addr, config.connect_timeout).await {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!(error = %e, "failed to set TCP_NODELAY");
                }
                return Ok(stream);
            }
            Err(e) => {
                tracing::debug!(%addr, error = %e, "connect attempt failed");
                last_error = Some(e);
            }
        }
    }

    let Some(e) = last_error else {
        return Err(Error::connection(
            ConnectionErrorKind::Connect,
            format!("no addresses for {}", config.socket_addr()),
        ));
    };
    let kind = if e.kind() == std::io::ErrorKind::ConnectionRefused {
        ConnectionErrorKind::Refused
    } else {
        ConnectionErrorKind::Connect
    };
    Err(Error::Connection(ConnectionError {
        kind,
        message: format!("failed to connect to {}: {e}", config.socket_addr()),
        source: Some(Box::new(e)),
    }))
}

fn io_error(context: &str, e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::TimedOut {
        return Error::Timeout;
    }
    Error::Connection(ConnectionError {
        kind: ConnectionErrorKind::Disconnected,
        message: format!("{context}: {e}"),
        source: Some(Box::new(e)),
    })
}

fn lock_error() -> Error {
    Error::connection(
        ConnectionErrorKind::Disconnected,
        "failed to acquire connection lock",
    )
}

fn auth_error(message: impl Into<String>) -> Error {
    Error::connection(ConnectionErrorKind::Authentication, message)
}

fn ssl_error(message: impl Into<String>) -> Error {
    Error::connection(ConnectionErrorKind::Ssl, message)
}

fn aborted_transaction_error() -> Error {
    Error::Query(QueryError {
        kind: QueryErrorKind::TransactionState,
        message: "current transaction is aborted, commit rolled back".to_string(),
        sqlstate: Some("25P02".to_string()),
        sql: Some("COMMIT".to_string()),
        detail: None,
        hint: None,
        position: None,
    })
}

/// Server error during a query. The SQLSTATE is always carried through.
fn error_from_fields(fields: &ErrorFields, sql: Option<&str>) -> Error {
    let code = fields.code.as_str();
    let kind = match fields.error_class() {
        "23" => QueryErrorKind::Constraint,
        "42" => QueryErrorKind::Syntax,
        "25" | "2D" => QueryErrorKind::TransactionState,
        "40" if code == "40001" => QueryErrorKind::Serialization,
        "40" if code == "40P01" => QueryErrorKind::Deadlock,
        "57" if code == "57014" => QueryErrorKind::Cancelled,
        _ => QueryErrorKind::Database,
    };
    Error::Query(QueryError {
        kind,
        message: fields.message.clone(),
        sqlstate: Some(fields.code.clone()),
        sql: sql.map(str::to_string),
        detail: fields.detail.clone(),
        hint: fields.hint.clone(),
        position: fields.position.and_then(|p| usize::try_from(p).ok()),
    })
}

/// Server error before the connection became ready.
fn startup_error(fields: &ErrorFields) -> Error {
    let kind = if fields.error_class() == "28" {
        ConnectionErrorKind::Authentication
    } else {
        ConnectionErrorKind::Connect
    };
    Error::connection(
        kind,
        format!("{} (SQLSTATE {})", fields.message, fields.code),
    )
}

/// Row count from a command tag: the last word of `INSERT 0 3`, `UPDATE 2`, `SELECT 5`.
fn parse_rows_affected(tag: &str) -> Option<u64> {
    tag.split_whitespace().last()?.parse().ok()
}

async fn write_all(stream: &mut TcpStream, data: &[u8]) -> std::io::Result<()> {
    let mut written = 0;
    while written < data.len() {
        let n = std::future::poll_fn(|cx| Pin::new(&mut *stream).poll_write(cx, &data[written..]))
            .await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "connection closed while writing",
            ));
        }
        written += n;
    }
    std::future::poll_fn(|cx| Pin::new(&mut *stream).poll_flush(cx)).await
}

async fn read_exact_async(stream: &mut TcpStream, buf: &mut [u8]) -> std::io::Result<()> {
    let mut read = 0;
    while read < buf.len() {
        let mut read_buf = ReadBuf::new(&mut buf[read..]);
        std::future::poll_fn(|cx| Pin::new(&mut *stream).poll_read(cx, &mut read_buf)).await?;
        let n = read_buf.filled().len();
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed",
            ));
        }
        read += n;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(code: &str) -> ErrorFields {
        ErrorFields {
            severity: "ERROR".to_string(),
            code: code.to_string(),
            message: "boom".to_string(),
            position: Some(8),
            ..Default::default()
        }
    }

    #[test]
    fn test_error_from_fields_keeps_sqlstate() {
        let err = error_from_fields(&fields("23505"), Some("INSERT INTO users"));
        match &err {
            Error::Query(q) => {
                assert_eq!(q.kind, QueryErrorKind::Constraint);
                assert_eq!(q.sqlstate.as_deref(), Some("23505"));
                assert_eq!(q.sql.as_deref(), Some("INSERT INTO users"));
                assert_eq!(q.position, Some(8));
            }
            other => panic!("expected query error, got {other:?}"),
        }
        assert_eq!(err.to_string(), "boom (SQLSTATE 23505)");
    }

    #[test]
    fn test_error_kinds_by_class() {
        let kind = |code: &str| match error_from_fields(&fields(code), None) {
            Error::Query(q) => q.kind,
            other => panic!("expected query error, got {other:?}"),
        };
        assert_eq!(kind("42P01"), QueryErrorKind::Syntax);
        assert_eq!(kind("40001"), QueryErrorKind::Serialization);
        assert_eq!(kind("40P01"), QueryErrorKind::Deadlock);
        assert_eq!(kind("57014"), QueryErrorKind::Cancelled);
        assert_eq!(kind("25P02"), QueryErrorKind::TransactionState);
        assert_eq!(kind("08006"), QueryErrorKind::Database);
        assert_eq!(kind("XX000"), QueryErrorKind::Database);
        assert!(error_from_fields(&fields("25P02"), None).is_unexpected_state());
    }

    #[test]
    fn test_startup_error_kinds() {
        match startup_error(&fields("28P01")) {
            Error::Connection(c) => {
                assert_eq!(c.kind, ConnectionErrorKind::Authentication);
                assert!(c.message.ends_with("(SQLSTATE 28P01)"));
            }
            other => panic!("expected connection error, got {other:?}"),
        }
        assert!(matches!(
            startup_error(&fields("3D000")),
            Error::Connection(ref c) if c.kind == ConnectionErrorKind::Connect
        ));
    }

    #[test]
    fn test_parse_rows_affected() {
        assert_eq!(parse_rows_affected("INSERT 0 3"), Some(3));
        assert_eq!(parse_rows_affected("UPDATE 2"), Some(2));
        assert_eq!(parse_rows_affected("SELECT 5"), Some(5));
        assert_eq!(parse_rows_affected("BEGIN"), None);
    }

    #[test]
    fn test_result_builder_decodes_rows() {
        let mut builder = ResultBuilder::default();
        builder.describe(vec![
            FieldDescription {
                name: "id".to_string(),
                table_oid: 0,
                column_id: 0,
                type_oid: crate::types::oid::INT8,
                type_size: 8,
                type_modifier: -1,
                format: 0,
            },
            FieldDescription {
                name: "email".to_string(),
                table_oid: 0,
                column_id: 0,
                type_oid: crate::types::oid::TEXT,
                type_size: -1,
                type_modifier: -1,
                format: 0,
            },
        ]);
        builder
            .push_row(vec![Some(b"7".to_vec()), Some(b"a@b.c".to_vec())])
            .unwrap();
        builder.push_row(vec![Some(b"8".to_vec()), None]).unwrap();
        assert!(builder.push_row(vec![Some(b"9".to_vec())]).is_err());
        let err = builder
            .push_row(vec![Some(b"x".to_vec()), None])
            .unwrap_err();
        assert!(err.to_string().contains("column id"));

        let result = builder.finish(Some("SELECT 2"));
        assert_eq!(result.rows_affected, 2);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].get_named("id"), Some(&Value::BigInt(7)));
        assert_eq!(result.rows[1].get_named("email"), Some(&Value::Null));
    }

    #[test]
    fn test_row_before_description_is_protocol_error() {
        let mut builder = ResultBuilder::default();
        assert!(matches!(
            builder.push_row(vec![None]),
            Err(Error::Protocol(_))
        ));
    }
}
