//! Live-server tests. Skipped unless `DATAGATE_TEST_POSTGRES_URL` is set.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use asupersync::runtime::RuntimeBuilder;
use asupersync::{Cx, Outcome};

use datagate_core::{
    Connection, Error, Executor, QueryErrorKind, Statement, TransactionOps, TxOptions, Value,
};
use datagate_postgres::{PgConfig, SharedPgConnection, SslMode};

const POSTGRES_URL_ENV: &str = "DATAGATE_TEST_POSTGRES_URL";

fn postgres_test_config() -> Option<PgConfig> {
    let raw = std::env::var(POSTGRES_URL_ENV).ok()?;
    let cfg = match PgConfig::from_url(&raw) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("skipping Postgres integration tests: bad {POSTGRES_URL_ENV}: {e}");
            return None;
        }
    };
    Some(
        cfg.connect_timeout(Duration::from_secs(10))
            .ssl_mode(SslMode::Disable),
    )
}

fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

fn test_table_name(prefix: &str) -> String {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_nanos();
    format!("{prefix}_{suffix}")
}

fn run<F: std::future::Future<Output = ()>>(f: impl FnOnce(Cx) -> F) {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    rt.block_on(f(Cx::for_testing()));
}

#[test]
fn postgres_connect_select_1() {
    let Some(cfg) = postgres_test_config() else {
        eprintln!("skipping Postgres integration tests: set {POSTGRES_URL_ENV}");
        return;
    };

    run(|cx| async move {
        let conn = unwrap_outcome(SharedPgConnection::connect(&cx, cfg).await);
        let rows = unwrap_outcome(conn.query(&cx, "SELECT 1 AS one", &[]).await);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_as::<i64>("one").expect("one as i64"), 1);
        unwrap_outcome(conn.ping(&cx).await);
        assert!(conn.is_reusable());
    });
}

#[test]
fn postgres_insert_returning_and_select() {
    let Some(cfg) = postgres_test_config() else {
        eprintln!("skipping Postgres integration tests: set {POSTGRES_URL_ENV}");
        return;
    };

    run(|cx| async move {
        let conn = unwrap_outcome(SharedPgConnection::connect(&cx, cfg).await);
        let table = test_table_name("datagate_pg_roundtrip");
        let drop_sql = format!("DROP TABLE IF EXISTS \"{table}\"");
        unwrap_outcome(
            conn.execute(
                &cx,
                &format!("CREATE TABLE \"{table}\" (id BIGSERIAL PRIMARY KEY, name TEXT NOT NULL, tags TEXT[])"),
                &[],
            )
            .await,
        );

        let rows = unwrap_outcome(
            conn.query(
                &cx,
                &format!("INSERT INTO \"{table}\" (name, tags) VALUES ($1, $2) RETURNING id"),
                &[
                    Value::Text("Alice".into()),
                    Value::Array(vec![Value::Text("a".into()), Value::Text("b,c".into())]),
                ],
            )
            .await,
        );
        let id: i64 = rows[0].get_as("id").expect("id");

        let rows = unwrap_outcome(
            conn.query(
                &cx,
                &format!("SELECT id, name, tags FROM \"{table}\" WHERE id = $1"),
                &[Value::BigInt(id)],
            )
            .await,
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_as::<String>("name").expect("name"), "Alice");
        assert_eq!(
            rows[0].get_named("tags"),
            Some(&Value::Array(vec![Value::Text("a".into()), Value::Text("b,c".into())]))
        );

        let _ = conn.execute(&cx, &drop_sql, &[]).await;
    });
}

#[test]
fn postgres_transaction_rollback_discards_changes() {
    let Some(cfg) = postgres_test_config() else {
        eprintln!("skipping Postgres integration tests: set {POSTGRES_URL_ENV}");
        return;
    };

    run(|cx| async move {
        let conn = unwrap_outcome(SharedPgConnection::connect(&cx, cfg).await);
        let table = test_table_name("datagate_pg_tx");
        let drop_sql = format!("DROP TABLE IF EXISTS \"{table}\"");
        let count_sql = format!("SELECT COUNT(*) AS n FROM \"{table}\"");
        unwrap_outcome(
            conn.execute(&cx, &format!("CREATE TABLE \"{table}\" (name TEXT NOT NULL)"), &[])
                .await,
        );

        let tx = unwrap_outcome(conn.begin_with(&cx, TxOptions::default()).await);
        unwrap_outcome(
            tx.execute(&cx, &format!("INSERT INTO \"{table}\" VALUES ($1)"), &[Value::Text("Bob".into())])
                .await,
        );
        assert!(!conn.is_reusable());
        unwrap_outcome(tx.rollback(&cx).await);
        assert!(conn.is_reusable());

        let rows = unwrap_outcome(conn.query(&cx, &count_sql, &[]).await);
        assert_eq!(rows[0].get_as::<i64>("n").expect("count"), 0);

        let _ = conn.execute(&cx, &drop_sql, &[]).await;
    });
}

#[test]
fn postgres_unique_violation_carries_sqlstate() {
    let Some(cfg) = postgres_test_config() else {
        eprintln!("skipping Postgres integration tests: set {POSTGRES_URL_ENV}");
        return;
    };

    run(|cx| async move {
        let conn = unwrap_outcome(SharedPgConnection::connect(&cx, cfg).await);
        let table = test_table_name("datagate_pg_unique");
        let drop_sql = format!("DROP TABLE IF EXISTS \"{table}\"");
        let insert_sql = format!("INSERT INTO \"{table}\" (email) VALUES ($1)");
        unwrap_outcome(
            conn.execute(&cx, &format!("CREATE TABLE \"{table}\" (email TEXT UNIQUE)"), &[])
                .await,
        );
        unwrap_outcome(conn.execute(&cx, &insert_sql, &[Value::Text("a@b.c".into())]).await);

        match conn.execute(&cx, &insert_sql, &[Value::Text("a@b.c".into())]).await {
            Outcome::Err(Error::Query(q)) => {
                assert_eq!(q.kind, QueryErrorKind::Constraint);
                assert_eq!(q.sqlstate.as_deref(), Some("23505"));
            }
            other => panic!("expected unique violation, got {other:?}"),
        }
        // The error was drained; the connection is still usable.
        assert!(conn.is_reusable());
        unwrap_outcome(conn.ping(&cx).await);

        let _ = conn.execute(&cx, &drop_sql, &[]).await;
    });
}

#[test]
fn postgres_pipeline_runs_in_order_and_stops_at_first_error() {
    let Some(cfg) = postgres_test_config() else {
        eprintln!("skipping Postgres integration tests: set {POSTGRES_URL_ENV}");
        return;
    };

    run(|cx| async move {
        let conn = unwrap_outcome(SharedPgConnection::connect(&cx, cfg).await);
        let results = unwrap_outcome(
            conn.pipeline(
                &cx,
                &[
                    Statement::raw("SELECT 1 AS a", vec![]),
                    Statement::raw("SELECT $1::int8 AS b", vec![Value::BigInt(2)]),
                    Statement::raw("SELECT 'x' AS c UNION ALL SELECT 'y'", vec![]),
                ],
            )
            .await,
        );
        assert_eq!(results.len(), 3);
        assert_eq!(results[1].rows[0].get_as::<i64>("b").expect("b"), 2);
        assert_eq!(results[2].rows.len(), 2);

        let outcome = conn
            .pipeline(
                &cx,
                &[
                    Statement::raw("SELECT 1", vec![]),
                    Statement::raw("SELECT * FROM datagate_no_such_table", vec![]),
                    Statement::raw("SELECT 3", vec![]),
                ],
            )
            .await;
        match outcome {
            Outcome::Err(Error::Query(q)) => {
                assert_eq!(q.sqlstate.as_deref(), Some("42P01"));
                assert_eq!(q.sql.as_deref(), Some("SELECT * FROM datagate_no_such_table"));
            }
            other => panic!("expected undefined table, got {other:?}"),
        }
        assert!(conn.is_reusable());
    });
}
