//! PostgreSQL connector and pool bootstrap.

use std::future::Future;

use asupersync::{Cx, Outcome};
use datagate_core::{Connection, Error, Result};
use datagate_pool::{Pool, PoolConfig};
use datagate_postgres::{PgConfig, SharedPgConnection};
use datagate_session::{Connector, Db, DbConfig};

use crate::settings::DatabaseSettings;

/// Opens [`SharedPgConnection`]s for a pool.
#[derive(Debug, Clone)]
pub struct PgConnector {
    config: PgConfig,
}

impl PgConnector {
    pub fn new(config: PgConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PgConfig {
        &self.config
    }
}

impl Connector for PgConnector {
    type Conn = SharedPgConnection;

    fn connect(&self, cx: &Cx) -> impl Future<Output = Outcome<SharedPgConnection, Error>> + Send {
        let config = self.config.clone();
        async move { SharedPgConnection::connect(cx, config).await }
    }
}

/// A PostgreSQL-backed [`Db`].
pub type PgDb = Db<PgConnector>;

/// Build a [`PgDb`] without opening any connection.
///
/// Fails when the pool configuration is invalid.
pub fn open(pg: PgConfig, pool: PoolConfig, config: DbConfig) -> Result<PgDb> {
    let pool = Pool::try_new(pool)?;
    Ok(Db::new(pool, PgConnector::new(pg), config))
}

/// Build a [`PgDb`] from settings, open `MinConns` connections and check that
/// the server answers.
#[tracing::instrument(level = "info", skip_all, fields(host = %settings.host, database = %settings.database))]
pub async fn connect(cx: &Cx, settings: &DatabaseSettings) -> Outcome<PgDb, Error> {
    let db = match open(settings.pg_config(), settings.pool_config(), settings.timeouts) {
        Ok(db) => db,
        Err(e) => return Outcome::Err(e),
    };

    match db.warm_up(cx).await {
        Outcome::Ok(opened) => tracing::debug!(opened, "pool warmed up"),
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    }

    let conn = match db.acquire(cx).await {
        Outcome::Ok(conn) => conn,
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };
    match conn.ping(cx).await {
        Outcome::Ok(()) => {}
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    }
    drop(conn);

    tracing::info!(max_connections = db.pool().config().max_connections, "database ready");
    Outcome::Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_invalid_pool() {
        let err = open(PgConfig::default(), PoolConfig::new(0), DbConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Pool(_)));
    }

    #[test]
    fn test_open_is_lazy() {
        let db = open(
            PgConfig::new("db.internal", "app", "shop"),
            PoolConfig::new(4).min_connections(1),
            DbConfig::default(),
        )
        .unwrap();
        let stats = db.stats();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.max_connections, 4);
    }

    #[test]
    fn test_connector_keeps_config() {
        let connector = PgConnector::new(
            PgConfig::new("db.internal", "app", "shop")
                .port(6543)
                .password("hunter2"),
        );
        assert_eq!(connector.config().port, 6543);
        assert!(!format!("{connector:?}").contains("hunter2"));
    }
}
