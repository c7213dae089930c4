//! Externally supplied database settings.
//!
//! One flat document covers the server, the pool and the call deadlines:
//!
//! ```json
//! {
//!   "DBHost": "db.internal", "DBPort": 5432, "DBdatabase": "shop",
//!   "DBUsername": "app", "DBPassword": "secret",
//!   "MaxConns": 20, "MinConns": 2, "MaxConnLifetime": 60, "MaxConnIdleTime": 10,
//!   "default_timeout_secs": 10, "multi_step_timeout_secs": 20
//! }
//! ```
//!
//! Pool lifetimes are in minutes, deadlines in seconds.

use datagate_pool::{PoolConfig, PoolSettings};
use datagate_postgres::PgConfig;
use datagate_session::DbConfig;
use serde::Deserialize;

#[derive(Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(rename = "DBHost")]
    pub host: String,
    #[serde(rename = "DBPort", default = "default_port")]
    pub port: u16,
    #[serde(rename = "DBdatabase")]
    pub database: String,
    #[serde(rename = "DBUsername")]
    pub username: String,
    #[serde(rename = "DBPassword", default)]
    pub password: Option<String>,
    #[serde(flatten)]
    pub pool: PoolSettings,
    #[serde(flatten)]
    pub timeouts: DbConfig,
}

fn default_port() -> u16 {
    5432
}

impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("pool", &self.pool)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl DatabaseSettings {
    /// Parse settings from a JSON document.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Connection parameters; TLS is not negotiated.
    pub fn pg_config(&self) -> PgConfig {
        let config = PgConfig::new(&self.host, &self.username, &self.database).port(self.port);
        match &self.password {
            Some(password) => config.password(password),
            None => config,
        }
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::from(self.pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const FULL: &str = r#"{
        "DBHost": "db.internal", "DBPort": 6543, "DBdatabase": "shop",
        "DBUsername": "app", "DBPassword": "hunter2",
        "MaxConns": 20, "MinConns": 2, "MaxConnLifetime": 60, "MaxConnIdleTime": 10,
        "default_timeout_secs": 5, "multi_step_timeout_secs": 15
    }"#;

    #[test]
    fn test_full_document() {
        let settings = DatabaseSettings::from_json(FULL).unwrap();
        let pg = settings.pg_config();
        assert_eq!(pg.host, "db.internal");
        assert_eq!(pg.port, 6543);
        assert_eq!(pg.user, "app");
        assert_eq!(pg.database, "shop");
        assert_eq!(pg.password.as_deref(), Some("hunter2"));

        let pool = settings.pool_config();
        assert_eq!(pool.max_connections, 20);
        assert_eq!(pool.min_connections, 2);
        assert_eq!(pool.max_lifetime, Some(Duration::from_secs(3600)));
        assert_eq!(pool.idle_timeout, Some(Duration::from_secs(600)));

        assert_eq!(settings.timeouts.default_timeout, Duration::from_secs(5));
        assert_eq!(settings.timeouts.multi_step_timeout, Duration::from_secs(15));
        assert!(!format!("{settings:?}").contains("hunter2"));
    }

    #[test]
    fn test_defaults() {
        let settings = DatabaseSettings::from_json(
            r#"{"DBHost": "localhost", "DBdatabase": "shop", "DBUsername": "app", "MaxConns": 4}"#,
        )
        .unwrap();
        assert_eq!(settings.port, 5432);
        assert!(settings.password.is_none());
        assert_eq!(settings.timeouts, DbConfig::default());
        assert_eq!(settings.pool_config().max_lifetime, None);
    }

    #[test]
    fn test_max_conns_is_required() {
        let err = DatabaseSettings::from_json(
            r#"{"DBHost": "localhost", "DBdatabase": "shop", "DBUsername": "app"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("MaxConns"));
    }
}
