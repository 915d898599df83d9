//! Database connection pool

use crate::Result;
use serde::Deserialize;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use std::path::Path;
use tracing::info;

/// Embedded migrations, applied when no filesystem path is configured.
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Database settings, including the migration policy.
#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub name: String,
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
    #[serde(default = "default_min_conns")]
    pub min_conns: u32,
    #[serde(default = "default_max_conns")]
    pub max_conns: u32,
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Migration settings. An empty path selects the embedded migrations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MigrationConfig {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub auto_apply: bool,
}

fn default_port() -> u16 {
    5432
}

fn default_ssl_mode() -> String {
    "prefer".to_string()
}

fn default_min_conns() -> u32 {
    1
}

fn default_max_conns() -> u32 {
    8
}

/// Database connection pool wrapper
#[derive(Debug, Clone)]
pub struct DbPool(PgPool);

impl DbPool {
    /// Connect to Postgres and apply migrations when configured.
    pub async fn connect(cfg: &DbConfig) -> Result<Self> {
        info!(host = %cfg.host, port = cfg.port, name = %cfg.name, "connecting to database");

        let ssl_mode = cfg.ssl_mode.parse::<PgSslMode>().unwrap_or(PgSslMode::Prefer);
        let options = PgConnectOptions::new()
            .host(&cfg.host)
            .port(cfg.port)
            .username(&cfg.user)
            .password(&cfg.password)
            .database(&cfg.name)
            .ssl_mode(ssl_mode);

        let pool = PgPoolOptions::new()
            .min_connections(cfg.min_conns)
            .max_connections(cfg.max_conns)
            .connect_with(options)
            .await?;

        let db = Self(pool);
        if cfg.migration.auto_apply {
            db.migrate(&cfg.migration.path).await?;
        }

        Ok(db)
    }

    /// Wrap an existing pool (tests).
    pub fn from_pool(pool: PgPool) -> Self {
        Self(pool)
    }

    /// Apply migrations from the given path, or the embedded set when the
    /// path is empty.
    pub async fn migrate(&self, path: &str) -> Result<()> {
        if path.is_empty() {
            info!("applying embedded migrations");
            MIGRATOR.run(&self.0).await?;
        } else {
            info!(path, "applying migrations from disk");
            let migrator = Migrator::new(Path::new(path)).await?;
            migrator.run(&self.0).await?;
        }
        Ok(())
    }

    /// Begin a transaction.
    pub async fn begin(&self) -> Result<sqlx::Transaction<'static, sqlx::Postgres>> {
        Ok(self.0.begin().await?)
    }

    /// Get the inner pool
    pub fn inner(&self) -> &PgPool {
        &self.0
    }

    /// Close the pool
    pub async fn close(&self) {
        self.0.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let cfg: DbConfig = serde_json::from_value(serde_json::json!({
            "host": "localhost",
            "user": "probe",
            "name": "probe",
        }))
        .unwrap();

        assert_eq!(cfg.port, 5432);
        assert_eq!(cfg.ssl_mode, "prefer");
        assert_eq!(cfg.min_conns, 1);
        assert_eq!(cfg.max_conns, 8);
        assert!(!cfg.migration.auto_apply);
        assert!(cfg.migration.path.is_empty());
    }
}
