//! The shared `PostgreSQL` pool.
//!
//! Queries are built at runtime rather than checked by `sqlx::query!`, so
//! the crate builds without a database. Every statement binds its inputs.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use studyquest_core::config::DatabaseConfig;

use crate::error::DbError;

/// A pooled `PostgreSQL` handle. Clones share one pool.
#[derive(Debug, Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    /// Open a pool sized and timed by the `database` config section.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] for an unparsable URL, or
    /// [`DbError::Postgres`] if no connection can be established.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DbError> {
        let options: PgConnectOptions = config
            .url
            .parse()
            .map_err(|e: sqlx::Error| DbError::Config(format!("database.url: {e}")))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_with(options)
            .await?;

        tracing::info!(max_connections = config.max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Open a pool for `url` with the default pool limits.
    ///
    /// # Errors
    ///
    /// Same as [`PostgresPool::connect`].
    pub async fn connect_url(url: &str) -> Result<Self, DbError> {
        let config = DatabaseConfig {
            url: url.to_owned(),
            ..DatabaseConfig::default()
        };
        Self::connect(&config).await
    }

    /// Apply pending migrations: the gamification tables and the
    /// `calculate_xp` function.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Migration`] if a migration fails.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations completed");
        Ok(())
    }

    /// The raw pool, for the table stores.
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Wait for checked-out connections to return, then close them.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL pool closed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unparsable_url_is_a_config_error() {
        let config = DatabaseConfig {
            url: "not a url".to_owned(),
            ..DatabaseConfig::default()
        };
        let err = PostgresPool::connect(&config).await.unwrap_err();
        assert!(matches!(err, DbError::Config(msg) if msg.starts_with("database.url")));
    }
}
