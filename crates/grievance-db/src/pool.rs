//! Connection pool wrapper.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::DbError;

/// Pool sizing and timeout settings.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Maximum number of pooled connections.
    pub max_connections: u32,
    /// How long to wait for a free connection before failing.
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Shared PostgreSQL pool. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct DbPool {
    inner: PgPool,
}

impl DbPool {
    /// Connect with default settings.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        Self::connect_with(url, &PoolSettings::default()).await
    }

    /// Connect with explicit pool settings.
    pub async fn connect_with(url: &str, settings: &PoolSettings) -> Result<Self, DbError> {
        let inner = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect(url)
            .await
            .map_err(DbError::ConnectionFailed)?;

        tracing::info!(
            max_connections = settings.max_connections,
            "Database pool established"
        );

        Ok(Self { inner })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(inner: PgPool) -> Self {
        Self { inner }
    }

    /// Borrow the underlying `SQLx` pool.
    #[must_use]
    pub fn inner(&self) -> &PgPool {
        &self.inner
    }

    /// Round-trip a trivial query to verify connectivity.
    pub async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1")
            .execute(&self.inner)
            .await
            .map_err(DbError::ConnectionFailed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool_settings() {
        let settings = PoolSettings::default();
        assert_eq!(settings.max_connections, 10);
        assert_eq!(settings.acquire_timeout, Duration::from_secs(5));
    }
}
