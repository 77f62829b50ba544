use std::time::Duration;

use parkbot_core::config::DatabaseConfig;
use sqlx::sqlite::SqlitePoolOptions;

pub type DbPool = sqlx::SqlitePool;

/// Writers may hold the database file this long before a concurrent
/// intake message gives up instead of queueing behind it.
const MAX_BUSY_TIMEOUT_MS: u64 = 30_000;

/// Pool sizing plus the SQLite pragmas applied to every connection.
#[derive(Clone, Debug)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub busy_timeout_ms: u64,
}

impl From<&DatabaseConfig> for PoolSettings {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            acquire_timeout_secs: config.timeout_secs,
            // A visitor message that waits out a writer gets the same
            // budget it would spend waiting for a free connection.
            busy_timeout_ms: config.timeout_secs.saturating_mul(1_000).min(MAX_BUSY_TIMEOUT_MS),
        }
    }
}

pub async fn connect_from_config(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect(&config.url, PoolSettings::from(config)).await
}

pub async fn connect(database_url: &str, settings: PoolSettings) -> Result<DbPool, sqlx::Error> {
    let busy_timeout_ms = settings.busy_timeout_ms.max(1);
    SqlitePoolOptions::new()
        .max_connections(settings.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs.max(1)))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query(&format!("PRAGMA busy_timeout = {busy_timeout_ms}"))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

/// Shorthand for tests and one-shot CLI work where only pool size and
/// acquire timeout matter.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    connect(
        database_url,
        PoolSettings {
            max_connections,
            acquire_timeout_secs: timeout_secs,
            busy_timeout_ms: timeout_secs.saturating_mul(1_000).min(MAX_BUSY_TIMEOUT_MS),
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_settings_follow_the_database_config() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 3,
            timeout_secs: 8,
        };

        let settings = PoolSettings::from(&config);
        assert_eq!(settings.max_connections, 3);
        assert_eq!(settings.acquire_timeout_secs, 8);
        assert_eq!(settings.busy_timeout_ms, 8_000);
    }

    #[test]
    fn busy_timeout_is_capped_for_generous_acquire_timeouts() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
            timeout_secs: 120,
        };

        assert_eq!(PoolSettings::from(&config).busy_timeout_ms, MAX_BUSY_TIMEOUT_MS);
    }

    #[tokio::test]
    async fn configured_busy_timeout_reaches_the_connection() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            timeout_secs: 7,
        };

        let pool = connect_from_config(&config).await.expect("connect");
        let applied: i64 = sqlx::query_scalar("PRAGMA busy_timeout")
            .fetch_one(&pool)
            .await
            .expect("read pragma");
        assert_eq!(applied, 7_000);
    }
}
