use std::time::Duration;

use planos_core::config::DatabaseConfig;
use sqlx::sqlite::SqlitePoolOptions;

pub type DbPool = sqlx::SqlitePool;

/// Opens a SQLite pool sized from the `[database]` section of the
/// application config.
///
/// Foreign keys and WAL are enabled on every connection. The per-connection
/// busy timeout tracks the configured acquire timeout so a contended write
/// gives up before the pool does.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let acquire_timeout_secs = config.timeout_secs.max(1);
    let busy_timeout_ms = acquire_timeout_secs.saturating_mul(1_000);

    SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                let busy = format!("PRAGMA busy_timeout = {busy_timeout_ms}");
                sqlx::query(&busy).execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(&config.url)
        .await
}

#[cfg(test)]
mod tests {
    use planos_core::config::DatabaseConfig;
    use sqlx::Row;

    use super::connect;

    fn memory_config() -> DatabaseConfig {
        DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            timeout_secs: 7,
        }
    }

    #[tokio::test]
    async fn pool_applies_the_configured_pragmas() {
        let pool = connect(&memory_config()).await.expect("connect");

        let foreign_keys: i64 = sqlx::query("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .expect("pragma query")
            .get(0);
        assert_eq!(foreign_keys, 1);

        let busy_timeout: i64 = sqlx::query("PRAGMA busy_timeout")
            .fetch_one(&pool)
            .await
            .expect("pragma query")
            .get(0);
        assert_eq!(busy_timeout, 7_000);

        pool.close().await;
    }
}
