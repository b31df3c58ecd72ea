//! Database migrations

use anyhow::Context;
use sqlx::SqlitePool;
use tracing::info;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Run database migrations
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("database migrations failed")?;
    info!("database migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::prepare_database;
    use groupting_config::DatabaseConfig;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_migrations_create_schema() {
        let temp_dir = TempDir::new().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("migrations.db").display()),
            max_connections: 1,
            busy_timeout_ms: 1_000,
        };

        let pool = prepare_database(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();
        // Re-running is a no-op.
        run_migrations(&pool).await.unwrap();

        for table in ["users", "groups", "chatrooms"] {
            let (count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                    .bind(table)
                    .fetch_one(&pool)
                    .await
                    .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }

    #[tokio::test]
    async fn test_schema_rejects_matched_group_without_peer() {
        let temp_dir = TempDir::new().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("check.db").display()),
            max_connections: 1,
            busy_timeout_ms: 1_000,
        };
        let pool = prepare_database(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let result = sqlx::query(
            "INSERT INTO groups (id, status, member_ids, created_at, updated_at)
             VALUES ('g1', 'matched', '[\"a\"]', 'now', 'now')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }
}
