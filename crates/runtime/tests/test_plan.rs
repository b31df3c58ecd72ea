use std::path::Path;

use anyhow::{Context, Result};
use groupting_config::AppConfig;
use groupting_database::{CreateGroupRequest, CreateUserRequest, GroupStatus};
use groupting_matching::SeekOutcome;
use groupting_runtime::MatchingServices;
use tempfile::TempDir;

fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}", path.to_string_lossy())
}

fn build_config(database_url: String, max_connections: u32) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = database_url;
    config.database.max_connections = max_connections;
    config
}

async fn initialise(config: &AppConfig) -> Result<MatchingServices> {
    MatchingServices::initialise(config)
        .await
        .context("failed to initialise matching services")
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_runs_migrations() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/init.db");
    let config = build_config(sqlite_url(&db_path), 4);

    let services = initialise(&config).await?;
    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('groups', 'chatrooms', 'users') ORDER BY name",
    )
    .fetch_all(&services.db_pool)
    .await?;

    assert_eq!(vec!["chatrooms", "groups", "users"], tables);
    drop(services);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn prepare_database_creates_sqlite_directory_if_missing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_dir = temp_dir.path().join("nested");
    let db_path = db_dir.join("prepared.db");
    let config = build_config(sqlite_url(&db_path), 2);

    assert!(!db_dir.exists());

    let services = initialise(&config).await?;
    assert!(db_dir.exists(), "database directory should be created");
    assert!(db_path.exists(), "database file should be created");
    drop(services);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_rejects_unreachable_database() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let blocker = temp_dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory")?;
    let config = build_config(sqlite_url(&blocker.join("db.sqlite")), 1);

    let error = match MatchingServices::initialise(&config).await {
        Ok(_) => panic!("expected initialisation to fail below a regular file"),
        Err(error) => error,
    };
    let message = format!("{error:?}");
    assert!(
        message.contains("failed to initialise database"),
        "expected database context, got {message}"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn services_share_one_store_with_the_coordinator() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = build_config(sqlite_url(&temp_dir.path().join("wired.db")), 4);
    let services = initialise(&config).await?;

    for (group, user) in [("G1", "a"), ("G2", "b")] {
        services
            .store
            .users()
            .create(&CreateUserRequest {
                id: user.to_string(),
                nickname: None,
                current_group_id: None,
            })
            .await?;
        services
            .store
            .groups()
            .create(&CreateGroupRequest {
                id: Some(group.to_string()),
                name: None,
                member_ids: vec![user.to_string()],
            })
            .await?;
        services.store.groups().start_seeking(group).await?;
    }

    let outcome = services.coordinator.seek("G1").await?;
    assert!(matches!(outcome, SeekOutcome::Matched(_)));

    let matched = services
        .store
        .groups()
        .find_by_status(GroupStatus::Matched)
        .await?;
    assert_eq!(2, matched.len());

    let report = services.coordinator.sweep().await?;
    assert_eq!(1, report.finalized);
    assert_eq!(1, services.store.chatrooms().count().await?);
    Ok(())
}
