use std::sync::Arc;

use anyhow::{Context, Result};
use groupting_config::AppConfig;
use groupting_database::{initialize_database, ChangeFeed, MatchStore};
use groupting_matching::{LoggingNotifier, MatchCoordinator, MatchNotifier};
use sqlx::SqlitePool;
use tracing::info;

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::TRACE)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

#[derive(Clone)]
pub struct MatchingServices {
    pub db_pool: SqlitePool,
    pub store: MatchStore,
    pub coordinator: Arc<MatchCoordinator>,
}

impl MatchingServices {
    /// Open the database and wire the coordinator with the logging notifier.
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        Self::initialise_with_notifier(config, Arc::new(LoggingNotifier)).await
    }

    pub async fn initialise_with_notifier(
        config: &AppConfig,
        notifier: Arc<dyn MatchNotifier>,
    ) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise database")?;

        let store = MatchStore::new(db_pool.clone(), ChangeFeed::new(config.matching.feed_capacity));
        let coordinator = Arc::new(MatchCoordinator::new(
            store.clone(),
            &config.matching,
            notifier,
        ));

        info!(
            database = %config.database.url,
            max_attempts = config.matching.max_attempts,
            sweep_interval_seconds = config.matching.sweep_interval_seconds,
            "matching services ready"
        );

        Ok(Self {
            db_pool,
            store,
            coordinator,
        })
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
