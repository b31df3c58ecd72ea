use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "groupting.toml",
    "config/groupting.toml",
    "crates/config/groupting.toml",
    "../groupting.toml",
    "../config/groupting.toml",
    "../crates/config/groupting.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub matching: MatchingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    #[serde(default = "DatabaseConfig::default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

impl DatabaseConfig {
    const fn default_busy_timeout() -> u64 {
        5_000
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://groupting.db".to_string(),
            max_connections: 10,
            busy_timeout_ms: Self::default_busy_timeout(),
        }
    }
}

/// Tuning for the pairing and finalization transactions.
///
/// ```
/// use groupting_config::MatchingConfig;
///
/// let matching = MatchingConfig::default();
/// assert_eq!(matching.max_attempts, 5);
/// assert_eq!(matching.initial_backoff_ms, 50);
/// assert!(matching.max_backoff_ms >= matching.initial_backoff_ms);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Attempts per transaction before the trigger gives up.
    #[serde(default = "MatchingConfig::default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "MatchingConfig::default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "MatchingConfig::default_max_backoff")]
    pub max_backoff_ms: u64,
    #[serde(default = "MatchingConfig::default_multiplier")]
    pub backoff_multiplier: f64,
    /// Candidates tried by a single seeking trigger before it leaves the group seeking.
    #[serde(default = "MatchingConfig::default_max_candidates")]
    pub max_candidates_per_trigger: u32,
    #[serde(default = "MatchingConfig::default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "MatchingConfig::default_feed_capacity")]
    pub feed_capacity: usize,
}

impl MatchingConfig {
    const fn default_max_attempts() -> u32 {
        5
    }

    const fn default_initial_backoff() -> u64 {
        50
    }

    const fn default_max_backoff() -> u64 {
        2_000
    }

    const fn default_multiplier() -> f64 {
        2.0
    }

    const fn default_max_candidates() -> u32 {
        8
    }

    const fn default_sweep_interval() -> u64 {
        30
    }

    const fn default_feed_capacity() -> usize {
        1_024
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            initial_backoff_ms: Self::default_initial_backoff(),
            max_backoff_ms: Self::default_max_backoff(),
            backoff_multiplier: Self::default_multiplier(),
            max_candidates_per_trigger: Self::default_max_candidates(),
            sweep_interval_seconds: Self::default_sweep_interval(),
            feed_capacity: Self::default_feed_capacity(),
        }
    }
}

fn as_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use groupting_config::load;
///
/// std::env::remove_var("GROUPTING_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.database.url.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();
    let matching = &defaults.matching;

    let mut builder = config::Config::builder()
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default(
            "database.busy_timeout_ms",
            as_i64(defaults.database.busy_timeout_ms),
        )?
        .set_default("matching.max_attempts", i64::from(matching.max_attempts))?
        .set_default(
            "matching.initial_backoff_ms",
            as_i64(matching.initial_backoff_ms),
        )?
        .set_default("matching.max_backoff_ms", as_i64(matching.max_backoff_ms))?
        .set_default("matching.backoff_multiplier", matching.backoff_multiplier)?
        .set_default(
            "matching.max_candidates_per_trigger",
            i64::from(matching.max_candidates_per_trigger),
        )?
        .set_default(
            "matching.sweep_interval_seconds",
            as_i64(matching.sweep_interval_seconds),
        )?
        .set_default(
            "matching.feed_capacity",
            as_i64(matching.feed_capacity as u64),
        )?;

    let environment_overrides = config::Environment::with_prefix("GROUPTING").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("GROUPTING_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via GROUPTING_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    // A zero attempt budget would never run the transaction at all.
    if config.matching.max_attempts == 0 {
        config.matching.max_attempts = 1;
    }
    if config.matching.backoff_multiplier < 1.0 {
        config.matching.backoff_multiplier = 1.0;
    }
    if config.matching.max_backoff_ms < config.matching.initial_backoff_ms {
        config.matching.max_backoff_ms = config.matching.initial_backoff_ms;
    }

    debug!(?config, "loaded coordinator configuration");
    Ok(config)
}
