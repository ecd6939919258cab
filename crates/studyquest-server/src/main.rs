//! Service binary for the StudyQuest gamification engine.
//!
//! Loads configuration, connects to `PostgreSQL`, and serves the HTTP API
//! while a background task keeps persisted event statuses in line with
//! the clock.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from the path given as the first argument, or
//!    `studyquest-config.yaml`, then apply environment overrides
//! 2. Initialize structured logging (tracing)
//! 3. Connect to `PostgreSQL` and run migrations
//! 4. Build the engine and start the status refresh task
//! 5. Serve HTTP until `Ctrl-C`

mod error;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use studyquest_api::AppState;
use studyquest_core::config::{LogFormat, LoggingConfig};
use studyquest_core::{Gamification, GamificationConfig, run_status_refresh};
use studyquest_db::{PgGamificationStore, PostgresPool};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

const DEFAULT_CONFIG_PATH: &str = "studyquest-config.yaml";

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config_path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let (config, found) = GamificationConfig::load(&config_path)?;

    init_logging(&config.logging)?;
    info!("studyquest-server starting");
    if found {
        info!(path = %config_path.display(), "Configuration loaded");
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }

    let pool = PostgresPool::connect(&config.database).await?;
    pool.run_migrations().await?;
    info!("Database ready");

    let store = Arc::new(PgGamificationStore::new(pool.clone()));
    let engine = Arc::new(Gamification::new(store, config.clone()));

    let refresh_secs = config.lifecycle.refresh_interval_secs;
    let refresher = if refresh_secs > 0 {
        info!(interval_secs = refresh_secs, "Starting event status refresh");
        Some(tokio::spawn(run_status_refresh(
            Arc::clone(&engine),
            Duration::from_secs(refresh_secs),
        )))
    } else {
        info!("Event status refresh disabled");
        None
    };

    let state = Arc::new(AppState::new(engine));
    let served = studyquest_api::start_server(&config.server, state).await;

    if let Some(handle) = refresher {
        handle.abort();
    }
    pool.close().await;
    served?;

    info!("studyquest-server shutdown complete");
    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) -> Result<(), AppError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    installed.map_err(|e| AppError::Logging {
        message: e.to_string(),
    })
}
