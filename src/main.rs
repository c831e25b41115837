use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reading_lists::config::Config;
use reading_lists::db::{health_check, run_migrations, DbProvider, ReadingListRepository, StoreLimits};
use reading_lists::services::maintenance::{run_purge, start_purge_task, PurgeSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reading_lists=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = Config::from_env();

    tracing::info!(
        "Starting reading list maintenance v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Global sweeps run on the central deployment only.
    if !config.central_store {
        tracing::warn!("CENTRAL_STORE is false; refusing to run maintenance here");
        return Ok(());
    }

    let db = DbProvider::connect(&config).await?;
    tracing::info!("PostgreSQL connected");

    run_migrations(db.write()).await?;

    if !health_check(db.write()).await {
        anyhow::bail!("database health check failed");
    }

    // Purge is unscoped: no user binding, no row limits.
    let repo = ReadingListRepository::new(db, None, StoreLimits::unlimited());
    let settings = PurgeSettings {
        interval_secs: config.purge_interval_secs,
        retention_days: config.retention_days,
    };

    // Interval 0 means one sweep and out, for cron-style scheduling.
    if settings.interval_secs == 0 {
        let outcome = run_purge(&repo, &settings).await;
        if !outcome.is_success() {
            anyhow::bail!("purge finished with {} errors", outcome.errors.len());
        }
        tracing::info!("Purge complete: {} rows removed", outcome.total_purged());
        return Ok(());
    }

    start_purge_task(repo, settings).await;

    Ok(())
}
