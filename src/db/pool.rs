//! Database connection management
//!
//! Every repository instance works through a [`DbProvider`]: a write pool
//! on the primary and a read pool on a replica (or the primary again when
//! no replica is configured), plus the replication wait that paces bulk
//! purge sweeps.

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::db::error::{RepoError, RepoResult};

/// Consistency hint for reads whose result feeds a write decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadConsistency {
    /// Replica read; may lag behind the primary
    Replica,
    /// Primary read holding a row lock; use right before writing
    PrimaryLocking,
}

/// Replication wait tuning
#[derive(Debug, Clone, Copy)]
pub struct ReplicationSettings {
    pub max_lag_ms: u64,
    pub poll_ms: u64,
    pub wait_timeout_ms: u64,
}

impl Default for ReplicationSettings {
    fn default() -> Self {
        Self {
            max_lag_ms: 1000,
            poll_ms: 250,
            wait_timeout_ms: 10_000,
        }
    }
}

/// Write and read database handles plus replication pacing
#[derive(Clone)]
pub struct DbProvider {
    write: PgPool,
    read: PgPool,
    has_replica: bool,
    replication: ReplicationSettings,
}

impl DbProvider {
    /// Connect both pools from configuration
    pub async fn connect(config: &Config) -> Result<Self, sqlx::Error> {
        info!(
            "Connecting to PostgreSQL (cluster: {})...",
            config.db_cluster.as_deref().unwrap_or("default")
        );

        let write = build_pool(&config.database_url, config).await?;
        let (read, has_replica) = match &config.replica_url {
            Some(url) => (build_pool(url, config).await?, true),
            None => (write.clone(), false),
        };

        info!(
            "PostgreSQL connection pools created with max {} connections (replica: {})",
            config.db_max_connections, has_replica
        );

        Ok(Self {
            write,
            read,
            has_replica,
            replication: ReplicationSettings {
                max_lag_ms: config.max_replication_lag_ms,
                poll_ms: config.replication_poll_ms,
                wait_timeout_ms: config.replication_wait_timeout_ms,
            },
        })
    }

    /// Wrap an already-connected pool, replica-less; used by tests
    pub fn from_pool(pool: PgPool, replication: ReplicationSettings) -> Self {
        Self {
            write: pool.clone(),
            read: pool,
            has_replica: false,
            replication,
        }
    }

    /// Handle for writes; always the primary
    pub fn write(&self) -> &PgPool {
        &self.write
    }

    /// Handle for reads that tolerate replica staleness
    pub fn read(&self) -> &PgPool {
        &self.read
    }

    /// Block until replica lag drops under the configured ceiling
    ///
    /// Purge sweeps call this between batches so bulk deletes never run
    /// ahead of the replicas. A deployment without a replica returns
    /// immediately.
    pub async fn wait_for_replication(&self) -> RepoResult<()> {
        if !self.has_replica {
            return Ok(());
        }

        let started = tokio::time::Instant::now();
        let timeout = Duration::from_millis(self.replication.wait_timeout_ms);

        loop {
            let lag_ms = self.replica_lag_ms().await?;
            if lag_ms <= self.replication.max_lag_ms as f64 {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                warn!(
                    "Replica lag {:.0}ms did not recover within {}ms",
                    lag_ms, self.replication.wait_timeout_ms
                );
                return Err(RepoError::ReplicationTimeout(
                    self.replication.wait_timeout_ms,
                ));
            }
            debug!("Replica lag {:.0}ms, waiting for replication to catch up", lag_ms);
            tokio::time::sleep(Duration::from_millis(self.replication.poll_ms)).await;
        }
    }

    /// Current replay lag on the read pool, in milliseconds
    async fn replica_lag_ms(&self) -> RepoResult<f64> {
        let lag_secs: f64 = sqlx::query_scalar(
            r#"
            SELECT CASE
                WHEN pg_is_in_recovery()
                THEN COALESCE(EXTRACT(EPOCH FROM (now() - pg_last_xact_replay_timestamp()))::float8, 0.0::float8)
                ELSE 0.0::float8
            END
            "#,
        )
        .fetch_one(&self.read)
        .await?;

        Ok(lag_secs * 1000.0)
    }
}

fn pool_options(config: &Config) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
}

async fn build_pool(url: &str, config: &Config) -> Result<PgPool, sqlx::Error> {
    let mut options = PgConnectOptions::from_str(url)?;
    if let Some(name) = &config.db_name {
        options = options.database(name);
    }

    pool_options(config).connect_with(options).await
}

/// Run database migrations against the primary
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Running database migrations...");

    sqlx::migrate!("./migrations").run(pool).await?;

    info!("Database migrations completed");

    Ok(())
}

/// Health check for the primary
pub async fn health_check(pool: &PgPool) -> bool {
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => true,
        Err(e) => {
            error!("Database health check failed: {}", e);
            false
        }
    }
}
