use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // PostgreSQL
    pub database_url: String,
    pub replica_url: Option<String>,
    pub db_max_connections: u32,

    // Store routing: which cluster/database this deployment talks to, and
    // whether it is the central deployment that runs global maintenance.
    pub db_cluster: Option<String>,
    pub db_name: Option<String>,
    pub central_store: bool,

    // Replication wait
    pub max_replication_lag_ms: u64,
    pub replication_poll_ms: u64,
    pub replication_wait_timeout_ms: u64,

    // Purge
    pub purge_interval_secs: u64,
    pub retention_days: i64,

    // Row limits (unset = unlimited)
    pub max_lists_per_user: Option<i64>,
    pub max_entries_per_list: Option<i64>,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            // PostgreSQL
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/readinglists".to_string()),
            replica_url: env::var("DATABASE_REPLICA_URL").ok().filter(|v| !v.is_empty()),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .unwrap_or(15),

            // Store routing
            db_cluster: env::var("DB_CLUSTER").ok().filter(|v| !v.is_empty()),
            db_name: env::var("DB_NAME").ok().filter(|v| !v.is_empty()),
            central_store: env::var("CENTRAL_STORE")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),

            // Replication wait
            max_replication_lag_ms: env::var("MAX_REPLICATION_LAG_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),
            replication_poll_ms: env::var("REPLICATION_POLL_MS")
                .unwrap_or_else(|_| "250".to_string())
                .parse()
                .unwrap_or(250),
            replication_wait_timeout_ms: env::var("REPLICATION_WAIT_TIMEOUT_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .unwrap_or(10_000),

            // Purge: 0 means run a single sweep and exit
            purge_interval_secs: env::var("PURGE_INTERVAL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .unwrap_or(86_400), // daily

            retention_days: env::var("RETENTION_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),

            // Row limits
            max_lists_per_user: env::var("MAX_LISTS_PER_USER")
                .ok()
                .and_then(|v| v.parse().ok()),
            max_entries_per_list: env::var("MAX_ENTRIES_PER_LIST")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
