//! Purge service for soft-deleted rows and orphaned sortkeys
//!
//! Runs on the central deployment only, either as a one-shot sweep or as
//! a periodic background task.
//! - Hard-deletes rows whose tombstone is older than the retention window
//! - Reclaims sortkey rows whose list or entry is gone

use chrono::Utc;
use std::time::Duration;
use tokio::time;

use crate::db::ReadingListRepository;

/// Configuration for the purge service
pub struct PurgeSettings {
    /// How often to run a sweep (in seconds)
    pub interval_secs: u64,
    /// How long a soft-deleted row survives before it is purged (in days)
    pub retention_days: i64,
}

impl Default for PurgeSettings {
    fn default() -> Self {
        Self {
            interval_secs: 86_400, // daily
            retention_days: 30,
        }
    }
}

/// Result of one purge sweep
#[derive(Debug, Default)]
pub struct PurgeOutcome {
    pub lists_purged: u64,
    pub entries_purged: u64,
    pub list_sortkeys_purged: u64,
    pub entry_sortkeys_purged: u64,
    pub errors: Vec<String>,
}

impl PurgeOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn total_purged(&self) -> u64 {
        self.lists_purged
            + self.entries_purged
            + self.list_sortkeys_purged
            + self.entry_sortkeys_purged
    }
}

/// Run a single purge sweep
pub async fn run_purge(repo: &ReadingListRepository, settings: &PurgeSettings) -> PurgeOutcome {
    let mut outcome = PurgeOutcome::default();
    let cutoff = Utc::now() - chrono::Duration::days(settings.retention_days);

    // Old tombstones first; the sortkeys they orphan are collected by the
    // sweep right after.
    match repo.purge_old_deleted(cutoff).await {
        Ok(purged) => {
            outcome.lists_purged = purged.lists;
            outcome.entries_purged = purged.entries;
        }
        Err(e) => {
            outcome.errors.push(format!("Deleted-row purge failed: {}", e));
            tracing::error!("Purge: deleted-row purge failed: {}", e);
        }
    }

    match repo.purge_sortkeys().await {
        Ok(purged) => {
            outcome.list_sortkeys_purged = purged.list_sortkeys;
            outcome.entry_sortkeys_purged = purged.entry_sortkeys;
        }
        Err(e) => {
            outcome.errors.push(format!("Sortkey purge failed: {}", e));
            tracing::error!("Purge: sortkey purge failed: {}", e);
        }
    }

    outcome
}

/// Start the background purge task
///
/// The first sweep runs immediately, then one per interval. This should
/// be spawned with `tokio::spawn`, or awaited directly by a binary that
/// has nothing else to do.
pub async fn start_purge_task(repo: ReadingListRepository, settings: PurgeSettings) {
    tracing::info!(
        "Starting purge task (interval: {}s, retention: {} days)",
        settings.interval_secs,
        settings.retention_days
    );

    // The interval's first tick completes immediately.
    let mut interval = time::interval(Duration::from_secs(settings.interval_secs));

    loop {
        interval.tick().await;

        let outcome = run_purge(&repo, &settings).await;
        if outcome.total_purged() > 0 {
            tracing::info!(
                "Purge sweep complete: {} lists, {} entries, {} list sortkeys, {} entry sortkeys",
                outcome.lists_purged,
                outcome.entries_purged,
                outcome.list_sortkeys_purged,
                outcome.entry_sortkeys_purged
            );
        }
        if !outcome.is_success() {
            for error in &outcome.errors {
                tracing::warn!("Purge error: {}", error);
            }
        }
    }
}
