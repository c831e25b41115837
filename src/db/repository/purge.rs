//! Store-wide maintenance sweeps
//!
//! Nothing here is scoped to one user: the sweeps walk the whole store in
//! bounded batches, waiting for replication to catch up between batches so
//! a long purge never leaves replicas far behind. Both sweeps are
//! restartable; an interrupted run just leaves work for the next one.

use chrono::{DateTime, Utc};

use crate::db::error::RepoResult;
use crate::db::models::{PurgedRows, PurgedSortkeys};

use super::ReadingListRepository;

/// Rows deleted per purge statement. Keeps each statement's lock
/// footprint and replication burst bounded.
pub const PURGE_BATCH_SIZE: i64 = 1000;

impl ReadingListRepository {
    /// Delete sortkey rows whose list or entry no longer exists.
    ///
    /// Teardown and the deleted-row purge leave sortkeys behind on
    /// purpose; this sweep is where they get reclaimed.
    pub async fn purge_sortkeys(&self) -> RepoResult<PurgedSortkeys> {
        let mut purged = PurgedSortkeys::default();

        loop {
            let deleted = sqlx::query(
                r#"
                DELETE FROM list_sortkeys
                WHERE list_id IN (
                    SELECT sk.list_id
                    FROM list_sortkeys sk
                    LEFT JOIN reading_lists l ON l.id = sk.list_id
                    WHERE l.id IS NULL
                    LIMIT $1
                )
                "#,
            )
            .bind(PURGE_BATCH_SIZE)
            .execute(self.db.write())
            .await?
            .rows_affected();

            if deleted == 0 {
                break;
            }
            purged.list_sortkeys += deleted;
            tracing::debug!("Purged {} orphaned list sortkeys", deleted);
            self.db.wait_for_replication().await?;
        }

        loop {
            let deleted = sqlx::query(
                r#"
                DELETE FROM entry_sortkeys
                WHERE entry_id IN (
                    SELECT sk.entry_id
                    FROM entry_sortkeys sk
                    LEFT JOIN reading_list_entries e ON e.id = sk.entry_id
                    WHERE e.id IS NULL
                    LIMIT $1
                )
                "#,
            )
            .bind(PURGE_BATCH_SIZE)
            .execute(self.db.write())
            .await?
            .rows_affected();

            if deleted == 0 {
                break;
            }
            purged.entry_sortkeys += deleted;
            tracing::debug!("Purged {} orphaned entry sortkeys", deleted);
            self.db.wait_for_replication().await?;
        }

        tracing::info!(
            "Sortkey purge removed {} list sortkeys, {} entry sortkeys",
            purged.list_sortkeys, purged.entry_sortkeys
        );
        Ok(purged)
    }

    /// Hard-delete rows soft-deleted before the cutoff.
    ///
    /// Lists go first and take all their entries with them, whatever the
    /// entries' own state; then entries whose own tombstone is old enough
    /// are swept. Sortkeys of purged rows are left for `purge_sortkeys`.
    pub async fn purge_old_deleted(&self, before: DateTime<Utc>) -> RepoResult<PurgedRows> {
        let mut purged = PurgedRows::default();

        loop {
            let mut tx = self.db.write().begin().await?;

            let list_ids = sqlx::query_scalar::<_, i64>(
                r#"
                SELECT id FROM reading_lists
                WHERE deleted AND updated_at < $1
                ORDER BY id
                LIMIT $2
                FOR UPDATE
                "#,
            )
            .bind(before)
            .bind(PURGE_BATCH_SIZE)
            .fetch_all(&mut *tx)
            .await?;

            if list_ids.is_empty() {
                break;
            }

            let entries = sqlx::query("DELETE FROM reading_list_entries WHERE list_id = ANY($1)")
                .bind(&list_ids)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            let lists = sqlx::query("DELETE FROM reading_lists WHERE id = ANY($1)")
                .bind(&list_ids)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            tx.commit().await?;

            purged.lists += lists;
            purged.entries += entries;
            tracing::debug!("Purged {} deleted lists and {} of their entries", lists, entries);
            self.db.wait_for_replication().await?;
        }

        loop {
            let deleted = sqlx::query(
                r#"
                DELETE FROM reading_list_entries
                WHERE id IN (
                    SELECT id FROM reading_list_entries
                    WHERE deleted AND updated_at < $1
                    ORDER BY id
                    LIMIT $2
                )
                "#,
            )
            .bind(before)
            .bind(PURGE_BATCH_SIZE)
            .execute(self.db.write())
            .await?
            .rows_affected();

            if deleted == 0 {
                break;
            }
            purged.entries += deleted;
            tracing::debug!("Purged {} deleted entries", deleted);
            self.db.wait_for_replication().await?;
        }

        tracing::info!(
            "Deleted-row purge removed {} lists, {} entries (cutoff {})",
            purged.lists, purged.entries, before
        );
        Ok(purged)
    }
}
