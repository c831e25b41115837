//! List entry CRUD

use crate::db::error::{RepoError, RepoResult};
use crate::db::models::ListEntryRow;

use super::{
    check_list_usable, check_lists_usable, classify_entry_write_miss, fetch_entry_check,
    fetch_list_check_for_update, fetch_list_checks, ReadingListRepository,
};

impl ReadingListRepository {
    /// Add a page to a list.
    ///
    /// The parent list is locked and validated first. A page already in
    /// the list is rejected whether the existing entry is live or
    /// soft-deleted; the unique constraint makes no distinction.
    pub async fn add_list_entry(
        &self,
        list_id: i64,
        project: &str,
        title: &str,
    ) -> RepoResult<ListEntryRow> {
        let user_id = self.require_user()?;

        let mut tx = self.db.write().begin().await?;

        let check = fetch_list_check_for_update(&mut *tx, list_id).await?;
        check_list_usable(list_id, check.as_ref(), user_id)?;

        if let Some(max) = self.limits.max_entries_per_list {
            let count = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM reading_list_entries WHERE list_id = $1 AND NOT deleted",
            )
            .bind(list_id)
            .fetch_one(&mut *tx)
            .await?;

            if count >= max {
                return Err(RepoError::EntryLimitExceeded(max));
            }
        }

        let inserted = sqlx::query_as::<_, ListEntryRow>(
            r#"
            INSERT INTO reading_list_entries (list_id, user_id, project, title)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (list_id, project, title) DO NOTHING
            RETURNING id, list_id, user_id, project, title, created_at, updated_at, deleted
            "#,
        )
        .bind(list_id)
        .bind(user_id)
        .bind(project)
        .bind(title)
        .fetch_optional(&mut *tx)
        .await?;

        let entry = match inserted {
            Some(entry) => entry,
            None => {
                return Err(RepoError::DuplicatePage {
                    list_id,
                    project: project.to_string(),
                    title: title.to_string(),
                });
            }
        };

        tx.commit().await?;
        Ok(entry)
    }

    /// Non-deleted entries of the given lists, grouped by list and ordered
    /// by entry rank within each (unranked entries last, then by id).
    ///
    /// Every requested list must exist, belong to the caller and be live;
    /// faults on lists that do exist are reported before missing ids.
    pub async fn get_list_entries(
        &self,
        list_ids: &[i64],
        limit: i64,
        offset: i64,
    ) -> RepoResult<Vec<ListEntryRow>> {
        let user_id = self.require_user()?;

        if list_ids.is_empty() {
            return Err(RepoError::EmptyListIds);
        }

        let checks = fetch_list_checks(self.db.read(), list_ids).await?;
        check_lists_usable(list_ids, &checks, user_id)?;

        let entries = sqlx::query_as::<_, ListEntryRow>(
            r#"
            SELECT e.id, e.list_id, e.user_id, e.project, e.title,
                   e.created_at, e.updated_at, e.deleted
            FROM reading_list_entries e
            LEFT JOIN entry_sortkeys sk ON sk.entry_id = e.id
            WHERE e.list_id = ANY($1) AND NOT e.deleted
            ORDER BY e.list_id, sk.sort_index, e.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(list_ids)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.db.read())
        .await?;

        Ok(entries)
    }

    /// Soft-delete an entry. Re-deleting an already-deleted entry succeeds
    /// and refreshes its tombstone.
    pub async fn delete_list_entry(&self, id: i64) -> RepoResult<()> {
        let user_id = self.require_user()?;

        let touched = sqlx::query(
            r#"
            UPDATE reading_list_entries
            SET deleted = TRUE, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(self.db.write())
        .await?
        .rows_affected();

        if touched == 0 {
            let check = fetch_entry_check(self.db.write(), id).await?;
            return Err(classify_entry_write_miss(id, check.as_ref(), user_id));
        }

        Ok(())
    }
}
