//! List CRUD

use crate::db::error::{RepoError, RepoResult};
use crate::db::models::{ListPatch, ListRow, NewList};
use crate::db::pool::ReadConsistency;

use super::{
    classify_list_write_miss, default_list_id_for_update, fetch_list_check,
    ReadingListRepository,
};

impl ReadingListRepository {
    /// Create a list for the user.
    ///
    /// The default list is locked while the insert runs so a concurrent
    /// teardown cannot slip between the setup check and the new row.
    pub async fn add_list(&self, new: NewList) -> RepoResult<ListRow> {
        let user_id = self.require_user()?;

        let mut tx = self.db.write().begin().await?;

        if default_list_id_for_update(&mut *tx, user_id)
            .await?
            .is_none()
        {
            return Err(RepoError::NotSetUp(user_id));
        }

        if let Some(max) = self.limits.max_lists_per_user {
            let count = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM reading_lists WHERE user_id = $1 AND NOT deleted",
            )
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

            if count >= max {
                return Err(RepoError::ListLimitExceeded(max));
            }
        }

        let list = sqlx::query_as::<_, ListRow>(
            r#"
            INSERT INTO reading_lists (user_id, is_default, name, description, color, image, icon)
            VALUES ($1, FALSE, $2, $3, $4, $5, $6)
            RETURNING id, user_id, is_default, name, description, color, image, icon,
                      created_at, updated_at, deleted
            "#,
        )
        .bind(user_id)
        .bind(&new.name)
        .bind(new.description.as_deref().unwrap_or(""))
        .bind(&new.color)
        .bind(&new.image)
        .bind(&new.icon)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(list)
    }

    /// The user's non-deleted lists, ordered by sortkey rank (unranked
    /// lists last, then by id).
    pub async fn get_all_lists(&self, limit: i64, offset: i64) -> RepoResult<Vec<ListRow>> {
        let user_id = self.require_user()?;

        let lists = sqlx::query_as::<_, ListRow>(
            r#"
            SELECT l.id, l.user_id, l.is_default, l.name, l.description, l.color, l.image,
                   l.icon, l.created_at, l.updated_at, l.deleted
            FROM reading_lists l
            LEFT JOIN list_sortkeys sk ON sk.list_id = l.id
            WHERE l.user_id = $1 AND NOT l.deleted
            ORDER BY sk.sort_index, l.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.db.read())
        .await?;

        // A set-up user always has at least the default list, so an empty
        // first page can only mean the user was never set up (or the
        // offset ran past the end).
        if lists.is_empty() && !self.is_setup_for_user(ReadConsistency::Replica).await? {
            return Err(RepoError::NotSetUp(user_id));
        }

        Ok(lists)
    }

    /// Patch a list's descriptive fields. Absent patch fields keep their
    /// stored value; any applied patch bumps `updated_at`. Soft-deleted
    /// lists accept updates like live ones.
    pub async fn update_list(&self, id: i64, patch: ListPatch) -> RepoResult<ListRow> {
        let user_id = self.require_user()?;

        // Nothing to write: verify the list is the caller's and hand the
        // stored row back untouched.
        if patch.is_empty() {
            let row = fetch_list_row(self, id).await?;
            return match row {
                Some(row) if row.user_id == user_id => Ok(row),
                Some(_) => Err(RepoError::NotOwnList(id)),
                None => Err(RepoError::NoSuchList(id)),
            };
        }

        let updated = sqlx::query_as::<_, ListRow>(
            r#"
            UPDATE reading_lists
            SET name = COALESCE($3, name),
                description = COALESCE($4, description),
                color = COALESCE($5, color),
                image = COALESCE($6, image),
                icon = COALESCE($7, icon),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, is_default, name, description, color, image, icon,
                      created_at, updated_at, deleted
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&patch.name)
        .bind(&patch.description)
        .bind(&patch.color)
        .bind(&patch.image)
        .bind(&patch.icon)
        .fetch_optional(self.db.write())
        .await?;

        match updated {
            Some(row) => Ok(row),
            None => {
                let check = fetch_list_check(self.db.write(), id).await?;
                Err(classify_list_write_miss(id, check.as_ref(), user_id, false))
            }
        }
    }

    /// Soft-delete a list. The default list is protected; re-deleting an
    /// already-deleted list succeeds and refreshes its tombstone.
    pub async fn delete_list(&self, id: i64) -> RepoResult<()> {
        let user_id = self.require_user()?;

        let touched = sqlx::query(
            r#"
            UPDATE reading_lists
            SET deleted = TRUE, updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND NOT is_default
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(self.db.write())
        .await?
        .rows_affected();

        if touched == 0 {
            let check = fetch_list_check(self.db.write(), id).await?;
            return Err(classify_list_write_miss(id, check.as_ref(), user_id, true));
        }

        Ok(())
    }
}

/// Fetch a full list row by id from the primary, no ownership filter.
async fn fetch_list_row(repo: &ReadingListRepository, id: i64) -> RepoResult<Option<ListRow>> {
    let row = sqlx::query_as::<_, ListRow>(
        r#"
        SELECT id, user_id, is_default, name, description, color, image, icon,
               created_at, updated_at, deleted
        FROM reading_lists
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(repo.db.write())
    .await?;

    Ok(row)
}
