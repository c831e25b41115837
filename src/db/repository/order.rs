//! List and entry ordering
//!
//! Order is stored as sortkey rows (row id, rank) and always replaced
//! wholesale: a set-order call deletes the caller's existing sortkeys and
//! writes rank = position for each id in the new order. Rows left out of
//! the order lose their rank and fall back to the unranked tail.

use crate::db::error::{RepoError, RepoResult};

use super::{
    check_entries_orderable, check_list_usable, check_lists_usable, default_list_id_for_update,
    fetch_entry_checks_for_update, fetch_list_check, fetch_list_check_for_update,
    fetch_list_checks_for_update, ReadingListRepository,
};

impl ReadingListRepository {
    /// The user's list ids in rank order (unranked lists last, by id).
    pub async fn get_list_order(&self) -> RepoResult<Vec<i64>> {
        let user_id = self.require_user()?;

        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT l.id
            FROM reading_lists l
            LEFT JOIN list_sortkeys sk ON sk.list_id = l.id
            WHERE l.user_id = $1 AND NOT l.deleted
            ORDER BY sk.sort_index, l.id
            "#,
        )
        .bind(user_id)
        .fetch_all(self.db.read())
        .await?;

        // The default list cannot be deleted, so a set-up user always has
        // at least one id here.
        if ids.is_empty() {
            return Err(RepoError::NotSetUp(user_id));
        }

        Ok(ids)
    }

    /// Replace the user's list order with `order`, rank = position.
    ///
    /// Every id must name a live list of the caller's. The default list's
    /// `updated_at` is bumped so the new order reaches sync clients.
    pub async fn set_list_order(&self, order: &[i64]) -> RepoResult<()> {
        let user_id = self.require_user()?;

        if order.is_empty() {
            return Err(RepoError::EmptyOrder);
        }

        let mut tx = self.db.write().begin().await?;

        let default_id = default_list_id_for_update(&mut *tx, user_id)
            .await?
            .ok_or(RepoError::NotSetUp(user_id))?;

        let checks = fetch_list_checks_for_update(&mut *tx, order).await?;
        check_lists_usable(order, &checks, user_id)?;

        sqlx::query(
            r#"
            DELETE FROM list_sortkeys
            WHERE list_id IN (SELECT id FROM reading_lists WHERE user_id = $1)
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        // ON CONFLICT keeps the first occurrence when an id repeats.
        for (rank, list_id) in order.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO list_sortkeys (list_id, sort_index)
                VALUES ($1, $2)
                ON CONFLICT (list_id) DO NOTHING
                "#,
            )
            .bind(list_id)
            .bind(rank as i32)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE reading_lists SET updated_at = NOW() WHERE id = $1")
            .bind(default_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// The entry ids of one list in rank order (unranked entries last,
    /// by id). An empty result is fine for a live empty list.
    pub async fn get_list_entry_order(&self, list_id: i64) -> RepoResult<Vec<i64>> {
        let user_id = self.require_user()?;

        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT e.id
            FROM reading_list_entries e
            LEFT JOIN entry_sortkeys sk ON sk.entry_id = e.id
            WHERE e.list_id = $1 AND e.user_id = $2 AND NOT e.deleted
            ORDER BY sk.sort_index, e.id
            "#,
        )
        .bind(list_id)
        .bind(user_id)
        .fetch_all(self.db.read())
        .await?;

        // Empty could mean a bad list id as easily as an empty list; look
        // at the list itself to tell them apart.
        if ids.is_empty() {
            let check = fetch_list_check(self.db.read(), list_id).await?;
            check_list_usable(list_id, check.as_ref(), user_id)?;
        }

        Ok(ids)
    }

    /// Replace one list's entry order with `order`, rank = position.
    ///
    /// Every id must name a live entry of the caller's inside `list_id`.
    /// The list's `updated_at` is bumped so the new order reaches sync
    /// clients.
    pub async fn set_list_entry_order(&self, list_id: i64, order: &[i64]) -> RepoResult<()> {
        let user_id = self.require_user()?;

        if order.is_empty() {
            return Err(RepoError::EmptyOrder);
        }

        let mut tx = self.db.write().begin().await?;

        let check = fetch_list_check_for_update(&mut *tx, list_id).await?;
        check_list_usable(list_id, check.as_ref(), user_id)?;

        let checks = fetch_entry_checks_for_update(&mut *tx, order).await?;
        check_entries_orderable(list_id, order, &checks, user_id)?;

        sqlx::query(
            r#"
            DELETE FROM entry_sortkeys
            WHERE entry_id IN (SELECT id FROM reading_list_entries WHERE list_id = $1)
            "#,
        )
        .bind(list_id)
        .execute(&mut *tx)
        .await?;

        for (rank, entry_id) in order.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO entry_sortkeys (entry_id, sort_index)
                VALUES ($1, $2)
                ON CONFLICT (entry_id) DO NOTHING
                "#,
            )
            .bind(entry_id)
            .bind(rank as i32)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE reading_lists SET updated_at = NOW() WHERE id = $1")
            .bind(list_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
