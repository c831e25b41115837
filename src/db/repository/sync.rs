//! Sync feed and page membership queries
//!
//! Sync clients poll with their last-seen timestamp and a strictly-greater
//! filter. Soft-deleted rows stay in the feed as tombstones; that is the
//! whole point of soft deletion here.

use chrono::{DateTime, Utc};

use crate::db::error::RepoResult;
use crate::db::models::{ListEntryRow, ListRow};

use super::ReadingListRepository;

impl ReadingListRepository {
    /// Lists changed strictly after `since`, deleted ones included,
    /// ordered by id for a stable paging cursor.
    pub async fn get_lists_by_date_updated(
        &self,
        since: DateTime<Utc>,
        limit: i64,
        offset: i64,
    ) -> RepoResult<Vec<ListRow>> {
        let user_id = self.require_user()?;

        let lists = sqlx::query_as::<_, ListRow>(
            r#"
            SELECT id, user_id, is_default, name, description, color, image, icon,
                   created_at, updated_at, deleted
            FROM reading_lists
            WHERE user_id = $1 AND updated_at > $2
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(since)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.db.read())
        .await?;

        Ok(lists)
    }

    /// Entries changed strictly after `since`, ordered by id.
    ///
    /// Deleted entries are included as tombstones, but entries whose whole
    /// list is deleted are not: clients drop those together with the list.
    pub async fn get_list_entries_by_date_updated(
        &self,
        since: DateTime<Utc>,
        limit: i64,
        offset: i64,
    ) -> RepoResult<Vec<ListEntryRow>> {
        let user_id = self.require_user()?;

        let entries = sqlx::query_as::<_, ListEntryRow>(
            r#"
            SELECT e.id, e.list_id, e.user_id, e.project, e.title,
                   e.created_at, e.updated_at, e.deleted
            FROM reading_list_entries e
            JOIN reading_lists l ON l.id = e.list_id
            WHERE e.user_id = $1 AND e.updated_at > $2 AND NOT l.deleted
            ORDER BY e.id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(since)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.db.read())
        .await?;

        Ok(entries)
    }

    /// The user's live lists that contain the given page as a live entry,
    /// ordered by id. Answers "which of my lists is this page in".
    pub async fn get_lists_by_page(
        &self,
        project: &str,
        title: &str,
        limit: i64,
        offset: i64,
    ) -> RepoResult<Vec<ListRow>> {
        let user_id = self.require_user()?;

        let lists = sqlx::query_as::<_, ListRow>(
            r#"
            SELECT l.id, l.user_id, l.is_default, l.name, l.description, l.color, l.image,
                   l.icon, l.created_at, l.updated_at, l.deleted
            FROM reading_lists l
            WHERE l.user_id = $1 AND NOT l.deleted
              AND EXISTS (
                  SELECT 1 FROM reading_list_entries e
                  WHERE e.list_id = l.id
                    AND e.project = $2 AND e.title = $3 AND NOT e.deleted
              )
            ORDER BY l.id
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(user_id)
        .bind(project)
        .bind(title)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.db.read())
        .await?;

        Ok(lists)
    }
}
