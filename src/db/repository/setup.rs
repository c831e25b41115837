//! User lifecycle: one default list per user marks the user as set up

use sqlx::PgExecutor;

use crate::db::error::{RepoError, RepoResult};
use crate::db::models::ListRow;
use crate::db::pool::ReadConsistency;

use super::{default_list_id_for_update, ReadingListRepository};

/// Serialize per-user setup and teardown on a transaction-scoped advisory
/// lock. Row locks cannot cover these paths because the default-list row
/// may not exist yet.
async fn advisory_user_lock<'e, E>(executor: E, user_id: i64) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(())
}

impl ReadingListRepository {
    /// Create the user's default list, marking the user as set up.
    pub async fn setup_for_user(&self) -> RepoResult<ListRow> {
        let user_id = self.require_user()?;

        let mut tx = self.db.write().begin().await?;
        advisory_user_lock(&mut *tx, user_id).await?;

        if default_list_id_for_update(&mut *tx, user_id)
            .await?
            .is_some()
        {
            return Err(RepoError::AlreadySetUp(user_id));
        }

        let list = sqlx::query_as::<_, ListRow>(
            r#"
            INSERT INTO reading_lists (user_id, is_default, name, description)
            VALUES ($1, TRUE, 'default', '')
            RETURNING id, user_id, is_default, name, description, color, image, icon,
                      created_at, updated_at, deleted
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO list_sortkeys (list_id, sort_index) VALUES ($1, 0)")
            .bind(list.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!("Set up reading lists for user {} (default list {})", user_id, list.id);
        Ok(list)
    }

    /// Remove every list and entry the user has, default list included.
    ///
    /// Rows are hard-deleted. Sortkey rows are left behind on purpose and
    /// reclaimed by the next sortkey purge sweep.
    pub async fn teardown_for_user(&self) -> RepoResult<()> {
        let user_id = self.require_user()?;

        let mut tx = self.db.write().begin().await?;
        advisory_user_lock(&mut *tx, user_id).await?;

        if default_list_id_for_update(&mut *tx, user_id)
            .await?
            .is_none()
        {
            return Err(RepoError::NotSetUp(user_id));
        }

        let entries = sqlx::query("DELETE FROM reading_list_entries WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let lists = sqlx::query("DELETE FROM reading_lists WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        tracing::info!(
            "Tore down reading lists for user {} ({} lists, {} entries)",
            user_id, lists, entries
        );
        Ok(())
    }

    /// Whether setup has run for the user.
    ///
    /// `PrimaryLocking` answers from the primary and holds a row lock on
    /// the default list for the duration of the check, for callers that
    /// must not race a concurrent teardown. `Replica` is a plain read and
    /// may trail the primary.
    pub async fn is_setup_for_user(&self, consistency: ReadConsistency) -> RepoResult<bool> {
        let user_id = self.require_user()?;

        match consistency {
            ReadConsistency::Replica => {
                let exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS (SELECT 1 FROM reading_lists WHERE user_id = $1 AND is_default)",
                )
                .bind(user_id)
                .fetch_one(self.db.read())
                .await?;
                Ok(exists)
            }
            ReadConsistency::PrimaryLocking => {
                let mut tx = self.db.write().begin().await?;
                let found = default_list_id_for_update(&mut *tx, user_id).await?.is_some();
                tx.commit().await?;
                Ok(found)
            }
        }
    }
}
