//! Reading list repository
//!
//! All reads and writes against the reading list tables go through
//! [`ReadingListRepository`]. A repository is constructed per request and
//! bound to the calling user; every user-facing operation re-checks that
//! binding so one user can never touch another user's rows. The purge
//! operations are the exception: they sweep the whole store and ignore
//! the binding.
//!
//! Guarded writes follow a diagnose-after-miss pattern: the write itself
//! filters on id and owner, and only when it touches zero rows do we read
//! the row back (without locks) to decide which error to report. The
//! classification lives in pure helpers here so it can be unit tested
//! without a database.

mod entries;
mod lists;
mod order;
mod purge;
mod setup;
mod sync;

use std::collections::HashMap;

use sqlx::{FromRow, PgExecutor};

use crate::db::error::{RepoError, RepoResult};
use crate::db::models::StoreLimits;
use crate::db::pool::DbProvider;

pub use purge::PURGE_BATCH_SIZE;

/// Per-user data access for reading lists.
///
/// `user_id` is `None` for anonymous callers, which every user-facing
/// operation rejects with [`RepoError::UserRequired`]. Purge operations
/// run regardless of the binding.
#[derive(Clone)]
pub struct ReadingListRepository {
    db: DbProvider,
    user_id: Option<i64>,
    limits: StoreLimits,
}

impl ReadingListRepository {
    pub fn new(db: DbProvider, user_id: Option<i64>, limits: StoreLimits) -> Self {
        Self {
            db,
            user_id,
            limits,
        }
    }

    /// The bound user id, or `UserRequired` for anonymous callers.
    fn require_user(&self) -> RepoResult<i64> {
        self.user_id.ok_or(RepoError::UserRequired)
    }

    /// Connection provider, exposed for callers that need to await
    /// replication or run ad-hoc health checks alongside repository calls.
    pub fn db(&self) -> &DbProvider {
        &self.db
    }
}

// ============================================================================
// Check rows - the minimal projections validation and diagnosis work from
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub(crate) struct ListCheck {
    pub id: i64,
    pub user_id: i64,
    pub is_default: bool,
    pub deleted: bool,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct EntryCheck {
    pub id: i64,
    pub list_id: i64,
    pub user_id: i64,
    pub deleted: bool,
}

/// Fetch the check row for a list, without locking it.
pub(crate) async fn fetch_list_check<'e, E>(
    executor: E,
    id: i64,
) -> Result<Option<ListCheck>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, ListCheck>(
        "SELECT id, user_id, is_default, deleted FROM reading_lists WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Fetch the check row for a list and hold a row lock on it until the
/// surrounding transaction ends.
pub(crate) async fn fetch_list_check_for_update<'e, E>(
    executor: E,
    id: i64,
) -> Result<Option<ListCheck>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, ListCheck>(
        "SELECT id, user_id, is_default, deleted FROM reading_lists WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Fetch the check row for a list entry, without locking it.
pub(crate) async fn fetch_entry_check<'e, E>(
    executor: E,
    id: i64,
) -> Result<Option<EntryCheck>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, EntryCheck>(
        "SELECT id, list_id, user_id, deleted FROM reading_list_entries WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Fetch check rows for a batch of lists, without locking.
pub(crate) async fn fetch_list_checks<'e, E>(
    executor: E,
    ids: &[i64],
) -> Result<Vec<ListCheck>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, ListCheck>(
        "SELECT id, user_id, is_default, deleted FROM reading_lists WHERE id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(executor)
    .await
}

/// Fetch check rows for a batch of lists, locking each matched row.
pub(crate) async fn fetch_list_checks_for_update<'e, E>(
    executor: E,
    ids: &[i64],
) -> Result<Vec<ListCheck>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, ListCheck>(
        "SELECT id, user_id, is_default, deleted FROM reading_lists WHERE id = ANY($1) FOR UPDATE",
    )
    .bind(ids)
    .fetch_all(executor)
    .await
}

/// Fetch check rows for a batch of entries, locking each matched row.
pub(crate) async fn fetch_entry_checks_for_update<'e, E>(
    executor: E,
    ids: &[i64],
) -> Result<Vec<EntryCheck>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, EntryCheck>(
        "SELECT id, list_id, user_id, deleted FROM reading_list_entries WHERE id = ANY($1) FOR UPDATE",
    )
    .bind(ids)
    .fetch_all(executor)
    .await
}

/// The user's default list id, with the row locked until the surrounding
/// transaction ends. `None` means the user has never been set up.
pub(crate) async fn default_list_id_for_update<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<Option<i64>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, i64>(
        "SELECT id FROM reading_lists WHERE user_id = $1 AND is_default FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

// ============================================================================
// Classification - pure decisions over check rows
// ============================================================================

/// Decide why a guarded list write touched nothing.
///
/// The write filters on id and owner (plus the default-list guard when
/// `default_protected`), so a zero-row result has to be explained by one
/// of those filters. A row that passes them all means the write raced
/// something it should not have; that is an internal fault, not a user
/// error.
pub(crate) fn classify_list_write_miss(
    id: i64,
    row: Option<&ListCheck>,
    user_id: i64,
    default_protected: bool,
) -> RepoError {
    match row {
        None => RepoError::NoSuchList(id),
        Some(row) if row.user_id != user_id => RepoError::NotOwnList(id),
        Some(row) if default_protected && row.is_default => {
            RepoError::CannotDeleteDefaultList(id)
        }
        Some(_) => RepoError::Internal(format!("write to list {id} matched no rows")),
    }
}

/// Decide why a guarded entry write touched nothing.
pub(crate) fn classify_entry_write_miss(
    id: i64,
    row: Option<&EntryCheck>,
    user_id: i64,
) -> RepoError {
    match row {
        None => RepoError::NoSuchListEntry(id),
        Some(row) if row.user_id != user_id => RepoError::NotOwnListEntry(id),
        Some(_) => RepoError::Internal(format!("write to list entry {id} matched no rows")),
    }
}

/// A list somebody wants to read from or write into must exist, belong to
/// the caller and not be soft-deleted.
pub(crate) fn check_list_usable(id: i64, row: Option<&ListCheck>, user_id: i64) -> RepoResult<()> {
    match row {
        None => Err(RepoError::NoSuchList(id)),
        Some(row) if row.user_id != user_id => Err(RepoError::NotOwnList(id)),
        Some(row) if row.deleted => Err(RepoError::ListDeleted(id)),
        Some(_) => Ok(()),
    }
}

/// Batch form of [`check_list_usable`] for order replacement.
///
/// Two passes: problems with rows that do exist (wrong owner, deleted)
/// are reported before any missing id, so the caller hears about the more
/// actionable fault first.
pub(crate) fn check_lists_usable(ids: &[i64], rows: &[ListCheck], user_id: i64) -> RepoResult<()> {
    let by_id: HashMap<i64, &ListCheck> = rows.iter().map(|r| (r.id, r)).collect();

    for id in ids {
        if let Some(row) = by_id.get(id) {
            check_list_usable(*id, Some(row), user_id)?;
        }
    }
    for id in ids {
        if !by_id.contains_key(id) {
            return Err(RepoError::NoSuchList(*id));
        }
    }
    Ok(())
}

/// Batch validation for entry order replacement: every id must name an
/// entry the caller owns, inside `list_id`, and not soft-deleted. Missing
/// ids are reported after faults on rows that exist.
pub(crate) fn check_entries_orderable(
    list_id: i64,
    ids: &[i64],
    rows: &[EntryCheck],
    user_id: i64,
) -> RepoResult<()> {
    let by_id: HashMap<i64, &EntryCheck> = rows.iter().map(|r| (r.id, r)).collect();

    for id in ids {
        if let Some(row) = by_id.get(id) {
            if row.user_id != user_id {
                return Err(RepoError::NotOwnListEntry(*id));
            }
            if row.list_id != list_id {
                return Err(RepoError::EntryNotInList {
                    entry_id: *id,
                    list_id,
                });
            }
            if row.deleted {
                return Err(RepoError::ListEntryDeleted(*id));
            }
        }
    }
    for id in ids {
        if !by_id.contains_key(id) {
            return Err(RepoError::NoSuchListEntry(*id));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(id: i64, user_id: i64, is_default: bool, deleted: bool) -> ListCheck {
        ListCheck {
            id,
            user_id,
            is_default,
            deleted,
        }
    }

    fn entry(id: i64, list_id: i64, user_id: i64, deleted: bool) -> EntryCheck {
        EntryCheck {
            id,
            list_id,
            user_id,
            deleted,
        }
    }

    #[test]
    fn list_write_miss_on_missing_row_is_no_such_list() {
        let err = classify_list_write_miss(7, None, 1, false);
        assert!(matches!(err, RepoError::NoSuchList(7)));
    }

    #[test]
    fn list_write_miss_on_foreign_row_is_not_own() {
        let row = list(7, 2, false, false);
        let err = classify_list_write_miss(7, Some(&row), 1, false);
        assert!(matches!(err, RepoError::NotOwnList(7)));
    }

    #[test]
    fn list_write_miss_on_default_row_is_guarded_only_when_protected() {
        let row = list(7, 1, true, false);

        let err = classify_list_write_miss(7, Some(&row), 1, true);
        assert!(matches!(err, RepoError::CannotDeleteDefaultList(7)));

        // The same row under an unprotected write has no explanation left.
        let err = classify_list_write_miss(7, Some(&row), 1, false);
        assert!(matches!(err, RepoError::Internal(_)));
    }

    #[test]
    fn entry_write_miss_classification() {
        assert!(matches!(
            classify_entry_write_miss(9, None, 1),
            RepoError::NoSuchListEntry(9)
        ));

        let foreign = entry(9, 3, 2, false);
        assert!(matches!(
            classify_entry_write_miss(9, Some(&foreign), 1),
            RepoError::NotOwnListEntry(9)
        ));

        let own = entry(9, 3, 1, false);
        assert!(matches!(
            classify_entry_write_miss(9, Some(&own), 1),
            RepoError::Internal(_)
        ));
    }

    #[test]
    fn usable_list_check_reports_deleted_after_ownership() {
        // A foreign deleted list reads as NotOwn, not Deleted: the caller
        // has no business learning the state of somebody else's list.
        let row = list(4, 2, false, true);
        assert!(matches!(
            check_list_usable(4, Some(&row), 1),
            Err(RepoError::NotOwnList(4))
        ));

        let row = list(4, 1, false, true);
        assert!(matches!(
            check_list_usable(4, Some(&row), 1),
            Err(RepoError::ListDeleted(4))
        ));

        let row = list(4, 1, false, false);
        assert!(check_list_usable(4, Some(&row), 1).is_ok());
    }

    #[test]
    fn batch_list_check_reports_existing_row_faults_before_missing_ids() {
        // id 2 is missing, id 3 is deleted; the deleted row wins.
        let rows = vec![list(1, 1, true, false), list(3, 1, false, true)];
        let err = check_lists_usable(&[1, 2, 3], &rows, 1).unwrap_err();
        assert!(matches!(err, RepoError::ListDeleted(3)));

        // With the deleted row fixed, the missing id surfaces.
        let rows = vec![list(1, 1, true, false), list(3, 1, false, false)];
        let err = check_lists_usable(&[1, 2, 3], &rows, 1).unwrap_err();
        assert!(matches!(err, RepoError::NoSuchList(2)));

        let rows = vec![
            list(1, 1, true, false),
            list(2, 1, false, false),
            list(3, 1, false, false),
        ];
        assert!(check_lists_usable(&[1, 2, 3], &rows, 1).is_ok());
    }

    #[test]
    fn batch_entry_check_covers_membership() {
        // Entry 5 lives in list 8, not list 7.
        let rows = vec![entry(4, 7, 1, false), entry(5, 8, 1, false)];
        let err = check_entries_orderable(7, &[4, 5], &rows, 1).unwrap_err();
        assert!(matches!(
            err,
            RepoError::EntryNotInList {
                entry_id: 5,
                list_id: 7
            }
        ));
    }

    #[test]
    fn batch_entry_check_order_of_faults() {
        // Foreign ownership beats a missing id elsewhere in the batch.
        let rows = vec![entry(4, 7, 2, false)];
        let err = check_entries_orderable(7, &[4, 6], &rows, 1).unwrap_err();
        assert!(matches!(err, RepoError::NotOwnListEntry(4)));

        // All rows fine, one id missing.
        let rows = vec![entry(4, 7, 1, false)];
        let err = check_entries_orderable(7, &[4, 6], &rows, 1).unwrap_err();
        assert!(matches!(err, RepoError::NoSuchListEntry(6)));
    }
}
