//! Purge sweep integration tests
//!
//! Same harness as tests/repository.rs: a live PostgreSQL behind
//! `READING_LISTS_TEST_DB`, tests ignored by default, one fresh user per
//! test. Tombstone ages are backdated with direct SQL since the repository
//! itself always stamps NOW().

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use reading_lists::db::pool::ReplicationSettings;
use reading_lists::db::{
    run_migrations, DbProvider, NewList, ReadingListRepository, StoreLimits,
};
use reading_lists::services::maintenance::{run_purge, PurgeSettings};

static USER_SEQ: AtomicI64 = AtomicI64::new(0);

fn fresh_user_id() -> i64 {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_micros() as i64;
    micros + USER_SEQ.fetch_add(1, Ordering::Relaxed)
}

async fn test_provider() -> DbProvider {
    let url = std::env::var("READING_LISTS_TEST_DB")
        .expect("READING_LISTS_TEST_DB must point at a scratch PostgreSQL database");
    let pool = PgPool::connect(&url).await.expect("connect test database");
    run_migrations(&pool).await.expect("run migrations");
    DbProvider::from_pool(pool, ReplicationSettings::default())
}

async fn repo_for(user_id: i64) -> ReadingListRepository {
    ReadingListRepository::new(test_provider().await, Some(user_id), StoreLimits::unlimited())
}

async fn backdate_list(repo: &ReadingListRepository, id: i64, to: DateTime<Utc>) {
    sqlx::query("UPDATE reading_lists SET updated_at = $1 WHERE id = $2")
        .bind(to)
        .bind(id)
        .execute(repo.db().write())
        .await
        .unwrap();
}

async fn backdate_entry(repo: &ReadingListRepository, id: i64, to: DateTime<Utc>) {
    sqlx::query("UPDATE reading_list_entries SET updated_at = $1 WHERE id = $2")
        .bind(to)
        .bind(id)
        .execute(repo.db().write())
        .await
        .unwrap();
}

async fn list_exists(repo: &ReadingListRepository, id: i64) -> bool {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM reading_lists WHERE id = $1)")
        .bind(id)
        .fetch_one(repo.db().write())
        .await
        .unwrap()
}

async fn entry_exists(repo: &ReadingListRepository, id: i64) -> bool {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM reading_list_entries WHERE id = $1)",
    )
    .bind(id)
    .fetch_one(repo.db().write())
    .await
    .unwrap()
}

// =============================================================================
// DELETED-ROW PURGE
// =============================================================================

#[tokio::test]
#[ignore]
async fn test_purge_respects_the_retention_cutoff() {
    let repo = repo_for(fresh_user_id()).await;
    repo.setup_for_user().await.unwrap();

    // A list deleted 10 days ago, with an entry of its own, and a
    // separately-deleted entry (5 days ago) inside a list that stays live.
    let old_list = repo.add_list(NewList::named("old")).await.unwrap();
    let inside_old = repo
        .add_list_entry(old_list.id, "en.wikipedia.org", "Dog")
        .await
        .unwrap();
    let live_list = repo.add_list(NewList::named("live")).await.unwrap();
    let newer_entry = repo
        .add_list_entry(live_list.id, "en.wikipedia.org", "Cat")
        .await
        .unwrap();
    let live_entry = repo
        .add_list_entry(live_list.id, "en.wikipedia.org", "Horse")
        .await
        .unwrap();

    repo.delete_list(old_list.id).await.unwrap();
    repo.delete_list_entry(newer_entry.id).await.unwrap();
    backdate_list(&repo, old_list.id, Utc::now() - Duration::days(10)).await;
    backdate_entry(&repo, newer_entry.id, Utc::now() - Duration::days(5)).await;

    // Cutoff between the two tombstones: the old list goes, entries and
    // all, regardless of the entries' own state; the newer tombstone and
    // everything live stay.
    // Purge is global, so other suites' rows may ride along; assert on
    // this test's rows rather than the sweep counts.
    let purged = repo
        .purge_old_deleted(Utc::now() - Duration::days(7))
        .await
        .unwrap();
    assert!(purged.lists >= 1);
    assert!(purged.entries >= 1);

    assert!(!list_exists(&repo, old_list.id).await);
    assert!(!entry_exists(&repo, inside_old.id).await);
    assert!(list_exists(&repo, live_list.id).await);
    assert!(entry_exists(&repo, newer_entry.id).await);
    assert!(entry_exists(&repo, live_entry.id).await);

    // Cutoff past the newer tombstone takes it too; the live rows survive.
    repo.purge_old_deleted(Utc::now() - Duration::days(1))
        .await
        .unwrap();

    assert!(!entry_exists(&repo, newer_entry.id).await);
    assert!(list_exists(&repo, live_list.id).await);
    assert!(entry_exists(&repo, live_entry.id).await);
}

#[tokio::test]
#[ignore]
async fn test_purge_is_idempotent() {
    let repo = repo_for(fresh_user_id()).await;
    repo.setup_for_user().await.unwrap();

    let list = repo.add_list(NewList::named("old")).await.unwrap();
    repo.delete_list(list.id).await.unwrap();
    backdate_list(&repo, list.id, Utc::now() - Duration::days(10)).await;

    repo.purge_old_deleted(Utc::now()).await.unwrap();
    assert!(!list_exists(&repo, list.id).await);

    // A second sweep over the same cutoff finds nothing of ours and
    // succeeds; re-running is always safe.
    repo.purge_old_deleted(Utc::now()).await.unwrap();
    assert!(!list_exists(&repo, list.id).await);
}

// =============================================================================
// SORTKEY PURGE
// =============================================================================

#[tokio::test]
#[ignore]
async fn test_orphaned_sortkeys_are_reclaimed() {
    let repo = repo_for(fresh_user_id()).await;
    let default_list = repo.setup_for_user().await.unwrap();

    let list = repo.add_list(NewList::named("dogs")).await.unwrap();
    let entry = repo
        .add_list_entry(list.id, "en.wikipedia.org", "Dog")
        .await
        .unwrap();
    repo.set_list_order(&[list.id, default_list.id]).await.unwrap();
    repo.set_list_entry_order(list.id, &[entry.id]).await.unwrap();

    // Teardown hard-deletes the rows and leaves the sortkeys orphaned.
    repo.teardown_for_user().await.unwrap();

    let orphaned_list_keys = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM list_sortkeys WHERE list_id = ANY($1)",
    )
    .bind(vec![default_list.id, list.id])
    .fetch_one(repo.db().write())
    .await
    .unwrap();
    assert_eq!(orphaned_list_keys, 2);

    let purged = repo.purge_sortkeys().await.unwrap();
    assert!(purged.list_sortkeys >= 2);
    assert!(purged.entry_sortkeys >= 1);

    let remaining = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM list_sortkeys WHERE list_id = ANY($1)",
    )
    .bind(vec![default_list.id, list.id])
    .fetch_one(repo.db().write())
    .await
    .unwrap();
    assert_eq!(remaining, 0);

    let entry_keys = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM entry_sortkeys WHERE entry_id = $1",
    )
    .bind(entry.id)
    .fetch_one(repo.db().write())
    .await
    .unwrap();
    assert_eq!(entry_keys, 0);
}

#[tokio::test]
#[ignore]
async fn test_sortkey_purge_keeps_live_ranks() {
    let repo = repo_for(fresh_user_id()).await;
    let default_list = repo.setup_for_user().await.unwrap();
    let list = repo.add_list(NewList::named("dogs")).await.unwrap();
    repo.set_list_order(&[list.id, default_list.id]).await.unwrap();

    repo.purge_sortkeys().await.unwrap();

    assert_eq!(
        repo.get_list_order().await.unwrap(),
        vec![list.id, default_list.id]
    );
}

// =============================================================================
// FULL SWEEP
// =============================================================================

#[tokio::test]
#[ignore]
async fn test_run_purge_sweeps_tombstones_then_sortkeys() {
    let repo = repo_for(fresh_user_id()).await;
    let default_list = repo.setup_for_user().await.unwrap();

    let list = repo.add_list(NewList::named("old")).await.unwrap();
    let entry = repo
        .add_list_entry(list.id, "en.wikipedia.org", "Dog")
        .await
        .unwrap();
    repo.set_list_order(&[list.id, default_list.id]).await.unwrap();
    repo.set_list_entry_order(list.id, &[entry.id]).await.unwrap();

    repo.delete_list(list.id).await.unwrap();
    backdate_list(&repo, list.id, Utc::now() - Duration::days(45)).await;

    let settings = PurgeSettings {
        interval_secs: 0,
        retention_days: 30,
    };
    let outcome = run_purge(&repo, &settings).await;

    assert!(outcome.is_success());
    assert!(outcome.lists_purged >= 1);
    assert!(outcome.entries_purged >= 1);
    // The list's and entry's ranks became orphans in the first phase and
    // were reclaimed in the second.
    assert!(outcome.list_sortkeys_purged >= 1);
    assert!(outcome.entry_sortkeys_purged >= 1);

    assert!(!list_exists(&repo, list.id).await);
    assert!(!entry_exists(&repo, entry.id).await);
    assert_eq!(repo.get_list_order().await.unwrap(), vec![default_list.id]);
}
