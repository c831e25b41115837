//! Error types for the reading list store
//!
//! Every public repository operation reports the first violated
//! precondition as one of these kinds. The API layer (out of scope here)
//! maps each kind to a stable machine-readable code; the variants carry
//! the offending id so it can build a useful message.

use thiserror::Error;

/// Result alias used throughout the repository layer.
pub type RepoResult<T> = Result<T, RepoError>;

/// Reading list repository errors
#[derive(Debug, Error)]
pub enum RepoError {
    /// Operation invoked without a caller identity
    #[error("operation requires a user id")]
    UserRequired,

    /// Setup called for a user that already has a default list
    #[error("reading lists already set up for user {0}")]
    AlreadySetUp(i64),

    /// Operation requires setup that never happened (or was torn down)
    #[error("reading lists not set up for user {0}")]
    NotSetUp(i64),

    #[error("list {0} does not exist")]
    NoSuchList(i64),

    #[error("list {0} belongs to another user")]
    NotOwnList(i64),

    #[error("list {0} is deleted")]
    ListDeleted(i64),

    #[error("list entry {0} does not exist")]
    NoSuchListEntry(i64),

    #[error("list entry {0} belongs to another user")]
    NotOwnListEntry(i64),

    #[error("list entry {0} is deleted")]
    ListEntryDeleted(i64),

    /// Entry exists but belongs to a different list than the caller claimed
    #[error("list entry {entry_id} is not in list {list_id}")]
    EntryNotInList { entry_id: i64, list_id: i64 },

    #[error("list {0} is the default list and cannot be deleted")]
    CannotDeleteDefaultList(i64),

    /// Unique-constraint conflict on (list, project, title)
    #[error("{project}:{title} is already in list {list_id}")]
    DuplicatePage {
        list_id: i64,
        project: String,
        title: String,
    },

    #[error("at least one list id is required")]
    EmptyListIds,

    #[error("at least one id is required to set an order")]
    EmptyOrder,

    #[error("cannot have more than {0} lists")]
    ListLimitExceeded(i64),

    #[error("cannot have more than {0} entries per list")]
    EntryLimitExceeded(i64),

    /// A write matched no rows for a reason none of the preconditions
    /// explain. This is a bug, not a bad request.
    #[error("internal consistency error: {0}")]
    Internal(String),

    /// Replica lag stayed above the configured ceiling for the whole wait
    #[error("replica lag did not recover within {0} ms")]
    ReplicationTimeout(u64),

    /// Store-level failure (lock waits, connectivity, constraint faults the
    /// repository did not anticipate); passed through opaquely
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_name_the_offending_id() {
        assert_eq!(RepoError::NoSuchList(42).to_string(), "list 42 does not exist");
        assert_eq!(
            RepoError::EntryNotInList { entry_id: 7, list_id: 3 }.to_string(),
            "list entry 7 is not in list 3"
        );
        assert_eq!(
            RepoError::CannotDeleteDefaultList(1).to_string(),
            "list 1 is the default list and cannot be deleted"
        );
    }

    #[test]
    fn test_duplicate_page_names_the_page() {
        let err = RepoError::DuplicatePage {
            list_id: 9,
            project: "en.wikipedia.org".to_string(),
            title: "Dog".to_string(),
        };
        assert_eq!(err.to_string(), "en.wikipedia.org:Dog is already in list 9");
    }
}
