//! Database module
//!
//! PostgreSQL integration using sqlx with:
//! - Split write/read connection pools with replication pacing
//! - Row types with FromRow
//! - Repository pattern for data access
//! - One error taxonomy shared by every operation

pub mod error;
pub mod models;
pub mod pool;
pub mod repository;

// Re-export commonly used items
pub use error::{RepoError, RepoResult};
pub use models::{ListEntryRow, ListPatch, ListRow, NewList, StoreLimits};
pub use pool::{health_check, run_migrations, DbProvider, ReadConsistency};
pub use repository::ReadingListRepository;
