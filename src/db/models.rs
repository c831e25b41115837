//! Database row types for PostgreSQL
//!
//! These types map directly to database rows and are handed to the API
//! layer as-is, which is why the row structs derive Serialize. Soft-deleted
//! rows keep their `deleted` flag visible so sync clients can observe
//! deletions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Database Row Types
// ============================================================================

/// Reading list row from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ListRow {
    pub id: i64,
    pub user_id: i64,
    pub is_default: bool,
    pub name: String,
    pub description: String,
    pub color: Option<String>,
    pub image: Option<String>,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted: bool,
}

/// Reading list entry row from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ListEntryRow {
    pub id: i64,
    pub list_id: i64,
    pub user_id: i64,
    pub project: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted: bool,
}

// ============================================================================
// Insert/Write Types
// ============================================================================

/// Fields for creating a non-default list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewList {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub image: Option<String>,
    pub icon: Option<String>,
}

impl NewList {
    /// Shorthand for a list with just a name
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Partial update for an existing list
///
/// `None` means "keep the stored value" — absent-field semantics. There is
/// no way to null out a column through a patch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub image: Option<String>,
    pub icon: Option<String>,
}

impl ListPatch {
    /// True when no field is set and there is nothing to write
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.color.is_none()
            && self.image.is_none()
            && self.icon.is_none()
    }
}

/// Row limits applied when creating lists and entries. Unset = unlimited.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreLimits {
    pub max_lists_per_user: Option<i64>,
    pub max_entries_per_list: Option<i64>,
}

impl StoreLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }
}

// ============================================================================
// Purge Result Types
// ============================================================================

/// Rows removed by a `purge_old_deleted` sweep
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PurgedRows {
    pub lists: u64,
    pub entries: u64,
}

/// Orphaned rank rows removed by a `purge_sortkeys` sweep
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PurgedSortkeys {
    pub list_sortkeys: u64,
    pub entry_sortkeys: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_is_empty() {
        assert!(ListPatch::default().is_empty());

        let patch = ListPatch {
            icon: Some("star".to_string()),
            ..ListPatch::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_list_row_serializes_deleted_flag() {
        let row = ListRow {
            id: 4,
            user_id: 10,
            is_default: false,
            name: "dogs".to_string(),
            description: String::new(),
            color: None,
            image: None,
            icon: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted: true,
        };

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["deleted"], serde_json::json!(true));
        assert_eq!(json["name"], serde_json::json!("dogs"));
    }
}
