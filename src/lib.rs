//! Per-user reading list storage on PostgreSQL
//!
//! The embedding service constructs a [`db::DbProvider`] once, then a
//! [`db::ReadingListRepository`] per request, bound to the calling user.
//! Lists and entries are soft-deleted so timestamp-based sync clients see
//! tombstones; the purge service in [`services::maintenance`] hard-deletes
//! old tombstones and reclaims orphaned sortkey rows.

pub mod config;
pub mod db;
pub mod services;
