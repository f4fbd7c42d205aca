//! # Repository Module
//!
//! One generic repository contract for every entity, with two backends.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Generic Repository                                   │
//! │                                                                         │
//! │  InventoryService                                                       │
//! │       │                                                                 │
//! │       │  books.get(Filter::eq("is_active", true))                       │
//! │       ▼                                                                 │
//! │  Arc<dyn Repository<Book>>                                              │
//! │  ├── add(&self, entity)        stage an insert                          │
//! │  ├── get(&self, filter)        lazy stream of committed rows            │
//! │  ├── update(&self, entity)     stage a full replace (id must exist)     │
//! │  ├── delete(&self, &entity)    stage a removal (id must exist)          │
//! │  └── save(&self)               commit everything staged, all or nothing │
//! │       │                                                                 │
//! │       ├──► SqliteRepository<Book>   (sqlite.rs)                         │
//! │       └──► MemoryRepository<Book>   (memory.rs)                         │
//! │                                                                         │
//! │  No joins: a service that needs a book's genre name asks the genre      │
//! │  repository itself.                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Staging and Saving
//! Writes are staged, not executed. `update` and `delete` check that the id
//! exists (committed, or staged for insert in the same unit) and fail with
//! `NotFound` right away; inserts are only judged by the store when the unit
//! commits. A failed `save` discards the whole unit and leaves the store as
//! it was.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};

use bookstore_core::{Entity, Filter};

use crate::error::DbResult;

// =============================================================================
// Delete Policy
// =============================================================================

/// What `delete` does to an entity that declares an active column.
///
/// Entities without one are always removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Remove the row.
    Hard,
    /// Clear the active flag; the row stays fetchable by id.
    #[default]
    Soft,
}

impl DeletePolicy {
    /// The column to clear, if this policy soft-deletes `E`.
    pub fn soft_column<E: Entity>(&self) -> Option<&'static str> {
        match self {
            DeletePolicy::Soft => E::ACTIVE_COLUMN,
            DeletePolicy::Hard => None,
        }
    }
}

impl std::str::FromStr for DeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hard" => Ok(DeletePolicy::Hard),
            "soft" => Ok(DeletePolicy::Soft),
            other => Err(format!("unknown delete policy '{}'", other)),
        }
    }
}

// =============================================================================
// Repository Trait
// =============================================================================

/// CRUD and predicate queries over one entity type.
///
/// Object safe; services hold `Arc<dyn Repository<E>>`.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// Stages an insert.
    ///
    /// Store-level rejections (duplicate id, dangling reference) surface
    /// from `save`.
    async fn add(&self, entity: E) -> DbResult<()>;

    /// Committed entities matching `filter`, in insertion order.
    ///
    /// Nothing is read until the stream is polled. The SQLite backend reads in
    /// rowid-keyed batches, one query per batch as the stream advances, so
    /// dropping the stream early stops the reads. An invalid filter yields a
    /// single `InvalidQuery` error.
    fn get(&self, filter: Filter) -> BoxStream<'static, DbResult<E>>;

    /// Stages a full replace of the entity with the same id.
    ///
    /// ## Errors
    /// `NotFound` if no such id exists.
    async fn update(&self, entity: E) -> DbResult<()>;

    /// Stages removal by id, following the repository's `DeletePolicy`.
    ///
    /// ## Errors
    /// `NotFound` if no such id exists.
    async fn delete(&self, entity: &E) -> DbResult<()>;

    /// Commits every staged change of the unit of work as one transaction.
    ///
    /// Returns how many changes were applied.
    async fn save(&self) -> DbResult<usize>;

    // -------------------------------------------------------------------------
    // Provided helpers
    // -------------------------------------------------------------------------

    /// Fetches one entity by id.
    async fn find(&self, id: &str) -> DbResult<Option<E>> {
        let mut rows = self.get(Filter::id(id));
        rows.try_next().await
    }

    async fn list(&self, filter: Filter) -> DbResult<Vec<E>> {
        self.get(filter).try_collect().await
    }

    async fn count(&self, filter: Filter) -> DbResult<usize> {
        self.get(filter)
            .try_fold(0usize, |n, _| async move { Ok(n + 1) })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookstore_core::{Book, Genre};

    #[test]
    fn test_delete_policy_applies_to_active_column_only() {
        assert_eq!(DeletePolicy::Soft.soft_column::<Book>(), Some("is_active"));
        assert_eq!(DeletePolicy::Soft.soft_column::<Genre>(), None);
        assert_eq!(DeletePolicy::Hard.soft_column::<Book>(), None);
    }

    #[test]
    fn test_delete_policy_parse() {
        assert_eq!("HARD".parse::<DeletePolicy>(), Ok(DeletePolicy::Hard));
        assert_eq!(" soft ".parse::<DeletePolicy>(), Ok(DeletePolicy::Soft));
        assert!("archive".parse::<DeletePolicy>().is_err());
        assert_eq!(DeletePolicy::default(), DeletePolicy::Soft);
    }
}
