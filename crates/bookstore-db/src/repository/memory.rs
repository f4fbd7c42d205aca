//! # In-Memory Repository
//!
//! `Repository<E>` without a database, for service tests.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  MemoryStore (Arc<Mutex<..>>)                                           │
//! │  ├── tables:  "books" → [(id, Book)], "genres" → [(id, Genre)], ...     │
//! │  ├── pending: staged changes of every repository of this store          │
//! │  └── fail_next_save: simulate the store refusing the next commit        │
//! │                                                                         │
//! │  store.repository::<Book>()   ──► MemoryRepository<Book>                │
//! │  store.repository::<Genre>()  ──► MemoryRepository<Genre>               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Staging, `NotFound` checks, the delete policy and filter evaluation behave
//! as in the SQLite backend. Foreign keys are not enforced.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use bookstore_core::{Entity, Filter};

use super::{DeletePolicy, Repository};
use crate::error::{DbError, DbResult};

type Row = Arc<dyn Any + Send + Sync>;

/// Clones a stored row with its active flag cleared.
type Deactivate = fn(&Row) -> Option<Row>;

fn deactivated<E: Entity>(row: &Row) -> Option<Row> {
    row.downcast_ref::<E>().map(|e| {
        let mut e = e.clone();
        e.set_active(false);
        Arc::new(e) as Row
    })
}

enum MemoryOp {
    Insert(Row),
    Update(Row),
    Delete,
    Deactivate(Deactivate),
}

struct MemoryChange {
    entity: &'static str,
    table: &'static str,
    id: String,
    op: MemoryOp,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<&'static str, Vec<(String, Row)>>,
    pending: Vec<MemoryChange>,
}

impl MemoryState {
    fn committed(&self, table: &str, id: &str) -> bool {
        self.tables
            .get(table)
            .map_or(false, |rows| rows.iter().any(|(row_id, _)| row_id == id))
    }

    fn staged_insert(&mut self, table: &str, id: &str) -> Option<&mut MemoryChange> {
        self.pending.iter_mut().find(|c| {
            c.table == table && c.id == id && matches!(c.op, MemoryOp::Insert(_))
        })
    }
}

/// Applies `changes` to a copy of `tables`, so a failure leaves the
/// original untouched.
fn apply(
    tables: &HashMap<&'static str, Vec<(String, Row)>>,
    changes: &[MemoryChange],
) -> DbResult<HashMap<&'static str, Vec<(String, Row)>>> {
    let mut next = tables.clone();

    for change in changes {
        let rows = next.entry(change.table).or_default();
        let position = rows.iter().position(|(id, _)| *id == change.id);

        match (&change.op, position) {
            (MemoryOp::Insert(_), Some(_)) => {
                return Err(DbError::duplicate(
                    format!("{}.id", change.table),
                    change.id.clone(),
                ));
            }
            (MemoryOp::Insert(row), None) => rows.push((change.id.clone(), row.clone())),
            (MemoryOp::Update(row), Some(i)) => rows[i].1 = row.clone(),
            (MemoryOp::Delete, Some(i)) => {
                rows.remove(i);
            }
            (MemoryOp::Deactivate(f), Some(i)) => {
                let row = f(&rows[i].1).ok_or_else(|| {
                    DbError::Internal(format!("{} row has unexpected type", change.entity))
                })?;
                rows[i].1 = row;
            }
            (_, None) => return Err(DbError::not_found(change.entity, change.id.clone())),
        }
    }

    Ok(next)
}

// =============================================================================
// MemoryStore
// =============================================================================

/// Shared in-process store. Cloning shares the data.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_next_save: Arc<AtomicBool>,
    policy: DeletePolicy,
}

impl MemoryStore {
    pub fn new(policy: DeletePolicy) -> Self {
        MemoryStore {
            state: Arc::new(Mutex::new(MemoryState::default())),
            fail_next_save: Arc::new(AtomicBool::new(false)),
            policy,
        }
    }

    pub fn repository<E: Entity>(&self) -> MemoryRepository<E> {
        MemoryRepository {
            store: self.clone(),
            _entity: PhantomData,
        }
    }

    /// Makes the next `save` fail with `StoreRejected`, as if the database
    /// had refused the write.
    pub fn fail_next_save(&self) {
        self.fail_next_save.store(true, Ordering::SeqCst);
    }

    pub async fn pending(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    async fn commit(&self) -> DbResult<usize> {
        let mut state = self.state.lock().await;
        let changes = std::mem::take(&mut state.pending);

        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            warn!(changes = changes.len(), "Simulated store rejection, unit discarded");
            return Err(DbError::StoreRejected("simulated failure".to_string()));
        }

        if changes.is_empty() {
            return Ok(0);
        }

        match apply(&state.tables, &changes) {
            Ok(tables) => {
                state.tables = tables;
                info!(changes = changes.len(), "Unit of work committed");
                Ok(changes.len())
            }
            Err(e) => {
                warn!(
                    changes = changes.len(),
                    error = %e,
                    "Unit of work rolled back and discarded"
                );
                Err(e)
            }
        }
    }
}

// =============================================================================
// MemoryRepository
// =============================================================================

/// `Repository<E>` over a [`MemoryStore`].
pub struct MemoryRepository<E> {
    store: MemoryStore,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for MemoryRepository<E> {
    fn clone(&self) -> Self {
        MemoryRepository {
            store: self.store.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> MemoryRepository<E> {
    /// A repository over a fresh, private store.
    pub fn new(policy: DeletePolicy) -> Self {
        MemoryStore::new(policy).repository()
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    async fn stage(&self, id: &str, op: MemoryOp) {
        debug!(entity = E::NAME, id = %id, "Staging change");
        self.store.state.lock().await.pending.push(MemoryChange {
            entity: E::NAME,
            table: E::TABLE,
            id: id.to_string(),
            op,
        });
    }
}

#[async_trait]
impl<E: Entity> Repository<E> for MemoryRepository<E> {
    async fn add(&self, entity: E) -> DbResult<()> {
        let id = entity.id().to_string();
        self.stage(&id, MemoryOp::Insert(Arc::new(entity))).await;
        Ok(())
    }

    fn get(&self, filter: Filter) -> BoxStream<'static, DbResult<E>> {
        let state = self.store.state.clone();

        stream::once(async move {
            filter.validate::<E>()?;
            let state = state.lock().await;
            let mut matched = Vec::new();
            for (_, row) in state.tables.get(E::TABLE).into_iter().flatten() {
                if let Some(entity) = row.downcast_ref::<E>() {
                    if filter.matches(entity)? {
                        matched.push(entity.clone());
                    }
                }
            }
            Ok::<_, DbError>(matched)
        })
        .map_ok(|rows| stream::iter(rows.into_iter().map(Ok::<E, DbError>)))
        .try_flatten()
        .boxed()
    }

    async fn update(&self, entity: E) -> DbResult<()> {
        let id = entity.id().to_string();
        let mut state = self.store.state.lock().await;

        if let Some(insert) = state.staged_insert(E::TABLE, &id) {
            insert.op = MemoryOp::Insert(Arc::new(entity));
            return Ok(());
        }
        if !state.committed(E::TABLE, &id) {
            return Err(DbError::not_found(E::NAME, id));
        }

        debug!(entity = E::NAME, id = %id, "Staging change");
        state.pending.push(MemoryChange {
            entity: E::NAME,
            table: E::TABLE,
            id,
            op: MemoryOp::Update(Arc::new(entity)),
        });
        Ok(())
    }

    async fn delete(&self, entity: &E) -> DbResult<()> {
        let id = entity.id().to_string();
        let soft = self.store.policy.soft_column::<E>().is_some();
        let mut state = self.store.state.lock().await;

        if soft {
            if let Some(insert) = state.staged_insert(E::TABLE, &id) {
                let mut inactive = entity.clone();
                inactive.set_active(false);
                insert.op = MemoryOp::Insert(Arc::new(inactive));
                return Ok(());
            }
        } else if state.staged_insert(E::TABLE, &id).is_some() {
            state
                .pending
                .retain(|c| !(c.table == E::TABLE && c.id == id));
            return Ok(());
        }
        if !state.committed(E::TABLE, &id) {
            return Err(DbError::not_found(E::NAME, id));
        }

        let op = if soft {
            MemoryOp::Deactivate(deactivated::<E>)
        } else {
            MemoryOp::Delete
        };
        debug!(entity = E::NAME, id = %id, "Staging change");
        state.pending.push(MemoryChange {
            entity: E::NAME,
            table: E::TABLE,
            id,
            op,
        });
        Ok(())
    }

    async fn save(&self) -> DbResult<usize> {
        self.store.commit().await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bookstore_core::{new_id, Genre, Price, ReferenceData};
    use chrono::Utc;

    fn price(quantity: i64) -> Price {
        Price {
            id: new_id(),
            book_id: new_id(),
            condition_id: new_id(),
            price_cents: 899,
            quantity,
            is_active: true,
            updated_by: None,
            updated_on: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_add_then_find() {
        let repo = MemoryRepository::<Genre>::new(DeletePolicy::Soft);
        let genre = Genre::new("Fantasy");

        repo.add(genre.clone()).await.unwrap();
        assert_eq!(repo.find(&genre.id).await.unwrap(), None);

        repo.save().await.unwrap();
        assert_eq!(repo.find(&genre.id).await.unwrap(), Some(genre));
    }

    #[tokio::test]
    async fn test_delete_then_find_is_empty() {
        let repo = MemoryRepository::<Genre>::new(DeletePolicy::Soft);
        let genre = Genre::new("Horror");
        repo.add(genre.clone()).await.unwrap();
        repo.save().await.unwrap();

        repo.delete(&genre).await.unwrap();
        repo.save().await.unwrap();
        assert_eq!(repo.find(&genre.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let repo = MemoryRepository::<Genre>::new(DeletePolicy::Soft);
        let err = repo.update(Genre::new("Nope")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_simulated_rejection_discards_unit() {
        let store = MemoryStore::new(DeletePolicy::Soft);
        let genres = store.repository::<Genre>();
        let prices = store.repository::<Price>();

        genres.add(Genre::new("Drama")).await.unwrap();
        prices.add(price(3)).await.unwrap();
        store.fail_next_save();

        let err = prices.save().await.unwrap_err();
        assert!(matches!(err, DbError::StoreRejected(_)));
        assert_eq!(store.pending().await, 0);
        assert_eq!(genres.count(Filter::All).await.unwrap(), 0);
        assert_eq!(prices.count(Filter::All).await.unwrap(), 0);

        // the switch only affects one save
        genres.add(Genre::new("Drama")).await.unwrap();
        assert_eq!(genres.save().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_change_leaves_store_unchanged() {
        let store = MemoryStore::new(DeletePolicy::Hard);
        let repo = store.repository::<Genre>();
        let kept = Genre::new("Satire");
        repo.add(kept.clone()).await.unwrap();
        repo.save().await.unwrap();

        // the second insert collides with the first
        repo.add(Genre::new("Travel")).await.unwrap();
        repo.add(kept.clone()).await.unwrap();
        let err = repo.save().await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        let all = repo.list(Filter::All).await.unwrap();
        assert_eq!(all, vec![kept]);
    }

    #[tokio::test]
    async fn test_soft_delete_of_price() {
        let repo = MemoryRepository::<Price>::new(DeletePolicy::Soft);
        let p = price(0);
        repo.add(p.clone()).await.unwrap();
        repo.save().await.unwrap();

        repo.delete(&p).await.unwrap();
        repo.save().await.unwrap();

        assert_eq!(repo.count(Filter::eq("is_active", true)).await.unwrap(), 0);
        let found = repo.find(&p.id).await.unwrap().unwrap();
        assert!(!found.is_active);
        assert_eq!(found.quantity, 0);
    }

    #[tokio::test]
    async fn test_delete_of_staged_insert() {
        let repo = MemoryRepository::<Genre>::new(DeletePolicy::Hard);
        let genre = Genre::new("Essays");
        repo.add(genre.clone()).await.unwrap();
        repo.delete(&genre).await.unwrap();

        assert_eq!(repo.store().pending().await, 0);
        assert_eq!(repo.save().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_reads_committed_state_in_insertion_order() {
        let repo = MemoryRepository::<Price>::new(DeletePolicy::Soft);
        let low = price(1);
        let high = price(50);
        repo.add(low.clone()).await.unwrap();
        repo.add(high.clone()).await.unwrap();
        repo.save().await.unwrap();

        let mut updated = low.clone();
        updated.quantity = 2;
        repo.update(updated.clone()).await.unwrap();

        let listed = repo.list(Filter::le("quantity", 5i64)).await.unwrap();
        assert_eq!(listed, vec![low]);

        repo.save().await.unwrap();
        let listed = repo.list(Filter::All).await.unwrap();
        assert_eq!(listed, vec![updated, high]);
    }
}
