//! # SQLite Repository
//!
//! `Repository<E>` over sqlx, with a unit of work shared per `DataContext`.
//!
//! ## Save Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ctx = db.context()                                                     │
//! │                                                                         │
//! │  ctx.books().add(book)        ──┐                                       │
//! │  ctx.prices().add(price)      ──┼──► UnitOfWork [Insert, Insert, Update]│
//! │  ctx.books().update(other)    ──┘        (Arc<Mutex<Vec<..>>>)          │
//! │                                                │                        │
//! │  ctx.save() / any repo.save()                  ▼                        │
//! │                                    BEGIN                                │
//! │                                    INSERT INTO books ...                │
//! │                                    INSERT INTO prices ...               │
//! │                                    UPDATE books ... (0 rows → NotFound) │
//! │                                    COMMIT   (deferred FKs checked here) │
//! │                                                │                        │
//! │                          error anywhere ──► ROLLBACK, unit discarded    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Filters
//! Each comparison renders as `COALESCE(<col> <op> ?, 0)` so a NULL operand
//! gives false instead of unknown, and `NOT` behaves like the in-memory
//! evaluation. Column names come from `Entity::COLUMNS` only; values are
//! always bound.
//!
//! ## Reads
//! `get` walks the table in rowid order, `BATCH_SIZE` rows per query, keyed
//! on the last rowid seen. A batch is only fetched when the stream is polled
//! past the previous one, so a caller that stops early stops reading.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{FromRow, Row, Sqlite, SqlitePool};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use bookstore_core::{
    Book, BookType, Condition, Entity, Filter, Genre, Op, Order, OrderDetail, Price, Publisher,
    Value,
};

use super::{DeletePolicy, Repository};
use crate::error::{DbError, DbResult};

/// An entity that can be read back from a SQLite row.
pub trait SqlEntity: Entity + for<'r> FromRow<'r, SqliteRow> + Unpin {}

impl<T> SqlEntity for T where T: Entity + for<'r> FromRow<'r, SqliteRow> + Unpin {}

// =============================================================================
// Statement Building
// =============================================================================

fn column_list<E: Entity>() -> String {
    E::COLUMNS
        .iter()
        .map(|c| c.name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn insert_sql<E: Entity>() -> String {
    let placeholders = vec!["?"; E::COLUMNS.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        E::TABLE,
        column_list::<E>(),
        placeholders
    )
}

/// `UPDATE ... SET <every column but id> WHERE id = ?`
fn update_sql<E: Entity>() -> String {
    let assignments = E::COLUMNS[1..]
        .iter()
        .map(|c| format!("{} = ?", c.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!("UPDATE {} SET {} WHERE id = ?", E::TABLE, assignments)
}

/// Values for `update_sql`: non-id columns, then the id.
fn update_values<E: Entity>(entity: &E) -> Vec<Value> {
    let mut values = entity.values();
    let id = values.remove(0);
    values.push(id);
    values
}

fn delete_sql<E: Entity>() -> String {
    format!("DELETE FROM {} WHERE id = ?", E::TABLE)
}

fn deactivate_sql<E: Entity>(column: &str) -> String {
    format!("UPDATE {} SET {} = ? WHERE id = ?", E::TABLE, column)
}

/// Renders a validated filter as a WHERE clause, pushing bound values.
fn render_filter(filter: &Filter, sql: &mut String, values: &mut Vec<Value>) {
    match filter {
        Filter::All => sql.push_str("1 = 1"),
        Filter::Compare { field, op, value } => {
            if value.is_null() {
                match op {
                    Op::Eq => sql.push_str(&format!("{} IS NULL", field)),
                    Op::Ne => sql.push_str(&format!("{} IS NOT NULL", field)),
                    _ => sql.push_str("0 = 1"),
                }
                return;
            }
            match op {
                Op::Contains => sql.push_str(&format!(
                    "COALESCE(instr(lower({}), lower(?)) > 0, 0)",
                    field
                )),
                _ => sql.push_str(&format!("COALESCE({} {} ?, 0)", field, op.sql())),
            }
            values.push(value.clone());
        }
        Filter::And(parts) | Filter::Or(parts) if parts.is_empty() => {
            let empty = if matches!(filter, Filter::And(_)) { "1 = 1" } else { "0 = 1" };
            sql.push_str(empty);
        }
        Filter::And(parts) | Filter::Or(parts) => {
            let joiner = if matches!(filter, Filter::And(_)) { " AND " } else { " OR " };
            sql.push('(');
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    sql.push_str(joiner);
                }
                render_filter(part, sql, values);
            }
            sql.push(')');
        }
        Filter::Not(inner) => {
            sql.push_str("NOT (");
            render_filter(inner, sql, values);
            sql.push(')');
        }
    }
}

/// Rows fetched per round trip by `get`.
const BATCH_SIZE: i64 = 200;

/// Builds one keyset page of a `get`:
/// `SELECT rowid AS row_key, <columns> FROM <table> WHERE rowid > ? AND (...)
/// ORDER BY rowid LIMIT ?`.
///
/// The returned values are the filter's only; the caller binds the last seen
/// rowid before them and the batch size after them.
///
/// ## Errors
/// `InvalidQuery` if the filter names an unknown column or mismatched kind.
fn select_sql<E: Entity>(filter: &Filter) -> DbResult<(String, Vec<Value>)> {
    filter.validate::<E>()?;
    let mut sql = format!(
        "SELECT rowid AS row_key, {} FROM {} WHERE rowid > ? AND (",
        column_list::<E>(),
        E::TABLE
    );
    let mut values = Vec::new();
    render_filter(filter, &mut sql, &mut values);
    sql.push_str(") ORDER BY rowid LIMIT ?");
    Ok((sql, values))
}

fn count_sql<E: Entity>(filter: &Filter) -> DbResult<(String, Vec<Value>)> {
    filter.validate::<E>()?;
    let mut sql = format!("SELECT COUNT(*) FROM {} WHERE ", E::TABLE);
    let mut values = Vec::new();
    render_filter(filter, &mut sql, &mut values);
    Ok((sql, values))
}

// =============================================================================
// Binding
// =============================================================================

fn bind<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    values: Vec<Value>,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in values {
        query = match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(b),
            Value::Int(i) => query.bind(i),
            Value::Text(s) => query.bind(s),
            Value::Timestamp(t) => query.bind(t),
        };
    }
    query
}

// =============================================================================
// Keyset Cursor
// =============================================================================

/// Position of a `get` stream between batches.
struct Cursor {
    pool: SqlitePool,
    sql: String,
    values: Vec<Value>,
    after: i64,
    done: bool,
}

impl Cursor {
    /// Fetches the next batch, or `None` once the last short batch was read.
    async fn next_batch<E: SqlEntity>(mut self) -> DbResult<Option<(Vec<E>, Cursor)>> {
        if self.done {
            return Ok(None);
        }

        let mut values = Vec::with_capacity(self.values.len() + 2);
        values.push(Value::Int(self.after));
        values.extend(self.values.iter().cloned());
        values.push(Value::Int(BATCH_SIZE));

        let rows = bind(sqlx::query(&self.sql), values)
            .fetch_all(&self.pool)
            .await?;

        let mut batch = Vec::with_capacity(rows.len());
        for row in &rows {
            self.after = row.try_get("row_key")?;
            batch.push(E::from_row(row)?);
        }
        self.done = (rows.len() as i64) < BATCH_SIZE;
        debug!(entity = E::NAME, rows = batch.len(), after = self.after, "Fetched batch");

        if batch.is_empty() {
            return Ok(None);
        }
        Ok(Some((batch, self)))
    }
}

// =============================================================================
// Unit of Work
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeKind {
    Insert,
    Update,
    Delete,
    Deactivate,
}

/// One staged statement.
#[derive(Debug, Clone)]
struct PendingChange {
    entity: &'static str,
    table: &'static str,
    id: String,
    kind: ChangeKind,
    sql: String,
    values: Vec<Value>,
}

/// Changes staged by every repository of one `DataContext`.
///
/// Cloning shares the same pending list.
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    changes: Arc<Mutex<Vec<PendingChange>>>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of staged changes.
    pub async fn pending(&self) -> usize {
        self.changes.lock().await.len()
    }

    /// Drops every staged change.
    pub async fn discard(&self) {
        let dropped = std::mem::take(&mut *self.changes.lock().await);
        if !dropped.is_empty() {
            warn!(changes = dropped.len(), "Discarding unit of work");
        }
    }

    async fn stage(&self, change: PendingChange) {
        debug!(
            entity = change.entity,
            id = %change.id,
            kind = ?change.kind,
            "Staging change"
        );
        self.changes.lock().await.push(change);
    }

    /// Replaces the values of a staged insert of the same row.
    ///
    /// Returns false when no such insert is staged.
    async fn amend_insert(&self, table: &str, id: &str, values: Vec<Value>) -> bool {
        let mut changes = self.changes.lock().await;
        match changes
            .iter_mut()
            .find(|c| c.kind == ChangeKind::Insert && c.table == table && c.id == id)
        {
            Some(insert) => {
                insert.values = values;
                true
            }
            None => false,
        }
    }

    /// Removes a staged insert of the same row, and anything staged after it
    /// for that row. Returns false when no such insert is staged.
    async fn cancel_insert(&self, table: &str, id: &str) -> bool {
        let mut changes = self.changes.lock().await;
        let staged = changes
            .iter()
            .any(|c| c.kind == ChangeKind::Insert && c.table == table && c.id == id);
        if staged {
            changes.retain(|c| !(c.table == table && c.id == id));
        }
        staged
    }

    /// Runs every staged change in one transaction.
    ///
    /// The pending list is emptied whatever the outcome.
    pub async fn commit(&self, pool: &SqlitePool) -> DbResult<usize> {
        let mut guard = self.changes.lock().await;
        let changes = std::mem::take(&mut *guard);

        if changes.is_empty() {
            return Ok(0);
        }

        match apply(pool, &changes).await {
            Ok(()) => {
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

async fn apply(pool: &SqlitePool, changes: &[PendingChange]) -> DbResult<()> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

    // Returning early drops `tx`, which rolls it back.
    for change in changes {
        let result = bind(sqlx::query(&change.sql), change.values.clone())
            .execute(&mut *tx)
            .await?;

        if change.kind != ChangeKind::Insert && result.rows_affected() == 0 {
            return Err(DbError::not_found(change.entity, change.id.clone()));
        }
    }

    tx.commit().await?;
    Ok(())
}

// =============================================================================
// SqliteRepository
// =============================================================================

/// `Repository<E>` backed by SQLite.
pub struct SqliteRepository<E> {
    pool: SqlitePool,
    unit: UnitOfWork,
    policy: DeletePolicy,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for SqliteRepository<E> {
    fn clone(&self) -> Self {
        SqliteRepository {
            pool: self.pool.clone(),
            unit: self.unit.clone(),
            policy: self.policy,
            _entity: PhantomData,
        }
    }
}

impl<E: SqlEntity> SqliteRepository<E> {
    /// Creates a repository staging into `unit`.
    pub fn new(pool: SqlitePool, unit: UnitOfWork, policy: DeletePolicy) -> Self {
        SqliteRepository {
            pool,
            unit,
            policy,
            _entity: PhantomData,
        }
    }

    /// Whether a committed row with this id exists.
    async fn exists(&self, id: &str) -> DbResult<bool> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE id = ?", E::TABLE);
        let n: i64 = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(n > 0)
    }

    fn change(&self, id: &str, kind: ChangeKind, sql: String, values: Vec<Value>) -> PendingChange {
        PendingChange {
            entity: E::NAME,
            table: E::TABLE,
            id: id.to_string(),
            kind,
            sql,
            values,
        }
    }
}

#[async_trait]
impl<E: SqlEntity> Repository<E> for SqliteRepository<E> {
    async fn add(&self, entity: E) -> DbResult<()> {
        let change = self.change(
            entity.id(),
            ChangeKind::Insert,
            insert_sql::<E>(),
            entity.values(),
        );
        self.unit.stage(change).await;
        Ok(())
    }

    fn get(&self, filter: Filter) -> BoxStream<'static, DbResult<E>> {
        let (sql, values) = match select_sql::<E>(&filter) {
            Ok(statement) => statement,
            Err(e) => return stream::once(async move { Err::<E, DbError>(e) }).boxed(),
        };
        debug!(entity = E::NAME, sql = %sql, "Querying");

        let cursor = Cursor {
            pool: self.pool.clone(),
            sql,
            values,
            after: 0,
            done: false,
        };

        stream::try_unfold(cursor, Cursor::next_batch::<E>)
            .map_ok(|rows| stream::iter(rows.into_iter().map(Ok::<E, DbError>)))
            .try_flatten()
            .boxed()
    }

    async fn update(&self, entity: E) -> DbResult<()> {
        let id = entity.id().to_string();

        if self
            .unit
            .amend_insert(E::TABLE, &id, entity.values())
            .await
        {
            debug!(entity = E::NAME, id = %id, "Amended staged insert");
            return Ok(());
        }

        if !self.exists(&id).await? {
            return Err(DbError::not_found(E::NAME, id));
        }

        let change = self.change(
            &id,
            ChangeKind::Update,
            update_sql::<E>(),
            update_values(&entity),
        );
        self.unit.stage(change).await;
        Ok(())
    }

    async fn delete(&self, entity: &E) -> DbResult<()> {
        let id = entity.id();
        let soft = self.policy.soft_column::<E>();

        let staged = match soft {
            Some(_) => {
                let mut inactive = entity.clone();
                inactive.set_active(false);
                self.unit
                    .amend_insert(E::TABLE, id, inactive.values())
                    .await
            }
            None => self.unit.cancel_insert(E::TABLE, id).await,
        };
        if staged {
            debug!(entity = E::NAME, id = %id, "Delete folded into staged insert");
            return Ok(());
        }

        if !self.exists(id).await? {
            return Err(DbError::not_found(E::NAME, id));
        }

        let change = match soft {
            Some(column) => self.change(
                id,
                ChangeKind::Deactivate,
                deactivate_sql::<E>(column),
                vec![Value::Bool(false), Value::from(id)],
            ),
            None => self.change(
                id,
                ChangeKind::Delete,
                delete_sql::<E>(),
                vec![Value::from(id)],
            ),
        };
        self.unit.stage(change).await;
        Ok(())
    }

    async fn save(&self) -> DbResult<usize> {
        self.unit.commit(&self.pool).await
    }

    async fn count(&self, filter: Filter) -> DbResult<usize> {
        let (sql, values) = count_sql::<E>(&filter)?;
        let mut query = sqlx::query_scalar::<Sqlite, i64>(&sql);
        for value in values {
            query = match value {
                Value::Null => query.bind(None::<String>),
                Value::Bool(b) => query.bind(b),
                Value::Int(i) => query.bind(i),
                Value::Text(s) => query.bind(s),
                Value::Timestamp(t) => query.bind(t),
            };
        }
        let n = query.fetch_one(&self.pool).await?;
        Ok(n as usize)
    }
}

// =============================================================================
// DataContext
// =============================================================================

/// Request-scoped access to every repository, sharing one unit of work.
///
/// Saving through any repository of the context commits the changes staged
/// through all of them.
#[derive(Debug, Clone)]
pub struct DataContext {
    pool: SqlitePool,
    unit: UnitOfWork,
    policy: DeletePolicy,
}

impl DataContext {
    pub fn new(pool: SqlitePool, policy: DeletePolicy) -> Self {
        DataContext {
            pool,
            unit: UnitOfWork::new(),
            policy,
        }
    }

    /// A repository for any entity, bound to this context's unit of work.
    pub fn repository<E: SqlEntity>(&self) -> SqliteRepository<E> {
        SqliteRepository::new(self.pool.clone(), self.unit.clone(), self.policy)
    }

    pub fn books(&self) -> SqliteRepository<Book> {
        self.repository()
    }

    pub fn prices(&self) -> SqliteRepository<Price> {
        self.repository()
    }

    pub fn orders(&self) -> SqliteRepository<Order> {
        self.repository()
    }

    pub fn order_details(&self) -> SqliteRepository<OrderDetail> {
        self.repository()
    }

    pub fn genres(&self) -> SqliteRepository<Genre> {
        self.repository()
    }

    pub fn publishers(&self) -> SqliteRepository<Publisher> {
        self.repository()
    }

    pub fn book_types(&self) -> SqliteRepository<BookType> {
        self.repository()
    }

    pub fn conditions(&self) -> SqliteRepository<Condition> {
        self.repository()
    }

    /// Commits the unit of work.
    pub async fn save(&self) -> DbResult<usize> {
        self.unit.commit(&self.pool).await
    }

    pub async fn pending(&self) -> usize {
        self.unit.pending().await
    }

    /// Drops everything staged so far.
    pub async fn discard(&self) {
        self.unit.discard().await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::memory::MemoryStore;
    use bookstore_core::{new_id, ReferenceData};
    use chrono::{TimeZone, Utc};

    async fn db(policy: DeletePolicy) -> Database {
        Database::new(DbConfig::in_memory().delete_policy(policy))
            .await
            .unwrap()
    }

    struct Refs {
        genre: Genre,
        publisher: Publisher,
        book_type: BookType,
        condition: Condition,
    }

    async fn seed_refs(ctx: &DataContext) -> Refs {
        let refs = Refs {
            genre: Genre::new("Fantasy"),
            publisher: Publisher::new("Tor"),
            book_type: BookType::new("Paperback"),
            condition: Condition::new("Good"),
        };
        ctx.genres().add(refs.genre.clone()).await.unwrap();
        ctx.publishers().add(refs.publisher.clone()).await.unwrap();
        ctx.book_types().add(refs.book_type.clone()).await.unwrap();
        ctx.conditions().add(refs.condition.clone()).await.unwrap();
        ctx.save().await.unwrap();
        refs
    }

    fn book(refs: &Refs, name: &str, author: &str) -> Book {
        Book {
            id: new_id(),
            name: name.to_string(),
            author: author.to_string(),
            summary: None,
            isbn: "9780765326355".to_string(),
            genre_id: refs.genre.id.clone(),
            publisher_id: refs.publisher.id.clone(),
            book_type_id: refs.book_type.id.clone(),
            condition_id: refs.condition.id.clone(),
            front_url: None,
            back_url: None,
            left_url: None,
            right_url: None,
            is_active: true,
            updated_by: Some("admin".to_string()),
            updated_on: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_statement_shapes() {
        assert_eq!(
            insert_sql::<Genre>(),
            "INSERT INTO genres (id, name) VALUES (?, ?)"
        );
        assert_eq!(update_sql::<Genre>(), "UPDATE genres SET name = ? WHERE id = ?");
        assert_eq!(delete_sql::<Genre>(), "DELETE FROM genres WHERE id = ?");

        let g = Genre::new("Horror");
        assert_eq!(
            update_values(&g),
            vec![Value::from("Horror"), Value::from(g.id.as_str())]
        );
    }

    #[test]
    fn test_render_filter() {
        let filter = Filter::eq("is_active", true)
            .and(Filter::contains("name", "dune").or(Filter::eq("summary", Value::Null)))
            .and(Filter::lt("updated_on", Utc::now()).negate());
        let (sql, values) = select_sql::<Book>(&filter).unwrap();

        assert!(sql.starts_with("SELECT rowid AS row_key, id, name, "));
        assert!(sql.ends_with(
            "WHERE rowid > ? AND ((COALESCE(is_active = ?, 0) AND (COALESCE(instr(lower(name), lower(?)) > 0, 0) \
             OR summary IS NULL) AND NOT (COALESCE(updated_on < ?, 0)))) ORDER BY rowid LIMIT ?"
        ));
        assert_eq!(values.len(), 3);

        let (sql, values) = select_sql::<Book>(&Filter::Or(vec![])).unwrap();
        assert!(sql.contains("WHERE rowid > ? AND (0 = 1)"));
        assert!(values.is_empty());
    }

    #[test]
    fn test_unknown_field_never_reaches_sql() {
        let err = select_sql::<Book>(&Filter::eq("1=1 OR name", "x")).unwrap_err();
        assert!(matches!(err, DbError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_add_then_find_is_equal() {
        let db = db(DeletePolicy::Soft).await;
        let ctx = db.context();
        let refs = seed_refs(&ctx).await;

        let b = book(&refs, "Mistborn", "Brandon Sanderson");
        ctx.books().add(b.clone()).await.unwrap();
        assert_eq!(ctx.pending().await, 1);

        // staged, not visible
        assert_eq!(ctx.books().find(&b.id).await.unwrap(), None);

        assert_eq!(ctx.books().save().await.unwrap(), 1);
        assert_eq!(ctx.books().find(&b.id).await.unwrap(), Some(b));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let db = db(DeletePolicy::Soft).await;
        let ctx = db.context();
        let refs = seed_refs(&ctx).await;

        let err = ctx
            .books()
            .update(book(&refs, "Ghost", "Nobody"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(ctx.pending().await, 0);
    }

    #[tokio::test]
    async fn test_update_replaces_row() {
        let db = db(DeletePolicy::Soft).await;
        let ctx = db.context();
        let refs = seed_refs(&ctx).await;

        let mut b = book(&refs, "Elantris", "Brandon Sanderson");
        ctx.books().add(b.clone()).await.unwrap();
        ctx.save().await.unwrap();

        b.summary = Some("A fallen city.".to_string());
        b.name = "Elantris (10th Anniversary)".to_string();
        ctx.books().update(b.clone()).await.unwrap();
        ctx.save().await.unwrap();

        assert_eq!(ctx.books().find(&b.id).await.unwrap(), Some(b));
        assert_eq!(ctx.books().count(Filter::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_of_staged_insert_amends_it() {
        let db = db(DeletePolicy::Soft).await;
        let ctx = db.context();
        let refs = seed_refs(&ctx).await;

        let mut b = book(&refs, "Warbreaker", "Brandon Sanderson");
        ctx.books().add(b.clone()).await.unwrap();
        b.author = "B. Sanderson".to_string();
        ctx.books().update(b.clone()).await.unwrap();

        assert_eq!(ctx.pending().await, 1);
        ctx.save().await.unwrap();
        assert_eq!(ctx.books().find(&b.id).await.unwrap(), Some(b));
    }

    #[tokio::test]
    async fn test_hard_delete_removes_row() {
        let db = db(DeletePolicy::Hard).await;
        let ctx = db.context();
        let refs = seed_refs(&ctx).await;

        let b = book(&refs, "The Hobbit", "J. R. R. Tolkien");
        ctx.books().add(b.clone()).await.unwrap();
        ctx.save().await.unwrap();

        ctx.books().delete(&b).await.unwrap();
        ctx.save().await.unwrap();
        assert_eq!(ctx.books().find(&b.id).await.unwrap(), None);

        let err = ctx.books().delete(&b).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_soft_delete_keeps_row_fetchable() {
        let db = db(DeletePolicy::Soft).await;
        let ctx = db.context();
        let refs = seed_refs(&ctx).await;

        let b = book(&refs, "Dune", "Frank Herbert");
        ctx.books().add(b.clone()).await.unwrap();
        ctx.save().await.unwrap();

        ctx.books().delete(&b).await.unwrap();
        ctx.save().await.unwrap();

        let active = ctx.books().list(Filter::eq("is_active", true)).await.unwrap();
        assert!(active.is_empty());

        let found = ctx.books().find(&b.id).await.unwrap().unwrap();
        assert!(!found.is_active);
    }

    #[tokio::test]
    async fn test_reference_data_is_always_hard_deleted() {
        let db = db(DeletePolicy::Soft).await;
        let ctx = db.context();

        let genre = Genre::new("Western");
        ctx.genres().add(genre.clone()).await.unwrap();
        ctx.save().await.unwrap();

        ctx.genres().delete(&genre).await.unwrap();
        ctx.save().await.unwrap();
        assert_eq!(ctx.genres().find(&genre.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_foreign_key_failure_rolls_back_whole_unit() {
        let db = db(DeletePolicy::Soft).await;
        let ctx = db.context();
        let refs = seed_refs(&ctx).await;

        let good = book(&refs, "Good Omens", "Pratchett & Gaiman");
        let mut dangling = book(&refs, "Orphan", "Nobody");
        dangling.genre_id = new_id();

        ctx.books().add(good.clone()).await.unwrap();
        ctx.books().add(dangling.clone()).await.unwrap();

        let err = ctx.save().await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));

        assert_eq!(ctx.pending().await, 0);
        assert_eq!(ctx.books().find(&good.id).await.unwrap(), None);
        assert_eq!(ctx.books().count(Filter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_staging_order_does_not_matter() {
        let db = db(DeletePolicy::Soft).await;
        let ctx = db.context();

        let genre = Genre::new("Mystery");
        let publisher = Publisher::new("Penguin");
        let book_type = BookType::new("Hardcover");
        let condition = Condition::new("Fair");
        let refs = Refs {
            genre: genre.clone(),
            publisher: publisher.clone(),
            book_type: book_type.clone(),
            condition: condition.clone(),
        };

        // book first, its references afterwards
        ctx.books().add(book(&refs, "Gaudy Night", "Dorothy L. Sayers")).await.unwrap();
        ctx.genres().add(genre).await.unwrap();
        ctx.publishers().add(publisher).await.unwrap();
        ctx.book_types().add(book_type).await.unwrap();
        ctx.conditions().add(condition).await.unwrap();

        assert_eq!(ctx.save().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let db = db(DeletePolicy::Soft).await;
        let ctx = db.context();

        let genre = Genre::new("Poetry");
        ctx.genres().add(genre.clone()).await.unwrap();
        ctx.save().await.unwrap();

        ctx.genres().add(genre).await.unwrap();
        let err = ctx.save().await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_get_is_lazy_and_ordered() {
        let db = db(DeletePolicy::Soft).await;
        let ctx = db.context();
        let refs = seed_refs(&ctx).await;

        let names = ["Zeta", "Alpha", "Mu"];
        for name in names {
            ctx.books().add(book(&refs, name, "Anon")).await.unwrap();
        }

        // created before the save, polled after it
        let stream = ctx.books().get(Filter::All);
        ctx.save().await.unwrap();

        let listed: Vec<Book> = stream.try_collect().await.unwrap();
        let listed: Vec<_> = listed.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(listed, names);
    }

    #[tokio::test]
    async fn test_get_reads_past_one_batch() {
        let db = db(DeletePolicy::Soft).await;
        let ctx = db.context();
        let refs = seed_refs(&ctx).await;

        let total = BATCH_SIZE as usize * 2 + 7;
        let mut ids = Vec::with_capacity(total);
        for i in 0..total {
            let mut b = book(&refs, &format!("Volume {}", i), "Anon");
            b.is_active = i % 3 != 0;
            ids.push((b.id.clone(), b.is_active));
            ctx.books().add(b).await.unwrap();
        }
        ctx.save().await.unwrap();

        let all: Vec<String> = ctx
            .books()
            .get(Filter::All)
            .map_ok(|b| b.id)
            .try_collect()
            .await
            .unwrap();
        let expected: Vec<String> = ids.iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(all, expected);

        // filtered rows are keyed on rowid too, so nothing is skipped or repeated
        let active: Vec<String> = ctx
            .books()
            .get(Filter::eq("is_active", true))
            .map_ok(|b| b.id)
            .try_collect()
            .await
            .unwrap();
        let expected: Vec<String> = ids
            .iter()
            .filter(|(_, active)| *active)
            .map(|(id, _)| id.clone())
            .collect();
        assert_eq!(active, expected);

        let window: Vec<String> = ctx
            .books()
            .get(Filter::All)
            .skip(BATCH_SIZE as usize - 1)
            .take(3)
            .map_ok(|b| b.id)
            .try_collect()
            .await
            .unwrap();
        let from = BATCH_SIZE as usize - 1;
        let expected: Vec<String> = ids[from..from + 3].iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(window, expected);
    }

    #[tokio::test]
    async fn test_case_variant_reference_name_is_rejected() {
        let db = db(DeletePolicy::Soft).await;
        let ctx = db.context();

        ctx.genres().add(Genre::new("Fantasy")).await.unwrap();
        ctx.save().await.unwrap();

        ctx.genres().add(Genre::new("FANTASY")).await.unwrap();
        let err = ctx.save().await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert_eq!(ctx.genres().count(Filter::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_filter_yields_error() {
        let db = db(DeletePolicy::Soft).await;
        let err = db
            .context()
            .books()
            .list(Filter::eq("price", 3i64))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_filters_match_memory_backend() {
        let db = db(DeletePolicy::Soft).await;
        let ctx = db.context();
        let refs = seed_refs(&ctx).await;

        let store = MemoryStore::new(DeletePolicy::Soft);
        let memory = store.repository::<Book>();

        let mut books = vec![
            book(&refs, "The Left Hand of Darkness", "Ursula K. Le Guin"),
            book(&refs, "The Dispossessed", "Ursula K. Le Guin"),
            book(&refs, "Dune", "Frank Herbert"),
            book(&refs, "Hyperion", "Dan Simmons"),
        ];
        books[0].summary = Some("Winter on Gethen".to_string());
        books[2].summary = Some("Spice and sand".to_string());
        books[3].is_active = false;
        books[3].updated_on = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();

        for b in &books {
            ctx.books().add(b.clone()).await.unwrap();
            memory.add(b.clone()).await.unwrap();
        }
        ctx.save().await.unwrap();
        memory.save().await.unwrap();

        let cutoff = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let filters = vec![
            Filter::All,
            Filter::eq("is_active", true),
            Filter::contains("author", "LE GUIN"),
            Filter::contains("summary", "and"),
            Filter::eq("summary", Value::Null),
            Filter::ne("summary", Value::Null),
            Filter::ne("summary", "Spice and sand"),
            Filter::eq("summary", "Spice and sand").negate(),
            Filter::lt("updated_on", cutoff),
            Filter::ge("name", "M").and(Filter::eq("is_active", true)),
            Filter::eq("name", "Dune").or(Filter::eq("name", "Hyperion")),
            Filter::And(vec![]),
            Filter::Or(vec![]),
        ];

        for filter in filters {
            let sql: Vec<String> = ctx
                .books()
                .list(filter.clone())
                .await
                .unwrap()
                .into_iter()
                .map(|b| b.id)
                .collect();
            let mem: Vec<String> = memory
                .list(filter.clone())
                .await
                .unwrap()
                .into_iter()
                .map(|b| b.id)
                .collect();
            assert_eq!(sql, mem, "backends disagree on {:?}", filter);
            assert_eq!(
                ctx.books().count(filter.clone()).await.unwrap(),
                sql.len()
            );
        }
    }

    #[tokio::test]
    async fn test_reference_name_filters_match_memory_backend() {
        let db = db(DeletePolicy::Soft).await;
        let ctx = db.context();
        let refs = seed_refs(&ctx).await;
        let orbit = Publisher::new("orbit");
        ctx.publishers().add(orbit.clone()).await.unwrap();
        ctx.save().await.unwrap();

        let store = MemoryStore::new(DeletePolicy::Soft);
        let genres = store.repository::<Genre>();
        let publishers = store.repository::<Publisher>();
        genres.add(refs.genre.clone()).await.unwrap();
        publishers.add(refs.publisher.clone()).await.unwrap();
        publishers.add(orbit).await.unwrap();
        publishers.save().await.unwrap();

        // comparisons are byte-wise in both backends; only Contains folds case
        let filters = vec![
            Filter::eq("name", "Fantasy"),
            Filter::eq("name", "fantasy"),
            Filter::ne("name", "fantasy"),
            Filter::gt("name", "e"),
            Filter::lt("name", "e"),
            Filter::ge("name", "Orbit"),
            Filter::contains("name", "FANT"),
        ];

        for filter in filters {
            let sql: Vec<String> = ctx
                .genres()
                .list(filter.clone())
                .await
                .unwrap()
                .into_iter()
                .map(|g| g.id)
                .collect();
            let mem: Vec<String> = genres
                .list(filter.clone())
                .await
                .unwrap()
                .into_iter()
                .map(|g| g.id)
                .collect();
            assert_eq!(sql, mem, "genres disagree on {:?}", filter);

            let sql: Vec<String> = ctx
                .publishers()
                .list(filter.clone())
                .await
                .unwrap()
                .into_iter()
                .map(|p| p.id)
                .collect();
            let mem: Vec<String> = publishers
                .list(filter.clone())
                .await
                .unwrap()
                .into_iter()
                .map(|p| p.id)
                .collect();
            assert_eq!(sql, mem, "publishers disagree on {:?}", filter);
        }

        assert!(ctx
            .genres()
            .list(Filter::eq("name", "fantasy"))
            .await
            .unwrap()
            .is_empty());
    }
}
