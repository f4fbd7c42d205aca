//! # Repository Bundle
//!
//! One `Arc<dyn Repository<E>>` per entity, built explicitly at start-up and
//! handed to each service constructor.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  main                                                                   │
//! │   │  db.context()                                                       │
//! │   ▼                                                                     │
//! │  Repositories::sqlite(&ctx) ──┬──► InventoryService::new(repos, ...)    │
//! │                               ├──► CatalogService::new(repos)           │
//! │                               ├──► DashboardService::new(repos, top_n)  │
//! │                               └──► OrderService::new(repos)             │
//! │                                                                         │
//! │  Tests: Repositories::in_memory(&MemoryStore::new(policy))              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every repository of one bundle shares one unit of work, so `save` on any
//! of them commits everything the services staged.

use std::sync::Arc;

use bookstore_core::{Book, BookType, Condition, Genre, Order, OrderDetail, Price, Publisher};
use bookstore_db::{DataContext, MemoryStore, Repository};

#[derive(Clone)]
pub struct Repositories {
    pub books: Arc<dyn Repository<Book>>,
    pub prices: Arc<dyn Repository<Price>>,
    pub orders: Arc<dyn Repository<Order>>,
    pub order_details: Arc<dyn Repository<OrderDetail>>,
    pub genres: Arc<dyn Repository<Genre>>,
    pub publishers: Arc<dyn Repository<Publisher>>,
    pub book_types: Arc<dyn Repository<BookType>>,
    pub conditions: Arc<dyn Repository<Condition>>,
}

impl Repositories {
    /// SQLite repositories sharing the context's unit of work.
    pub fn sqlite(ctx: &DataContext) -> Self {
        Repositories {
            books: Arc::new(ctx.books()),
            prices: Arc::new(ctx.prices()),
            orders: Arc::new(ctx.orders()),
            order_details: Arc::new(ctx.order_details()),
            genres: Arc::new(ctx.genres()),
            publishers: Arc::new(ctx.publishers()),
            book_types: Arc::new(ctx.book_types()),
            conditions: Arc::new(ctx.conditions()),
        }
    }

    /// In-process repositories over a shared store.
    pub fn in_memory(store: &MemoryStore) -> Self {
        Repositories {
            books: Arc::new(store.repository::<Book>()),
            prices: Arc::new(store.repository::<Price>()),
            orders: Arc::new(store.repository::<Order>()),
            order_details: Arc::new(store.repository::<OrderDetail>()),
            genres: Arc::new(store.repository::<Genre>()),
            publishers: Arc::new(store.repository::<Publisher>()),
            book_types: Arc::new(store.repository::<BookType>()),
            conditions: Arc::new(store.repository::<Condition>()),
        }
    }
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories").finish_non_exhaustive()
    }
}
