//! # bookstore-db: Database Layer for the Bookstore Back Office
//!
//! SQLite persistence behind one generic, entity-parameterized repository.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Bookstore Admin Data Flow                           │
//! │                                                                         │
//! │  InventoryService::save_book                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  bookstore-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌──────────────────┐  ┌──────────────┐  │   │
//! │  │   │   Database    │    │   DataContext    │  │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │───►│  one UnitOfWork  │  │  (embedded)  │  │   │
//! │  │   │               │    │                  │  │              │  │   │
//! │  │   │ SqlitePool    │    │ SqliteRepository │  │ 001_initial  │  │   │
//! │  │   │ DeletePolicy  │    │   <Book>, ...    │  │  _schema.sql │  │   │
//! │  │   └───────────────┘    └──────────────────┘  └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   MemoryRepository<E>: same contract, no database (tests)       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database schema
//! - [`error`] - Database error types
//! - [`repository`] - The `Repository<E>` trait and its two backends
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bookstore_core::{Book, Filter};
//! use bookstore_db::{Database, DbConfig, Repository};
//!
//! let db = Database::new(DbConfig::new("bookstore.db")).await?;
//! let ctx = db.context();
//!
//! let books = ctx.books();
//! books.add(book).await?;
//! books.save().await?;
//!
//! let active = books.list(Filter::eq("is_active", true)).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, ErrorKind};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::memory::{MemoryRepository, MemoryStore};
pub use repository::sqlite::{DataContext, SqliteRepository, UnitOfWork};
pub use repository::{DeletePolicy, Repository};
