//! # bookstore-core: Pure Domain Logic for the Bookstore Back Office
//!
//! Entities, filter expressions, dashboard statistics and form validation,
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Bookstore Admin Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 apps/admin (services + CLI)                     │   │
//! │  │   InventoryService, CatalogService, DashboardService, ...       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ bookstore-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────┐ │   │
//! │  │   │  types   │ │  entity  │ │  query   │ │  stats   │ │money │ │   │
//! │  │   │  Book    │ │  Entity  │ │  Filter  │ │ Ranking  │ │Money │ │   │
//! │  │   │  Order   │ │  Value   │ │  Op      │ │ top_n    │ │      │ │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘ └──────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                bookstore-db (Database Layer)                    │   │
//! │  │        SQLite pool, schema, generic repository, unit of work    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entities (Book, Price, Order, OrderDetail, reference data)
//! - [`entity`] - The `Entity` trait and column `Value`s
//! - [`query`] - `Filter` expression trees
//! - [`stats`] - Top-N rankings and count series for the dashboard
//! - [`money`] - Money type with integer arithmetic
//! - [`validation`] - Admin form rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use bookstore_core::{Filter, Genre, ReferenceData};
//!
//! let genre = Genre::new("Fantasy");
//! let filter = Filter::contains("name", "fant");
//! assert!(filter.matches(&genre).unwrap());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod entity;
pub mod error;
pub mod money;
pub mod query;
pub mod stats;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use entity::{Column, Entity, Kind, Value};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use query::{Filter, Op};
pub use stats::{CountEntry, InventoryStats, OrderLine, Ranking};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// How many entries each dashboard ranking shows unless configured otherwise.
pub const DEFAULT_TOP_N: usize = 5;

/// Rows per inventory / search page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Upper bound for the stock quantity of one inventory record.
pub const MAX_STOCK_QUANTITY: i64 = 9_999;
