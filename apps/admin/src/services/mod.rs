//! # Admin Services
//!
//! The operations of the back office, one struct per screen family.
//!
//! - [`inventory`] - Book and price editors, details, search, suggestions, low stock
//! - [`catalog`] - Genres, publishers, book types and conditions
//! - [`dashboard`] - Sales rankings and monthly series
//! - [`order`] - Order lookup and status changes
//!
//! Services only talk to `Repositories`; they never see SQL. Each write
//! operation stages its changes and commits them with one `save`.

pub mod catalog;
pub mod dashboard;
pub mod inventory;
pub mod order;

pub use catalog::CatalogService;
pub use dashboard::{DashboardService, DashboardView};
pub use inventory::{
    BookDetails, InventoryService, LowStockItem, SearchField, SearchPage, SearchSort, SortField,
    SortOrder,
};
pub use order::{OrderService, OrderSummary};
