//! # bookstore-admin: Back-Office Services
//!
//! The operations behind the bookstore admin screens, wired explicitly over
//! the generic repositories of `bookstore-db`.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Application Startup                               │
//! │                                                                         │
//! │  1. Load Configuration ───────────────────────────────────────────────► │
//! │     • defaults → bookstore.toml → BOOKSTORE_* environment               │
//! │                                                                         │
//! │  2. Initialize Logging ───────────────────────────────────────────────► │
//! │     • tracing-subscriber with env filter                                │
//! │     • RUST_LOG wins over [logging] filter                               │
//! │                                                                         │
//! │  3. Connect to Database ──────────────────────────────────────────────► │
//! │     • SQLite with WAL mode, foreign keys on                             │
//! │     • Embedded schema applied                                           │
//! │                                                                         │
//! │  4. Open a DataContext and build Repositories ────────────────────────► │
//! │                                                                         │
//! │  5. Construct the service and run the command ────────────────────────► │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod services;
pub mod state;

use tracing::Level;
use tracing_subscriber::EnvFilter;

pub use config::AdminConfig;
pub use error::{AdminError, AdminResult, ErrorCode};
pub use services::{CatalogService, DashboardService, InventoryService, OrderService};
pub use state::Repositories;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` overrides `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .with_writer(std::io::stderr)
        .init();
}
