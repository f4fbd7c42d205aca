//! # Inventory Statistics
//!
//! Pure aggregation behind the admin dashboard.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  order lines ──┬──► group by genre     ──► sort desc ──► take N         │
//! │                ├──► group by book type ──► sort desc ──► take N         │
//! │                ├──► group by publisher ──► sort desc ──► take N         │
//! │                └──► group by book name ──► sort desc ──► take N         │
//! │                                                                         │
//! │  inventory records ──► group by month (updated_on) ──► series           │
//! │  orders            ──► group by month (created_at) ──► series           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Groups are kept in first-seen order and sorted with a stable sort, so
//! ties stay in the order they first appeared. The four rankings are
//! independent of each other.
//!
//! ## Example
//! ```rust
//! use bookstore_core::stats::top_n;
//!
//! let ranking = top_n(["A", "B", "A", "C"], 2);
//! assert_eq!(ranking.top().map(|e| e.label.as_str()), Some("A"));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Order, Price};

// =============================================================================
// Inputs
// =============================================================================

/// An order line resolved to the names the dashboard groups by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub genre: String,
    pub book_type: String,
    pub publisher: String,
    pub book_name: String,
}

// =============================================================================
// Outputs
// =============================================================================

/// A label and how often it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountEntry {
    pub label: String,
    pub count: usize,
}

impl CountEntry {
    pub fn new(label: impl Into<String>, count: usize) -> Self {
        CountEntry {
            label: label.into(),
            count,
        }
    }
}

/// Entries sorted by descending count, capped at N.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ranking(Vec<CountEntry>);

impl Ranking {
    /// The highest-ranked entry, if there is any data at all.
    pub fn top(&self) -> Option<&CountEntry> {
        self.0.first()
    }

    pub fn entries(&self) -> &[CountEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything the dashboard shows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryStats {
    pub by_genre: Ranking,
    pub by_type: Ranking,
    pub by_publisher: Ranking,
    pub by_name: Ranking,
    /// Inventory records per month, first-seen order.
    pub inventory_series: Vec<CountEntry>,
    /// Orders per month, first-seen order.
    pub order_series: Vec<CountEntry>,
}

// =============================================================================
// Aggregation
// =============================================================================

/// Counts labels, keeping the order in which each label first appeared.
pub fn count_by<I, S>(labels: I) -> Vec<CountEntry>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut groups: Vec<CountEntry> = Vec::new();
    for label in labels {
        let label = label.as_ref();
        match groups.iter().position(|e| e.label == label) {
            Some(i) => groups[i].count += 1,
            None => groups.push(CountEntry::new(label, 1)),
        }
    }
    groups
}

/// Top `n` labels by count, ties in first-seen order.
pub fn top_n<I, S>(labels: I, n: usize) -> Ranking
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut groups = count_by(labels);
    // sort_by is stable
    groups.sort_by(|a, b| b.count.cmp(&a.count));
    groups.truncate(n);
    Ranking(groups)
}

/// Calendar-month label used by both series.
pub fn month_label(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

/// Computes the dashboard statistics.
///
/// Never fails; empty inputs give empty rankings and series.
pub fn aggregate(
    lines: &[OrderLine],
    inventory: &[Price],
    orders: &[Order],
    top: usize,
) -> InventoryStats {
    InventoryStats {
        by_genre: top_n(lines.iter().map(|l| &l.genre), top),
        by_type: top_n(lines.iter().map(|l| &l.book_type), top),
        by_publisher: top_n(lines.iter().map(|l| &l.publisher), top),
        by_name: top_n(lines.iter().map(|l| &l.book_name), top),
        inventory_series: count_by(inventory.iter().map(|p| month_label(&p.updated_on))),
        order_series: count_by(orders.iter().map(|o| month_label(&o.created_at))),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
