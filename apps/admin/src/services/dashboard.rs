//! # Dashboard Service
//!
//! Loads order lines, resolves what each line sold and hands the labels to
//! the statistics aggregator.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  order_details ──► book ──┬──► genre name     ─┐                        │
//! │                           ├──► type name       │                        │
//! │                           ├──► publisher name  ├──► OrderLine           │
//! │                           └──► book name      ─┘        │               │
//! │                                                         ▼               │
//! │  prices (inventory) ───────────────────────────► stats::aggregate       │
//! │  orders ───────────────────────────────────────►        │               │
//! │                                                         ▼               │
//! │                                                   DashboardView         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lookups are cached per dashboard call, so each book and reference record
//! is read once however many lines point at it.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use bookstore_core::stats::{aggregate, OrderLine};
use bookstore_core::{CountEntry, Entity, Filter, InventoryStats, Money, OrderDetail, ReferenceData};
use bookstore_db::Repository;

use crate::error::AdminResult;
use crate::state::Repositories;

/// What the dashboard screen shows.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub top_genre: Option<CountEntry>,
    pub top_type: Option<CountEntry>,
    pub top_publisher: Option<CountEntry>,
    pub top_name: Option<CountEntry>,
    /// Sum of every resolved line's total.
    pub total_sales: Money,
    pub stats: InventoryStats,
}

impl DashboardView {
    fn new(stats: InventoryStats, total_sales: Money) -> Self {
        DashboardView {
            top_genre: stats.by_genre.top().cloned(),
            top_type: stats.by_type.top().cloned(),
            top_publisher: stats.by_publisher.top().cloned(),
            top_name: stats.by_name.top().cloned(),
            total_sales,
            stats,
        }
    }
}

pub struct DashboardService {
    repos: Repositories,
    top_n: usize,
}

impl DashboardService {
    pub fn new(repos: Repositories, top_n: usize) -> Self {
        DashboardService { repos, top_n }
    }

    pub async fn dashboard(&self) -> AdminResult<DashboardView> {
        let details = self.repos.order_details.list(Filter::All).await?;
        let inventory = self.repos.prices.list(Filter::All).await?;
        let orders = self.repos.orders.list(Filter::All).await?;

        let mut books = Lookup::new(self.repos.books.clone());
        let mut genres = Lookup::new(self.repos.genres.clone());
        let mut types = Lookup::new(self.repos.book_types.clone());
        let mut publishers = Lookup::new(self.repos.publishers.clone());

        let mut lines = Vec::with_capacity(details.len());
        let mut total_sales = Money::zero();

        for detail in &details {
            let Some(book) = books.get(&detail.book_id).await? else {
                skip(detail, "book");
                continue;
            };
            let Some(genre) = genres.name(&book.genre_id).await? else {
                skip(detail, "genre");
                continue;
            };
            let Some(book_type) = types.name(&book.book_type_id).await? else {
                skip(detail, "type");
                continue;
            };
            let Some(publisher) = publishers.name(&book.publisher_id).await? else {
                skip(detail, "publisher");
                continue;
            };

            total_sales += detail.line_total();
            lines.push(OrderLine {
                genre,
                book_type,
                publisher,
                book_name: book.name,
            });
        }

        let stats = aggregate(&lines, &inventory, &orders, self.top_n);
        debug!(
            lines = lines.len(),
            skipped = details.len() - lines.len(),
            top_n = self.top_n,
            "Dashboard computed"
        );

        Ok(DashboardView::new(stats, total_sales))
    }
}

fn skip(detail: &OrderDetail, missing: &str) {
    warn!(
        order_detail_id = %detail.id,
        order_id = %detail.order_id,
        missing,
        "Skipping order line with a dangling reference"
    );
}

/// Per-call cache in front of one repository.
struct Lookup<E: Entity> {
    repo: Arc<dyn Repository<E>>,
    cache: HashMap<String, Option<E>>,
}

impl<E: Entity> Lookup<E> {
    fn new(repo: Arc<dyn Repository<E>>) -> Self {
        Lookup {
            repo,
            cache: HashMap::new(),
        }
    }

    async fn get(&mut self, id: &str) -> AdminResult<Option<E>> {
        if let Some(hit) = self.cache.get(id) {
            return Ok(hit.clone());
        }
        let found = self.repo.find(id).await?;
        self.cache.insert(id.to_string(), found.clone());
        Ok(found)
    }
}

impl<E: ReferenceData> Lookup<E> {
    async fn name(&mut self, id: &str) -> AdminResult<Option<String>> {
        Ok(self.get(id).await?.map(|r| r.name().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookstore_core::{
        new_id, Book, BookType, Condition, Genre, Order, OrderStatus, Price, Publisher,
    };
    use bookstore_db::{DeletePolicy, MemoryStore};
    use chrono::{TimeZone, Utc};

    struct Fixture {
        repos: Repositories,
        genres: Vec<Genre>,
        publisher: Publisher,
        book_type: BookType,
        condition: Condition,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = MemoryStore::new(DeletePolicy::Soft);
            let repos = Repositories::in_memory(&store);
            let genres: Vec<Genre> = ["A", "B", "C"].into_iter().map(Genre::new).collect();
            for g in &genres {
                repos.genres.add(g.clone()).await.unwrap();
            }
            let publisher = Publisher::new("Penguin");
            let book_type = BookType::new("Paperback");
            let condition = Condition::new("Good");
            repos.publishers.add(publisher.clone()).await.unwrap();
            repos.book_types.add(book_type.clone()).await.unwrap();
            repos.conditions.add(condition.clone()).await.unwrap();
            repos.genres.save().await.unwrap();

            Fixture {
                repos,
                genres,
                publisher,
                book_type,
                condition,
            }
        }

        /// Stages a book in `genre`, its price and a one-line order.
        async fn sell(&self, name: &str, genre: &Genre, quantity: i64) -> Book {
            let at = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
            let book = Book {
                id: new_id(),
                name: name.to_string(),
                author: "Someone".to_string(),
                summary: None,
                isbn: "9780306406157".to_string(),
                genre_id: genre.id.clone(),
                publisher_id: self.publisher.id.clone(),
                book_type_id: self.book_type.id.clone(),
                condition_id: self.condition.id.clone(),
                front_url: None,
                back_url: None,
                left_url: None,
                right_url: None,
                is_active: true,
                updated_by: None,
                updated_on: at,
            };
            let price = Price {
                id: new_id(),
                book_id: book.id.clone(),
                condition_id: self.condition.id.clone(),
                price_cents: 500,
                quantity: 4,
                is_active: true,
                updated_by: None,
                updated_on: at,
            };
            let order = Order {
                id: new_id(),
                status: OrderStatus::Delivered,
                created_at: at,
                updated_at: at,
            };
            let detail = OrderDetail {
                id: new_id(),
                order_id: order.id.clone(),
                book_id: book.id.clone(),
                price_id: price.id.clone(),
                unit_price_cents: price.price_cents,
                quantity,
            };

            self.repos.books.add(book.clone()).await.unwrap();
            self.repos.prices.add(price).await.unwrap();
            self.repos.orders.add(order).await.unwrap();
            self.repos.order_details.add(detail).await.unwrap();
            book
        }
    }

    #[tokio::test]
    async fn test_empty_store_has_no_tops() {
        let fx = Fixture::new().await;
        let view = DashboardService::new(fx.repos.clone(), 5)
            .dashboard()
            .await
            .unwrap();

        assert!(view.top_genre.is_none());
        assert!(view.top_type.is_none());
        assert!(view.top_publisher.is_none());
        assert!(view.top_name.is_none());
        assert!(view.stats.by_genre.is_empty());
        assert!(view.total_sales.is_zero());
    }

    #[tokio::test]
    async fn test_genre_ranking() {
        let fx = Fixture::new().await;
        let [a, b, c] = [&fx.genres[0], &fx.genres[1], &fx.genres[2]];
        fx.sell("One", a, 1).await;
        fx.sell("Two", b, 1).await;
        fx.sell("Three", a, 2).await;
        fx.sell("Four", c, 1).await;
        fx.repos.books.save().await.unwrap();

        let view = DashboardService::new(fx.repos.clone(), 2)
            .dashboard()
            .await
            .unwrap();

        assert_eq!(
            view.stats.by_genre.entries(),
            &[CountEntry::new("A", 2), CountEntry::new("B", 1)]
        );
        assert_eq!(view.top_genre, Some(CountEntry::new("A", 2)));
        assert_eq!(view.top_publisher, Some(CountEntry::new("Penguin", 4)));
        assert_eq!(view.top_type, Some(CountEntry::new("Paperback", 4)));
        assert_eq!(view.stats.by_name.len(), 2);
        assert_eq!(view.total_sales, Money::from_cents(500 * 5));
        assert_eq!(view.stats.order_series, vec![CountEntry::new("2024-03", 4)]);
        assert_eq!(
            view.stats.inventory_series,
            vec![CountEntry::new("2024-03", 4)]
        );
    }

    #[tokio::test]
    async fn test_dangling_lines_are_skipped() {
        let fx = Fixture::new().await;
        let orphan_genre = Genre::new("Gone");
        fx.sell("Kept", &fx.genres[0], 1).await;
        fx.sell("Orphan", &orphan_genre, 1).await;
        fx.repos
            .order_details
            .add(OrderDetail {
                id: new_id(),
                order_id: new_id(),
                book_id: new_id(),
                price_id: new_id(),
                unit_price_cents: 100,
                quantity: 1,
            })
            .await
            .unwrap();
        fx.repos.books.save().await.unwrap();

        let view = DashboardService::new(fx.repos.clone(), 5)
            .dashboard()
            .await
            .unwrap();

        assert_eq!(
            view.stats.by_name.entries(),
            &[CountEntry::new("Kept", 1)]
        );
        assert_eq!(view.total_sales, Money::from_cents(500));
    }
}
