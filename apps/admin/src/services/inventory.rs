//! # Inventory Service
//!
//! Book listing, editing, search and stock screening.
//!
//! ## Book Editor Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Save Book                                            │
//! │                                                                         │
//! │  save_book(book, "alice")                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  stamp audit fields: updated_by = alice, updated_on = now, active       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate_book ──── invalid? ──► ValidationError (nothing staged)       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  books.find(id) ─── exists? ──► books.update(book)                      │
//! │       │                                                                 │
//! │       └──────────── new? ─────► books.add(book)                         │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │                                 books.save()                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::cmp::Ordering;
use std::collections::HashSet;
use std::str::FromStr;

use chrono::Utc;
use futures_util::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use bookstore_core::validation::{validate_book, validate_price, validate_search_term};
use bookstore_core::{Book, Filter, Price, ValidationError};

use crate::config::InventorySettings;
use crate::error::{AdminError, AdminResult};
use crate::state::Repositories;

// =============================================================================
// View Types
// =============================================================================

/// Which text column a search runs against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    #[default]
    Name,
    Author,
    Isbn,
    Summary,
}

impl SearchField {
    pub fn column(&self) -> &'static str {
        match self {
            SearchField::Name => "name",
            SearchField::Author => "author",
            SearchField::Isbn => "isbn",
            SearchField::Summary => "summary",
        }
    }
}

impl FromStr for SearchField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" | "title" => Ok(SearchField::Name),
            "author" => Ok(SearchField::Author),
            "isbn" => Ok(SearchField::Isbn),
            "summary" => Ok(SearchField::Summary),
            other => Err(ValidationError::InvalidFormat {
                field: "search by".to_string(),
                reason: format!("unknown search field '{}'", other),
            }),
        }
    }
}

/// Column a search result list is ordered by.
///
/// `Added` keeps insertion order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Added,
    Name,
    Author,
    Isbn,
    UpdatedOn,
}

impl SortField {
    /// Text columns compare ignoring case.
    fn compare(&self, a: &Book, b: &Book) -> Ordering {
        match self {
            SortField::Added => Ordering::Equal,
            SortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortField::Author => a.author.to_lowercase().cmp(&b.author.to_lowercase()),
            SortField::Isbn => a.isbn.cmp(&b.isbn),
            SortField::UpdatedOn => a.updated_on.cmp(&b.updated_on),
        }
    }
}

impl FromStr for SortField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "added" => Ok(SortField::Added),
            "name" | "title" => Ok(SortField::Name),
            "author" => Ok(SortField::Author),
            "isbn" => Ok(SortField::Isbn),
            "updated" | "updated_on" => Ok(SortField::UpdatedOn),
            other => Err(ValidationError::InvalidFormat {
                field: "sort by".to_string(),
                reason: format!("unknown sort field '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "asc" | "ascending" => Ok(SortOrder::Asc),
            "desc" | "descending" => Ok(SortOrder::Desc),
            other => Err(ValidationError::InvalidFormat {
                field: "sort order".to_string(),
                reason: format!("expected asc or desc, got '{}'", other),
            }),
        }
    }
}

/// Ordering of a search result list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSort {
    pub by: SortField,
    pub order: SortOrder,
}

impl SearchSort {
    pub fn new(by: SortField, order: SortOrder) -> Self {
        SearchSort { by, order }
    }

    /// Insertion order ascending is what the store already yields.
    fn is_natural(&self) -> bool {
        self.by == SortField::Added && self.order == SortOrder::Asc
    }

    /// Stable sort; ties keep insertion order in both directions.
    fn apply(&self, books: &mut [Book]) {
        if self.by == SortField::Added {
            if self.order == SortOrder::Desc {
                books.reverse();
            }
            return;
        }
        match self.order {
            SortOrder::Asc => books.sort_by(|a, b| self.by.compare(a, b)),
            SortOrder::Desc => books.sort_by(|a, b| self.by.compare(b, a)),
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub books: Vec<Book>,
    /// 1-based page number.
    pub page: usize,
    pub page_size: usize,
    /// Matches across all pages.
    pub total: usize,
}

impl SearchPage {
    pub fn page_count(&self) -> usize {
        self.total.div_ceil(self.page_size)
    }
}

/// A book with its reference names resolved and its inventory records.
#[derive(Debug, Clone, Serialize)]
pub struct BookDetails {
    pub book: Book,
    pub genre: Option<String>,
    pub publisher: Option<String>,
    pub book_type: Option<String>,
    pub condition: Option<String>,
    /// Present picture URLs, or the configured default image.
    pub images: Vec<String>,
    pub prices: Vec<Price>,
}

/// An inventory record running out, with the title for the report.
#[derive(Debug, Clone, Serialize)]
pub struct LowStockItem {
    pub book_name: Option<String>,
    pub price: Price,
}

// =============================================================================
// Service
// =============================================================================

pub struct InventoryService {
    repos: Repositories,
    page_size: usize,
    default_image: String,
}

impl InventoryService {
    pub fn new(repos: Repositories, settings: &InventorySettings) -> Self {
        InventoryService {
            repos,
            page_size: settings.page_size.max(1),
            default_image: settings.default_image.clone(),
        }
    }

    /// Active books in insertion order, `count` of them starting at `start`.
    ///
    /// Rows are pulled from the store only as far as the window reaches; the
    /// SQLite backend stops fetching batches once `take` is satisfied.
    pub async fn get_books(
        &self,
        username: &str,
        start: usize,
        count: usize,
    ) -> AdminResult<Vec<Book>> {
        debug!(username = %username, start, count, "Listing books");

        let books: Vec<Book> = self
            .repos
            .books
            .get(Filter::eq("is_active", true))
            .skip(start)
            .take(count)
            .try_collect()
            .await?;

        Ok(books)
    }

    pub async fn get_book(&self, id: &str) -> AdminResult<Book> {
        self.repos
            .books
            .find(id)
            .await?
            .ok_or_else(|| AdminError::not_found("Book", id))
    }

    /// Stamps, validates and commits a book, inserting it if its id is new.
    ///
    /// A blank id gets a fresh one. Saving always reactivates the book.
    pub async fn save_book(&self, mut book: Book, username: &str) -> AdminResult<Book> {
        if book.id.trim().is_empty() {
            book.id = Uuid::new_v4().to_string();
        }
        book.updated_by = Some(username.to_string());
        book.updated_on = Utc::now();
        book.is_active = true;

        validate_book(&book)?;

        let exists = self.repos.books.find(&book.id).await?.is_some();
        if exists {
            self.repos.books.update(book.clone()).await?;
        } else {
            self.repos.books.add(book.clone()).await?;
        }
        self.repos.books.save().await?;

        info!(book_id = %book.id, username = %username, created = !exists, "Book saved");
        Ok(book)
    }

    pub async fn book_details(&self, id: &str) -> AdminResult<BookDetails> {
        let book = self.get_book(id).await?;

        let genre = self.repos.genres.find(&book.genre_id).await?.map(|g| g.name);
        let publisher = self
            .repos
            .publishers
            .find(&book.publisher_id)
            .await?
            .map(|p| p.name);
        let book_type = self
            .repos
            .book_types
            .find(&book.book_type_id)
            .await?
            .map(|t| t.name);
        let condition = self
            .repos
            .conditions
            .find(&book.condition_id)
            .await?
            .map(|c| c.name);

        let mut images: Vec<String> = book.image_urls().into_iter().map(String::from).collect();
        if images.is_empty() {
            images.push(self.default_image.clone());
        }

        let prices = self
            .repos
            .prices
            .list(Filter::eq("book_id", book.id.as_str()))
            .await?;

        Ok(BookDetails {
            book,
            genre,
            publisher,
            book_type,
            condition,
            images,
            prices,
        })
    }

    /// Case-insensitive substring search over active books.
    ///
    /// An empty term matches every active book. `page` is 1-based; page 0 is
    /// read as page 1, and a page past the end is empty. Any ordering other
    /// than insertion order ascending sorts the full match list before paging.
    pub async fn search_books(
        &self,
        search_by: SearchField,
        term: &str,
        page: usize,
        sort: SearchSort,
    ) -> AdminResult<SearchPage> {
        let term = validate_search_term(term)?;
        let page = page.max(1);
        let offset = (page - 1).saturating_mul(self.page_size);

        let mut filter = Filter::eq("is_active", true);
        if !term.is_empty() {
            filter = filter.and(Filter::contains(search_by.column(), term.as_str()));
        }

        let (books, total) = if sort.is_natural() {
            let total = self.repos.books.count(filter.clone()).await?;
            let books: Vec<Book> = self
                .repos
                .books
                .get(filter)
                .skip(offset)
                .take(self.page_size)
                .try_collect()
                .await?;
            (books, total)
        } else {
            let mut matched = self.repos.books.list(filter).await?;
            sort.apply(&mut matched);
            let total = matched.len();
            let books = matched
                .into_iter()
                .skip(offset)
                .take(self.page_size)
                .collect();
            (books, total)
        };

        debug!(search_by = ?search_by, term = %term, page, ?sort, total, "Book search");

        Ok(SearchPage {
            books,
            page,
            page_size: self.page_size,
            total,
        })
    }

    /// Distinct names of active books containing `term`, for type-ahead.
    ///
    /// Names that differ only in case are reported once, first spelling wins.
    /// Stops reading as soon as `limit` names are found.
    pub async fn suggest_names(&self, term: &str, limit: usize) -> AdminResult<Vec<String>> {
        let term = validate_search_term(term)?;
        if term.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let filter = Filter::eq("is_active", true).and(Filter::contains("name", term.as_str()));
        let mut rows = self.repos.books.get(filter);

        let mut seen = HashSet::new();
        let mut names = Vec::new();
        while let Some(book) = rows.try_next().await? {
            if seen.insert(book.name.to_lowercase()) {
                names.push(book.name);
                if names.len() == limit {
                    break;
                }
            }
        }

        debug!(term = %term, found = names.len(), "Name suggestions");
        Ok(names)
    }

    /// Stamps, validates and commits an inventory record, inserting it if
    /// its id is new.
    ///
    /// A blank id gets a fresh one. Saving always reactivates the record. The
    /// book must exist; a retired book can still have its prices edited.
    pub async fn save_price(&self, mut price: Price, username: &str) -> AdminResult<Price> {
        if price.id.trim().is_empty() {
            price.id = Uuid::new_v4().to_string();
        }
        price.updated_by = Some(username.to_string());
        price.updated_on = Utc::now();
        price.is_active = true;

        validate_price(&price)?;
        self.get_book(&price.book_id).await?;

        let exists = self.repos.prices.find(&price.id).await?.is_some();
        if exists {
            self.repos.prices.update(price.clone()).await?;
        } else {
            self.repos.prices.add(price.clone()).await?;
        }
        self.repos.prices.save().await?;

        info!(
            price_id = %price.id,
            book_id = %price.book_id,
            quantity = price.quantity,
            username = %username,
            created = !exists,
            "Price saved"
        );
        Ok(price)
    }

    /// Active inventory records with `quantity <= threshold`.
    pub async fn low_stock(&self, threshold: i64) -> AdminResult<Vec<LowStockItem>> {
        let filter = Filter::eq("is_active", true).and(Filter::le("quantity", threshold));
        let prices = self.repos.prices.list(filter).await?;

        let mut items = Vec::with_capacity(prices.len());
        for price in prices {
            let book_name = self.repos.books.find(&price.book_id).await?.map(|b| b.name);
            items.push(LowStockItem { book_name, price });
        }

        debug!(threshold, count = items.len(), "Low stock screening");
        Ok(items)
    }

    /// Deletes a book through the repository, so the configured delete
    /// policy decides between clearing `is_active` and removing the row.
    pub async fn deactivate_book(&self, id: &str) -> AdminResult<()> {
        let book = self.get_book(id).await?;
        self.repos.books.delete(&book).await?;
        self.repos.books.save().await?;

        info!(book_id = %id, "Book deactivated");
        Ok(())
    }
}
