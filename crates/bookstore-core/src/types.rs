//! # Domain Types
//!
//! The persisted entities of the bookstore back office.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌───────────────┐  ┌───────────────┐  ┌───────────────┐               │
//! │  │     Genre     │  │   Publisher   │  │   BookType    │  Condition    │
//! │  │  id, name     │  │  id, name     │  │  id, name     │  id, name     │
//! │  └───────┬───────┘  └───────┬───────┘  └───────┬───────┘               │
//! │          └──────────────────┼──────────────────┘                        │
//! │                     ┌───────▼───────┐                                   │
//! │                     │     Book      │ isbn, author, image urls          │
//! │                     └───────┬───────┘                                   │
//! │                     ┌───────▼───────┐                                   │
//! │                     │     Price     │ one inventory record              │
//! │                     │ cents, qty    │ (book + condition)                │
//! │                     └───────┬───────┘                                   │
//! │   ┌───────────────┐ ┌───────▼───────┐                                   │
//! │   │     Order     │◄┤  OrderDetail  │ unit price frozen at sale time    │
//! │   │ status, dates │ └───────────────┘                                   │
//! │   └───────────────┘                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every entity has a UUID v4 `id` generated by the caller before insert.
//! Audit fields (`updated_by`, `updated_on`) are written by the services at
//! save time and never derived on read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Column, Entity, Kind, Value};
use crate::money::Money;

// =============================================================================
// Reference Data
// =============================================================================

/// Name-only lookup tables referenced by `Book`.
///
/// Lets one catalog service manage genres, publishers, types and conditions.
pub trait ReferenceData: Entity {
    /// Singular label used in validation messages ("genre").
    const LABEL: &'static str;

    /// Creates a new record with a fresh id.
    fn new(name: impl Into<String>) -> Self;

    fn name(&self) -> &str;

    fn set_name(&mut self, name: String);
}

const REFERENCE_COLUMNS: &[Column] = &[
    Column::new("id", Kind::Text),
    Column::new("name", Kind::Text),
];

macro_rules! reference_entity {
    ($(#[$doc:meta])* $ty:ident, $table:literal, $label:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
        pub struct $ty {
            pub id: String,
            pub name: String,
        }

        impl Entity for $ty {
            const NAME: &'static str = stringify!($ty);
            const TABLE: &'static str = $table;
            const COLUMNS: &'static [Column] = REFERENCE_COLUMNS;

            fn id(&self) -> &str {
                &self.id
            }

            fn field(&self, column: &str) -> Option<Value> {
                match column {
                    "id" => Some(Value::from(&self.id)),
                    "name" => Some(Value::from(&self.name)),
                    _ => None,
                }
            }
        }

        impl ReferenceData for $ty {
            const LABEL: &'static str = $label;

            fn new(name: impl Into<String>) -> Self {
                $ty {
                    id: new_id(),
                    name: name.into(),
                }
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn set_name(&mut self, name: String) {
                self.name = name;
            }
        }
    };
}

reference_entity!(
    /// A literary genre ("Science Fiction").
    Genre, "genres", "genre"
);
reference_entity!(
    /// A publishing house.
    Publisher, "publishers", "publisher"
);
reference_entity!(
    /// Physical format ("Hardcover", "Paperback").
    BookType, "book_types", "type"
);
reference_entity!(
    /// Copy condition ("Like New", "Acceptable").
    Condition, "conditions", "condition"
);

/// Generates a new UUID v4 identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// =============================================================================
// Book
// =============================================================================

/// A title in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Book {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub name: String,

    pub author: String,

    /// Blurb shown on the product page.
    pub summary: Option<String>,

    /// ISBN-10 or ISBN-13, hyphens allowed.
    pub isbn: String,

    pub genre_id: String,
    pub publisher_id: String,
    pub book_type_id: String,
    pub condition_id: String,

    /// Image URLs resolved by the upload pipeline.
    pub front_url: Option<String>,
    pub back_url: Option<String>,
    pub left_url: Option<String>,
    pub right_url: Option<String>,

    /// Whether the book is listed (soft delete clears it).
    pub is_active: bool,

    /// Username of the last editor.
    pub updated_by: Option<String>,

    pub updated_on: DateTime<Utc>,
}

impl Book {
    /// Image URLs that are set, in front/back/left/right order.
    pub fn image_urls(&self) -> Vec<&str> {
        [&self.front_url, &self.back_url, &self.left_url, &self.right_url]
            .into_iter()
            .filter_map(|u| u.as_deref())
            .filter(|u| !u.trim().is_empty())
            .collect()
    }
}

impl Entity for Book {
    const NAME: &'static str = "Book";
    const TABLE: &'static str = "books";
    const COLUMNS: &'static [Column] = &[
        Column::new("id", Kind::Text),
        Column::new("name", Kind::Text),
        Column::new("author", Kind::Text),
        Column::new("summary", Kind::Text),
        Column::new("isbn", Kind::Text),
        Column::new("genre_id", Kind::Text),
        Column::new("publisher_id", Kind::Text),
        Column::new("book_type_id", Kind::Text),
        Column::new("condition_id", Kind::Text),
        Column::new("front_url", Kind::Text),
        Column::new("back_url", Kind::Text),
        Column::new("left_url", Kind::Text),
        Column::new("right_url", Kind::Text),
        Column::new("is_active", Kind::Bool),
        Column::new("updated_by", Kind::Text),
        Column::new("updated_on", Kind::Timestamp),
    ];
    const ACTIVE_COLUMN: Option<&'static str> = Some("is_active");

    fn id(&self) -> &str {
        &self.id
    }

    fn field(&self, column: &str) -> Option<Value> {
        let v = match column {
            "id" => Value::from(&self.id),
            "name" => Value::from(&self.name),
            "author" => Value::from(&self.author),
            "summary" => Value::from(self.summary.clone()),
            "isbn" => Value::from(&self.isbn),
            "genre_id" => Value::from(&self.genre_id),
            "publisher_id" => Value::from(&self.publisher_id),
            "book_type_id" => Value::from(&self.book_type_id),
            "condition_id" => Value::from(&self.condition_id),
            "front_url" => Value::from(self.front_url.clone()),
            "back_url" => Value::from(self.back_url.clone()),
            "left_url" => Value::from(self.left_url.clone()),
            "right_url" => Value::from(self.right_url.clone()),
            "is_active" => Value::Bool(self.is_active),
            "updated_by" => Value::from(self.updated_by.clone()),
            "updated_on" => Value::Timestamp(self.updated_on),
            _ => return None,
        };
        Some(v)
    }

    fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }
}

// =============================================================================
// Price (Inventory Record)
// =============================================================================

/// One priced stock line: a book in a given condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Price {
    pub id: String,
    pub book_id: String,
    pub condition_id: String,
    /// Price in cents (smallest currency unit).
    pub price_cents: i64,
    /// Copies in stock.
    pub quantity: i64,
    pub is_active: bool,
    pub updated_by: Option<String>,
    pub updated_on: DateTime<Utc>,
}

impl Price {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

impl Entity for Price {
    const NAME: &'static str = "Price";
    const TABLE: &'static str = "prices";
    const COLUMNS: &'static [Column] = &[
        Column::new("id", Kind::Text),
        Column::new("book_id", Kind::Text),
        Column::new("condition_id", Kind::Text),
        Column::new("price_cents", Kind::Int),
        Column::new("quantity", Kind::Int),
        Column::new("is_active", Kind::Bool),
        Column::new("updated_by", Kind::Text),
        Column::new("updated_on", Kind::Timestamp),
    ];
    const ACTIVE_COLUMN: Option<&'static str> = Some("is_active");

    fn id(&self) -> &str {
        &self.id
    }

    fn field(&self, column: &str) -> Option<Value> {
        let v = match column {
            "id" => Value::from(&self.id),
            "book_id" => Value::from(&self.book_id),
            "condition_id" => Value::from(&self.condition_id),
            "price_cents" => Value::Int(self.price_cents),
            "quantity" => Value::Int(self.quantity),
            "is_active" => Value::Bool(self.is_active),
            "updated_by" => Value::from(self.updated_by.clone()),
            "updated_on" => Value::Timestamp(self.updated_on),
            _ => return None,
        };
        Some(v)
    }

    fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Fulfilment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Checkout completed, nothing picked yet.
    JustPlaced,
    Pending,
    EnRoute,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Stored spelling, matching the serde/sqlx representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::JustPlaced => "just_placed",
            OrderStatus::Pending => "pending",
            OrderStatus::EnRoute => "en_route",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "just_placed" => Some(OrderStatus::JustPlaced),
            "pending" => Some(OrderStatus::Pending),
            "en_route" => Some(OrderStatus::EnRoute),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::JustPlaced
    }
}

impl From<OrderStatus> for Value {
    fn from(s: OrderStatus) -> Self {
        Value::Text(s.as_str().to_string())
    }
}

// =============================================================================
// Order
// =============================================================================

/// A customer order. Its lines live in `OrderDetail`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Order {
    const NAME: &'static str = "Order";
    const TABLE: &'static str = "orders";
    const COLUMNS: &'static [Column] = &[
        Column::new("id", Kind::Text),
        Column::new("status", Kind::Text),
        Column::new("created_at", Kind::Timestamp),
        Column::new("updated_at", Kind::Timestamp),
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn field(&self, column: &str) -> Option<Value> {
        let v = match column {
            "id" => Value::from(&self.id),
            "status" => Value::from(self.status),
            "created_at" => Value::Timestamp(self.created_at),
            "updated_at" => Value::Timestamp(self.updated_at),
            _ => return None,
        };
        Some(v)
    }
}

// =============================================================================
// Order Detail
// =============================================================================

/// A line of an order.
/// Uses snapshot pattern: the unit price is frozen when the order is placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderDetail {
    pub id: String,
    pub order_id: String,
    pub book_id: String,
    pub price_id: String,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    pub quantity: i64,
}

impl OrderDetail {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Unit price × quantity.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

impl Entity for OrderDetail {
    const NAME: &'static str = "OrderDetail";
    const TABLE: &'static str = "order_details";
    const COLUMNS: &'static [Column] = &[
        Column::new("id", Kind::Text),
        Column::new("order_id", Kind::Text),
        Column::new("book_id", Kind::Text),
        Column::new("price_id", Kind::Text),
        Column::new("unit_price_cents", Kind::Int),
        Column::new("quantity", Kind::Int),
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn field(&self, column: &str) -> Option<Value> {
        let v = match column {
            "id" => Value::from(&self.id),
            "order_id" => Value::from(&self.order_id),
            "book_id" => Value::from(&self.book_id),
            "price_id" => Value::from(&self.price_id),
            "unit_price_cents" => Value::Int(self.unit_price_cents),
            "quantity" => Value::Int(self.quantity),
            _ => return None,
        };
        Some(v)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_book() -> Book {
        Book {
            id: new_id(),
            name: "A Wizard of Earthsea".to_string(),
            author: "Ursula K. Le Guin".to_string(),
            summary: None,
            isbn: "978-0-547-77374-3".to_string(),
            genre_id: new_id(),
            publisher_id: new_id(),
            book_type_id: new_id(),
            condition_id: new_id(),
            front_url: Some("https://img/front.jpg".to_string()),
            back_url: None,
            left_url: Some("  ".to_string()),
            right_url: Some("https://img/right.jpg".to_string()),
            is_active: true,
            updated_by: None,
            updated_on: Utc::now(),
        }
    }

    /// Every declared column must be readable, in declaration order.
    fn assert_columns_readable<E: Entity>(entity: &E) {
        assert_eq!(E::COLUMNS[0].name, "id");
        for column in E::COLUMNS {
            assert!(
                entity.field(column.name).is_some(),
                "{}.{} not readable",
                E::NAME,
                column.name
            );
        }
        assert_eq!(entity.values().len(), E::COLUMNS.len());
        assert!(entity.field("no_such_column").is_none());
    }

    #[test]
    fn test_columns_match_fields() {
        assert_columns_readable(&sample_book());
        assert_columns_readable(&Genre::new("Fantasy"));
        assert_columns_readable(&Condition::new("Good"));
        assert_columns_readable(&Order {
            id: new_id(),
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        assert_columns_readable(&OrderDetail {
            id: new_id(),
            order_id: new_id(),
            book_id: new_id(),
            price_id: new_id(),
            unit_price_cents: 500,
            quantity: 2,
        });
    }

    #[test]
    fn test_book_image_urls_skip_blank() {
        let book = sample_book();
        assert_eq!(
            book.image_urls(),
            vec!["https://img/front.jpg", "https://img/right.jpg"]
        );
    }

    #[test]
    fn test_set_active() {
        let mut book = sample_book();
        book.set_active(false);
        assert_eq!(book.field("is_active"), Some(Value::Bool(false)));
    }

    #[test]
    fn test_order_status_spelling() {
        for status in [
            OrderStatus::JustPlaced,
            OrderStatus::Pending,
            OrderStatus::EnRoute,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::default(), OrderStatus::JustPlaced);
    }

    #[test]
    fn test_line_total() {
        let detail = OrderDetail {
            id: new_id(),
            order_id: new_id(),
            book_id: new_id(),
            price_id: new_id(),
            unit_price_cents: 1299,
            quantity: 3,
        };
        assert_eq!(detail.line_total().cents(), 3897);
    }
}
