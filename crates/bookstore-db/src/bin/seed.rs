//! # Seed Data Generator
//!
//! Populates the database with a small used-book catalog for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 books (default)
//! cargo run -p bookstore-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p bookstore-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p bookstore-db --bin seed -- --db ./data/bookstore.db
//! ```
//!
//! ## Generated Data
//! - Genres, publishers, book types and conditions
//! - `count` books cycling through the title list
//! - One inventory record per book: $2.99 - $24.99, stock 0 - 20
//! - One order per three books, spread over the last twelve months,
//!   each with one or two lines

use bookstore_core::{
    new_id, Book, BookType, Condition, Filter, Genre, Order, OrderDetail, OrderStatus, Price,
    Publisher, ReferenceData,
};
use bookstore_db::{Database, DbConfig, Repository};
use chrono::{Duration, Utc};
use std::env;

const GENRES: &[&str] = &[
    "Fantasy",
    "Science Fiction",
    "Mystery",
    "Romance",
    "History",
    "Poetry",
    "Biography",
];

const PUBLISHERS: &[&str] = &["Penguin", "Tor", "Orbit", "Vintage", "Faber & Faber"];

const BOOK_TYPES: &[&str] = &["Paperback", "Hardcover", "Mass Market"];

const CONDITIONS: &[&str] = &["Like New", "Very Good", "Good", "Acceptable"];

/// (title, author)
const TITLES: &[(&str, &str)] = &[
    ("A Wizard of Earthsea", "Ursula K. Le Guin"),
    ("The Left Hand of Darkness", "Ursula K. Le Guin"),
    ("Dune", "Frank Herbert"),
    ("Foundation", "Isaac Asimov"),
    ("The Big Sleep", "Raymond Chandler"),
    ("Gaudy Night", "Dorothy L. Sayers"),
    ("Persuasion", "Jane Austen"),
    ("The Guns of August", "Barbara W. Tuchman"),
    ("Ariel", "Sylvia Plath"),
    ("Long Walk to Freedom", "Nelson Mandela"),
    ("Kindred", "Octavia E. Butler"),
    ("The Name of the Rose", "Umberto Eco"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./bookstore_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Bookstore Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of books to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./bookstore_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Bookstore Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!("Books:    {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");

    let ctx = db.context();

    let existing = ctx.books().count(Filter::All).await?;
    if existing > 0 {
        println!("⚠ Database already has {} books", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();

    let genres = stage_reference::<Genre>(&ctx.genres(), GENRES).await?;
    let publishers = stage_reference::<Publisher>(&ctx.publishers(), PUBLISHERS).await?;
    let book_types = stage_reference::<BookType>(&ctx.book_types(), BOOK_TYPES).await?;
    let conditions = stage_reference::<Condition>(&ctx.conditions(), CONDITIONS).await?;

    let now = Utc::now();
    let mut prices: Vec<Price> = Vec::with_capacity(count);

    for seed in 0..count {
        let (title, author) = TITLES[seed % TITLES.len()];
        let condition = &conditions[seed % conditions.len()];
        let updated_on = now - Duration::days(((seed * 13) % 365) as i64);

        let book = Book {
            id: new_id(),
            name: if seed < TITLES.len() {
                title.to_string()
            } else {
                format!("{} ({})", title, seed / TITLES.len() + 1)
            },
            author: author.to_string(),
            summary: None,
            isbn: format!("978{:010}", seed),
            genre_id: genres[seed % genres.len()].id.clone(),
            publisher_id: publishers[seed % publishers.len()].id.clone(),
            book_type_id: book_types[seed % book_types.len()].id.clone(),
            condition_id: condition.id.clone(),
            front_url: None,
            back_url: None,
            left_url: None,
            right_url: None,
            is_active: true,
            updated_by: Some("seed".to_string()),
            updated_on,
        };

        let price = Price {
            id: new_id(),
            book_id: book.id.clone(),
            condition_id: condition.id.clone(),
            price_cents: 299 + ((seed * 37) % 2200) as i64, // $2.99 - $24.98
            quantity: (seed % 21) as i64,
            is_active: true,
            updated_by: Some("seed".to_string()),
            updated_on,
        };

        ctx.books().add(book).await?;
        ctx.prices().add(price.clone()).await?;
        prices.push(price);
    }

    let statuses = [
        OrderStatus::Delivered,
        OrderStatus::EnRoute,
        OrderStatus::Pending,
        OrderStatus::JustPlaced,
        OrderStatus::Cancelled,
    ];
    let mut orders = 0usize;
    let mut lines = 0usize;

    for (n, chunk) in prices.chunks(3).enumerate() {
        let created_at = now - Duration::days(((n * 29) % 365) as i64);
        let order = Order {
            id: new_id(),
            status: statuses[n % statuses.len()],
            created_at,
            updated_at: created_at,
        };

        for price in chunk.iter().take(1 + n % 2) {
            ctx.order_details()
                .add(OrderDetail {
                    id: new_id(),
                    order_id: order.id.clone(),
                    book_id: price.book_id.clone(),
                    price_id: price.id.clone(),
                    unit_price_cents: price.price_cents,
                    quantity: 1 + (n % 3) as i64,
                })
                .await?;
            lines += 1;
        }

        ctx.orders().add(order).await?;
        orders += 1;
    }

    let staged = ctx.save().await?;

    let elapsed = start.elapsed();
    println!();
    println!("✓ Committed {} rows in {:?}", staged, elapsed);

    let summary = serde_json::json!({
        "genres": genres.len(),
        "publishers": publishers.len(),
        "book_types": book_types.len(),
        "conditions": conditions.len(),
        "books": count,
        "orders": orders,
        "order_details": lines,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Stages one record per name and returns them.
async fn stage_reference<E: ReferenceData>(
    repo: &dyn Repository<E>,
    names: &[&str],
) -> Result<Vec<E>, Box<dyn std::error::Error>> {
    let mut records = Vec::with_capacity(names.len());
    for name in names {
        let record = E::new(*name);
        repo.add(record.clone()).await?;
        records.push(record);
    }
    Ok(records)
}
