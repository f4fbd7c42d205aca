//! # Bookstore Admin Command Line
//!
//! Runs one back-office operation and prints the result as JSON.
//!
//! ## Usage
//! ```bash
//! bookstore-admin dashboard
//! bookstore-admin books --start 0 --count 20
//! bookstore-admin book <book-id> > book.json
//! bookstore-admin save-book book.json
//! bookstore-admin search author "le guin" --page 2 --sort name --order desc
//! bookstore-admin suggest dune --limit 5
//! bookstore-admin details <book-id>
//! bookstore-admin save-price price.json
//! bookstore-admin low-stock --threshold 3
//! bookstore-admin deactivate <book-id>
//! bookstore-admin genres
//! bookstore-admin add-genre "Science Fiction"
//! bookstore-admin rename-genre "Sci-Fi" "Science Fiction"
//! bookstore-admin orders --status pending
//! bookstore-admin order <order-id>
//! bookstore-admin order-status <order-id> delivered
//!
//! # Use a specific config file
//! bookstore-admin --config ./bookstore.toml dashboard
//! ```

use anyhow::{bail, Context};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};
use tracing::info;

use bookstore_admin::services::{SearchField, SearchSort, SortField, SortOrder};
use bookstore_admin::{
    init_tracing, AdminConfig, CatalogService, DashboardService, InventoryService, OrderService,
    Repositories,
};
use bookstore_core::{Book, OrderStatus, Price};
use bookstore_db::Database;

/// Name suggestions returned when `--limit` is not given.
const DEFAULT_SUGGESTIONS: usize = 10;

const USAGE: &str = "\
Usage: bookstore-admin [--config <PATH>] [--user <NAME>] <COMMAND> [ARGS]

Commands:
  dashboard                          Sales rankings and monthly series
  books [--start N] [--count N]      Active books, paged
  book <BOOK_ID>                     One book as editable JSON
  save-book <FILE>                   Create or update a book from JSON
  search <FIELD> <TERM> [--page N] [--sort COL] [--order asc|desc]
                                     FIELD is name, author, isbn or summary;
                                     COL is added, name, author, isbn or updated
  suggest <TERM> [--limit N]         Distinct book names containing TERM
  details <BOOK_ID>                  Book with names, images and prices
  save-price <FILE>                  Create or update a price from JSON
  low-stock [--threshold N]          Inventory records running out
  deactivate <BOOK_ID>               Delete a book under the delete policy
  genres | publishers | types | conditions
  add-genre | add-publisher | add-type | add-condition <NAME>
  rename-genre | rename-publisher | rename-type | rename-condition <ACTUAL> <NAME>
  orders [--status STATUS]           Orders, optionally in one status
  order <ORDER_ID>                   Order with lines and total
  order-status <ORDER_ID> <STATUS>   just_placed, pending, en_route, delivered, cancelled";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args: Vec<String> = env::args().skip(1).collect();

    let config_path = take_option(&mut args, "--config").map(PathBuf::from);
    let username = take_option(&mut args, "--user").unwrap_or_else(|| "admin".to_string());

    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = AdminConfig::load(config_path).context("loading configuration")?;
    init_tracing(&config.logging.filter);

    info!(db = ?config.database.path, policy = ?config.database.delete_policy, "Starting bookstore admin");

    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("creating database directory")?;
        }
    }

    let db = Database::new(config.db_config())
        .await
        .context("opening database")?;
    let ctx = db.context();
    let repos = Repositories::sqlite(&ctx);

    let result = run(&config, repos, &username, args).await;

    db.close().await;
    result
}

async fn run(
    config: &AdminConfig,
    repos: Repositories,
    username: &str,
    mut args: Vec<String>,
) -> anyhow::Result<()> {
    let command = args.remove(0);
    let inventory = || InventoryService::new(repos.clone(), &config.inventory);
    let catalog = || CatalogService::new(repos.clone());
    let orders = || OrderService::new(repos.clone());

    match command.as_str() {
        "dashboard" => {
            let service = DashboardService::new(repos.clone(), config.dashboard.top_n);
            print_json(&service.dashboard().await?)
        }
        "books" => {
            let start = take_number(&mut args, "--start")?.unwrap_or(0);
            let count = take_number(&mut args, "--count")?.unwrap_or(config.inventory.page_size);
            print_json(&inventory().get_books(username, start, count).await?)
        }
        "book" => print_json(&inventory().get_book(arg(&args, 0, "BOOK_ID")?).await?),
        "save-book" => {
            let book: Book = read_json(arg(&args, 0, "FILE")?)?;
            print_json(&inventory().save_book(book, username).await?)
        }
        "search" => {
            let page = take_number(&mut args, "--page")?.unwrap_or(1);
            let by: SortField = take_option(&mut args, "--sort").unwrap_or_default().parse()?;
            let order: SortOrder = take_option(&mut args, "--order").unwrap_or_default().parse()?;
            let field: SearchField = arg(&args, 0, "FIELD")?.parse()?;
            let term = args.get(1).map(String::as_str).unwrap_or("");
            let sort = SearchSort::new(by, order);
            print_json(&inventory().search_books(field, term, page, sort).await?)
        }
        "suggest" => {
            let limit = take_number(&mut args, "--limit")?.unwrap_or(DEFAULT_SUGGESTIONS);
            print_json(&inventory().suggest_names(arg(&args, 0, "TERM")?, limit).await?)
        }
        "save-price" => {
            let price: Price = read_json(arg(&args, 0, "FILE")?)?;
            print_json(&inventory().save_price(price, username).await?)
        }
        "details" => print_json(&inventory().book_details(arg(&args, 0, "BOOK_ID")?).await?),
        "low-stock" => {
            let threshold = take_number(&mut args, "--threshold")?
                .unwrap_or(config.inventory.low_stock_threshold);
            print_json(&inventory().low_stock(threshold).await?)
        }
        "deactivate" => {
            let id = arg(&args, 0, "BOOK_ID")?;
            inventory().deactivate_book(id).await?;
            print_json(&serde_json::json!({ "deactivated": id }))
        }
        "genres" => print_json(&catalog().list_genres().await?),
        "publishers" => print_json(&catalog().list_publishers().await?),
        "types" => print_json(&catalog().list_book_types().await?),
        "conditions" => print_json(&catalog().list_conditions().await?),
        "add-genre" => print_json(&catalog().add_genre(arg(&args, 0, "NAME")?).await?),
        "add-publisher" => print_json(&catalog().add_publisher(arg(&args, 0, "NAME")?).await?),
        "add-type" => print_json(&catalog().add_book_type(arg(&args, 0, "NAME")?).await?),
        "add-condition" => print_json(&catalog().add_condition(arg(&args, 0, "NAME")?).await?),
        "rename-genre" => {
            let (actual, name) = (arg(&args, 0, "ACTUAL")?, arg(&args, 1, "NAME")?);
            print_json(&catalog().rename_genre(actual, name).await?)
        }
        "rename-publisher" => {
            let (actual, name) = (arg(&args, 0, "ACTUAL")?, arg(&args, 1, "NAME")?);
            print_json(&catalog().rename_publisher(actual, name).await?)
        }
        "rename-type" => {
            let (actual, name) = (arg(&args, 0, "ACTUAL")?, arg(&args, 1, "NAME")?);
            print_json(&catalog().rename_book_type(actual, name).await?)
        }
        "rename-condition" => {
            let (actual, name) = (arg(&args, 0, "ACTUAL")?, arg(&args, 1, "NAME")?);
            print_json(&catalog().rename_condition(actual, name).await?)
        }
        "orders" => {
            let status = match take_option(&mut args, "--status") {
                Some(raw) => Some(parse_status(&raw)?),
                None => None,
            };
            print_json(&orders().list_orders(status).await?)
        }
        "order" => print_json(&orders().get_order(arg(&args, 0, "ORDER_ID")?).await?),
        "order-status" => {
            let id = arg(&args, 0, "ORDER_ID")?;
            let status = parse_status(arg(&args, 1, "STATUS")?)?;
            print_json(&orders().update_status(id, status).await?)
        }
        other => bail!("unknown command '{}'\n\n{}", other, USAGE),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let path = Path::new(path);
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn parse_status(raw: &str) -> anyhow::Result<OrderStatus> {
    match OrderStatus::parse(raw) {
        Some(status) => Ok(status),
        None => bail!("unknown order status '{}'", raw),
    }
}

/// Removes `--name VALUE` from `args`.
fn take_option(args: &mut Vec<String>, name: &str) -> Option<String> {
    let at = args.iter().position(|a| a == name)?;
    if at + 1 >= args.len() {
        args.remove(at);
        return None;
    }
    let value = args.remove(at + 1);
    args.remove(at);
    Some(value)
}

fn take_number<T: std::str::FromStr>(args: &mut Vec<String>, name: &str) -> anyhow::Result<Option<T>> {
    match take_option(args, name) {
        Some(raw) => match raw.parse() {
            Ok(n) => Ok(Some(n)),
            Err(_) => bail!("{} expects a number, got '{}'", name, raw),
        },
        None => Ok(None),
    }
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> anyhow::Result<&'a str> {
    match args.get(index) {
        Some(value) => Ok(value.as_str()),
        None => bail!("missing <{}>\n\n{}", name, USAGE),
    }
}
