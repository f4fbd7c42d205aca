//! # Validation Module
//!
//! Admin form validation for the bookstore back office.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Admin form (excluded view layer)                              │
//! │  └── Required markers, input types                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Admin services (Rust)                                         │
//! │  └── THIS MODULE: field rules, run before anything is staged            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── NOT NULL / CHECK constraints                                       │
//! │  └── Foreign keys, checked when the unit of work commits                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bookstore_core::validation::{validate_isbn, validate_quantity};
//!
//! assert!(validate_isbn("978-0-547-77374-3").is_ok());
//! assert!(validate_quantity(3).is_ok());
//! ```

use crate::error::ValidationError;
use crate::types::{Book, Price};
use crate::MAX_STOCK_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn required(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a book title. 1-200 characters.
pub fn validate_book_name(name: &str) -> ValidationResult<()> {
    required("name", name, 200)
}

/// Validates an author. 1-150 characters.
pub fn validate_author(author: &str) -> ValidationResult<()> {
    required("author", author, 150)
}

/// Validates the name of a genre, publisher, type or condition.
///
/// `field` is the reference label so messages read "publisher is required".
pub fn validate_reference_name(field: &str, name: &str) -> ValidationResult<()> {
    required(field, name, 100)
}

/// Validates an ISBN.
///
/// ## Rules
/// - Hyphens and spaces are ignored
/// - ISBN-13: 13 digits
/// - ISBN-10: 9 digits followed by a digit or `X`
///
/// Check digits are not verified.
///
/// ## Example
/// ```rust
/// use bookstore_core::validation::validate_isbn;
///
/// assert!(validate_isbn("0-306-40615-X").is_ok());
/// assert!(validate_isbn("9780306406157").is_ok());
/// assert!(validate_isbn("12345").is_err());
/// ```
pub fn validate_isbn(isbn: &str) -> ValidationResult<()> {
    let digits: Vec<char> = isbn
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect();

    if digits.is_empty() {
        return Err(ValidationError::Required {
            field: "isbn".to_string(),
        });
    }

    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "isbn".to_string(),
        reason: reason.to_string(),
    };

    match digits.len() {
        13 => {
            if digits.iter().all(char::is_ascii_digit) {
                Ok(())
            } else {
                Err(invalid("ISBN-13 must contain only digits"))
            }
        }
        10 => {
            let (body, check) = digits.split_at(9);
            let check_ok = check[0].is_ascii_digit() || check[0] == 'X' || check[0] == 'x';
            if body.iter().all(char::is_ascii_digit) && check_ok {
                Ok(())
            } else {
                Err(invalid("ISBN-10 must be 9 digits followed by a digit or X"))
            }
        }
        _ => Err(invalid("must have 10 or 13 digits")),
    }
}

/// Validates a search term.
///
/// ## Rules
/// - Can be empty (lists everything)
/// - Maximum 100 characters
///
/// ## Returns
/// The trimmed term.
pub fn validate_search_term(term: &str) -> ValidationResult<String> {
    let term = term.trim();

    if term.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "search term".to_string(),
            max: 100,
        });
    }

    Ok(term.to_string())
}

/// Validates the editable fields of a book before it is staged.
pub fn validate_book(book: &Book) -> ValidationResult<()> {
    validate_uuid(&book.id)?;
    validate_book_name(&book.name)?;
    validate_author(&book.author)?;
    validate_isbn(&book.isbn)?;

    if let Some(summary) = &book.summary {
        if summary.chars().count() > 4000 {
            return Err(ValidationError::TooLong {
                field: "summary".to_string(),
                max: 4000,
            });
        }
    }

    for (field, id) in [
        ("genre", &book.genre_id),
        ("publisher", &book.publisher_id),
        ("type", &book.book_type_id),
        ("condition", &book.condition_id),
    ] {
        if id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: field.to_string(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a stock quantity.
///
/// ## Rules
/// - Zero is allowed (sold out)
/// - Must not exceed MAX_STOCK_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if !(0..=MAX_STOCK_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: MAX_STOCK_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents. Must be positive.
///
/// ## Example
/// ```rust
/// use bookstore_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());
/// assert!(validate_price_cents(0).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "price".to_string(),
        });
    }

    Ok(())
}

/// Validates an inventory record before it is staged.
pub fn validate_price(price: &Price) -> ValidationResult<()> {
    validate_uuid(&price.id)?;
    validate_uuid(&price.book_id)?;
    if price.condition_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "condition".to_string(),
        });
    }
    validate_price_cents(price.price_cents)?;
    validate_quantity(price.quantity)
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string.
///
/// ## Example
/// ```rust
/// use bookstore_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
