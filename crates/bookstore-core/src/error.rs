//! # Error Types
//!
//! Domain-specific error types for bookstore-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bookstore-core errors (this file)                                     │
//! │  ├── CoreError        - Domain errors (bad filters, wrapped validation)│
//! │  └── ValidationError  - Admin form input failures                      │
//! │                                                                         │
//! │  bookstore-db errors (separate crate)                                  │
//! │  └── DbError          - NotFound + persistence failures                │
//! │                                                                         │
//! │  admin app errors                                                      │
//! │  └── AdminError       - What the presentation layer sees               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → AdminError              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (field, entity, value)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A filter references a column the entity does not have.
    ///
    /// ## When This Occurs
    /// - A search form posts a `search_by` value that is not mapped to a column
    /// - A filter built for one entity is run against another
    ///
    /// Field names are never interpolated into SQL unless they pass this check.
    #[error("{entity} has no field '{field}'")]
    UnknownField { entity: String, field: String },

    /// A filter compares a column against a value of the wrong kind.
    ///
    /// SQLite would happily compare `quantity < 'abc'` by storage class, so
    /// such filters are rejected up front instead of returning surprises.
    #[error("{entity}.{field}: {reason}")]
    InvalidFilter {
        entity: String,
        field: String,
        reason: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Admin form input errors.
///
/// Raised before anything is staged in a repository, so a rejected form never
/// reaches the database.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid ISBN, invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., a publisher that already exists).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// A rename that does not change anything.
    #[error("{field} '{value}' is unchanged")]
    Unchanged { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
