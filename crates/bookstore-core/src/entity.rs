//! # Entity Contract
//!
//! The small amount of metadata every persisted type exposes so that one
//! generic repository can store it.
//!
//! ## Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  impl Entity for Book                                                   │
//! │                                                                         │
//! │   NAME          "Book"            used in errors and logs               │
//! │   TABLE         "books"           the only table this type touches      │
//! │   COLUMNS       [id, name, ...]   id first, declared kinds              │
//! │   ACTIVE_COLUMN Some("is_active") enables soft delete                   │
//! │                                                                         │
//! │   field("author") ──► Some(Value::Text("Le Guin"))                      │
//! │   field("price")  ──► None  (not a column)                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The database crate builds its statements from `TABLE` and `COLUMNS`; the
//! in-memory backend evaluates filters through `field`. Both therefore see
//! exactly the same set of columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

// =============================================================================
// Values
// =============================================================================

/// A single column value, as seen by filters and by statement binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The kind of a non-null value.
    pub fn kind(&self) -> Option<Kind> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(Kind::Bool),
            Value::Int(_) => Some(Kind::Int),
            Value::Text(_) => Some(Kind::Text),
            Value::Timestamp(_) => Some(Kind::Timestamp),
        }
    }

    /// Orders two values of the same kind.
    ///
    /// Returns `None` when either side is null or the kinds differ; callers
    /// treat that as "no match".
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// =============================================================================
// Columns
// =============================================================================

/// Declared storage kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Bool,
    Int,
    Text,
    Timestamp,
}

/// One persisted column of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: Kind,
}

impl Column {
    pub const fn new(name: &'static str, kind: Kind) -> Self {
        Column { name, kind }
    }
}

// =============================================================================
// Entity Trait
// =============================================================================

/// A persisted domain object with a unique string identifier.
///
/// ## Contract
/// - `COLUMNS[0]` is the identifier column (`id`)
/// - `field` returns `Some` for every name in `COLUMNS` and `None` otherwise
/// - entities that declare `ACTIVE_COLUMN` must implement `set_active`
pub trait Entity: Clone + Send + Sync + 'static {
    /// Human-readable type name ("Book").
    const NAME: &'static str;

    /// Backing table ("books").
    const TABLE: &'static str;

    /// Every stored column, identifier first.
    const COLUMNS: &'static [Column];

    /// Boolean column flipped by a soft delete, if the entity has one.
    const ACTIVE_COLUMN: Option<&'static str> = None;

    fn id(&self) -> &str;

    /// Reads one column by name.
    fn field(&self, column: &str) -> Option<Value>;

    fn set_active(&mut self, _active: bool) {}

    /// Column values in `COLUMNS` order.
    fn values(&self) -> Vec<Value> {
        Self::COLUMNS
            .iter()
            .map(|c| self.field(c.name).unwrap_or(Value::Null))
            .collect()
    }

    /// Looks up a column definition by name.
    fn column(name: &str) -> Option<&'static Column> {
        Self::COLUMNS.iter().find(|c| c.name == name)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
