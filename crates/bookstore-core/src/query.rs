//! # Filter Expressions
//!
//! The predicate passed to `Repository::get`, as plain data.
//!
//! ## Why a Tree
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Filter::eq("is_active", true).and(Filter::contains("name", "dune"))    │
//! │                                                                         │
//! │                    And                                                  │
//! │                   /   \                                                 │
//! │     Compare(is_active = true)   Compare(name contains 'dune')           │
//! │                                                                         │
//! │   bookstore-db   ──► WHERE (COALESCE(is_active = ?, 0)                  │
//! │                        AND COALESCE(instr(lower(name), lower(?)) > 0, 0))│
//! │   MemoryRepository ──► Filter::matches(&book)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Semantics (identical in both backends)
//! - `Eq`/`Ne` against `Value::Null` mean "is null" / "is not null"
//! - any other comparison involving a null is false
//! - `Contains` is an ASCII case-insensitive substring test on text columns
//! - an empty `And` is true, an empty `Or` is false
//! - `Not` is plain boolean negation (nulls were already folded to false)
//!
//! Field names are validated against `Entity::COLUMNS` before a filter is
//! evaluated or rendered, so a name never reaches SQL unchecked.

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, Kind, Value};
use crate::error::{CoreError, CoreResult};

// =============================================================================
// Operators
// =============================================================================

/// Comparison operator of a single `Compare` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
}

impl Op {
    /// SQL spelling for the ordering operators.
    pub fn sql(&self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "<>",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Contains => "CONTAINS",
        }
    }
}

// =============================================================================
// Filter
// =============================================================================

/// A boolean predicate over one entity's columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Matches every row.
    All,
    Compare {
        field: String,
        op: Op,
        value: Value,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Default for Filter {
    fn default() -> Self {
        Filter::All
    }
}

impl Filter {
    pub fn compare(field: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        Filter::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Op::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Op::Ne, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Op::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Op::Le, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Op::Gt, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Op::Ge, value)
    }

    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::compare(field, Op::Contains, Value::Text(needle.into()))
    }

    /// Shorthand for `eq("id", id)`.
    pub fn id(id: impl Into<String>) -> Self {
        Self::eq("id", Value::Text(id.into()))
    }

    /// Conjunction, flattening nested `And`s.
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut a), Filter::And(b)) => {
                a.extend(b);
                Filter::And(a)
            }
            (Filter::And(mut a), f) => {
                a.push(f);
                Filter::And(a)
            }
            (f, Filter::And(mut b)) => {
                b.insert(0, f);
                Filter::And(b)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }

    /// Disjunction, flattening nested `Or`s.
    pub fn or(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::Or(mut a), Filter::Or(b)) => {
                a.extend(b);
                Filter::Or(a)
            }
            (Filter::Or(mut a), f) => {
                a.push(f);
                Filter::Or(a)
            }
            (a, b) => Filter::Or(vec![a, b]),
        }
    }

    pub fn negate(self) -> Self {
        match self {
            Filter::Not(inner) => *inner,
            f => Filter::Not(Box::new(f)),
        }
    }

    /// Checks every referenced field against `E::COLUMNS`.
    ///
    /// ## Errors
    /// - `UnknownField` for a name that is not a column
    /// - `InvalidFilter` for a value of the wrong kind, or `Contains` on a
    ///   non-text column
    pub fn validate<E: Entity>(&self) -> CoreResult<()> {
        match self {
            Filter::All => Ok(()),
            Filter::Compare { field, op, value } => {
                let column = E::column(field).ok_or_else(|| CoreError::UnknownField {
                    entity: E::NAME.to_string(),
                    field: field.clone(),
                })?;

                let invalid = |reason: String| CoreError::InvalidFilter {
                    entity: E::NAME.to_string(),
                    field: field.clone(),
                    reason,
                };

                if *op == Op::Contains && column.kind != Kind::Text {
                    return Err(invalid("contains needs a text column".to_string()));
                }
                match value.kind() {
                    Some(kind) if kind != column.kind => Err(invalid(format!(
                        "expected {:?} value, got {:?}",
                        column.kind, kind
                    ))),
                    _ => Ok(()),
                }
            }
            Filter::And(parts) | Filter::Or(parts) => {
                parts.iter().try_for_each(|f| f.validate::<E>())
            }
            Filter::Not(inner) => inner.validate::<E>(),
        }
    }

    /// Evaluates the filter against one entity.
    ///
    /// Mismatched kinds evaluate to false; use [`Filter::validate`] to reject
    /// them instead.
    pub fn matches<E: Entity>(&self, entity: &E) -> CoreResult<bool> {
        match self {
            Filter::All => Ok(true),
            Filter::Compare { field, op, value } => {
                let actual = entity.field(field).ok_or_else(|| CoreError::UnknownField {
                    entity: E::NAME.to_string(),
                    field: field.clone(),
                })?;
                Ok(compare(&actual, *op, value))
            }
            Filter::And(parts) => {
                for part in parts {
                    if !part.matches(entity)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Filter::Or(parts) => {
                for part in parts {
                    if part.matches(entity)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Filter::Not(inner) => Ok(!inner.matches(entity)?),
        }
    }
}

fn compare(actual: &Value, op: Op, expected: &Value) -> bool {
    use std::cmp::Ordering::*;

    if expected.is_null() {
        return match op {
            Op::Eq => actual.is_null(),
            Op::Ne => !actual.is_null(),
            _ => false,
        };
    }

    if op == Op::Contains {
        return match (actual.as_text(), expected.as_text()) {
            (Some(haystack), Some(needle)) => haystack
                .to_ascii_lowercase()
                .contains(&needle.to_ascii_lowercase()),
            _ => false,
        };
    }

    match actual.compare(expected) {
        None => false,
        Some(ord) => match op {
            Op::Eq => ord == Equal,
            Op::Ne => ord != Equal,
            Op::Lt => ord == Less,
            Op::Le => ord != Greater,
            Op::Gt => ord == Greater,
            Op::Ge => ord != Less,
            Op::Contains => false,
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Column;

    #[derive(Clone)]
    struct Shelf {
        id: String,
        label: String,
        note: Option<String>,
        capacity: i64,
    }

    impl Entity for Shelf {
        const NAME: &'static str = "Shelf";
        const TABLE: &'static str = "shelves";
        const COLUMNS: &'static [Column] = &[
            Column::new("id", Kind::Text),
            Column::new("label", Kind::Text),
            Column::new("note", Kind::Text),
            Column::new("capacity", Kind::Int),
        ];

        fn id(&self) -> &str {
            &self.id
        }

        fn field(&self, column: &str) -> Option<Value> {
            match column {
                "id" => Some(self.id.clone().into()),
                "label" => Some(self.label.clone().into()),
                "note" => Some(self.note.clone().into()),
                "capacity" => Some(self.capacity.into()),
                _ => None,
            }
        }
    }

    fn shelf(label: &str, note: Option<&str>, capacity: i64) -> Shelf {
        Shelf {
            id: format!("id-{}", label),
            label: label.to_string(),
            note: note.map(str::to_string),
            capacity,
        }
    }

    #[test]
    fn test_compare_ops() {
        let s = shelf("Fantasy", None, 40);
        assert!(Filter::eq("capacity", 40i64).matches(&s).unwrap());
        assert!(Filter::lt("capacity", 41i64).matches(&s).unwrap());
        assert!(Filter::ge("capacity", 40i64).matches(&s).unwrap());
        assert!(!Filter::gt("capacity", 40i64).matches(&s).unwrap());
        assert!(Filter::ne("label", "Poetry").matches(&s).unwrap());
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let s = shelf("Science Fiction", None, 10);
        assert!(Filter::contains("label", "fiction").matches(&s).unwrap());
        assert!(Filter::contains("label", "SCIENCE").matches(&s).unwrap());
        assert!(!Filter::contains("label", "fantasy").matches(&s).unwrap());
    }

    #[test]
    fn test_null_semantics() {
        let s = shelf("Poetry", None, 5);
        assert!(Filter::eq("note", Value::Null).matches(&s).unwrap());
        assert!(!Filter::ne("note", Value::Null).matches(&s).unwrap());
        // a null column never equals or differs from a concrete value
        assert!(!Filter::eq("note", "x").matches(&s).unwrap());
        assert!(!Filter::ne("note", "x").matches(&s).unwrap());
        assert!(!Filter::contains("note", "x").matches(&s).unwrap());
        // but negation is plain boolean negation
        assert!(Filter::eq("note", "x").negate().matches(&s).unwrap());
    }

    #[test]
    fn test_combinators() {
        let s = shelf("History", Some("ground floor"), 12);
        let f = Filter::contains("note", "floor").and(Filter::gt("capacity", 10i64));
        assert!(f.matches(&s).unwrap());

        let f = Filter::eq("label", "Poetry").or(Filter::eq("label", "History"));
        assert!(f.matches(&s).unwrap());

        assert!(Filter::And(vec![]).matches(&s).unwrap());
        assert!(!Filter::Or(vec![]).matches(&s).unwrap());
        assert!(Filter::All.matches(&s).unwrap());
    }

    #[test]
    fn test_and_flattens() {
        let f = Filter::eq("label", "a")
            .and(Filter::eq("label", "b"))
            .and(Filter::eq("label", "c"));
        assert!(matches!(f, Filter::And(ref parts) if parts.len() == 3));
        assert_eq!(Filter::All.and(Filter::id("x")), Filter::id("x"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let s = shelf("Art", None, 1);
        let err = Filter::eq("price", 3i64).matches(&s).unwrap_err();
        assert!(matches!(err, CoreError::UnknownField { .. }));

        let err = Filter::eq("label", "x")
            .and(Filter::eq("label; DROP TABLE shelves", 1i64))
            .validate::<Shelf>()
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownField { ref field, .. } if field.starts_with("label;")));
    }

    #[test]
    fn test_validate_kinds() {
        assert!(Filter::lt("capacity", 3i64).validate::<Shelf>().is_ok());
        assert!(Filter::eq("note", Value::Null).validate::<Shelf>().is_ok());
        assert!(matches!(
            Filter::lt("capacity", "abc").validate::<Shelf>(),
            Err(CoreError::InvalidFilter { .. })
        ));
        assert!(matches!(
            Filter::contains("capacity", "1").validate::<Shelf>(),
            Err(CoreError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_filter_serializes() {
        let f = Filter::contains("label", "art");
        let json = serde_json::to_string(&f).unwrap();
        let back: Filter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }
}
