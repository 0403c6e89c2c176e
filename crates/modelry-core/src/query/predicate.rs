//! Predicate IR shared by the builder, the stores and the in-memory evaluator.

use crate::value::Value;
use std::collections::HashSet;

/// A boolean condition over one entity's columns.
///
/// A query's predicate list is conjunctive.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Equality (`field = value`).
    Eq { field: String, value: Value },
    /// Inequality (`field != value`).
    Ne { field: String, value: Value },
    /// Less than.
    Lt { field: String, value: Value },
    /// Less than or equal.
    Le { field: String, value: Value },
    /// Greater than.
    Gt { field: String, value: Value },
    /// Greater than or equal.
    Ge { field: String, value: Value },
    /// Membership in a set of values.
    In { field: String, values: Vec<Value> },
    /// Null check.
    IsNull { field: String },
    /// Not-null check.
    IsNotNull { field: String },
    /// SQL LIKE pattern (`%` any run, `_` one char, backslash escapes).
    Like { field: String, pattern: String },
    /// Negated LIKE.
    NotLike { field: String, pattern: String },
    /// Inclusive range.
    Between { field: String, low: Value, high: Value },
    /// All nested predicates hold.
    And(Vec<Predicate>),
    /// At least one nested predicate holds.
    Or(Vec<Predicate>),
    /// Matches nothing.
    Never,
}

impl Predicate {
    /// Equality, mapping null to [`Predicate::IsNull`].
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        match value.into() {
            Value::Null => Predicate::IsNull { field },
            value => Predicate::Eq { field, value },
        }
    }

    /// Inequality.
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Ne {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Less than.
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Lt {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Less than or equal.
    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Le {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Greater than.
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Gt {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Greater than or equal.
    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Ge {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Membership.
    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::In {
            field: field.into(),
            values,
        }
    }

    /// LIKE pattern.
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Predicate::Like {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    /// Inclusive range.
    pub fn between(field: impl Into<String>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Predicate::Between {
            field: field.into(),
            low: low.into(),
            high: high.into(),
        }
    }

    /// Column names referenced by this predicate.
    pub fn fields(&self) -> HashSet<&str> {
        let mut fields = HashSet::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, fields: &mut HashSet<&'a str>) {
        match self {
            Predicate::Eq { field, .. }
            | Predicate::Ne { field, .. }
            | Predicate::Lt { field, .. }
            | Predicate::Le { field, .. }
            | Predicate::Gt { field, .. }
            | Predicate::Ge { field, .. }
            | Predicate::In { field, .. }
            | Predicate::IsNull { field }
            | Predicate::IsNotNull { field }
            | Predicate::Like { field, .. }
            | Predicate::NotLike { field, .. }
            | Predicate::Between { field, .. } => {
                fields.insert(field);
            }
            Predicate::And(nested) | Predicate::Or(nested) => {
                for p in nested {
                    p.collect_fields(fields);
                }
            }
            Predicate::Never => {}
        }
    }

    /// Check if this predicate can never match.
    pub fn is_never(&self) -> bool {
        match self {
            Predicate::Never => true,
            Predicate::And(nested) => nested.iter().any(Predicate::is_never),
            Predicate::Or(nested) => !nested.is_empty() && nested.iter().all(Predicate::is_never),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_null_becomes_is_null() {
        assert_eq!(
            Predicate::eq("owner_id", Value::Null),
            Predicate::IsNull {
                field: "owner_id".into()
            }
        );
        assert!(matches!(Predicate::eq("age", 3), Predicate::Eq { .. }));
    }

    #[test]
    fn test_fields() {
        let p = Predicate::Or(vec![
            Predicate::eq("name", "Rex"),
            Predicate::And(vec![Predicate::gt("age", 3), Predicate::lt("age", 9)]),
        ]);
        let fields = p.fields();

        assert_eq!(fields.len(), 2);
        assert!(fields.contains("name"));
        assert!(fields.contains("age"));
    }

    #[test]
    fn test_is_never() {
        assert!(Predicate::Never.is_never());
        assert!(Predicate::And(vec![Predicate::eq("a", 1), Predicate::Never]).is_never());
        assert!(!Predicate::Or(vec![Predicate::eq("a", 1), Predicate::Never]).is_never());
        assert!(!Predicate::Or(vec![]).is_never());
    }
}
