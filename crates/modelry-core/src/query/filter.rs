//! Predicate evaluation against in-memory rows.
//!
//! Stores without a query language of their own (see `MemoryStore`) use [`FilterEvaluator`]
//! to decide whether a row matches a predicate list.

use super::predicate::Predicate;
use crate::value::Value;
use std::borrow::Cow;
use std::cmp::Ordering;

/// Evaluates predicates against rows of column values.
pub struct FilterEvaluator;

impl FilterEvaluator {
    /// Check whether a row satisfies every predicate.
    pub fn matches_all(predicates: &[Predicate], row: &[(String, Value)]) -> bool {
        predicates.iter().all(|p| Self::evaluate(p, row))
    }

    /// Evaluate a single predicate against a row.
    pub fn evaluate(predicate: &Predicate, row: &[(String, Value)]) -> bool {
        match predicate {
            Predicate::Eq { field, value } => Self::compare_field(row, field, value, Self::values_equal),
            Predicate::Ne { field, value } => {
                Self::compare_field(row, field, value, |a, b| !a.is_null() && !Self::values_equal(a, b))
            }
            Predicate::Lt { field, value } => Self::compare_field(row, field, value, |a, b| {
                a.compare(b).map(Ordering::is_lt).unwrap_or(false)
            }),
            Predicate::Le { field, value } => Self::compare_field(row, field, value, |a, b| {
                a.compare(b).map(Ordering::is_le).unwrap_or(false)
            }),
            Predicate::Gt { field, value } => Self::compare_field(row, field, value, |a, b| {
                a.compare(b).map(Ordering::is_gt).unwrap_or(false)
            }),
            Predicate::Ge { field, value } => Self::compare_field(row, field, value, |a, b| {
                a.compare(b).map(Ordering::is_ge).unwrap_or(false)
            }),
            Predicate::In { field, values } => match Self::get_field_value(row, field) {
                Some(fv) => values.iter().any(|v| Self::values_equal(fv, v)),
                None => false,
            },
            Predicate::IsNull { field } => {
                matches!(Self::get_field_value(row, field), None | Some(Value::Null))
            }
            Predicate::IsNotNull { field } => {
                !matches!(Self::get_field_value(row, field), None | Some(Value::Null))
            }
            Predicate::Like { field, pattern } => Self::get_field_value(row, field)
                .and_then(Self::like_operand)
                .is_some_and(|text| Self::like_match(&text, pattern)),
            Predicate::NotLike { field, pattern } => Self::get_field_value(row, field)
                .and_then(Self::like_operand)
                .is_some_and(|text| !Self::like_match(&text, pattern)),
            Predicate::Between { field, low, high } => {
                Self::compare_field(row, field, low, |a, lo| {
                    let above = a.compare(lo).map(Ordering::is_ge).unwrap_or(false);
                    let below = a.compare(high).map(Ordering::is_le).unwrap_or(false);
                    above && below
                })
            }
            Predicate::And(nested) => nested.iter().all(|p| Self::evaluate(p, row)),
            Predicate::Or(nested) => nested.iter().any(|p| Self::evaluate(p, row)),
            Predicate::Never => false,
        }
    }

    /// Get a field value from a row by name.
    fn get_field_value<'a>(row: &'a [(String, Value)], field: &str) -> Option<&'a Value> {
        row.iter().find(|(name, _)| name == field).map(|(_, v)| v)
    }

    /// Compare a field value with a comparator function.
    fn compare_field<F>(row: &[(String, Value)], field: &str, value: &Value, comparator: F) -> bool
    where
        F: FnOnce(&Value, &Value) -> bool,
    {
        match Self::get_field_value(row, field) {
            Some(fv) => comparator(fv, value),
            None => false, // Missing field doesn't match
        }
    }

    /// SQL equality: null never equals anything.
    fn values_equal(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Entity(a), Value::Entity(b)) => a.id().is_some() && a.id() == b.id(),
            _ => a.compare(b).map(Ordering::is_eq).unwrap_or(false),
        }
    }

    /// Match a string against a SQL LIKE pattern.
    ///
    /// Supports:
    /// - `%` matches zero or more characters
    /// - `_` matches exactly one character
    /// - `\\%` matches literal `%`
    /// - `\\_` matches literal `_`
    ///
    /// Runs in `O(value * pattern)`: on a mismatch only the most recent `%` is retried.
    pub fn like_match(value: &str, pattern: &str) -> bool {
        let tokens = LikeToken::parse(pattern);
        let chars: Vec<char> = value.chars().collect();

        let (mut t, mut c) = (0, 0);
        let mut retry: Option<(usize, usize)> = None;
        while c < chars.len() {
            match tokens.get(t) {
                Some(LikeToken::Any) => {
                    retry = Some((t, c));
                    t += 1;
                    continue;
                }
                Some(LikeToken::One) => {
                    t += 1;
                    c += 1;
                    continue;
                }
                Some(LikeToken::Char(p)) if *p == chars[c] => {
                    t += 1;
                    c += 1;
                    continue;
                }
                _ => {}
            }
            match retry {
                Some((any, from)) => {
                    t = any + 1;
                    c = from + 1;
                    retry = Some((any, from + 1));
                }
                None => return false,
            }
        }
        tokens[t..].iter().all(|token| *token == LikeToken::Any)
    }

    /// Text SQLite compares a LIKE pattern against. Null never matches.
    fn like_operand(value: &Value) -> Option<Cow<'_, str>> {
        match value {
            Value::Null => None,
            Value::Text(s) => Some(Cow::Borrowed(s)),
            Value::Bool(b) => Some(Cow::Borrowed(if *b { "1" } else { "0" })),
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => Some(Cow::Owned(format!("{:.1}", x))),
            Value::Entity(inst) => inst.id().and_then(Self::like_operand),
            other => Some(Cow::Owned(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LikeToken {
    Any,
    One,
    Char(char),
}

impl LikeToken {
    fn parse(pattern: &str) -> Vec<LikeToken> {
        let mut tokens = Vec::with_capacity(pattern.len());
        let mut chars = pattern.chars();
        while let Some(ch) = chars.next() {
            tokens.push(match ch {
                '%' => LikeToken::Any,
                '_' => LikeToken::One,
                '\\' => LikeToken::Char(chars.next().unwrap_or('\\')),
                other => LikeToken::Char(other),
            });
        }
        tokens
    }
}
