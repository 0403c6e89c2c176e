//! Runtime attribute values.

use crate::catalog::ScalarType;
use crate::error::{Error, Result};
use crate::instance::Instance;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::fmt;

/// Date format used for textual input and storage.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A runtime attribute value.
///
/// Scalars map to the catalog's [`ScalarType`]s. `Entity` carries an already-resolved
/// related instance, as produced by relationship resolution or assigned by callers.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 string.
    Text(String),
    /// Calendar date.
    Date(NaiveDate),
    /// A related instance.
    Entity(Box<Instance>),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as f64, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as date.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Try to get as a related instance.
    pub fn as_entity(&self) -> Option<&Instance> {
        match self {
            Value::Entity(inst) => Some(inst),
            _ => None,
        }
    }

    /// Short name of the value's kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
            Value::Entity(_) => "entity",
        }
    }

    /// Convert to the given scalar type.
    ///
    /// Text is parsed; integers widen to floats and whole floats narrow to integers.
    /// Null stays null. `attribute` names the target in error messages.
    pub fn coerce(self, attribute: &str, ty: ScalarType) -> Result<Value> {
        let mismatch = |v: &Value| {
            Error::invalid_value(attribute, format!("cannot convert {} to {}", v.kind(), ty))
        };

        match (self, ty) {
            (Value::Null, _) => Ok(Value::Null),
            (Value::Text(s), _) => parse_text(attribute, &s, ty),
            (v @ Value::Bool(_), ScalarType::Bool) => Ok(v),
            (Value::Int(i), ScalarType::Bool) if i == 0 || i == 1 => Ok(Value::Bool(i == 1)),
            (v @ Value::Int(_), ScalarType::Int) => Ok(v),
            (Value::Int(i), ScalarType::Float) => Ok(Value::Float(i as f64)),
            (v @ Value::Float(_), ScalarType::Float) => Ok(v),
            (Value::Float(f), ScalarType::Int) if f.fract() == 0.0 => {
                // 2^63 is exactly representable; i64::MAX is not.
                if f >= -(2f64.powi(63)) && f < 2f64.powi(63) {
                    Ok(Value::Int(f as i64))
                } else {
                    Err(Error::invalid_value(attribute, format!("{} is out of range for int", f)))
                }
            }
            (v @ Value::Date(_), ScalarType::Date) => Ok(v),
            (Value::Entity(inst), _) => Err(mismatch(&Value::Entity(inst))),
            (v, ScalarType::Text) => Ok(Value::Text(v.to_string())),
            (v, _) => Err(mismatch(&v)),
        }
    }

    /// Order two values of compatible kinds.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

fn parse_text(attribute: &str, text: &str, ty: ScalarType) -> Result<Value> {
    let invalid = || Error::invalid_value(attribute, format!("\"{}\" is not a valid {}", text, ty));
    let trimmed = text.trim();

    match ty {
        ScalarType::Text => Ok(Value::Text(text.to_string())),
        ScalarType::Bool => match trimmed.to_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
            "false" | "f" | "no" | "n" | "0" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        ScalarType::Int => trimmed.parse().map(Value::Int).map_err(|_| invalid()),
        ScalarType::Float => trimmed.parse().map(Value::Float).map_err(|_| invalid()),
        ScalarType::Date => NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
            .map(Value::Date)
            .map_err(|_| invalid()),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("None"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Entity(inst) => write!(f, "{}", inst),
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
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<Instance> for Value {
    fn from(v: Instance) -> Self {
        Value::Entity(Box::new(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        assert!(Value::Null.is_null());
        assert!(!Value::Bool(true).is_null());

        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int(100).as_i64(), Some(100));
        assert_eq!(Value::Int(2).as_f64(), Some(2.0));
        assert_eq!(Value::Text("hello".into()).as_str(), Some("hello"));
    }

    #[test]
    fn test_value_conversions() {
        let v: Value = 42i32.into();
        assert_eq!(v, Value::Int(42));

        let v: Value = "hello".into();
        assert_eq!(v, Value::Text("hello".into()));

        let v: Value = None::<i64>.into();
        assert_eq!(v, Value::Null);
    }

    #[test]
    fn test_coerce_text() {
        assert_eq!(
            Value::from("42").coerce("age", ScalarType::Int).unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            Value::from("yes").coerce("active", ScalarType::Bool).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            Value::from("2.5").coerce("weight", ScalarType::Float).unwrap(),
            Value::Float(2.5)
        );
        assert_eq!(
            Value::from("1999-12-31").coerce("born", ScalarType::Date).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(1999, 12, 31).unwrap())
        );
    }

    #[test]
    fn test_coerce_failures() {
        let err = Value::from("abc").coerce("age", ScalarType::Int).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { attribute, .. } if attribute == "age"));

        assert!(Value::Float(1.5).coerce("age", ScalarType::Int).is_err());
        assert!(Value::Date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
            .coerce("age", ScalarType::Int)
            .is_err());
    }

    #[test]
    fn test_coerce_numeric_widening() {
        assert_eq!(
            Value::Int(3).coerce("x", ScalarType::Float).unwrap(),
            Value::Float(3.0)
        );
        assert_eq!(
            Value::Float(3.0).coerce("x", ScalarType::Int).unwrap(),
            Value::Int(3)
        );
        assert_eq!(Value::Null.coerce("x", ScalarType::Int).unwrap(), Value::Null);
        assert_eq!(
            Value::Int(7).coerce("x", ScalarType::Text).unwrap(),
            Value::Text("7".into())
        );
    }

    #[test]
    fn test_float_to_int_out_of_range() {
        for f in [1e300, -1e300, 9_223_372_036_854_775_808.0, f64::INFINITY] {
            assert!(
                matches!(Value::Float(f).coerce("x", ScalarType::Int), Err(Error::InvalidValue { .. })),
                "{}",
                f
            );
        }
        assert_eq!(
            Value::Float(-9_223_372_036_854_775_808.0).coerce("x", ScalarType::Int).unwrap(),
            Value::Int(i64::MIN)
        );
    }

    #[test]
    fn test_compare() {
        assert_eq!(Value::Int(1).compare(&Value::Int(2)), Some(Ordering::Less));
        assert_eq!(Value::Int(2).compare(&Value::Float(2.0)), Some(Ordering::Equal));
        assert_eq!(Value::Int(1).compare(&Value::Text("1".into())), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "None");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()).to_string(),
            "2024-03-09"
        );
    }
}
