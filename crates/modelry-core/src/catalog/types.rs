//! Core type definitions for the catalog.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar data types an attribute can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point.
    Float,
    /// UTF-8 string.
    Text,
    /// Calendar date.
    Date,
}

impl ScalarType {
    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarType::Int | ScalarType::Float)
    }

    /// SQL column type used by relational stores.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ScalarType::Bool | ScalarType::Int => "integer",
            ScalarType::Float => "real",
            ScalarType::Text | ScalarType::Date => "text",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::Bool => "bool",
            ScalarType::Int => "int",
            ScalarType::Float => "float",
            ScalarType::Text => "text",
            ScalarType::Date => "date",
        };
        f.write_str(name)
    }
}
