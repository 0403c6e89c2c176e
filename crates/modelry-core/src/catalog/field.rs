//! Scalar attribute definitions for entities.

use super::types::ScalarType;
use crate::error::Result;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// A scalar (column) attribute within an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Attribute name.
    pub name: String,
    /// Attribute data type.
    #[serde(rename = "type")]
    pub scalar_type: ScalarType,
    /// Whether the column accepts null.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Declared default, offered by the collector and applied by stores on insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
}

fn default_nullable() -> bool {
    true
}

/// Declared default value for a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// String value, coerced to the field type when used.
    Text(String),
}

impl DefaultValue {
    /// The literal as an untyped value.
    pub fn to_value(&self) -> Value {
        match self {
            DefaultValue::Bool(b) => Value::Bool(*b),
            DefaultValue::Int(i) => Value::Int(*i),
            DefaultValue::Float(f) => Value::Float(*f),
            DefaultValue::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl FieldDef {
    /// Create a new non-nullable field.
    pub fn new(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar_type,
            nullable: false,
            default: None,
        }
    }

    /// Create a nullable field.
    pub fn optional(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar_type,
            nullable: true,
            default: None,
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Check if this field has a default value.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// The declared default as a typed value, if any.
    pub fn default_value(&self) -> Result<Option<Value>> {
        let Some(default) = &self.default else {
            return Ok(None);
        };
        default
            .to_value()
            .coerce(&self.name, self.scalar_type)
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_field_def_builder() {
        let field = FieldDef::new("age", ScalarType::Int).with_default(DefaultValue::Int(18));

        assert_eq!(field.name, "age");
        assert!(!field.nullable);
        assert!(field.has_default());
        assert_eq!(field.default_value().unwrap(), Some(Value::Int(18)));
    }

    #[test]
    fn test_optional_field() {
        let field = FieldDef::optional("nickname", ScalarType::Text);

        assert!(field.nullable);
        assert!(!field.has_default());
        assert_eq!(field.default_value().unwrap(), None);
    }

    #[test]
    fn test_text_default_is_coerced() {
        let field = FieldDef::new("born", ScalarType::Date)
            .with_default(DefaultValue::Text("2020-01-31".into()));

        assert_eq!(
            field.default_value().unwrap(),
            Some(Value::Date(NaiveDate::from_ymd_opt(2020, 1, 31).unwrap()))
        );
    }

    #[test]
    fn test_field_from_json_defaults_to_nullable() {
        let field: FieldDef = serde_json::from_str(r#"{"name": "name", "type": "text"}"#).unwrap();
        assert!(field.nullable);
        assert_eq!(field.scalar_type, ScalarType::Text);
    }
}
