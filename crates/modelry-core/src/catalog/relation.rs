//! Relationship attributes between entities.

use serde::{Deserialize, Serialize};

/// A relationship attribute: a reference from one entity to exactly one instance of another.
///
/// The reference is stored in a local scalar column (conventionally `<name>_id`) holding the
/// target's identity. Nullability of the relationship is the nullability of that column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Relationship attribute name (e.g. `owner`).
    pub name: String,
    /// Target entity name.
    pub target: String,
    /// Local foreign-key field holding the target identity (e.g. `owner_id`).
    #[serde(default)]
    pub local_field: String,
}

impl RelationDef {
    /// Create a relationship whose local field follows the `<name>_id` convention.
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        let name = name.into();
        let local_field = format!("{}_id", name);
        Self {
            name,
            target: target.into(),
            local_field,
        }
    }

    /// Override the local foreign-key field.
    pub fn with_local_field(mut self, field: impl Into<String>) -> Self {
        self.local_field = field.into();
        self
    }

    /// Fill in the conventional local field when a schema file leaves it out.
    pub(crate) fn normalize(&mut self) {
        if self.local_field.is_empty() {
            self.local_field = format!("{}_id", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conventional_local_field() {
        let rel = RelationDef::new("owner", "Person");

        assert_eq!(rel.name, "owner");
        assert_eq!(rel.target, "Person");
        assert_eq!(rel.local_field, "owner_id");
    }

    #[test]
    fn test_custom_local_field() {
        let rel = RelationDef::new("author", "User").with_local_field("written_by");
        assert_eq!(rel.local_field, "written_by");
    }

    #[test]
    fn test_normalize_from_json() {
        let mut rel: RelationDef =
            serde_json::from_str(r#"{"name": "species", "target": "Species"}"#).unwrap();
        assert!(rel.local_field.is_empty());
        rel.normalize();
        assert_eq!(rel.local_field, "species_id");
    }
}
