//! Entity definitions.

use super::field::{DefaultValue, FieldDef};
use super::relation::RelationDef;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default identity attribute name.
pub const DEFAULT_IDENTITY: &str = "id";

/// An entity type: a declared record shape with ordered scalar and relationship attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Entity name (unique within the registry, case-insensitively).
    pub name: String,
    /// Name of the identity field.
    #[serde(default = "default_identity")]
    pub identity_field: String,
    /// Scalar attributes in declaration order.
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Relationship attributes in declaration order.
    #[serde(default)]
    pub relations: Vec<RelationDef>,
    /// How instances of this entity are presented.
    #[serde(default)]
    pub presentation: Presentation,
}

fn default_identity() -> String {
    DEFAULT_IDENTITY.to_string()
}

/// Presentation metadata for an entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Presentation {
    /// Attributes listed by the default rendering (all attributes when unset).
    pub display_attributes: Option<Vec<String>>,
    /// Type-level render template.
    pub custom_template: Option<String>,
    /// Template used when an instance is offered as a picker option.
    pub option_template: Option<String>,
    /// Template used when an instance appears as a translated table cell.
    pub table_template: Option<String>,
    /// Default table columns.
    pub table_attributes: Option<Vec<String>>,
    /// Attribute values passed through the translator.
    pub translate_values: TranslateValues,
    /// Print listings as a table instead of one rendered line per instance.
    pub print_as_table: bool,
    /// Attribute used to resolve a bare value into an instance of this entity.
    pub default_filter_attribute: Option<String>,
    /// Static choice lists for scalar attributes.
    pub attribute_options: BTreeMap<String, Vec<AttributeOption>>,
}

/// Which attribute values get translated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TranslateValues {
    /// `true` translates every attribute, `false` none.
    Flag(bool),
    /// Translate only the listed attributes.
    Only(Vec<String>),
}

impl Default for TranslateValues {
    fn default() -> Self {
        TranslateValues::Flag(false)
    }
}

/// A labelled static choice for a scalar attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeOption {
    /// Label shown to the user.
    pub label: String,
    /// Value assigned when chosen.
    pub value: DefaultValue,
}

/// Descriptor returned by attribute lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Attribute<'a> {
    /// A scalar column.
    Scalar(&'a FieldDef),
    /// A reference to another entity.
    Relation(&'a RelationDef),
}

impl<'a> Attribute<'a> {
    /// Attribute name.
    pub fn name(&self) -> &'a str {
        match self {
            Attribute::Scalar(f) => &f.name,
            Attribute::Relation(r) => &r.name,
        }
    }

    /// Check if this is a relationship attribute.
    pub fn is_relation(&self) -> bool {
        matches!(self, Attribute::Relation(_))
    }
}

/// Implemented by Rust types that declare an entity.
pub trait Model {
    /// Describe the entity type.
    fn describe() -> EntityDef;
}

impl EntityDef {
    /// Create a new entity definition with the default `id` identity field.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity_field: default_identity(),
            fields: Vec::new(),
            relations: Vec::new(),
            presentation: Presentation::default(),
        }
    }

    /// Use a different identity field.
    pub fn with_identity(mut self, field: impl Into<String>) -> Self {
        self.identity_field = field.into();
        self
    }

    /// Add a field to the entity.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add multiple fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Add a relationship.
    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    /// Restrict default rendering to these attributes.
    pub fn with_display_attributes<S: Into<String>>(mut self, attrs: impl IntoIterator<Item = S>) -> Self {
        self.presentation.display_attributes = Some(attrs.into_iter().map(Into::into).collect());
        self
    }

    /// Set the type-level render template.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.presentation.custom_template = Some(template.into());
        self
    }

    /// Set the picker option template.
    pub fn with_option_template(mut self, template: impl Into<String>) -> Self {
        self.presentation.option_template = Some(template.into());
        self
    }

    /// Set the table cell template.
    pub fn with_table_template(mut self, template: impl Into<String>) -> Self {
        self.presentation.table_template = Some(template.into());
        self
    }

    /// Set the default table columns.
    pub fn with_table_attributes<S: Into<String>>(mut self, attrs: impl IntoIterator<Item = S>) -> Self {
        self.presentation.table_attributes = Some(attrs.into_iter().map(Into::into).collect());
        self
    }

    /// Set which attribute values are translated.
    pub fn with_translate_values(mut self, translate: TranslateValues) -> Self {
        self.presentation.translate_values = translate;
        self
    }

    /// Print listings as a table.
    pub fn printed_as_table(mut self) -> Self {
        self.presentation.print_as_table = true;
        self
    }

    /// Set the default filter attribute.
    pub fn with_default_filter(mut self, attr: impl Into<String>) -> Self {
        self.presentation.default_filter_attribute = Some(attr.into());
        self
    }

    /// Offer a static choice list for a scalar attribute.
    pub fn with_attribute_options(mut self, attr: impl Into<String>, options: Vec<AttributeOption>) -> Self {
        self.presentation.attribute_options.insert(attr.into(), options);
        self
    }

    /// Attribute names in order: scalars first, then relationships.
    pub fn attributes(&self, ignore_relationship: bool) -> Vec<&str> {
        let scalars = self.fields.iter().map(|f| f.name.as_str());
        if ignore_relationship {
            scalars.collect()
        } else {
            scalars
                .chain(self.relations.iter().map(|r| r.name.as_str()))
                .collect()
        }
    }

    /// Look up an attribute descriptor by name.
    pub fn attribute(&self, name: &str) -> Option<Attribute<'_>> {
        if let Some(field) = self.get_field(name) {
            return Some(Attribute::Scalar(field));
        }
        self.get_relation(name).map(Attribute::Relation)
    }

    /// Look up an attribute descriptor, failing with [`Error::UnknownAttribute`].
    pub fn require_attribute(&self, name: &str) -> Result<Attribute<'_>> {
        self.attribute(name)
            .ok_or_else(|| Error::unknown_attribute(&self.name, name))
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get a relationship by name.
    pub fn get_relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Get the relationship stored in the given local field.
    pub fn relation_for_field(&self, field: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.local_field == field)
    }

    /// Get the identity field definition.
    pub fn get_identity_field(&self) -> Option<&FieldDef> {
        self.get_field(&self.identity_field)
    }

    /// Whether a relationship accepts null (the nullability of its local field).
    pub fn relation_nullable(&self, relation: &RelationDef) -> bool {
        self.get_field(&relation.local_field)
            .map(|f| f.nullable)
            .unwrap_or(true)
    }

    /// Attributes listed by the default rendering.
    pub fn display_attributes(&self) -> Vec<&str> {
        match &self.presentation.display_attributes {
            Some(attrs) => attrs.iter().map(String::as_str).collect(),
            None => self.attributes(false),
        }
    }

    /// Attributes whose values are translated.
    pub fn attributes_to_translate(&self) -> Vec<&str> {
        match &self.presentation.translate_values {
            TranslateValues::Flag(false) => Vec::new(),
            TranslateValues::Flag(true) => self.attributes(false),
            TranslateValues::Only(attrs) => attrs.iter().map(String::as_str).collect(),
        }
    }

    /// Whether the given attribute's value is translated.
    pub fn translates(&self, attr: &str) -> bool {
        match &self.presentation.translate_values {
            TranslateValues::Flag(flag) => *flag,
            TranslateValues::Only(attrs) => attrs.iter().any(|a| a == attr),
        }
    }

    /// Attribute used to resolve bare filter values; falls back to the identity field.
    pub fn default_filter_attribute(&self) -> &str {
        self.presentation
            .default_filter_attribute
            .as_deref()
            .unwrap_or(&self.identity_field)
    }

    /// Check internal consistency of this definition on its own.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.get_identity_field().is_none() {
            return Err(Error::InvalidSchema(format!(
                "{} has no identity field \"{}\"",
                self.name, self.identity_field
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for name in self.attributes(false) {
            if !seen.insert(name) {
                return Err(Error::InvalidSchema(format!(
                    "{} declares attribute \"{}\" twice",
                    self.name, name
                )));
            }
        }
        for relation in &self.relations {
            if self.get_field(&relation.local_field).is_none() {
                return Err(Error::InvalidSchema(format!(
                    "{}.{} refers to missing field \"{}\"",
                    self.name, relation.name, relation.local_field
                )));
            }
        }
        if let Some(attr) = &self.presentation.default_filter_attribute {
            if self.get_field(attr).is_none() {
                return Err(Error::InvalidSchema(format!(
                    "{} default filter attribute \"{}\" is not a field",
                    self.name, attr
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ScalarType;

    fn pet() -> EntityDef {
        EntityDef::new("Pet")
            .with_field(FieldDef::new("id", ScalarType::Int))
            .with_field(FieldDef::new("name", ScalarType::Text))
            .with_field(FieldDef::optional("owner_id", ScalarType::Int))
            .with_relation(RelationDef::new("owner", "Person"))
    }

    #[test]
    fn test_entity_builder() {
        let entity = pet();

        assert_eq!(entity.name, "Pet");
        assert_eq!(entity.identity_field, "id");
        assert_eq!(entity.fields.len(), 3);
        assert_eq!(entity.relations.len(), 1);
    }

    #[test]
    fn test_attributes_ignoring_relationships() {
        let entity = pet();

        let all = entity.attributes(false);
        let scalars = entity.attributes(true);
        assert_eq!(all, vec!["id", "name", "owner_id", "owner"]);
        assert_eq!(scalars, vec!["id", "name", "owner_id"]);
        assert!(scalars.iter().all(|a| all.contains(a)));
        assert!(scalars.iter().all(|a| !entity.attribute(a).unwrap().is_relation()));
    }

    #[test]
    fn test_attribute_lookup() {
        let entity = pet();

        assert!(matches!(entity.attribute("name"), Some(Attribute::Scalar(_))));
        assert!(matches!(entity.attribute("owner"), Some(Attribute::Relation(_))));
        assert!(entity.attribute("nonexistent").is_none());
        assert!(matches!(
            entity.require_attribute("nonexistent"),
            Err(Error::UnknownAttribute { .. })
        ));
        assert_eq!(entity.relation_for_field("owner_id").unwrap().name, "owner");
    }

    #[test]
    fn test_relation_nullability_follows_local_field() {
        let entity = pet();
        let owner = entity.get_relation("owner").unwrap();
        assert!(entity.relation_nullable(owner));

        let strict = EntityDef::new("Pet")
            .with_field(FieldDef::new("id", ScalarType::Int))
            .with_field(FieldDef::new("owner_id", ScalarType::Int))
            .with_relation(RelationDef::new("owner", "Person"));
        assert!(!strict.relation_nullable(strict.get_relation("owner").unwrap()));
    }

    #[test]
    fn test_translate_values() {
        let entity = pet().with_translate_values(TranslateValues::Only(vec!["name".into()]));
        assert!(entity.translates("name"));
        assert!(!entity.translates("owner"));
        assert_eq!(entity.attributes_to_translate(), vec!["name"]);

        let all = pet().with_translate_values(TranslateValues::Flag(true));
        assert_eq!(all.attributes_to_translate().len(), 4);
    }

    #[test]
    fn test_default_filter_falls_back_to_identity() {
        assert_eq!(pet().default_filter_attribute(), "id");
        assert_eq!(pet().with_default_filter("name").default_filter_attribute(), "name");
    }

    #[test]
    fn test_validate() {
        assert!(pet().validate().is_ok());

        let no_identity = EntityDef::new("Tag").with_field(FieldDef::new("label", ScalarType::Text));
        assert!(matches!(no_identity.validate(), Err(Error::InvalidSchema(_))));

        let dangling = EntityDef::new("Pet")
            .with_field(FieldDef::new("id", ScalarType::Int))
            .with_relation(RelationDef::new("owner", "Person"));
        assert!(matches!(dangling.validate(), Err(Error::InvalidSchema(_))));
    }

    #[test]
    fn test_presentation_from_json() {
        let entity: EntityDef = serde_json::from_str(
            r#"{
                "name": "Pet",
                "fields": [{"name": "id", "type": "int", "nullable": false}],
                "presentation": {"translate_values": ["name"], "print_as_table": true}
            }"#,
        )
        .unwrap();

        assert_eq!(entity.identity_field, "id");
        assert!(entity.presentation.print_as_table);
        assert_eq!(
            entity.presentation.translate_values,
            TranslateValues::Only(vec!["name".into()])
        );
    }
}
