//! Registry of declared entity types.

use super::entity::{EntityDef, Model};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// All entity types known to an engine.
///
/// Populated once at startup and read-only afterwards. Lookup by name is case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    entities: Vec<Arc<EntityDef>>,
    by_name: HashMap<String, usize>,
}

/// On-disk schema document.
#[derive(Debug, Deserialize)]
struct SchemaDocument {
    entities: Vec<EntityDef>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a set of definitions and validate cross references.
    pub fn from_entities(entities: impl IntoIterator<Item = EntityDef>) -> Result<Self> {
        let mut registry = Self::new();
        for entity in entities {
            registry.register(entity)?;
        }
        registry.validate()?;
        Ok(registry)
    }

    /// Parse a JSON schema document of the form `{"entities": [...]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: SchemaDocument = serde_json::from_str(json)?;
        Self::from_entities(doc.entities)
    }

    /// Register a Rust type that describes itself.
    pub fn with_model<M: Model>(mut self) -> Result<Self> {
        self.register(M::describe())?;
        Ok(self)
    }

    /// Register an entity definition.
    ///
    /// Checks the definition on its own; relationship targets are checked by [`validate`](Self::validate)
    /// once every type is registered.
    pub fn register(&mut self, mut entity: EntityDef) -> Result<()> {
        for relation in &mut entity.relations {
            relation.normalize();
        }
        entity.validate()?;

        let key = entity.name.to_lowercase();
        if self.by_name.contains_key(&key) {
            return Err(Error::InvalidSchema(format!(
                "entity \"{}\" registered twice",
                entity.name
            )));
        }

        debug!(entity = %entity.name, "registered entity");
        self.by_name.insert(key, self.entities.len());
        self.entities.push(Arc::new(entity));
        Ok(())
    }

    /// Check that every relationship points at a registered type.
    pub fn validate(&self) -> Result<()> {
        for entity in &self.entities {
            for relation in &entity.relations {
                if self.get(&relation.target).is_none() {
                    return Err(Error::InvalidSchema(format!(
                        "{}.{} targets unknown entity \"{}\"",
                        entity.name, relation.name, relation.target
                    )));
                }
            }
        }
        Ok(())
    }

    /// Look up an entity by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&Arc<EntityDef>> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|&idx| &self.entities[idx])
    }

    /// Look up an entity by name, failing with [`Error::ModelNotFound`].
    pub fn get_model(&self, name: &str) -> Result<&Arc<EntityDef>> {
        self.get(name)
            .ok_or_else(|| Error::ModelNotFound(name.to_string()))
    }

    /// Registered entities in registration order.
    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityDef>> {
        self.entities.iter()
    }

    /// Registered entity names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.name.as_str()).collect()
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, RelationDef, ScalarType};

    struct Person;

    impl Model for Person {
        fn describe() -> EntityDef {
            EntityDef::new("Person")
                .with_field(FieldDef::new("id", ScalarType::Int))
                .with_field(FieldDef::new("name", ScalarType::Text))
                .with_default_filter("name")
        }
    }

    fn pet() -> EntityDef {
        EntityDef::new("Pet")
            .with_field(FieldDef::new("id", ScalarType::Int))
            .with_field(FieldDef::optional("owner_id", ScalarType::Int))
            .with_relation(RelationDef::new("owner", "Person"))
    }

    #[test]
    fn test_get_model_is_case_insensitive() {
        let registry = ModelRegistry::new().with_model::<Person>().unwrap();

        assert_eq!(registry.get_model("person").unwrap().name, "Person");
        assert_eq!(registry.get_model("PERSON").unwrap().name, "Person");
        assert!(matches!(
            registry.get_model("Ghost"),
            Err(Error::ModelNotFound(name)) if name == "Ghost"
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = ModelRegistry::new().with_model::<Person>().unwrap();
        let clash = EntityDef::new("PERSON").with_field(FieldDef::new("id", ScalarType::Int));

        assert!(matches!(registry.register(clash), Err(Error::InvalidSchema(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_relation_target_rejected() {
        let result = ModelRegistry::from_entities([pet()]);
        assert!(matches!(result, Err(Error::InvalidSchema(_))));

        let ok = ModelRegistry::from_entities([Person::describe(), pet()]).unwrap();
        assert_eq!(ok.names(), vec!["Person", "Pet"]);
    }

    #[test]
    fn test_from_json_normalizes_relations() {
        let registry = ModelRegistry::from_json(
            r#"{"entities": [
                {"name": "Person", "fields": [{"name": "id", "type": "int", "nullable": false}]},
                {"name": "Pet",
                 "fields": [
                    {"name": "id", "type": "int", "nullable": false},
                    {"name": "owner_id", "type": "int"}
                 ],
                 "relations": [{"name": "owner", "target": "Person"}]}
            ]}"#,
        )
        .unwrap();

        let pet = registry.get_model("pet").unwrap();
        assert_eq!(pet.get_relation("owner").unwrap().local_field, "owner_id");
    }
}
