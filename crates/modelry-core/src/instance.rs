//! Entity instances.

use crate::catalog::{Attribute, EntityDef};
use crate::error::{Error, Result};
use crate::value::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);
static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);
static NULL: Value = Value::Null;

/// Process-unique token identifying a live instance.
///
/// Clones of an instance share its handle, so caches keyed by handle treat them as the
/// same object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceHandle(u64);

impl InstanceHandle {
    fn next() -> Self {
        InstanceHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw handle number.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// A live value of an entity type.
///
/// Holds one value per scalar attribute (null until set) plus any related instances that
/// were attached by assignment or loaded for rendering.
#[derive(Debug, Clone)]
pub struct Instance {
    def: Arc<EntityDef>,
    handle: InstanceHandle,
    revision: u64,
    values: Vec<(String, Value)>,
    related: Vec<(String, Value)>,
}

impl Instance {
    /// Create an empty instance with every attribute null.
    pub fn new(def: Arc<EntityDef>) -> Self {
        let values = def
            .fields
            .iter()
            .map(|f| (f.name.clone(), Value::Null))
            .collect();
        Self {
            def,
            handle: InstanceHandle::next(),
            revision: 0,
            values,
            related: Vec::new(),
        }
    }

    /// Build an instance from a stored row.
    ///
    /// Columns the entity does not declare are ignored.
    pub fn from_row(def: Arc<EntityDef>, row: Vec<(String, Value)>) -> Self {
        let mut instance = Self::new(def);
        instance.load_row(row);
        instance.revision = 0;
        instance
    }

    /// Set an attribute, builder style.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(name, value.into())?;
        Ok(self)
    }

    /// The entity type of this instance.
    pub fn entity(&self) -> &EntityDef {
        &self.def
    }

    /// Shared handle to the entity type.
    pub fn entity_arc(&self) -> &Arc<EntityDef> {
        &self.def
    }

    /// Entity type name.
    pub fn entity_name(&self) -> &str {
        &self.def.name
    }

    /// Object identity token.
    pub fn handle(&self) -> InstanceHandle {
        self.handle
    }

    /// Content revision. Zero until the first write; every write or load then draws a
    /// process-unique number, so diverged clones never share a revision.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Identity value, if assigned.
    pub fn id(&self) -> Option<&Value> {
        self.scalar(&self.def.identity_field).filter(|v| !v.is_null())
    }

    /// Check if storage has assigned this instance an identity.
    pub fn is_persisted(&self) -> bool {
        self.id().is_some()
    }

    /// Read an attribute.
    ///
    /// A relationship reads as the attached related instance, or null when none is attached.
    pub fn get(&self, name: &str) -> Result<&Value> {
        match self.def.require_attribute(name)? {
            Attribute::Scalar(_) => Ok(self.scalar(name).unwrap_or(&NULL)),
            Attribute::Relation(_) => Ok(self
                .related
                .iter()
                .find(|(n, _)| n == name)
                .map_or(&NULL, |(_, v)| v)),
        }
    }

    /// Scalar value by name, without attribute validation.
    pub fn scalar(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Attached related instance for a relationship.
    pub fn related(&self, relation: &str) -> Option<&Instance> {
        self.related
            .iter()
            .find(|(n, _)| n == relation)
            .and_then(|(_, v)| v.as_entity())
    }

    /// Write an attribute.
    ///
    /// Scalars take the value as given; callers coerce first. A relationship takes a related
    /// instance (its identity is copied into the local field) or null.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let relation = match self.def.require_attribute(name)? {
            Attribute::Scalar(_) => None,
            Attribute::Relation(rel) => Some((rel.local_field.clone(), rel.target.clone())),
        };

        match relation {
            None => {
                self.detach_stale(name, &value);
                self.put_scalar(name, value);
            }
            Some((local, target)) => match value {
                Value::Null => {
                    self.related.retain(|(n, _)| n != name);
                    self.put_scalar(&local, Value::Null);
                }
                Value::Entity(inst) if inst.entity_name().eq_ignore_ascii_case(&target) => {
                    let id = inst.id().cloned().unwrap_or(Value::Null);
                    self.put_scalar(&local, id);
                    self.attach(name, *inst);
                }
                other => {
                    return Err(Error::invalid_value(
                        name,
                        format!("expected a {} instance, got {}", target, other.kind()),
                    ));
                }
            },
        }
        self.bump_revision();
        Ok(())
    }

    /// Attach a loaded related instance without changing the local field.
    pub fn attach(&mut self, relation: &str, instance: Instance) {
        let value = Value::Entity(Box::new(instance));
        match self.related.iter_mut().find(|(n, _)| n == relation) {
            Some(slot) => slot.1 = value,
            None => self.related.push((relation.to_string(), value)),
        }
    }

    /// Scalar values in declaration order.
    pub fn values(&self) -> &[(String, Value)] {
        &self.values
    }

    /// Scalar values to persist, skipping a null identity.
    pub fn to_row(&self) -> Vec<(String, Value)> {
        self.values
            .iter()
            .filter(|(n, v)| !(n == &self.def.identity_field && v.is_null()))
            .cloned()
            .collect()
    }

    /// Replace scalar values with a stored row, keeping the handle.
    pub fn load_row(&mut self, row: Vec<(String, Value)>) {
        for (name, value) in row {
            self.detach_stale(&name, &value);
            if self.scalar(&name).is_some() {
                self.put_scalar(&name, value);
            }
        }
        self.bump_revision();
    }

    fn bump_revision(&mut self) {
        self.revision = NEXT_REVISION.fetch_add(1, Ordering::Relaxed);
    }

    fn put_scalar(&mut self, name: &str, value: Value) {
        if let Some(slot) = self.values.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
        }
    }

    /// Drop an attached related instance whose identity no longer matches its local field.
    fn detach_stale(&mut self, field: &str, value: &Value) {
        let Some(relation) = self.def.relation_for_field(field) else {
            return;
        };
        let name = relation.name.clone();
        self.related.retain(|(n, related)| {
            n != &name || related.as_entity().and_then(Instance::id) == Some(value)
        });
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.def.name == other.def.name && self.values == other.values
    }
}

impl fmt::Display for Instance {
    /// Short form `<Class(ID: n)>`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.id().cloned().unwrap_or(Value::Null);
        write!(
            f,
            "<{}({}: {})>",
            self.def.name,
            self.def.identity_field.to_uppercase(),
            id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, RelationDef, ScalarType};

    fn person() -> Arc<EntityDef> {
        Arc::new(
            EntityDef::new("Person")
                .with_field(FieldDef::new("id", ScalarType::Int))
                .with_field(FieldDef::new("name", ScalarType::Text)),
        )
    }

    fn pet() -> Arc<EntityDef> {
        Arc::new(
            EntityDef::new("Pet")
                .with_field(FieldDef::new("id", ScalarType::Int))
                .with_field(FieldDef::new("name", ScalarType::Text))
                .with_field(FieldDef::optional("owner_id", ScalarType::Int))
                .with_relation(RelationDef::new("owner", "Person")),
        )
    }

    #[test]
    fn test_new_instance_is_all_null() {
        let inst = Instance::new(pet());

        assert!(!inst.is_persisted());
        assert!(inst.get("name").unwrap().is_null());
        assert!(inst.get("owner").unwrap().is_null());
        assert!(matches!(inst.get("age"), Err(Error::UnknownAttribute { .. })));
    }

    #[test]
    fn test_clones_share_handle() {
        let a = Instance::new(person());
        let b = a.clone();
        let c = Instance::new(person());

        assert_eq!(a.handle(), b.handle());
        assert_ne!(a.handle(), c.handle());
    }

    #[test]
    fn test_set_bumps_revision() {
        let mut inst = Instance::new(person());
        assert_eq!(inst.revision(), 0);

        inst.set("name", "Ana".into()).unwrap();
        let first = inst.revision();
        assert!(first > 0);
        assert_eq!(inst.get("name").unwrap(), &Value::from("Ana"));

        inst.set("name", "Bo".into()).unwrap();
        assert!(inst.revision() > first);
    }

    #[test]
    fn test_diverged_clones_get_distinct_revisions() {
        let rex = Instance::new(person());
        let mut a = rex.clone();
        let mut b = rex.clone();
        a.set("name", "Alpha".into()).unwrap();
        b.set("name", "Beta".into()).unwrap();

        assert_eq!(a.handle(), b.handle());
        assert_ne!(a.revision(), b.revision());
    }

    #[test]
    fn test_set_relation_copies_identity() {
        let owner = Instance::from_row(
            person(),
            vec![("id".into(), Value::Int(7)), ("name".into(), "Ana".into())],
        );
        let mut rex = Instance::new(pet());
        rex.set("owner", owner.into()).unwrap();

        assert_eq!(rex.scalar("owner_id"), Some(&Value::Int(7)));
        assert_eq!(rex.related("owner").unwrap().get("name").unwrap(), &Value::from("Ana"));

        rex.set("owner", Value::Null).unwrap();
        assert!(rex.related("owner").is_none());
        assert_eq!(rex.scalar("owner_id"), Some(&Value::Null));
    }

    #[test]
    fn test_relation_rejects_scalar() {
        let mut rex = Instance::new(pet());
        assert!(matches!(
            rex.set("owner", Value::Int(1)),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_changing_local_field_detaches_related() {
        let owner = Instance::from_row(person(), vec![("id".into(), Value::Int(7))]);
        let mut rex = Instance::new(pet()).with("owner", owner).unwrap();

        rex.set("owner_id", Value::Int(8)).unwrap();
        assert!(rex.related("owner").is_none());
    }

    #[test]
    fn test_to_row_skips_null_identity() {
        let inst = Instance::new(person()).with("name", "Ana").unwrap();
        let row = inst.to_row();

        assert_eq!(row, vec![("name".to_string(), Value::from("Ana"))]);
    }

    #[test]
    fn test_display_short_form() {
        let inst = Instance::from_row(person(), vec![("id".into(), Value::Int(3))]);
        assert_eq!(inst.to_string(), "<Person(ID: 3)>");
    }
}
