//! Criteria translation and lazy queries.

use super::predicate::Predicate;
use crate::catalog::{Attribute, EntityDef, FieldDef, RelationDef};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::value::Value;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::debug;

/// Value side of one filter criterion.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Equality, a wildcard pattern (text containing the wildcard marker), or a related
    /// instance to match against.
    Value(Value),
    /// Inclusive range.
    Range(Value, Value),
}

impl From<Value> for FilterValue {
    fn from(v: Value) -> Self {
        FilterValue::Value(v)
    }
}

/// Ordered attribute name to filter value mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    entries: Vec<(String, FilterValue)>,
}

impl Criteria {
    /// Create empty criteria (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality (or wildcard, or related instance) criterion.
    pub fn with(mut self, attr: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(attr, FilterValue::Value(value.into()));
        self
    }

    /// Add an inclusive range criterion.
    pub fn with_range(
        mut self,
        attr: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.push(attr, FilterValue::Range(low.into(), high.into()));
        self
    }

    /// Add a criterion, replacing an earlier one for the same attribute.
    pub fn push(&mut self, attr: impl Into<String>, value: FilterValue) {
        let attr = attr.into();
        match self.entries.iter_mut().find(|(a, _)| *a == attr) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((attr, value)),
        }
    }

    /// Iterate criteria in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.entries.iter().map(|(a, v)| (a.as_str(), v))
    }

    /// Number of criteria.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no criteria.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, FilterValue)> for Criteria {
    fn from_iter<I: IntoIterator<Item = (String, FilterValue)>>(iter: I) -> Self {
        let mut criteria = Criteria::new();
        for (attr, value) in iter {
            criteria.push(attr, value);
        }
        criteria
    }
}

/// Translates criteria into predicates over one entity's columns.
pub struct PredicateBuilder<'a> {
    config: &'a EngineConfig,
}

impl<'a> PredicateBuilder<'a> {
    /// Create a builder using the given wildcard and null conventions.
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Build one predicate per criterion.
    ///
    /// `resolve` turns a bare value given for a relationship into a target instance, or
    /// `None` when nothing matches. An unresolved relationship yields [`Predicate::Never`].
    pub fn build<R>(&self, entity: &EntityDef, criteria: &Criteria, mut resolve: R) -> Result<Vec<Predicate>>
    where
        R: FnMut(&RelationDef, Value) -> Result<Option<Instance>>,
    {
        let mut predicates = Vec::with_capacity(criteria.len());
        for (attr, value) in criteria.iter() {
            let predicate = match (entity.require_attribute(attr)?, value) {
                (Attribute::Scalar(field), FilterValue::Value(v)) => {
                    self.scalar_predicate(field, self.null_literal(v.clone()))?
                }
                (Attribute::Scalar(field), FilterValue::Range(low, high)) => Predicate::Between {
                    field: field.name.clone(),
                    low: low.clone().coerce(&field.name, field.scalar_type)?,
                    high: high.clone().coerce(&field.name, field.scalar_type)?,
                },
                (Attribute::Relation(rel), FilterValue::Value(v)) => {
                    let value = match self.null_literal(v.clone()) {
                        Value::Null => Value::Null,
                        Value::Entity(inst) => Value::Entity(inst),
                        bare => match resolve(rel, bare)? {
                            Some(inst) => Value::Entity(Box::new(inst)),
                            None => {
                                debug!(relation = %rel.name, "relationship value did not resolve");
                                predicates.push(Predicate::Never);
                                continue;
                            }
                        },
                    };
                    Self::relation_predicate(rel, value)
                }
                (Attribute::Relation(rel), FilterValue::Range(..)) => {
                    return Err(Error::invalid_value(
                        &rel.name,
                        "ranges are not supported on relationships",
                    ));
                }
            };
            predicates.push(predicate);
        }
        Ok(predicates)
    }

    fn null_literal(&self, value: Value) -> Value {
        match value {
            Value::Text(s) if s == self.config.null_literal => Value::Null,
            other => other,
        }
    }

    fn scalar_predicate(&self, field: &FieldDef, value: Value) -> Result<Predicate> {
        if let Value::Text(s) = &value {
            if s.contains(self.config.wildcard) {
                let pattern = if self.config.wildcard == '%' {
                    s.clone()
                } else {
                    s.replace(self.config.wildcard, "%")
                };
                return Ok(Predicate::like(&field.name, pattern));
            }
        }
        let value = value.coerce(&field.name, field.scalar_type)?;
        Ok(Predicate::eq(&field.name, value))
    }

    fn relation_predicate(rel: &RelationDef, value: Value) -> Predicate {
        match value {
            Value::Entity(inst) => match inst.id() {
                Some(id) => Predicate::eq(&rel.local_field, id.clone()),
                None => Predicate::Never,
            },
            _ => Predicate::IsNull {
                field: rel.local_field.clone(),
            },
        }
    }
}

/// Executes queries built against an entity type.
pub trait QueryExecutor {
    /// Stream matching instances to `visit` until it breaks.
    fn scan_instances(
        &self,
        entity: &Arc<EntityDef>,
        predicates: &[Predicate],
        visit: &mut dyn FnMut(Instance) -> ControlFlow<()>,
    ) -> Result<()>;

    /// Count matching rows.
    fn count_rows(&self, entity: &EntityDef, predicates: &[Predicate]) -> Result<usize>;

    /// Delete matching rows, returning how many were removed.
    fn delete_rows(&self, entity: &EntityDef, predicates: &[Predicate]) -> Result<usize>;
}

/// A lazy, conjunctive query over one entity type.
///
/// Nothing touches storage until the query is iterated, counted, materialised or deleted.
pub struct Query<'a> {
    executor: &'a dyn QueryExecutor,
    entity: Arc<EntityDef>,
    predicates: Vec<Predicate>,
}

impl<'a> Query<'a> {
    /// Create a query matching every instance of `entity`.
    pub fn new(executor: &'a dyn QueryExecutor, entity: Arc<EntityDef>) -> Self {
        Self {
            executor,
            entity,
            predicates: Vec::new(),
        }
    }

    /// Add a predicate (ANDed with the rest).
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Add several predicates.
    pub fn filter_all(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.predicates.extend(predicates);
        self
    }

    /// The queried entity type.
    pub fn entity(&self) -> &EntityDef {
        &self.entity
    }

    /// Accumulated predicates.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    fn never(&self) -> bool {
        self.predicates.iter().any(Predicate::is_never)
    }

    /// Visit matching instances in store order until `visit` breaks.
    pub fn for_each<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(Instance) -> ControlFlow<()>,
    {
        if self.never() {
            return Ok(());
        }
        self.executor
            .scan_instances(&self.entity, &self.predicates, &mut visit)
    }

    /// Materialise every match.
    pub fn fetch(&self) -> Result<Vec<Instance>> {
        let mut out = Vec::new();
        self.for_each(|inst| {
            out.push(inst);
            ControlFlow::Continue(())
        })?;
        Ok(out)
    }

    /// First match, if any.
    pub fn first(&self) -> Result<Option<Instance>> {
        let mut first = None;
        self.for_each(|inst| {
            first = Some(inst);
            ControlFlow::Break(())
        })?;
        Ok(first)
    }

    /// Count matches.
    pub fn count(&self) -> Result<usize> {
        if self.never() {
            return Ok(0);
        }
        self.executor.count_rows(&self.entity, &self.predicates)
    }

    /// Delete every match, returning how many were removed.
    pub fn delete(self) -> Result<usize> {
        if self.never() {
            return Ok(0);
        }
        self.executor.delete_rows(&self.entity, &self.predicates)
    }
}

impl std::fmt::Debug for Query<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("entity", &self.entity.name)
            .field("predicates", &self.predicates)
            .finish()
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
            .with_field(FieldDef::optional("age", ScalarType::Int))
            .with_field(FieldDef::optional("owner_id", ScalarType::Int))
            .with_relation(RelationDef::new("owner", "Person"))
    }

    fn person(id: i64) -> Instance {
        let def = Arc::new(
            EntityDef::new("Person")
                .with_field(FieldDef::new("id", ScalarType::Int))
                .with_field(FieldDef::new("name", ScalarType::Text)),
        );
        Instance::from_row(def, vec![("id".into(), Value::Int(id))])
    }

    fn no_resolve(_: &RelationDef, _: Value) -> Result<Option<Instance>> {
        panic!("resolver should not be called")
    }

    fn build(criteria: Criteria) -> Result<Vec<Predicate>> {
        let config = EngineConfig::default();
        PredicateBuilder::new(&config).build(&pet(), &criteria, no_resolve)
    }

    #[test]
    fn test_scalar_equality_is_coerced() {
        let preds = build(Criteria::new().with("age", "3")).unwrap();
        assert_eq!(preds, vec![Predicate::eq("age", 3)]);
    }

    #[test]
    fn test_wildcard_becomes_like() {
        let preds = build(Criteria::new().with("name", "%oh%")).unwrap();
        assert_eq!(preds, vec![Predicate::like("name", "%oh%")]);
    }

    #[test]
    fn test_custom_wildcard_is_translated() {
        let config = EngineConfig::default().with_wildcard('*');
        let preds = PredicateBuilder::new(&config)
            .build(&pet(), &Criteria::new().with("name", "R*"), no_resolve)
            .unwrap();
        assert_eq!(preds, vec![Predicate::like("name", "R%")]);
    }

    #[test]
    fn test_range_becomes_between() {
        let preds = build(Criteria::new().with_range("age", "18", 30)).unwrap();
        assert_eq!(preds, vec![Predicate::between("age", 18, 30)]);
    }

    #[test]
    fn test_null_literal() {
        let preds = build(Criteria::new().with("age", "None").with("owner", "None")).unwrap();
        assert_eq!(
            preds,
            vec![
                Predicate::IsNull { field: "age".into() },
                Predicate::IsNull {
                    field: "owner_id".into()
                },
            ]
        );
    }

    #[test]
    fn test_relationship_instance_compares_identity() {
        let preds = build(Criteria::new().with("owner", person(4))).unwrap();
        assert_eq!(preds, vec![Predicate::eq("owner_id", 4)]);
    }

    #[test]
    fn test_relationship_is_resolved() {
        let config = EngineConfig::default();
        let mut seen = Vec::new();
        let preds = PredicateBuilder::new(&config)
            .build(&pet(), &Criteria::new().with("owner", "Ana"), |rel, value| {
                seen.push((rel.target.clone(), value));
                Ok(Some(person(9)))
            })
            .unwrap();

        assert_eq!(seen, vec![("Person".to_string(), Value::from("Ana"))]);
        assert_eq!(preds, vec![Predicate::eq("owner_id", 9)]);
    }

    #[test]
    fn test_unresolved_relationship_matches_nothing() {
        let config = EngineConfig::default();
        let preds = PredicateBuilder::new(&config)
            .build(&pet(), &Criteria::new().with("owner", "Nobody"), |_, _| Ok(None))
            .unwrap();
        assert_eq!(preds, vec![Predicate::Never]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            build(Criteria::new().with("color", "red")),
            Err(Error::UnknownAttribute { .. })
        ));
        assert!(matches!(
            build(Criteria::new().with("age", "old")),
            Err(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            build(Criteria::new().with_range("owner", 1, 2)),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_criteria_replace_same_attribute() {
        let criteria = Criteria::new().with("name", "a").with("age", 1).with("name", "b");
        let entries: Vec<_> = criteria.iter().map(|(a, _)| a).collect();

        assert_eq!(entries, vec!["name", "age"]);
        assert_eq!(
            criteria.iter().next().map(|(_, v)| v.clone()),
            Some(FilterValue::Value("b".into()))
        );
    }
}
