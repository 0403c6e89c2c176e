//! CRUD orchestration over the catalog, storage, renderer and collector.

mod cache;
mod crud;

pub use cache::InstanceCache;
pub use crud::parse_assignments;

use crate::catalog::{EntityDef, ModelRegistry, RelationDef};
use crate::collect::{NoPrompt, Prompt};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::query::{Criteria, Predicate, PredicateBuilder, Query, QueryExecutor};
use crate::render::{CacheStats, RenderContext, Renderer};
use crate::storage::{Session, Store};
use crate::translate::{IdentityTranslator, Translator};
use crate::value::Value;
use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::debug;

/// The modelry engine.
///
/// Owns the storage session and every derived cache. All operations take `&self`, so the
/// collector can create and save related instances while an outer operation is running.
///
/// # Example
///
/// ```
/// use modelry_core::{Criteria, Engine, EntityDef, FieldDef, MemoryStore, ModelRegistry, ScalarType};
/// use std::sync::Arc;
///
/// let registry = ModelRegistry::from_entities([EntityDef::new("Person")
///     .with_field(FieldDef::new("id", ScalarType::Int))
///     .with_field(FieldDef::new("name", ScalarType::Text))])
/// .unwrap();
/// let engine = Engine::new(Arc::new(registry), MemoryStore::new()).unwrap();
///
/// let mut ana = engine.create("Person", false, &[("name", "Ana".into())]).unwrap();
/// engine.save(&mut ana, true).unwrap();
///
/// let found = engine.filter("Person", &Criteria::new().with("name", "%n%")).unwrap();
/// assert_eq!(found.count().unwrap(), 1);
/// assert_eq!(engine.render(&ana, None).unwrap(), "<Person(ID: 1, NAME: Ana)>");
/// ```
pub struct Engine {
    registry: Arc<ModelRegistry>,
    config: EngineConfig,
    session: Mutex<Session>,
    renderer: Renderer,
    translator: Box<dyn Translator>,
    prompt: Box<dyn Prompt>,
    cache: InstanceCache,
}

impl Engine {
    /// Create an engine with the default configuration.
    pub fn new(registry: Arc<ModelRegistry>, store: impl Store + 'static) -> Result<Self> {
        Self::with_config(registry, store, EngineConfig::default())
    }

    /// Create an engine with an explicit configuration.
    pub fn with_config(
        registry: Arc<ModelRegistry>,
        store: impl Store + 'static,
        config: EngineConfig,
    ) -> Result<Self> {
        let renderer = Renderer::new(config.render_cache, config.render_cache_capacity)?;
        debug!(entities = registry.len(), policy = ?config.render_cache, "engine created");
        Ok(Self {
            registry,
            config,
            session: Mutex::new(Session::new(store)),
            renderer,
            translator: Box::new(IdentityTranslator),
            prompt: Box::new(NoPrompt),
            cache: InstanceCache::new(),
        })
    }

    /// Use a translator for display strings.
    pub fn with_translator(mut self, translator: impl Translator + 'static) -> Self {
        self.translator = Box::new(translator);
        self
    }

    /// Use a prompt for interactive collection.
    pub fn with_prompt(mut self, prompt: impl Prompt + 'static) -> Self {
        self.prompt = Box::new(prompt);
        self
    }

    /// The model registry.
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The prompt used for interactive collection.
    pub fn prompt(&self) -> &dyn Prompt {
        self.prompt.as_ref()
    }

    /// Look up an entity type by name, case-insensitively.
    pub fn get_model(&self, name: &str) -> Result<Arc<EntityDef>> {
        self.registry.get_model(name).map(Arc::clone)
    }

    /// Translate a display key.
    pub fn translate(&self, key: &str) -> String {
        self.translator.translate(key)
    }

    /// A query over every instance of an entity type.
    pub fn query(&self, entity: &str) -> Result<Query<'_>> {
        Ok(Query::new(self, self.get_model(entity)?))
    }

    /// Build a lazy query from attribute criteria.
    ///
    /// Relationship criteria given as bare values are resolved first, by querying the target
    /// type on its default filter attribute. A value that resolves to nothing makes the query
    /// match nothing. Chain [`Query::filter`] to AND further predicates.
    pub fn filter(&self, entity: &str, criteria: &Criteria) -> Result<Query<'_>> {
        self.filter_with(entity, Vec::new(), criteria)
    }

    /// [`filter`](Self::filter) with positional predicates ANDed in front of the criteria.
    pub fn filter_with(&self, entity: &str, predicates: Vec<Predicate>, criteria: &Criteria) -> Result<Query<'_>> {
        let def = self.get_model(entity)?;
        let built = PredicateBuilder::new(&self.config).build(&def, criteria, |rel, value| {
            self.resolve_related(rel, value)
        })?;
        debug!(entity = %def.name, predicates = predicates.len() + built.len(), "filter built");
        Ok(Query::new(self, def).filter_all(predicates).filter_all(built))
    }

    /// Every instance of an entity type, served from the per-type cache when populated.
    pub fn all(&self, entity: &str) -> Result<Arc<Vec<Instance>>> {
        let def = self.get_model(entity)?;
        if let Some(instances) = self.cache.get(&def.name) {
            return Ok(instances);
        }
        let instances = Query::new(self, Arc::clone(&def)).fetch()?;
        Ok(self.cache.insert(&def.name, instances))
    }

    /// The instance a relationship of `instance` points at, if any.
    pub fn related(&self, instance: &Instance, relation: &str) -> Result<Option<Instance>> {
        let def = instance.entity();
        let relation = def
            .get_relation(relation)
            .ok_or_else(|| Error::unknown_attribute(&def.name, relation))?;
        match instance.related(&relation.name) {
            Some(related) => Ok(Some(related.clone())),
            None => self.load_related(instance, relation),
        }
    }

    /// Render an instance with `template`, else its type's template, else the default form.
    pub fn render(&self, instance: &Instance, template: Option<&str>) -> Result<String> {
        self.renderer.render(self, instance, template)
    }

    /// Render-cache statistics.
    pub fn render_stats(&self) -> &CacheStats {
        self.renderer.cache_stats()
    }

    /// The per-type instance cache.
    pub fn instance_cache(&self) -> &InstanceCache {
        &self.cache
    }

    /// Resolve a bare value into the first matching instance of a relationship's target.
    fn resolve_related(&self, relation: &RelationDef, value: Value) -> Result<Option<Instance>> {
        let target = self.get_model(&relation.target)?;
        let criteria = Criteria::new().with(target.default_filter_attribute(), value);
        self.filter(&target.name, &criteria)?.first()
    }

    fn load_related_by_id(&self, relation: &RelationDef, id: &Value) -> Result<Option<Instance>> {
        let target = self.get_model(&relation.target)?;
        let identity = target.identity_field.clone();
        Query::new(self, target)
            .filter(Predicate::eq(identity, id.clone()))
            .first()
    }
}

impl QueryExecutor for Engine {
    /// Streams rows while the session is locked; `visit` must not call back into the engine.
    fn scan_instances(
        &self,
        entity: &Arc<EntityDef>,
        predicates: &[Predicate],
        visit: &mut dyn FnMut(Instance) -> ControlFlow<()>,
    ) -> Result<()> {
        let session = self.session.lock();
        session.store().scan(entity, predicates, &mut |row| {
            visit(Instance::from_row(Arc::clone(entity), row))
        })
    }

    fn count_rows(&self, entity: &EntityDef, predicates: &[Predicate]) -> Result<usize> {
        self.session.lock().store().count(entity, predicates)
    }

    fn delete_rows(&self, entity: &EntityDef, predicates: &[Predicate]) -> Result<usize> {
        let removed = self.session.lock().delete_where(entity, predicates)?;
        self.cache.invalidate(&entity.name);
        self.renderer.clear();
        Ok(removed)
    }
}

impl RenderContext for Engine {
    fn translate(&self, key: &str) -> String {
        self.translator.translate(key)
    }

    fn load_related(&self, instance: &Instance, relation: &RelationDef) -> Result<Option<Instance>> {
        match instance.scalar(&relation.local_field) {
            Some(id) if !id.is_null() => self.load_related_by_id(relation, id),
            _ => Ok(None),
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("entities", &self.registry.names())
            .field("config", &self.config)
            .field("cached_types", &self.cache.len())
            .finish_non_exhaustive()
    }
}
