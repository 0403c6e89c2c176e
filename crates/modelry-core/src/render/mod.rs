//! Instance rendering.
//!
//! An instance renders either through a template (see [`template`]) or in the default
//! bracketed form `<Class(ATTR: value, ...)>`. Related instances render recursively; an
//! instance already being rendered further up falls back to the short form
//! `<Class(ID: n)>`.

mod cache;
pub mod template;

pub use cache::{CacheStats, RenderCache, RenderCachePolicy, RenderKey};

use crate::catalog::{Attribute, RelationDef};
use crate::error::{Error, Result};
use crate::instance::{Instance, InstanceHandle};
use std::borrow::Cow;
use std::collections::HashMap;
use template::PathExpressions;
use tracing::debug;

/// Services the renderer needs from its host.
pub trait RenderContext {
    /// Translate a display key.
    fn translate(&self, key: &str) -> String;

    /// Load the instance a relationship points at, if any.
    fn load_related(&self, instance: &Instance, relation: &RelationDef) -> Result<Option<Instance>>;
}

/// Renders instances to strings, memoising results.
pub struct Renderer {
    policy: RenderCachePolicy,
    cache: RenderCache,
    paths: PathExpressions,
}

impl Renderer {
    /// Create a renderer.
    pub fn new(policy: RenderCachePolicy, capacity: usize) -> Result<Self> {
        Ok(Self {
            policy,
            cache: RenderCache::new(capacity),
            paths: PathExpressions::new()?,
        })
    }

    /// Active cache policy.
    pub fn policy(&self) -> RenderCachePolicy {
        self.policy
    }

    /// Cache statistics.
    pub fn cache_stats(&self) -> &CacheStats {
        self.cache.stats()
    }

    /// Drop memoised renderings of one instance.
    pub fn invalidate(&self, handle: InstanceHandle) {
        self.cache.invalidate(handle);
    }

    /// Drop every memoised rendering.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Render an instance with an explicit template, else its type's template, else the
    /// default form.
    pub fn render(&self, ctx: &dyn RenderContext, instance: &Instance, template: Option<&str>) -> Result<String> {
        let key = RenderKey::for_instance(self.policy, instance, template);
        if let Some(key) = &key {
            if let Some(text) = self.cache.get(key) {
                return Ok(text);
            }
        }

        let mut stack = Vec::new();
        let text = self.render_inner(ctx, instance, template, &mut stack)?;

        if let Some(key) = key {
            self.cache.insert(key, text.clone());
        }
        Ok(text)
    }

    fn render_inner(
        &self,
        ctx: &dyn RenderContext,
        instance: &Instance,
        template: Option<&str>,
        stack: &mut Vec<InstanceHandle>,
    ) -> Result<String> {
        if stack.contains(&instance.handle()) {
            debug!(instance = %instance, "reference cycle while rendering");
            return Ok(instance.to_string());
        }
        stack.push(instance.handle());
        let result = self.render_body(ctx, instance, template, stack);
        stack.pop();
        result
    }

    fn render_body(
        &self,
        ctx: &dyn RenderContext,
        instance: &Instance,
        template: Option<&str>,
        stack: &mut Vec<InstanceHandle>,
    ) -> Result<String> {
        let def = instance.entity();
        let class = ctx.translate(&def.name);
        let template = template.or(def.presentation.custom_template.as_deref());

        // Slot values; `None` marks a null attribute.
        let mut values: Vec<(String, Option<String>)> = vec![("class".to_string(), Some(class.clone()))];
        let mut related_text: HashMap<String, Option<String>> = HashMap::new();
        let display = def.display_attributes();

        for attr in &display {
            if attr.starts_with('_') {
                continue;
            }
            let mut text = match def.require_attribute(attr)? {
                Attribute::Scalar(_) => {
                    let value = instance.get(attr)?;
                    (!value.is_null()).then(|| value.to_string())
                }
                Attribute::Relation(rel) => self.related_text(ctx, instance, rel, stack, &mut related_text)?,
            };
            if def.translates(attr) {
                text = Some(ctx.translate(text.as_deref().unwrap_or("None")));
            }
            if let Some(rel) = attr.strip_suffix("_id").and_then(|x| def.get_relation(x)) {
                let rendered = self.related_text(ctx, instance, rel, stack, &mut related_text)?;
                values.push((rel.name.clone(), rendered));
            }
            values.push((attr.to_string(), text));
        }

        match template {
            Some(template) => {
                let expanded = self
                    .paths
                    .expand(template, |path| self.walk_path(ctx, instance, path, stack))?;
                template::substitute(&expanded, |name| {
                    values
                        .iter()
                        .rev()
                        .find(|(k, _)| k == name)
                        .map(|(_, v)| v.clone().unwrap_or_else(|| "None".to_string()))
                })
            }
            None => {
                let parts: Vec<String> = display
                    .iter()
                    .filter_map(|attr| {
                        values
                            .iter()
                            .rev()
                            .find(|(k, _)| k == attr)
                            .and_then(|(_, v)| v.as_ref())
                            .map(|v| format!("{}: {}", ctx.translate(attr).to_uppercase(), v))
                    })
                    .collect();
                Ok(format!("<{}({})>", class, parts.join(", ")))
            }
        }
    }

    /// Rendered text of a related instance, memoised for the current rendering.
    fn related_text(
        &self,
        ctx: &dyn RenderContext,
        instance: &Instance,
        relation: &RelationDef,
        stack: &mut Vec<InstanceHandle>,
        memo: &mut HashMap<String, Option<String>>,
    ) -> Result<Option<String>> {
        if let Some(text) = memo.get(&relation.name) {
            return Ok(text.clone());
        }
        let text = match related_instance(ctx, instance, relation)? {
            Some(related) => Some(self.render_inner(ctx, &related, None, stack)?),
            None => None,
        };
        memo.insert(relation.name.clone(), text.clone());
        Ok(text)
    }

    /// Walk `a.b.c` from an instance. Any null along the way yields empty text.
    fn walk_path(
        &self,
        ctx: &dyn RenderContext,
        instance: &Instance,
        path: &str,
        stack: &mut Vec<InstanceHandle>,
    ) -> Result<String> {
        let segments: Vec<&str> = path.split('.').collect();
        let mut current: Cow<'_, Instance> = Cow::Borrowed(instance);

        for (i, segment) in segments.iter().enumerate() {
            let last = i + 1 == segments.len();
            let next = match current.entity().require_attribute(segment)? {
                Attribute::Scalar(_) => {
                    let value = current.get(segment)?;
                    if value.is_null() {
                        return Ok(String::new());
                    }
                    if !last {
                        return Err(Error::unknown_attribute(
                            format!("{}.{}", current.entity_name(), segment),
                            segments[i + 1],
                        ));
                    }
                    return Ok(value.to_string());
                }
                Attribute::Relation(rel) => match related_instance(ctx, &current, rel)? {
                    Some(related) => related.into_owned(),
                    None => return Ok(String::new()),
                },
            };
            if last {
                return self.render_inner(ctx, &next, None, stack);
            }
            current = Cow::Owned(next);
        }
        Ok(String::new())
    }
}

/// The attached related instance, else one loaded through the context.
fn related_instance<'a>(
    ctx: &dyn RenderContext,
    instance: &'a Instance,
    relation: &RelationDef,
) -> Result<Option<Cow<'a, Instance>>> {
    if let Some(related) = instance.related(&relation.name) {
        return Ok(Some(Cow::Borrowed(related)));
    }
    let local = instance.scalar(&relation.local_field);
    if local.map_or(true, |v| v.is_null()) {
        return Ok(None);
    }
    Ok(ctx.load_related(instance, relation)?.map(Cow::Owned))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntityDef, FieldDef, ScalarType, TranslateValues};
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    struct Plain;

    impl RenderContext for Plain {
        fn translate(&self, key: &str) -> String {
            key.to_string()
        }

        fn load_related(&self, _: &Instance, _: &RelationDef) -> Result<Option<Instance>> {
            Ok(None)
        }
    }

    struct Spanish;

    impl RenderContext for Spanish {
        fn translate(&self, key: &str) -> String {
            match key {
                "Pet" => "Mascota".into(),
                "name" => "nombre".into(),
                "dog" => "perro".into(),
                other => other.into(),
            }
        }

        fn load_related(&self, _: &Instance, _: &RelationDef) -> Result<Option<Instance>> {
            Ok(None)
        }
    }

    fn person_def() -> Arc<EntityDef> {
        Arc::new(
            EntityDef::new("Person")
                .with_field(FieldDef::new("id", ScalarType::Int))
                .with_field(FieldDef::new("name", ScalarType::Text))
                .with_display_attributes(["name"]),
        )
    }

    fn pet_def() -> EntityDef {
        EntityDef::new("Pet")
            .with_field(FieldDef::new("id", ScalarType::Int))
            .with_field(FieldDef::new("name", ScalarType::Text))
            .with_field(FieldDef::optional("kind", ScalarType::Text))
            .with_field(FieldDef::optional("owner_id", ScalarType::Int))
            .with_relation(RelationDef::new("owner", "Person"))
    }

    fn ana() -> Instance {
        Instance::from_row(
            person_def(),
            vec![("id".into(), Value::Int(1)), ("name".into(), "Ana".into())],
        )
    }

    fn rex(def: EntityDef) -> Instance {
        Instance::from_row(
            Arc::new(def),
            vec![("id".into(), Value::Int(7)), ("name".into(), "Rex".into())],
        )
    }

    fn renderer() -> Renderer {
        Renderer::new(RenderCachePolicy::Revision, 64).unwrap()
    }

    #[test]
    fn test_path_expressions() {
        let pet = rex(pet_def()).with("owner", ana()).unwrap();
        let out = renderer()
            .render(&Plain, &pet, Some("$(owner.name) owns $(name)"))
            .unwrap();
        assert_eq!(out, "Ana owns Rex");
    }

    #[test]
    fn test_null_hop_is_empty() {
        let out = renderer()
            .render(&Plain, &rex(pet_def()), Some("[$(owner.name)] $(kind)|"))
            .unwrap();
        assert_eq!(out, "[] |");
    }

    #[test]
    fn test_named_slots() {
        let pet = rex(pet_def()).with("owner", ana()).unwrap();
        let out = renderer()
            .render(&Plain, &pet, Some("$class ${name} of $owner, kind $kind"))
            .unwrap();
        assert_eq!(out, "Pet Rex of <Person(NAME: Ana)>, kind None");
    }

    #[test]
    fn test_undefined_slot_is_error() {
        let result = renderer().render(&Plain, &rex(pet_def()), Some("$color"));
        assert!(matches!(result, Err(Error::UndefinedSlot(_))));
    }

    #[test]
    fn test_unknown_path_is_error() {
        let result = renderer().render(&Plain, &rex(pet_def()), Some("$(color)"));
        assert!(matches!(result, Err(Error::UnknownAttribute { .. })));
    }

    #[test]
    fn test_path_values_are_not_placeholders() {
        let pet = Instance::new(Arc::new(pet_def())).with("name", "$class").unwrap();
        let out = renderer().render(&Plain, &pet, Some("$(name)")).unwrap();
        assert_eq!(out, "$class");
    }

    #[test]
    fn test_default_form_skips_nulls() {
        let out = renderer().render(&Plain, &rex(pet_def()), None).unwrap();
        assert_eq!(out, "<Pet(ID: 7, NAME: Rex)>");
    }

    #[test]
    fn test_default_form_with_relation() {
        let pet = rex(pet_def()).with("owner", ana()).unwrap();
        let out = renderer().render(&Plain, &pet, None).unwrap();
        assert_eq!(
            out,
            "<Pet(ID: 7, NAME: Rex, OWNER_ID: 1, OWNER: <Person(NAME: Ana)>)>"
        );
    }

    #[test]
    fn test_type_template_and_translation() {
        let def = pet_def()
            .with_template("$class: $name ($kind)")
            .with_translate_values(TranslateValues::Only(vec!["kind".into()]));
        let pet = rex(def).with("kind", "dog").unwrap();

        let out = renderer().render(&Spanish, &pet, None).unwrap();
        assert_eq!(out, "Mascota: Rex (perro)");
    }

    #[test]
    fn test_default_form_translates_labels() {
        let def = pet_def().with_display_attributes(["name"]);
        let out = renderer().render(&Spanish, &rex(def), None).unwrap();
        assert_eq!(out, "<Mascota(NOMBRE: Rex)>");
    }

    #[test]
    fn test_cycle_renders_short_form() {
        let def = Arc::new(
            EntityDef::new("Node")
                .with_field(FieldDef::new("id", ScalarType::Int))
                .with_field(FieldDef::optional("next_id", ScalarType::Int))
                .with_relation(RelationDef::new("next", "Node"))
                .with_display_attributes(["id", "next"]),
        );
        let mut node = Instance::from_row(def, vec![("id".into(), Value::Int(1))]);
        let itself = node.clone();
        node.set("next", itself.into()).unwrap();

        let out = renderer().render(&Plain, &node, None).unwrap();
        assert_eq!(out, "<Node(ID: 1, NEXT: <Node(ID: 1)>)>");
    }

    #[test]
    fn test_cache_policies() {
        let template = Some("$name");
        let mut pet = rex(pet_def());

        let snapshot = Renderer::new(RenderCachePolicy::Snapshot, 8).unwrap();
        let revision = renderer();
        let disabled = Renderer::new(RenderCachePolicy::Disabled, 8).unwrap();
        for r in [&snapshot, &revision, &disabled] {
            assert_eq!(r.render(&Plain, &pet, template).unwrap(), "Rex");
            assert_eq!(r.render(&Plain, &pet, template).unwrap(), "Rex");
        }
        assert_eq!(snapshot.cache_stats().hits(), 1);
        assert_eq!(disabled.cache_stats().hits(), 0);

        pet.set("name", "Max".into()).unwrap();
        assert_eq!(snapshot.render(&Plain, &pet, template).unwrap(), "Rex");
        assert_eq!(revision.render(&Plain, &pet, template).unwrap(), "Max");
        assert_eq!(disabled.render(&Plain, &pet, template).unwrap(), "Max");

        snapshot.invalidate(pet.handle());
        assert_eq!(snapshot.render(&Plain, &pet, template).unwrap(), "Max");
    }

    #[test]
    fn test_diverged_clones_render_their_own_values() {
        let renderer = renderer();
        let pet = rex(pet_def());
        let mut alpha = pet.clone();
        let mut beta = pet.clone();
        alpha.set("name", "Alpha".into()).unwrap();
        beta.set("name", "Beta".into()).unwrap();

        assert_eq!(renderer.render(&Plain, &alpha, Some("$(name)")).unwrap(), "Alpha");
        assert_eq!(renderer.render(&Plain, &beta, Some("$(name)")).unwrap(), "Beta");
        assert_eq!(renderer.render(&Plain, &alpha, Some("$(name)")).unwrap(), "Alpha");
    }
}
