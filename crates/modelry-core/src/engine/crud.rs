//! Create, edit, save and delete.

use super::Engine;
use crate::catalog::{Attribute, EntityDef};
use crate::collect::{self, Answer, PromptType};
use crate::error::{Error, Result};
use crate::instance::{Instance, InstanceHandle};
use crate::query::Criteria;
use crate::storage::Row;
use crate::table::TableData;
use crate::value::Value;
use std::sync::Arc;
use tracing::{debug, info};

impl Engine {
    /// Instantiate an entity with the given attributes.
    ///
    /// With `ask_for_none_values`, every attribute still unset whose name does not end with
    /// the identity suffix is collected through the prompt. The instance is not saved.
    pub fn create(&self, entity: &str, ask_for_none_values: bool, attrs: &[(&str, Value)]) -> Result<Instance> {
        let def = self.get_model(entity)?;
        let mut instance = Instance::new(Arc::clone(&def));
        for (attr, value) in attrs {
            self.set_attribute(&mut instance, attr, value.clone())?;
        }

        if ask_for_none_values {
            for attr in def.attributes(false) {
                if self.config.is_identity_like(attr) || !is_unset(&instance, attr) {
                    continue;
                }
                self.ask_attribute(&mut instance, attr, None)?;
            }
        }
        debug!(entity = %def.name, "instance created");
        Ok(instance)
    }

    /// Write one attribute, converting the value the way the attribute needs.
    ///
    /// The null literal means null. Scalars are coerced to their declared type. A
    /// relationship takes null, an instance, or a bare value resolved on the target's
    /// default filter attribute; a bare value that matches nothing is an error.
    pub fn set_attribute(&self, instance: &mut Instance, attribute: &str, value: Value) -> Result<()> {
        let value = match value {
            Value::Text(s) if s == self.config.null_literal => Value::Null,
            other => other,
        };
        let def = Arc::clone(instance.entity_arc());
        let value = match def.require_attribute(attribute)? {
            Attribute::Scalar(_) if value.is_null() => Value::Null,
            Attribute::Scalar(field) => value.coerce(&field.name, field.scalar_type)?,
            Attribute::Relation(rel) => match value {
                Value::Null | Value::Entity(_) => value,
                bare => {
                    let shown = bare.to_string();
                    let resolved = self.resolve_related(rel, bare)?.ok_or_else(|| {
                        Error::invalid_value(attribute, format!("no {} matches \"{}\"", rel.target, shown))
                    })?;
                    Value::Entity(Box::new(resolved))
                }
            },
        };
        instance.set(attribute, value)
    }

    /// Apply an `attr=value,attr=value` assignment list.
    pub fn set_attributes(&self, instance: &mut Instance, assignments: &str) -> Result<()> {
        for (attr, value) in parse_assignments(assignments)? {
            self.set_attribute(instance, attr, Value::Text(value.to_string()))?;
        }
        Ok(())
    }

    /// Queue an instance for saving; with `commit`, flush and reload it from storage.
    ///
    /// The entity's "all" cache is invalidated either way.
    pub fn save(&self, instance: &mut Instance, commit: bool) -> Result<()> {
        self.session.lock().add(instance);
        let result = if commit {
            self.commit_session().map(|saved| {
                if let Some((_, row)) = saved.into_iter().find(|(h, _)| *h == instance.handle()) {
                    instance.load_row(row);
                }
            })
        } else {
            Ok(())
        };
        self.cache.invalidate(instance.entity_name());
        self.renderer.invalidate(instance.handle());
        result
    }

    /// Update an instance, then save it.
    ///
    /// `set` is an `attr=value,...` list applied without prompting; without it every
    /// attribute not ending with the identity suffix is collected, defaulting to its current
    /// value.
    pub fn edit(&self, instance: &mut Instance, set: Option<&str>) -> Result<()> {
        match set.filter(|s| !s.trim().is_empty()) {
            Some(assignments) => self.set_attributes(instance, assignments)?,
            None => {
                let def = Arc::clone(instance.entity_arc());
                for attr in def.attributes(false) {
                    if !self.config.is_identity_like(attr) {
                        self.ask_attribute(instance, attr, None)?;
                    }
                }
            }
        }
        self.save(instance, true)
    }

    /// Delete one instance, or without one every instance matching `criteria`.
    ///
    /// Returns the number of instances removed. With `commit` the session is flushed.
    pub fn delete(
        &self,
        entity: &str,
        instance: Option<&Instance>,
        commit: bool,
        criteria: &Criteria,
    ) -> Result<usize> {
        let def = self.get_model(entity)?;
        let removed = match instance {
            None => self.filter(&def.name, criteria)?.delete()?,
            Some(instance) => {
                self.session.lock().delete(instance)?;
                self.cache.invalidate(instance.entity_name());
                self.renderer.invalidate(instance.handle());
                1
            }
        };
        let result = if commit { self.commit_session().map(drop) } else { Ok(()) };
        self.cache.invalidate(&def.name);
        result.map(|_| removed)
    }

    /// Flush pending work, returning the number of instances written.
    pub fn commit(&self) -> Result<usize> {
        Ok(self.commit_session()?.len())
    }

    /// Discard pending work and roll back the open transaction.
    pub fn rollback(&self) -> Result<()> {
        let result = self.session.lock().rollback();
        self.cache.clear();
        self.renderer.clear();
        result
    }

    /// Ask for one attribute through the prompt and write the answer back.
    ///
    /// Picking "Create" on a relationship collects, saves and assigns a new target instance.
    pub fn ask_attribute(&self, instance: &mut Instance, attribute: &str, default: Option<Value>) -> Result<()> {
        let def = Arc::clone(instance.entity_arc());
        let question = match def.require_attribute(attribute)? {
            Attribute::Scalar(field) => collect::scalar_question(
                &def,
                field,
                instance.scalar(attribute),
                default,
                self.translator.as_ref(),
            )?,
            Attribute::Relation(rel) => {
                let target = self.get_model(&rel.target)?;
                let template = target.presentation.option_template.as_deref();
                let options = self
                    .all(&target.name)?
                    .iter()
                    .map(|option| Ok((self.render(option, template)?, option.clone())))
                    .collect::<Result<Vec<_>>>()?;
                collect::relation_question(&def, rel, options, self.translator.as_ref())
            }
        };

        let value = match (self.prompt.ask(&question)?, &question.prompt_type) {
            (Answer::Value(value), _) => value,
            (Answer::Create, PromptType::Entity(target)) => {
                info!(entity = %target, attribute, "creating related instance");
                let mut created = self.create(target, true, &[])?;
                self.save(&mut created, true)?;
                Value::Entity(Box::new(created))
            }
            (Answer::Create, PromptType::Scalar(_)) => {
                return Err(Error::Prompt(format!("\"{}\" cannot be created", attribute)));
            }
        };
        self.set_attribute(instance, attribute, value)
    }

    /// Project instances into table cells.
    ///
    /// Columns are `columns` if given, else the entity's table attributes, else its scalar
    /// attributes with `_id` removed. Headers and the title are translated. Cells of
    /// translated columns are passed through the translator; a related instance in such a
    /// cell is rendered with its type's table template.
    pub fn tabulate(&self, entity: &str, instances: &[Instance], columns: Option<&[String]>) -> Result<TableData> {
        let def = self.get_model(entity)?;
        let columns: Vec<String> = match columns.filter(|c| !c.is_empty()) {
            Some(columns) => columns.to_vec(),
            None => match &def.presentation.table_attributes {
                Some(attrs) => attrs.clone(),
                None => def
                    .attributes(true)
                    .iter()
                    .map(|a| a.replace("_id", ""))
                    .collect(),
            },
        };

        let headers = columns.iter().map(|c| self.translate(c)).collect();
        let mut table = TableData::new(self.translate(&def.name), headers);
        for instance in instances {
            let row = columns
                .iter()
                .map(|column| self.table_cell(&def, instance, column))
                .collect::<Result<Vec<_>>>()?;
            table.push_row(row);
        }
        Ok(table)
    }

    fn table_cell(&self, def: &EntityDef, instance: &Instance, column: &str) -> Result<String> {
        let translated = def.translates(column);
        let text = match def.require_attribute(column)? {
            Attribute::Scalar(_) => instance.get(column)?.to_string(),
            Attribute::Relation(rel) => match self.related(instance, &rel.name)? {
                Some(related) => {
                    let template = translated
                        .then(|| related.entity().presentation.table_template.clone())
                        .flatten();
                    self.render(&related, template.as_deref())?
                }
                None => Value::Null.to_string(),
            },
        };
        Ok(if translated { self.translate(&text) } else { text })
    }

    fn commit_session(&self) -> Result<Vec<(InstanceHandle, Row)>> {
        let result = self.session.lock().commit();
        // A commit touches every type with pending work.
        self.cache.clear();
        result
    }
}

/// Whether an attribute still needs a value.
fn is_unset(instance: &Instance, attribute: &str) -> bool {
    match instance.entity().attribute(attribute) {
        Some(Attribute::Scalar(_)) => instance.scalar(attribute).map_or(true, Value::is_null),
        Some(Attribute::Relation(rel)) => {
            instance.related(&rel.name).is_none()
                && instance.scalar(&rel.local_field).map_or(true, Value::is_null)
        }
        None => false,
    }
}

/// Split `attr=value,attr=value` into pairs. Attribute names are trimmed, values are not.
pub fn parse_assignments(assignments: &str) -> Result<Vec<(&str, &str)>> {
    assignments
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            part.split_once('=')
                .map(|(attr, value)| (attr.trim(), value))
                .filter(|(attr, _)| !attr.is_empty())
                .ok_or_else(|| Error::InvalidAssignment(part.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignments() {
        assert_eq!(
            parse_assignments("name=Rex,age=3").unwrap(),
            vec![("name", "Rex"), ("age", "3")]
        );
        assert_eq!(parse_assignments("note=a=b").unwrap(), vec![("note", "a=b")]);
        assert!(parse_assignments("").unwrap().is_empty());
        assert!(matches!(parse_assignments("name"), Err(Error::InvalidAssignment(_))));
        assert!(matches!(parse_assignments("=x"), Err(Error::InvalidAssignment(_))));
    }
}
