//! In-process store.

use super::{Row, Store};
use crate::catalog::{EntityDef, ScalarType};
use crate::error::{Error, Result};
use crate::query::{FilterEvaluator, Predicate};
use crate::value::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::ops::ControlFlow;
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct Table {
    rows: Vec<Row>,
    next_id: i64,
}

/// A store that keeps every table in memory.
///
/// Transactions snapshot all tables on `begin` and restore them on `rollback`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<String, Table>,
    snapshot: Option<HashMap<String, Table>>,
}

fn table_key(entity: &EntityDef) -> String {
    entity.name.to_lowercase()
}

fn column<'a>(row: &'a Row, name: &str) -> Option<&'a Value> {
    row.iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

fn identity_of<'a>(entity: &EntityDef, row: &'a Row) -> Option<&'a Value> {
    column(row, &entity.identity_field).filter(|v| !v.is_null())
}

fn same_identity(a: &Value, b: &Value) -> bool {
    a.compare(b).map(Ordering::is_eq).unwrap_or(false)
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, entity: &EntityDef) -> Option<&Table> {
        self.tables.get(&table_key(entity))
    }

    fn table_mut(&mut self, entity: &EntityDef) -> &mut Table {
        self.tables.entry(table_key(entity)).or_default()
    }

    /// Complete a row to the full declared column set, applying defaults.
    fn complete_row(entity: &EntityDef, mut row: Row) -> Result<Row> {
        let mut full = Vec::with_capacity(entity.fields.len());
        for field in &entity.fields {
            let value = row
                .iter()
                .position(|(n, _)| *n == field.name)
                .map(|idx| row.swap_remove(idx).1)
                .unwrap_or(Value::Null);
            let value = match value {
                Value::Null => field.default_value()?.unwrap_or(Value::Null),
                v => v,
            };
            full.push((field.name.clone(), value));
        }
        Ok(full)
    }

    fn check_not_null(entity: &EntityDef, row: &Row) -> Result<()> {
        for field in &entity.fields {
            if !field.nullable && column(row, &field.name).map_or(true, Value::is_null) {
                return Err(Error::invalid_value(
                    &field.name,
                    format!("{}.{} may not be null", entity.name, field.name),
                ));
            }
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    fn insert(&mut self, entity: &EntityDef, row: Row) -> Result<Row> {
        let mut row = Self::complete_row(entity, row)?;
        let table = self.table_mut(entity);

        match identity_of(entity, &row).cloned() {
            Some(id) => {
                if table
                    .rows
                    .iter()
                    .any(|r| identity_of(entity, r).is_some_and(|v| same_identity(v, &id)))
                {
                    return Err(Error::invalid_value(
                        &entity.identity_field,
                        format!("{} with identity {} already exists", entity.name, id),
                    ));
                }
                if let Value::Int(i) = id {
                    table.next_id = table.next_id.max(i);
                }
            }
            None => {
                let is_int = entity
                    .get_identity_field()
                    .is_some_and(|f| f.scalar_type == ScalarType::Int);
                if !is_int {
                    return Err(Error::invalid_value(
                        &entity.identity_field,
                        "identity must be given for non-integer keys",
                    ));
                }
                table.next_id += 1;
                let id = Value::Int(table.next_id);
                if let Some(slot) = row.iter_mut().find(|(n, _)| *n == entity.identity_field) {
                    slot.1 = id;
                }
            }
        }

        Self::check_not_null(entity, &row)?;

        let table = self.table_mut(entity);
        let position = {
            let id = identity_of(entity, &row);
            table
                .rows
                .iter()
                .position(|r| match (identity_of(entity, r), id) {
                    (Some(a), Some(b)) => a.compare(b).is_some_and(Ordering::is_gt),
                    _ => false,
                })
                .unwrap_or(table.rows.len())
        };
        table.rows.insert(position, row.clone());
        debug!(entity = %entity.name, rows = table.rows.len(), "inserted row");
        Ok(row)
    }

    fn update(&mut self, entity: &EntityDef, id: &Value, row: Row) -> Result<bool> {
        let Some(table) = self.tables.get_mut(&table_key(entity)) else {
            return Ok(false);
        };
        let Some(stored) = table
            .rows
            .iter_mut()
            .find(|r| identity_of(entity, r).is_some_and(|v| same_identity(v, id)))
        else {
            return Ok(false);
        };

        let mut updated = stored.clone();
        for (name, value) in row {
            if let Some(slot) = updated.iter_mut().find(|(n, _)| *n == name) {
                slot.1 = value;
            }
        }
        Self::check_not_null(entity, &updated)?;
        *stored = updated;
        Ok(true)
    }

    fn delete(&mut self, entity: &EntityDef, id: &Value) -> Result<bool> {
        let Some(table) = self.tables.get_mut(&table_key(entity)) else {
            return Ok(false);
        };
        let before = table.rows.len();
        table
            .rows
            .retain(|r| !identity_of(entity, r).is_some_and(|v| same_identity(v, id)));
        Ok(table.rows.len() < before)
    }

    fn delete_where(&mut self, entity: &EntityDef, predicates: &[Predicate]) -> Result<usize> {
        let Some(table) = self.tables.get_mut(&table_key(entity)) else {
            return Ok(0);
        };
        let before = table.rows.len();
        table
            .rows
            .retain(|r| !FilterEvaluator::matches_all(predicates, r));
        Ok(before - table.rows.len())
    }

    fn scan(
        &self,
        entity: &EntityDef,
        predicates: &[Predicate],
        visit: &mut dyn FnMut(Row) -> ControlFlow<()>,
    ) -> Result<()> {
        let Some(table) = self.table(entity) else {
            return Ok(());
        };
        for row in &table.rows {
            if FilterEvaluator::matches_all(predicates, row) && visit(row.clone()).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn count(&self, entity: &EntityDef, predicates: &[Predicate]) -> Result<usize> {
        Ok(self.table(entity).map_or(0, |t| {
            t.rows
                .iter()
                .filter(|r| FilterEvaluator::matches_all(predicates, r))
                .count()
        }))
    }

    fn fetch(&self, entity: &EntityDef, id: &Value) -> Result<Option<Row>> {
        Ok(self.table(entity).and_then(|t| {
            t.rows
                .iter()
                .find(|r| identity_of(entity, r).is_some_and(|v| same_identity(v, id)))
                .cloned()
        }))
    }

    fn begin(&mut self) -> Result<()> {
        if self.snapshot.is_none() {
            self.snapshot = Some(self.tables.clone());
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.snapshot = None;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if let Some(tables) = self.snapshot.take() {
            self.tables = tables;
        }
        Ok(())
    }
}
